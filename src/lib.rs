pub mod config;
pub mod crypto;
pub mod domain;
pub mod pin;
pub mod server;
pub mod session;
pub mod setup;
pub mod siwe;
pub mod telemetry;
pub mod token;
