pub mod admin;
pub mod health;
pub mod pin;
pub mod session;
pub mod token;
pub mod ws;
