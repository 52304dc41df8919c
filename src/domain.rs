//! Collaborators the pairing core talks to, and their in-memory implementations.

mod errors;
pub mod memory;
pub mod models;
pub mod ports;

pub use errors::{ErrorKind, StoreError};
