//! Single-device sign-in with a short numeric PIN.
//!
//! A PIN is bound to an account, an email and the ECDSA address of the device
//! that asked for it. The device proves possession of its key by signing the
//! PIN it received out of band.

mod errors;
mod pool;
mod service;

pub use errors::PinError;
pub use pool::{PIN_LENGTH, Pin, PinPool};
pub use service::{LogPinDelivery, PinDelivery, PinIssued, PinRedemption, PinRequest, PinService};
