//! Two-party session pairing and the SIWE authentication flow.
//!
//! A [`Session`] is created by one party and joined by a second; both then drive
//! its [`AuthFlow`] through the [`SessionController`], over a WebSocket or plain
//! HTTP calls. The [`SessionRegistry`] owns every live session.

mod client;
mod controller;
mod errors;
pub mod flow;
pub mod messages;
mod pairing;
mod registry;
mod socket;

pub use client::{SessionClient, Transport};
pub use controller::{Collaborators, SessionController};
pub use errors::{ErrorPayload, SessionError};
pub use flow::{AuthFlow, FlowState};
pub use messages::{Envelope, Inbound, Message, Request, SessionType};
pub use pairing::{MAX_PARTIES, Session};
pub use registry::SessionRegistry;
pub use socket::{SocketSettings, serve_socket};

use std::time::Duration;

use async_trait::async_trait;

/// Provides a method for deleting expired entries.
#[async_trait]
pub trait ExpiredDeletion: Send + Sync {
    /// Deletes expired entries and returns how many were removed.
    fn delete_expired(&self) -> usize;

    /// This function will keep running indefinitely, deleting expired entries
    /// and then waiting for the specified period before deleting again.
    async fn delete_expired_periodically(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = self.delete_expired();
            if removed > 0 {
                tracing::debug!(removed, "Deleted expired entries");
            }
        }
    }
}
