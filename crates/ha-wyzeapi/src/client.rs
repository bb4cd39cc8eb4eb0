//! Contract with the Wyze cloud client library

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by the Wyze cloud client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WyzeError {
    /// Credentials were rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The cloud could not be reached
    #[error("cannot connect to Wyze: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

/// An authenticated session with the Wyze cloud.
///
/// One client exists per config entry; platforms share it through
/// [`client_for_entry`](crate::client_for_entry).
#[async_trait]
pub trait WyzeClient: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<(), WyzeError>;

    /// End the session and release its connections
    async fn close(&self) -> Result<(), WyzeError>;
}

/// Creates fresh, not yet authenticated clients
#[async_trait]
pub trait WyzeClientFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn WyzeClient>, WyzeError>;
}
