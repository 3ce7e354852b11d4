//! Access to the remote item catalog.
//!
//! [`ItemBackend`] is the raw, fallible transport. [`RemoteItemSource`]
//! wraps a backend with a client-side timeout and a fallback dataset so
//! that reads are total for every network-class failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::model::{Item, ItemPatch, NewItem};

pub mod envelope;
pub mod fallback;
pub mod filter;
pub mod http;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod source;

pub use filter::ItemFilter;
pub use http::HttpBackend;
#[cfg(any(test, feature = "test-support"))]
pub use memory::{Fault, MemoryBackend};
pub use source::{Fetched, RemoteItemSource, Served};

/// Raw transport to the remote catalog.
///
/// Implementations report every failure; the absorbing policy lives in
/// [`RemoteItemSource`] and the mutator.
#[async_trait]
pub trait ItemBackend: Send + Sync {
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, RemoteError>;

    /// Create an item. The response body is optional: some backends answer
    /// `201` with nothing useful in it.
    async fn create_item(&self, draft: &NewItem) -> Result<Option<Item>, RemoteError>;

    async fn claim_item(&self, id: &str) -> Result<(), RemoteError>;

    async fn update_item(&self, id: &str, patch: &ItemPatch) -> Result<(), RemoteError>;

    async fn delete_item(&self, id: &str) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: ItemBackend + ?Sized> ItemBackend for Arc<T> {
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, RemoteError> {
        (**self).list_items(filter).await
    }

    async fn create_item(&self, draft: &NewItem) -> Result<Option<Item>, RemoteError> {
        (**self).create_item(draft).await
    }

    async fn claim_item(&self, id: &str) -> Result<(), RemoteError> {
        (**self).claim_item(id).await
    }

    async fn update_item(&self, id: &str, patch: &ItemPatch) -> Result<(), RemoteError> {
        (**self).update_item(id, patch).await
    }

    async fn delete_item(&self, id: &str) -> Result<(), RemoteError> {
        (**self).delete_item(id).await
    }
}

/// How a backend failure is treated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient: timeouts, connection failures, 5xx, garbage bodies.
    Network,
    /// The server understood the request and refused it.
    Rejected,
    /// The target identity does not exist remotely.
    NotFound,
}

/// A failed backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl RemoteError {
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Timeout(_) | Self::Connect(_) | Self::Decode(_) => FailureClass::Network,
            Self::Status { status, .. } => match *status {
                404 | 410 => FailureClass::NotFound,
                408 | 429 | 500..=599 => FailureClass::Network,
                _ => FailureClass::Rejected,
            },
        }
    }

    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self.class(), FailureClass::Network)
    }

    /// Map into the caller-facing taxonomy; `id` names the mutation target.
    #[must_use]
    pub fn into_sync_error(self, id: &str) -> SyncError {
        match self.class() {
            FailureClass::Network => SyncError::NetworkUnavailable {
                reason: self.to_string(),
            },
            FailureClass::NotFound => SyncError::NotFound { id: id.to_string() },
            FailureClass::Rejected => SyncError::Rejected {
                message: match self {
                    Self::Status { message, .. } if !message.is_empty() => message,
                    other => other.to_string(),
                },
            },
        }
    }
}
