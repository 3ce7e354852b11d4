use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::model::{Item, ItemPatch, NewItem};
use crate::remote::{ItemBackend, ItemFilter, RemoteError};

/// Where a fetched list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Served {
    Remote,
    /// The backend failed; the fallback dataset was served instead.
    Fallback { reason: RemoteError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub items: Vec<Item>,
    pub served: Served,
}

impl Fetched {
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self.served, Served::Fallback { .. })
    }
}

/// A backend wrapped with a client-side timeout and a fallback dataset.
///
/// [`fetch`](Self::fetch) is total: every backend failure, including a
/// timeout or a non-2xx answer, degrades to the fallback list filtered by
/// the same criteria. Mutations are bounded by the same timeout, which
/// surfaces as [`RemoteError::Timeout`].
#[derive(Debug)]
pub struct RemoteItemSource<B> {
    backend: B,
    fallback: Vec<Item>,
    timeout: Duration,
}

impl<B: ItemBackend> RemoteItemSource<B> {
    #[must_use]
    pub const fn new(backend: B, fallback: Vec<Item>, timeout: Duration) -> Self {
        Self {
            backend,
            fallback,
            timeout,
        }
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn fallback(&self) -> &[Item] {
        &self.fallback
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(RemoteError::Timeout(self.timeout)))
    }

    pub async fn fetch(&self, filter: &ItemFilter) -> Vec<Item> {
        self.fetch_outcome(filter).await.items
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch_outcome(&self, filter: &ItemFilter) -> Fetched {
        match self.bounded(self.backend.list_items(filter)).await {
            Ok(items) => {
                debug!(count = items.len(), "fetched remote items");
                Fetched {
                    items,
                    served: Served::Remote,
                }
            }
            Err(reason) => {
                let items: Vec<Item> = self
                    .fallback
                    .iter()
                    .filter(|item| filter.matches(item))
                    .cloned()
                    .collect();
                warn!(
                    error = %reason,
                    fallback_items = items.len(),
                    "remote fetch failed, serving fallback dataset"
                );
                Fetched {
                    items,
                    served: Served::Fallback { reason },
                }
            }
        }
    }

    /// # Errors
    ///
    /// Any backend failure, with timeouts reported as [`RemoteError::Timeout`].
    pub async fn create(&self, draft: &NewItem) -> Result<Option<Item>, RemoteError> {
        self.bounded(self.backend.create_item(draft)).await
    }

    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub async fn claim(&self, id: &str) -> Result<(), RemoteError> {
        self.bounded(self.backend.claim_item(id)).await
    }

    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub async fn update(&self, id: &str, patch: &ItemPatch) -> Result<(), RemoteError> {
        self.bounded(self.backend.update_item(id, patch)).await
    }

    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.bounded(self.backend.delete_item(id)).await
    }
}
