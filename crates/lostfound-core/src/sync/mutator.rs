//! Optimistic create/claim/update/delete.
//!
//! Each mutation runs Attempting → Confirmed | FallenBack:
//!
//! - `create`: remote success refreshes the view; a network failure parks
//!   the item in the local slot instead.
//! - `claim`: the view is patched before the remote call and stays patched
//!   whatever the outcome. A claim the service could not be told about is
//!   saved on this device until `retry_pending` forwards it.
//! - `update`/`delete`: remote failures are surfaced. Items that only exist
//!   locally are changed in the local slot without a remote call.
//!
//! `Rejected` and `NotFound` always surface to the caller.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::identity::identity_of;
use crate::model::{Item, ItemPatch, NewItem, OwnerRef};
use crate::remote::{FailureClass, ItemBackend, ItemFilter, RemoteItemSource};
use crate::store::{KeyValueStore, LocalStore};
use crate::sync::feed::{ItemFeed, RefreshOutcome};

/// Prefix of identities minted for items saved while offline.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// User-facing result of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeSignal {
    SucceededRemote,
    SucceededLocalFallback,
    Failed,
}

impl OutcomeSignal {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SucceededRemote => "succeeded-remote",
            Self::SucceededLocalFallback => "succeeded-local-fallback",
            Self::Failed => "failed",
        }
    }

    /// Signal for a finished mutation, `Failed` for any error.
    #[must_use]
    pub const fn of(result: &Result<MutationReport, SyncError>) -> Self {
        match result {
            Ok(report) => report.signal,
            Err(_) => Self::Failed,
        }
    }
}

impl std::fmt::Display for OutcomeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    pub signal: OutcomeSignal,
    /// Identity of the affected item, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
}

impl MutationReport {
    fn remote(id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            signal: OutcomeSignal::SucceededRemote,
            id,
            message: message.into(),
        }
    }

    fn local(id: &str, message: impl Into<String>) -> Self {
        Self {
            signal: OutcomeSignal::SucceededLocalFallback,
            id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Caller state a mutation needs: the filter to refresh with and the
/// session user to stamp on new reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationContext {
    pub filter: ItemFilter,
    pub owner: Option<String>,
}

impl MutationContext {
    #[must_use]
    pub fn new(filter: ItemFilter) -> Self {
        Self {
            filter,
            owner: None,
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }
}

/// Result of [`OptimisticMutator::retry_pending`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrySummary {
    /// Local identities whose remote create succeeded.
    pub promoted: Vec<String>,
    /// Local identities left in place by a network failure.
    pub still_pending: Vec<String>,
    /// Identities refused by the server, with its message.
    pub rejected: Vec<(String, String)>,
    /// Saved claims the server accepted.
    pub claims_sent: Vec<String>,
    /// Saved claims left in place by a network failure.
    pub claims_pending: Vec<String>,
}

/// Single writer of the local slots; owns the feed it keeps current.
#[derive(Debug)]
pub struct OptimisticMutator<B, S> {
    source: RemoteItemSource<B>,
    local: LocalStore<S>,
    feed: ItemFeed,
    minted: AtomicU64,
}

impl<B: ItemBackend, S: KeyValueStore> OptimisticMutator<B, S> {
    #[must_use]
    pub fn new(source: RemoteItemSource<B>, local: LocalStore<S>) -> Self {
        Self {
            source,
            local,
            feed: ItemFeed::new(),
            minted: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn source(&self) -> &RemoteItemSource<B> {
        &self.source
    }

    #[must_use]
    pub const fn local(&self) -> &LocalStore<S> {
        &self.local
    }

    #[must_use]
    pub const fn feed(&self) -> &ItemFeed {
        &self.feed
    }

    /// Re-fetch and reconcile. See [`ItemFeed::refresh`].
    pub async fn refresh(&self, filter: &ItemFilter) -> RefreshOutcome {
        self.feed.refresh(&self.source, &self.local, filter).await
    }

    /// Report a new item.
    ///
    /// # Errors
    ///
    /// `Rejected`/`NotFound` from the server, or `Storage` when the local
    /// fallback cannot be written.
    pub async fn create(
        &self,
        ctx: &MutationContext,
        mut draft: NewItem,
    ) -> Result<MutationReport, SyncError> {
        if draft.owner.is_none() {
            draft.owner.clone_from(&ctx.owner);
        }

        match self.source.create(&draft).await {
            Ok(created) => {
                let id = created.as_ref().and_then(|item| item.identity().map(str::to_string));
                info!(id = id.as_deref().unwrap_or("?"), "item created remotely");
                self.refresh(&ctx.filter).await;
                Ok(MutationReport::remote(id, "Item reported."))
            }
            Err(err) if err.is_network() => {
                let now = Utc::now();
                let id = self.mint_local_id(&draft.title, now);
                warn!(error = %err, id = %id, "create failed, saving item locally");
                self.local.push(draft.into_item(id.clone(), now))?;
                self.feed.rebuild(&self.local);
                Ok(MutationReport::local(
                    &id,
                    "Saved on this device; it will be sent when the service is reachable.",
                ))
            }
            Err(err) => Err(err.into_sync_error(&draft.title)),
        }
    }

    /// Mark an item claimed.
    ///
    /// The view shows the claim immediately and keeps showing it, including
    /// when this returns an error. When only the network failed, the claim
    /// is saved so later views keep it until the service confirms it.
    ///
    /// # Errors
    ///
    /// `NotFound` when no source knows `id`, `Rejected` when the server
    /// refuses, `Storage` for local slot failures.
    pub async fn claim(&self, ctx: &MutationContext, id: &str) -> Result<MutationReport, SyncError> {
        let id = id.trim();
        let not_found = || SyncError::NotFound { id: id.to_string() };
        if id.is_empty() {
            return Err(not_found());
        }

        if self.local.contains(id) {
            self.local.modify(id, Item::mark_claimed)?;
            self.feed.rebuild(&self.local);
            self.feed.patch_claimed(id);
            return Ok(MutationReport::local(id, "Claimed on this device."));
        }

        let in_view = self.feed.patch_claimed(id);
        match self.source.claim(id).await {
            Ok(()) => {
                if let Err(err) = self.local.settle_claim(id) {
                    warn!(error = %err, id, "could not clear saved claim");
                }
                self.refresh(&ctx.filter).await;
                Ok(MutationReport::remote(Some(id.to_string()), "Item claimed."))
            }
            Err(err) if err.is_network() && in_view => {
                warn!(error = %err, id, "claim not confirmed remotely, saving it locally");
                self.local.record_claim(id)?;
                Ok(MutationReport::local(
                    id,
                    "Claimed on this device; it will be sent when the service is reachable.",
                ))
            }
            Err(err) if err.is_network() => {
                warn!(error = %err, id, "claim target unknown and service unreachable");
                Err(not_found())
            }
            Err(err) => Err(err.into_sync_error(id)),
        }
    }

    /// Apply field changes to an item.
    ///
    /// # Errors
    ///
    /// Every remote failure, including `NetworkUnavailable`.
    pub async fn update(
        &self,
        ctx: &MutationContext,
        id: &str,
        patch: &ItemPatch,
    ) -> Result<MutationReport, SyncError> {
        let id = id.trim();
        if self.local.modify(id, |item| patch.apply_to(item))?.is_some() {
            self.feed.rebuild(&self.local);
            return Ok(MutationReport::local(id, "Updated on this device."));
        }

        self.source
            .update(id, patch)
            .await
            .map_err(|err| err.into_sync_error(id))?;
        self.refresh(&ctx.filter).await;
        Ok(MutationReport::remote(Some(id.to_string()), "Item updated."))
    }

    /// Remove an item from the source that owns it.
    ///
    /// # Errors
    ///
    /// Every remote failure, including `NetworkUnavailable`.
    pub async fn delete(&self, ctx: &MutationContext, id: &str) -> Result<MutationReport, SyncError> {
        let id = id.trim();
        if self.local.remove(id)?.is_some() {
            self.feed.rebuild(&self.local);
            return Ok(MutationReport::local(id, "Removed from this device."));
        }

        self.source
            .delete(id)
            .await
            .map_err(|err| err.into_sync_error(id))?;
        self.refresh(&ctx.filter).await;
        Ok(MutationReport::remote(Some(id.to_string()), "Item deleted."))
    }

    /// Try to promote every pending local item with a remote create, then
    /// forward every saved claim.
    ///
    /// Stops at the first network failure; the rest stays pending. A corrupt
    /// slot is reset and counts as empty. Claims the server refuses are
    /// dropped and reported as rejected.
    ///
    /// # Errors
    ///
    /// `Storage` when a slot cannot be read or rewritten.
    pub async fn retry_pending(&self, ctx: &MutationContext) -> Result<RetrySummary, SyncError> {
        let pending = self.local.read_or_reset()?;
        let mut summary = RetrySummary::default();
        let mut offline = false;

        for item in pending {
            let Some(local_id) = identity_of(&item).map(str::to_string) else {
                continue;
            };
            if offline {
                summary.still_pending.push(local_id);
                continue;
            }
            match self.source.create(&draft_of(&item)).await {
                Ok(created) => {
                    if item.claimed {
                        self.forward_claim(created.as_ref()).await;
                    }
                    self.local.remove(&local_id)?;
                    info!(id = %local_id, "promoted pending item");
                    summary.promoted.push(local_id);
                }
                Err(err) if err.class() == FailureClass::Network => {
                    warn!(error = %err, "service unreachable, keeping pending items");
                    offline = true;
                    summary.still_pending.push(local_id);
                }
                Err(err) => {
                    let message = err.into_sync_error(&local_id).to_string();
                    warn!(id = %local_id, %message, "pending item rejected");
                    summary.rejected.push((local_id, message));
                }
            }
        }

        for id in self.local.pending_claims() {
            if offline {
                summary.claims_pending.push(id);
                continue;
            }
            match self.source.claim(&id).await {
                Ok(()) => {
                    self.local.settle_claim(&id)?;
                    info!(id = %id, "forwarded saved claim");
                    summary.claims_sent.push(id);
                }
                Err(err) if err.class() == FailureClass::Network => {
                    warn!(error = %err, "service unreachable, keeping saved claims");
                    offline = true;
                    summary.claims_pending.push(id);
                }
                Err(err) => {
                    let message = err.into_sync_error(&id).to_string();
                    self.local.settle_claim(&id)?;
                    warn!(id = %id, %message, "saved claim refused, dropping it");
                    summary.rejected.push((id, message));
                }
            }
        }

        if summary.promoted.is_empty() && summary.claims_sent.is_empty() {
            self.feed.rebuild(&self.local);
        } else {
            self.refresh(&ctx.filter).await;
        }
        Ok(summary)
    }

    async fn forward_claim(&self, created: Option<&Item>) {
        let Some(id) = created.and_then(Item::identity) else {
            return;
        };
        self.feed.patch_claimed(id);
        if let Err(err) = self.source.claim(id).await {
            warn!(error = %err, id, "could not forward claim of promoted item");
        }
    }

    /// `local-` followed by 10 hex chars, unique within the local slot.
    fn mint_local_id(&self, title: &str, now: DateTime<Utc>) -> String {
        let existing = self.local.load();
        loop {
            let counter = self.minted.fetch_add(1, Ordering::Relaxed);
            let mut hasher = blake3::Hasher::new();
            hasher.update(title.as_bytes());
            hasher.update(&now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
            hasher.update(&counter.to_le_bytes());
            let hex = hasher.finalize().to_hex();
            let id = format!("{LOCAL_ID_PREFIX}{}", &hex.as_str()[..10]);
            if !existing.iter().any(|item| identity_of(item) == Some(id.as_str())) {
                return id;
            }
        }
    }
}

fn draft_of(item: &Item) -> NewItem {
    NewItem {
        title: item.title.clone(),
        description: item.description.clone(),
        location: item.location.clone(),
        category: item.category,
        status: item.status,
        contact: item.contact.clone(),
        phone: item.phone.clone(),
        image_url: item.image_url.clone(),
        owner: item.owner.as_ref().and_then(OwnerRef::id).map(str::to_string),
    }
}
