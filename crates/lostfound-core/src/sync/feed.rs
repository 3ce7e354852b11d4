//! The live item view.
//!
//! [`ItemFeed`] holds the most recent reconciled view together with the
//! remote snapshot it was built from. Refreshes are last-request-wins:
//! every call takes a ticket before suspending on the network, and a
//! result whose ticket is no longer the newest is discarded on arrival.
//!
//! The feed also keeps the claim overlay: identities seen as claimed during
//! this process, and claims saved on this device that the service has not
//! confirmed, stay claimed in every later view.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::identity::identity_of;
use crate::model::Item;
use crate::remote::{ItemBackend, ItemFilter, RemoteItemSource, Served};
use crate::store::{KeyValueStore, LocalStore};
use crate::sync::reconcile::{Origin, ViewEntry, reconcile_with_origin};

/// What happened to a refresh once its fetch completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The result became the current view.
    Applied { served: Served, entries: usize },
    /// A newer refresh was issued while this one was in flight.
    Superseded,
}

impl RefreshOutcome {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Debug, Default)]
struct FeedState {
    filter: ItemFilter,
    remote: Vec<Item>,
    served: Option<Served>,
    entries: Vec<ViewEntry>,
    claimed: HashSet<String>,
}

impl FeedState {
    fn rebuild(&mut self, local: &[Item], unconfirmed: Vec<String>) {
        self.claimed.extend(unconfirmed);
        let mut entries = reconcile_with_origin(local, &self.remote).entries;
        for entry in &mut entries {
            let Some(id) = identity_of(&entry.item) else {
                continue;
            };
            if self.claimed.contains(id) {
                entry.item.mark_claimed();
            } else if entry.item.claimed {
                self.claimed.insert(id.to_string());
            }
        }
        self.entries = entries;
    }
}

#[derive(Debug, Default)]
pub struct ItemFeed {
    state: Mutex<FeedState>,
    issued: AtomicU64,
}

impl ItemFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch with `filter` and, unless superseded, make the result current.
    ///
    /// Superseded results are dropped without reading or writing the local
    /// slot.
    pub async fn refresh<B, S>(
        &self,
        source: &RemoteItemSource<B>,
        local: &LocalStore<S>,
        filter: &ItemFilter,
    ) -> RefreshOutcome
    where
        B: ItemBackend,
        S: KeyValueStore,
    {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = source.fetch_outcome(filter).await;

        let mut state = self.lock();
        let newest = self.issued.load(Ordering::SeqCst);
        if ticket != newest {
            debug!(ticket, newest, "discarding superseded fetch");
            return RefreshOutcome::Superseded;
        }
        state.filter = filter.clone();
        state.remote = fetched.items;
        state.served = Some(fetched.served.clone());
        state.rebuild(&local.load(), local.pending_claims());
        RefreshOutcome::Applied {
            served: fetched.served,
            entries: state.entries.len(),
        }
    }

    /// Recompute the view from the cached remote snapshot and the current
    /// local slots. Used after a local-only change.
    pub fn rebuild<S: KeyValueStore>(&self, local: &LocalStore<S>) {
        let items = local.load();
        let claims = local.pending_claims();
        self.lock().rebuild(&items, claims);
    }

    /// Optimistically mark `id` claimed in the current and all later views.
    ///
    /// Returns whether the identity is part of the current view.
    pub fn patch_claimed(&self, id: &str) -> bool {
        let mut state = self.lock();
        state.claimed.insert(id.to_string());
        let mut found = false;
        for entry in &mut state.entries {
            if identity_of(&entry.item) == Some(id) {
                entry.item.mark_claimed();
                found = true;
            }
        }
        found
    }

    /// Whether `id` is pinned as claimed for the rest of the process.
    #[must_use]
    pub fn is_claim_pinned(&self, id: &str) -> bool {
        self.lock().claimed.contains(id)
    }

    #[must_use]
    pub fn view(&self) -> Vec<Item> {
        self.lock().entries.iter().map(|e| e.item.clone()).collect()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<ViewEntry> {
        self.lock().entries.clone()
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<ViewEntry> {
        self.lock()
            .entries
            .iter()
            .find(|entry| identity_of(&entry.item) == Some(id))
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    #[must_use]
    pub fn origin_of(&self, id: &str) -> Option<Origin> {
        self.find(id).map(|entry| entry.origin)
    }

    /// Filter of the view currently shown.
    #[must_use]
    pub fn filter(&self) -> ItemFilter {
        self.lock().filter.clone()
    }

    /// How the current view's remote half was served, if it was ever fetched.
    #[must_use]
    pub fn served(&self) -> Option<Served> {
        self.lock().served.clone()
    }
}
