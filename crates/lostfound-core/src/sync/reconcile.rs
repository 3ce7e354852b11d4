//! Local/remote reconciliation for item lists.
//!
//! Merges the items waiting in the local slot with the items served by the
//! remote catalog into one deduplicated, order-stable view.
//!
//! # Semantics
//!
//! The inputs are concatenated as `local ++ remote` and, for each identity,
//! only its first occurrence is kept. That single rule gives:
//!
//! - **No duplicates**: every identity appears once.
//! - **Local wins**: an identity present on both sides keeps the local copy,
//!   which carries the user's most recent intent.
//! - **Stable order**: all local entries come first, then the remote-only
//!   ones; relative order inside each side is untouched. Nothing is sorted.
//!
//! Entries without a usable identity cannot be proven duplicates and are
//! always kept. Reconciliation never fails and never drops an entry for
//! being malformed.

use std::collections::HashSet;

use serde::Serialize;

use crate::identity::identity_of;
use crate::model::Item;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which source an entry of a reconciled view was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Present in the local slot, not yet confirmed by the remote catalog.
    Local,
    /// Served by the remote catalog (or its fallback dataset).
    Remote,
}

/// One entry of a reconciled view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEntry {
    pub item: Item,
    pub origin: Origin,
}

/// The result of reconciling a local and a remote list.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Local entries first, then remote-only entries.
    pub entries: Vec<ViewEntry>,
    /// Number of local entries kept.
    pub local_retained: usize,
    /// Number of remote entries kept (identities not seen locally).
    pub remote_retained: usize,
    /// Number of input entries dropped because their identity was already seen.
    pub duplicates_skipped: usize,
    /// Number of kept entries that had no identity.
    pub unidentified: usize,
}

impl Reconciliation {
    /// Strip origins, keeping order.
    #[must_use]
    pub fn into_items(self) -> Vec<Item> {
        self.entries.into_iter().map(|entry| entry.item).collect()
    }

    #[must_use]
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.entries.iter().map(|entry| &entry.item)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reconcile two item lists with local-wins, first-occurrence semantics.
///
/// # Arguments
///
/// * `local`: items from the local slot (pending, user-authored).
/// * `remote`: items from the remote catalog.
///
/// # Examples
///
/// ```
/// use lostfound_core::model::Item;
/// use lostfound_core::sync::reconcile::reconcile;
///
/// let local = vec![Item::new("mine").with_id("a")];
/// let remote = vec![Item::new("theirs").with_id("a"), Item::new("b").with_id("b")];
/// let view = reconcile(&local, &remote);
/// assert_eq!(view.len(), 2);
/// assert_eq!(view[0].title, "mine");
/// ```
#[must_use]
pub fn reconcile(local: &[Item], remote: &[Item]) -> Vec<Item> {
    reconcile_with_origin(local, remote).into_items()
}

/// Like [`reconcile`], but tags every entry with its [`Origin`] and
/// reports merge statistics.
#[must_use]
pub fn reconcile_with_origin(local: &[Item], remote: &[Item]) -> Reconciliation {
    let mut seen: HashSet<&str> = HashSet::with_capacity(local.len() + remote.len());
    let mut entries: Vec<ViewEntry> = Vec::with_capacity(local.len() + remote.len());
    let mut local_retained = 0;
    let mut unidentified = 0;

    let tagged = local
        .iter()
        .map(|item| (item, Origin::Local))
        .chain(remote.iter().map(|item| (item, Origin::Remote)));

    for (item, origin) in tagged {
        let keep = match identity_of(item) {
            Some(id) => seen.insert(id),
            None => {
                unidentified += 1;
                true
            }
        };
        if !keep {
            continue;
        }
        if origin == Origin::Local {
            local_retained += 1;
        }
        entries.push(ViewEntry {
            item: item.clone(),
            origin,
        });
    }

    let duplicates_skipped = local.len() + remote.len() - entries.len();
    let remote_retained = entries.len() - local_retained;

    if duplicates_skipped > 0 {
        tracing::debug!(
            local = local.len(),
            remote = remote.len(),
            duplicates_skipped,
            "reconciled overlapping item lists"
        );
    }

    Reconciliation {
        entries,
        local_retained,
        remote_retained,
        duplicates_skipped,
        unidentified,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
