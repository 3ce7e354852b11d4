//! Synchronisation between the local slot and the remote catalog.
//!
//! - [`reconcile`] merges local and remote lists into one view.
//! - [`feed`] owns the current view and enforces last-request-wins refreshes.
//! - [`mutator`] applies create/claim/update/delete with local fallback.

pub mod feed;
pub mod mutator;
pub mod reconcile;
