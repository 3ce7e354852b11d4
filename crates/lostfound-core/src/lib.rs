//! lostfound-core library.
//!
//! Keeps a lost-and-found item view consistent while the remote catalog
//! is slow, unreachable or inconsistent:
//!
//! - [`sync::reconcile`] merges pending local items with remote items.
//! - [`remote::RemoteItemSource`] turns every network failure on reads into
//!   a fallback dataset.
//! - [`sync::mutator::OptimisticMutator`] applies create/claim/update/delete
//!   with local fallback.
//! - [`role::normalize`] repairs role claims before authorization.
//!
//! # Conventions
//!
//! - **Errors**: library errors are `thiserror` enums with stable
//!   [`error::ErrorCode`]s; configuration uses `anyhow::Result`.
//! - **Logging**: `tracing` macros; every absorbed failure is logged at
//!   `warn`.

pub mod config;
pub mod error;
pub mod identity;
pub mod lock;
pub mod model;
pub mod remote;
pub mod role;
pub mod session;
pub mod store;
pub mod sync;

pub use error::{ErrorCode, SyncError};
pub use model::{Item, ItemPatch, NewItem, Role, User};
pub use sync::reconcile::reconcile;
