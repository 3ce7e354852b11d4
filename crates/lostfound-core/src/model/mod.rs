//! Item and user records exchanged between the local slot, the remote
//! catalog, and the presentation layer.

pub mod item;
pub mod user;

pub use item::{Category, Item, ItemPatch, NewItem, OwnerRef, Review, Status};
pub use user::{Role, User};
