pub mod claim;
pub mod completions;
pub mod create;
pub mod delete;
pub mod list;
pub mod login;
pub mod pending;
pub mod show;
pub mod update;
