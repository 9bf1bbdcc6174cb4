//! SQLite-backed persistence for alert rules, delivery history and user
//! notification settings.
//!
//! [`AlertStore`] is the single access layer; entities live in
//! [`entities`] and per-table operations in [`store`] submodules.

pub mod entities;
pub mod error;
pub mod store;


pub use store::AlertStore;
