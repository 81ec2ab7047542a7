//! # nexus-store
//!
//! Durable state for the relay: registered identities, groups and the
//! per-sender delivery log.
//!
//! Each of the three collections is held in memory behind its own lock and
//! written through to a [`DurableStore`] as a whole JSON document whenever it
//! changes. The production backend is SQLite ([`Database`]); tests use
//! [`MemoryStore`].

pub mod backend;
pub mod database;
pub mod groups;
pub mod identities;
pub mod messages;
pub mod migrations;
pub mod models;

mod error;

pub use backend::{DurableStore, MemoryStore};
pub use database::Database;
pub use error::{GroupError, IdentityError, StoreError};
pub use groups::GroupStore;
pub use identities::IdentityStore;
pub use messages::DeliveryLog;
pub use models::*;
