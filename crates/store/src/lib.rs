//! Datastore layer for the fulfillment system.
//!
//! The [`Datastore`] trait is the repository/ledger interface every saga
//! step and refund flow goes through: it takes and returns the plain-data
//! records from the `domain` crate and hides how mutations are made atomic.
//! [`MemoryStore`] is the in-memory implementation backing the single
//! logical datastore; each of its write methods is one scoped
//! read-modify-write block, the in-memory stand-in for a row-locking
//! transaction.

pub mod datastore;
pub mod error;
pub mod memory;

pub use datastore::Datastore;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
