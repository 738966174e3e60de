//! Distributed message-identifier store.
//!
//! Replay protection needs one shared mutable resource: a store where an
//! identifier can be claimed exactly once until it expires. The gateway
//! runs as a fleet, so implementations must make `assert_unique` atomic
//! across machines, not just within one process: of all concurrent claims
//! for the same identifier, exactly one observes [`Uniqueness::Unique`]
//! and every other observes [`Uniqueness::Duplicate`], including during
//! the grace window before expired rows are reclaimed.

use crate::errors::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

mod memory;

pub use memory::InMemoryMessageIdStore;

/// Whether an identifier claim succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uniqueness {
    /// The identifier was not present; this caller now holds it.
    Unique,

    /// The identifier was already claimed and has not expired.
    Duplicate,
}

/// Store of claimed message identifiers.
#[async_trait]
pub trait MessageIdStore: Send + Sync {
    /// Claim `id` until `expires`. Returns [`Uniqueness::Duplicate`] when
    /// a live claim already exists; storage faults are errors.
    async fn assert_unique(
        &self,
        id: &str,
        expires: DateTime<Utc>,
    ) -> Result<Uniqueness, StorageError>;

    /// Reclaim expired identifiers.
    async fn cleanup(&self) -> Result<usize, StorageError>;
}
