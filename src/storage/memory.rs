//! In-process message-identifier store.
//!
//! Single-node stand-in for the cluster-wide store; suitable for tests and
//! single-gateway deployments. DashMap's entry API gives the atomic
//! claim-if-absent without holding a map-wide lock.

use crate::errors::StorageError;
use crate::storage::{MessageIdStore, Uniqueness};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

/// DashMap-backed [`MessageIdStore`].
#[derive(Debug, Default)]
pub struct InMemoryMessageIdStore {
    claims: DashMap<String, DateTime<Utc>>,
}

impl InMemoryMessageIdStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live claims, expired rows included until cleanup runs.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[async_trait]
impl MessageIdStore for InMemoryMessageIdStore {
    async fn assert_unique(
        &self,
        id: &str,
        expires: DateTime<Utc>,
    ) -> Result<Uniqueness, StorageError> {
        let now = Utc::now();
        match self.claims.entry(id.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(expires);
                Ok(Uniqueness::Unique)
            }
            Entry::Occupied(mut entry) => {
                // An expired claim is reclaimable in place.
                if *entry.get() <= now {
                    entry.insert(expires);
                    Ok(Uniqueness::Unique)
                } else {
                    Ok(Uniqueness::Duplicate)
                }
            }
        }
    }

    async fn cleanup(&self) -> Result<usize, StorageError> {
        let now = Utc::now();
        let before = self.claims.len();
        self.claims.retain(|_, expires| *expires > now);
        let removed = before - self.claims.len();
        if removed > 0 {
            debug!(removed, "reclaimed expired message identifiers");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_first_claim_unique_second_duplicate() {
        let store = InMemoryMessageIdStore::new();
        let expires = Utc::now() + Duration::minutes(10);

        assert_eq!(
            store.assert_unique("uuid:msg-1", expires).await.unwrap(),
            Uniqueness::Unique
        );
        assert_eq!(
            store.assert_unique("uuid:msg-1", expires).await.unwrap(),
            Uniqueness::Duplicate
        );
        assert_eq!(
            store.assert_unique("uuid:msg-2", expires).await.unwrap(),
            Uniqueness::Unique
        );
    }

    #[tokio::test]
    async fn test_expired_claim_reclaimed_in_place() {
        let store = InMemoryMessageIdStore::new();
        let past = Utc::now() - Duration::minutes(1);
        let future = Utc::now() + Duration::minutes(10);

        assert_eq!(
            store.assert_unique("uuid:msg-1", past).await.unwrap(),
            Uniqueness::Unique
        );
        assert_eq!(
            store.assert_unique("uuid:msg-1", future).await.unwrap(),
            Uniqueness::Unique
        );
        assert_eq!(
            store.assert_unique("uuid:msg-1", future).await.unwrap(),
            Uniqueness::Duplicate
        );
    }

    #[tokio::test]
    async fn test_cleanup_reclaims_only_expired() {
        let store = InMemoryMessageIdStore::new();
        let past = Utc::now() - Duration::minutes(1);
        let future = Utc::now() + Duration::minutes(10);

        store.assert_unique("uuid:old", past).await.unwrap();
        store.assert_unique("uuid:live", future).await.unwrap();

        assert_eq!(store.cleanup().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.assert_unique("uuid:live", future).await.unwrap(),
            Uniqueness::Duplicate
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_admit_exactly_one() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryMessageIdStore::new());
        let expires = Utc::now() + Duration::minutes(10);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.assert_unique("uuid:contended", expires).await.unwrap()
            }));
        }

        let mut unique = 0;
        for handle in handles {
            if handle.await.unwrap() == Uniqueness::Unique {
                unique += 1;
            }
        }
        assert_eq!(unique, 1);
    }
}
