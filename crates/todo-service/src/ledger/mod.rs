//! Token ledger: allocation and revocation of session token ids.
//!
//! The ledger is the single source of truth for revocation. Token ids are
//! allocated monotonically and never reused; a revoked id stays revoked for
//! the lifetime of the ledger.
//!
//! The two capabilities are separate traits so the issuer (and tests) can
//! depend on exactly what they use.

use crate::errors::LedgerError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Hands out fresh token ids.
#[async_trait]
pub trait TokenIdAllocator: Send + Sync {
    /// Return an id no previous call has returned.
    async fn allocate_id(&self) -> Result<u64, LedgerError>;
}

/// Tracks revoked token ids.
#[async_trait]
pub trait TokenRevoker: Send + Sync {
    /// False for any id never revoked, including ids not yet allocated.
    async fn is_revoked(&self, token_id: u64) -> Result<bool, LedgerError>;

    /// Mark `token_id` revoked. Revoking twice is a no-op.
    ///
    /// Returns true only for the call that moved the id to revoked.
    async fn revoke(&self, token_id: u64) -> Result<bool, LedgerError>;
}

/// Process-lifetime ledger.
///
/// Allocation is a single atomic increment. Revocations serialize on the
/// write lock, so of two concurrent revokes of the same id exactly one
/// reports it newly revoked and both observe it revoked afterwards.
#[derive(Debug)]
pub struct InMemoryTokenLedger {
    next_id: AtomicU64,
    revoked: RwLock<HashSet<u64>>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            revoked: RwLock::new(HashSet::new()),
        }
    }

    /// Number of revoked ids currently tracked.
    pub async fn revoked_count(&self) -> usize {
        self.revoked.read().await.len()
    }
}

impl Default for InMemoryTokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenIdAllocator for InMemoryTokenLedger {
    async fn allocate_id(&self) -> Result<u64, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id == u64::MAX {
            return Err(LedgerError::Unavailable(
                "token id space exhausted".to_string(),
            ));
        }
        Ok(id)
    }
}

#[async_trait]
impl TokenRevoker for InMemoryTokenLedger {
    async fn is_revoked(&self, token_id: u64) -> Result<bool, LedgerError> {
        Ok(self.revoked.read().await.contains(&token_id))
    }

    async fn revoke(&self, token_id: u64) -> Result<bool, LedgerError> {
        let newly_revoked = self.revoked.write().await.insert(token_id);
        debug!(
            target: "todo.ledger",
            token_id = token_id,
            newly_revoked = newly_revoked,
            "Token id revoked"
        );
        Ok(newly_revoked)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_allocate_returns_increasing_ids() {
        let ledger = InMemoryTokenLedger::new();

        let first = ledger.allocate_id().await.unwrap();
        let second = ledger.allocate_id().await.unwrap();
        let third = ledger.allocate_id().await.unwrap();

        assert_eq!(first, 1);
        assert!(second > first);
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_revoked() {
        let ledger = InMemoryTokenLedger::new();

        assert!(!ledger.is_revoked(1).await.unwrap());
        // Never allocated
        assert!(!ledger.is_revoked(999_999).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_is_observable_immediately() {
        let ledger = InMemoryTokenLedger::new();
        let id = ledger.allocate_id().await.unwrap();

        assert!(ledger.revoke(id).await.unwrap());

        assert!(ledger.is_revoked(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let ledger = InMemoryTokenLedger::new();
        let id = ledger.allocate_id().await.unwrap();

        assert!(ledger.revoke(id).await.unwrap());
        assert!(!ledger.revoke(id).await.unwrap());

        assert!(ledger.is_revoked(id).await.unwrap());
        assert_eq!(ledger.revoked_count().await, 1);
    }

    #[tokio::test]
    async fn test_revoke_does_not_affect_other_ids() {
        let ledger = InMemoryTokenLedger::new();
        let a = ledger.allocate_id().await.unwrap();
        let b = ledger.allocate_id().await.unwrap();

        ledger.revoke(a).await.unwrap();

        assert!(ledger.is_revoked(a).await.unwrap());
        assert!(!ledger.is_revoked(b).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocation_yields_distinct_ids() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let n = 500;

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.allocate_id().await.unwrap() })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), n);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_revoke_of_same_id() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let id = ledger.allocate_id().await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.revoke(id).await })
            })
            .collect();

        let mut newly_revoked = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                newly_revoked += 1;
            }
        }

        assert_eq!(newly_revoked, 1);
        assert!(ledger.is_revoked(id).await.unwrap());
        assert_eq!(ledger.revoked_count().await, 1);
    }
}
