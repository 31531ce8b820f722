use std::sync::Arc;

use tracing::{debug, warn};

use super::{Claim, ClaimError, ClaimStore};

/// Owned handle to an acquired claim.
///
/// Call [`ClaimGuard::release`] on every exit path. If the guard is dropped
/// without it (a panic or a cancelled task), a best-effort release is
/// spawned on the current runtime; if that cannot happen the claim is left
/// for stale reclamation.
pub struct ClaimGuard {
    claim: Claim,
    store: Arc<dyn ClaimStore>,
    released: bool,
}

impl ClaimGuard {
    pub fn new(claim: Claim, store: Arc<dyn ClaimStore>) -> Self {
        Self {
            claim,
            store,
            released: false,
        }
    }

    pub fn claim(&self) -> &Claim {
        &self.claim
    }

    pub fn file_id(&self) -> &str {
        &self.claim.file_id
    }

    /// Release the claim. Returns whether a row was actually removed.
    pub async fn release(mut self) -> Result<bool, ClaimError> {
        self.released = true;
        let removed = self
            .store
            .release(&self.claim.file_id, &self.claim.holder_id)
            .await?;
        if !removed {
            debug!(
                file_id = %self.claim.file_id,
                holder_id = %self.claim.holder_id,
                "Claim was already gone at release"
            );
        }
        Ok(removed)
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let store = Arc::clone(&self.store);
        let file_id = self.claim.file_id.clone();
        let holder_id = self.claim.holder_id.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(file_id = %file_id, "Claim guard dropped unreleased, releasing in background");
                handle.spawn(async move {
                    if let Err(e) = store.release(&file_id, &holder_id).await {
                        warn!(file_id = %file_id, error = %e, "Background claim release failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    file_id = %file_id,
                    "Claim guard dropped outside a runtime, claim left for stale reclamation"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{AcquireOutcome, SqliteClaimStore};
    use crate::job::ProcessKind;
    use chrono::Duration;

    async fn acquire(store: &Arc<SqliteClaimStore>, file_id: &str) -> ClaimGuard {
        match store.acquire(file_id, "host-A", ProcessKind::Mail).await.unwrap() {
            AcquireOutcome::Acquired { claim, .. } => {
                ClaimGuard::new(claim, Arc::clone(store) as Arc<dyn ClaimStore>)
            }
            other => panic!("expected Acquired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_release_removes_claim() {
        let store = Arc::new(SqliteClaimStore::in_memory(Duration::minutes(30)).unwrap());
        let guard = acquire(&store, "R1_A_1").await;
        assert_eq!(guard.file_id(), "R1_A_1");

        assert!(guard.release().await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_without_release_frees_claim() {
        let store = Arc::new(SqliteClaimStore::in_memory(Duration::minutes(30)).unwrap());
        let guard = acquire(&store, "R1_A_1").await;
        drop(guard);

        // Give the spawned release a chance to finish
        for _ in 0..50 {
            if store.list().await.unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("claim was not released after guard drop");
    }
}
