//! Status relay: keeps the agent's latest snapshot and performs the one-time
//! seeding of the approval ledger's pending queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::ledger::ApprovalLedger;
use crate::models::status::{Receipt, StatusSnapshot};
use crate::store::{read_json, KvStore, StoreError};

pub const SNAPSHOT_KEY: &str = "latest";
pub const LAST_SYNC_KEY: &str = "last_sync";

const NO_DATA: &str = "No status data available. The backup agent has not pushed a snapshot yet.";

pub struct StatusRelay {
    store: Option<Arc<dyn KvStore>>,
    ledger: Arc<ApprovalLedger>,
}

impl StatusRelay {
    pub fn new(store: Option<Arc<dyn KvStore>>, ledger: Arc<ApprovalLedger>) -> Self {
        if store.is_none() {
            tracing::warn!("status relay has no store, snapshots will not be kept");
        }
        Self { store, ledger }
    }

    /// Replace the stored snapshot, stamp the sync time, and seed the pending
    /// queue if it has never existed.
    ///
    /// Store failures do not fail the push; they are logged and reported
    /// through `Receipt::persisted`.
    pub async fn accept_snapshot(
        &self,
        snapshot: StatusSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Receipt, AppError> {
        let agents = snapshot.agents_summary();

        let persisted = match self.store.as_deref() {
            None => false,
            Some(store) => match write_snapshot(store, &snapshot, now).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!("failed to store snapshot: {}", e);
                    false
                }
            },
        };

        let items = snapshot.pending_approvals().unwrap_or_default();
        if let Err(e) = self.ledger.seed_pending(items).await {
            tracing::error!("failed to seed pending queue: {}", e);
        }

        tracing::info!(agents = %agents, persisted, "status snapshot accepted");
        Ok(Receipt {
            received_at: now,
            agents,
            persisted,
        })
    }

    /// The last pushed document, byte-for-byte.
    pub async fn get_latest_snapshot(&self) -> Result<String, AppError> {
        let store = self.store.as_deref().ok_or(AppError::NotFound(NO_DATA))?;
        store
            .get(SNAPSHOT_KEY)
            .await?
            .ok_or(AppError::NotFound(NO_DATA))
    }

    pub async fn last_sync(&self) -> Result<DateTime<Utc>, AppError> {
        let store = self.store.as_deref().ok_or(AppError::NotFound(NO_DATA))?;
        read_json(store, LAST_SYNC_KEY)
            .await?
            .ok_or(AppError::NotFound(NO_DATA))
    }
}

async fn write_snapshot(
    store: &dyn KvStore,
    snapshot: &StatusSnapshot,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    store.put(SNAPSHOT_KEY, snapshot.raw()).await?;
    let stamp = serde_json::to_string(&now).map_err(|source| StoreError::Corrupt {
        key: LAST_SYNC_KEY.to_string(),
        source,
    })?;
    store.put(LAST_SYNC_KEY, &stamp).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::rbac::ApproverAllowList;
    use crate::models::approval::PendingItem;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    struct Fixture {
        relay: StatusRelay,
        ledger: Arc<ApprovalLedger>,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(ApprovalLedger::new(
            Some(Arc::new(MemoryStore::new())),
            ApproverAllowList::new(["ops@example.com"]),
        ));
        let relay = StatusRelay::new(Some(Arc::new(MemoryStore::new())), ledger.clone());
        Fixture { relay, ledger }
    }

    fn snapshot(body: &str) -> StatusSnapshot {
        StatusSnapshot::parse(body.as_bytes()).unwrap()
    }

    fn ids(items: &[PendingItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_get_before_push_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.relay.get_latest_snapshot().await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(f.relay.last_sync().await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_push_then_get_returns_verbatim() {
        let f = fixture();
        let body = r#"{"summary": {"active_agents": 2},  "jobs": []}"#;
        let receipt = f.relay.accept_snapshot(snapshot(body), at(9)).await.unwrap();

        assert_eq!(receipt.agents, "2 active");
        assert_eq!(receipt.received_at, at(9));
        assert!(receipt.persisted);
        assert_eq!(f.relay.get_latest_snapshot().await.unwrap(), body);
        assert_eq!(f.relay.last_sync().await.unwrap(), at(9));
    }

    #[tokio::test]
    async fn test_later_push_replaces_snapshot_wholesale() {
        let f = fixture();
        f.relay
            .accept_snapshot(snapshot(r#"{"a":1}"#), at(9))
            .await
            .unwrap();
        f.relay
            .accept_snapshot(snapshot(r#"{"b":2}"#), at(10))
            .await
            .unwrap();
        assert_eq!(f.relay.get_latest_snapshot().await.unwrap(), r#"{"b":2}"#);
        assert_eq!(f.relay.last_sync().await.unwrap(), at(10));
    }

    #[tokio::test]
    async fn test_first_push_seeds_and_second_does_not() {
        let f = fixture();
        f.relay
            .accept_snapshot(
                snapshot(r#"{"pending_approvals":[{"id":"A"},{"id":"B"}]}"#),
                at(9),
            )
            .await
            .unwrap();
        assert_eq!(ids(&f.ledger.list_state().await.unwrap().pending), vec!["A", "B"]);

        f.relay
            .accept_snapshot(
                snapshot(r#"{"pending_approvals":[{"id":"C"}]}"#),
                at(10),
            )
            .await
            .unwrap();
        assert_eq!(ids(&f.ledger.list_state().await.unwrap().pending), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_push_without_pending_seeds_empty_queue() {
        let f = fixture();
        f.relay
            .accept_snapshot(snapshot(r#"{"summary":{}}"#), at(9))
            .await
            .unwrap();
        // The queue now exists, so a later list can no longer seed it.
        f.relay
            .accept_snapshot(snapshot(r#"{"pending_approvals":[{"id":"A"}]}"#), at(10))
            .await
            .unwrap();
        assert!(f.ledger.list_state().await.unwrap().pending.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_first_pushes_seed_once() {
        let f = fixture();
        let first = f.relay.accept_snapshot(
            snapshot(r#"{"pending_approvals":[{"id":"A"}]}"#),
            at(9),
        );
        let second = f.relay.accept_snapshot(
            snapshot(r#"{"pending_approvals":[{"id":"B"},{"id":"C"}]}"#),
            at(9),
        );
        let (r1, r2) = tokio::join!(first, second);
        r1.unwrap();
        r2.unwrap();

        let pending = f.ledger.list_state().await.unwrap().pending;
        let seeded = ids(&pending);
        assert!(seeded == vec!["A"] || seeded == vec!["B", "C"], "{:?}", seeded);
    }

    #[tokio::test]
    async fn test_no_store_still_acknowledges() {
        let ledger = Arc::new(ApprovalLedger::new(None, ApproverAllowList::default()));
        let relay = StatusRelay::new(None, ledger);
        let receipt = relay
            .accept_snapshot(snapshot(r#"{"summary":{"active_agents":1}}"#), at(9))
            .await
            .unwrap();
        assert!(!receipt.persisted);
        assert_eq!(receipt.agents, "1 active");
        assert!(relay.get_latest_snapshot().await.is_err());
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl KvStore for Unreachable {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn put(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn compare_and_swap(
            &self,
            _key: &str,
            _expected: Option<&str>,
            _new: &str,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_is_degraded_not_missing() {
        let ledger = Arc::new(ApprovalLedger::new(None, ApproverAllowList::default()));
        let relay = StatusRelay::new(Some(Arc::new(Unreachable)), ledger);
        assert!(matches!(
            relay.get_latest_snapshot().await,
            Err(AppError::StorageDegraded(_))
        ));
        assert!(matches!(
            relay.last_sync().await,
            Err(AppError::StorageDegraded(_))
        ));
    }
}
