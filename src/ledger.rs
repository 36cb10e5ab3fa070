//! Approval ledger: the pending queue and the bounded decision history.
//!
//! Keys (inside the ledger's own namespace):
//! - `pending`         → JSON array of [`PendingItem`]
//! - `history`         → JSON array of [`Decision`], newest first, ≤ [`HISTORY_LIMIT`]
//! - `decision:<id>`   → the latest [`Decision`] for `id`
//!
//! `pending` and `history` are only ever rewritten through
//! [`update_json`], so two decisions landing at the same time both take
//! effect instead of one silently overwriting the other.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::middleware::rbac::ApproverAllowList;
use crate::models::approval::{Decision, DecisionAction, LedgerState, PendingItem};
use crate::store::{init_json_if_absent, read_json, update_json, KvStore, StoreError};

pub const PENDING_KEY: &str = "pending";
pub const HISTORY_KEY: &str = "history";
pub const HISTORY_LIMIT: usize = 100;

fn decision_key(id: &str) -> String {
    format!("decision:{}", id)
}

/// Body of a decision submission. Every field is optional at the wire level
/// so that absence maps to `MissingField` rather than a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionRequest {
    pub id: Option<String>,
    pub action: Option<String>,
    pub note: Option<String>,
}

/// A recorded decision plus whether it actually reached the store.
#[derive(Debug, Clone, Serialize)]
pub struct Recorded {
    #[serde(flatten)]
    pub decision: Decision,
    pub persisted: bool,
}

pub struct ApprovalLedger {
    store: Option<Arc<dyn KvStore>>,
    approvers: ApproverAllowList,
}

impl ApprovalLedger {
    /// `store = None` runs the ledger in best-effort mode: decisions are
    /// validated and returned, nothing is kept.
    pub fn new(store: Option<Arc<dyn KvStore>>, approvers: ApproverAllowList) -> Self {
        if store.is_none() {
            tracing::warn!("approval ledger has no store, decisions will not be persisted");
        }
        Self { store, approvers }
    }

    pub fn approvers(&self) -> &ApproverAllowList {
        &self.approvers
    }

    pub async fn list_state(&self) -> Result<LedgerState, AppError> {
        let Some(store) = self.store.as_deref() else {
            return Ok(LedgerState::default());
        };
        let pending = read_json(store, PENDING_KEY).await?.unwrap_or_default();
        let history = read_json(store, HISTORY_KEY).await?.unwrap_or_default();
        Ok(LedgerState { pending, history })
    }

    pub async fn get_decision(&self, id: &str) -> Result<Decision, AppError> {
        let store = self
            .store
            .as_deref()
            .ok_or(AppError::NotFound("no decision recorded for this id"))?;
        read_json(store, &decision_key(id))
            .await?
            .ok_or(AppError::NotFound("no decision recorded for this id"))
    }

    /// Validate and record a decision by `approver`.
    ///
    /// Checks run in a fixed order: required fields, then the action kind,
    /// then allow-list membership. Nothing is written unless all pass.
    pub async fn record_decision(
        &self,
        req: DecisionRequest,
        approver: &str,
        now: DateTime<Utc>,
    ) -> Result<Recorded, AppError> {
        let id = req.id.filter(|s| !s.is_empty());
        let action = req.action.filter(|s| !s.is_empty());
        let (id, action) = match (id, action) {
            (Some(id), Some(action)) => (id, action),
            (None, _) => return Err(AppError::MissingField("id")),
            (_, None) => return Err(AppError::MissingField("action")),
        };
        let action: DecisionAction = action.parse().map_err(AppError::InvalidAction)?;
        if !self.approvers.contains(approver) {
            tracing::warn!(approver = %approver, id = %id, "decision from non-approver rejected");
            return Err(AppError::Forbidden(approver.to_string()));
        }

        let decision = Decision {
            id,
            action,
            note: req.note.unwrap_or_default(),
            by: approver.to_string(),
            at: now,
        };

        let persisted = match self.store.as_deref() {
            None => {
                tracing::warn!(id = %decision.id, "no store configured, decision not persisted");
                false
            }
            Some(store) => match persist(store, &decision).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(id = %decision.id, "decision persisted partially or not at all: {}", e);
                    false
                }
            },
        };

        tracing::info!(
            id = %decision.id,
            action = %decision.action,
            by = %decision.by,
            persisted,
            "decision recorded"
        );
        Ok(Recorded {
            decision,
            persisted,
        })
    }

    /// Initialize the pending queue from a snapshot's list, but only if the
    /// queue has never been written. Returns whether this call seeded it.
    pub async fn seed_pending(&self, items: Vec<PendingItem>) -> Result<bool, StoreError> {
        let Some(store) = self.store.as_deref() else {
            return Ok(false);
        };
        let count = items.len();
        let seeded = init_json_if_absent(store, PENDING_KEY, &items).await?;
        if seeded {
            tracing::info!(count, "pending queue seeded from snapshot");
        }
        Ok(seeded)
    }
}

async fn persist(store: &dyn KvStore, decision: &Decision) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(decision).map_err(|source| StoreError::Corrupt {
        key: decision_key(&decision.id),
        source,
    })?;
    store.put(&decision_key(&decision.id), &encoded).await?;

    update_json(store, PENDING_KEY, |pending: Option<Vec<PendingItem>>| {
        let mut pending = pending.unwrap_or_default();
        pending.retain(|item| item.id != decision.id);
        pending
    })
    .await?;

    update_json(store, HISTORY_KEY, |history: Option<Vec<Decision>>| {
        let mut history = history.unwrap_or_default();
        // A retried write may land after a later-stamped decision.
        let pos = history
            .iter()
            .position(|d| d.at <= decision.at)
            .unwrap_or(history.len());
        history.insert(pos, decision.clone());
        history.truncate(HISTORY_LIMIT);
        history
    })
    .await?;

    Ok(())
}
