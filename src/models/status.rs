use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::approval::PendingItem;
use crate::errors::AppError;

/// The agent's latest status document.
///
/// The original bytes are kept so reads return exactly what was pushed.
/// Only `pending_approvals` and `summary.active_agents` are ever looked at.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    raw: String,
    doc: Value,
}

impl StatusSnapshot {
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let doc: Value =
            serde_json::from_slice(body).map_err(|e| AppError::InvalidPayload(e.to_string()))?;
        let raw = String::from_utf8(body.to_vec())
            .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
        Ok(Self { raw, doc })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `"<n> active"` when the agent reported a count, `"unknown"` otherwise.
    pub fn agents_summary(&self) -> String {
        match self.doc.pointer("/summary/active_agents") {
            None | Some(Value::Null) => "unknown".to_string(),
            Some(Value::String(s)) => format!("{} active", s),
            Some(v) => format!("{} active", v),
        }
    }

    /// The embedded pending list, normalized for seeding: entries without a
    /// string id are dropped and repeated ids keep their first occurrence.
    /// None when the snapshot has no `pending_approvals` array.
    pub fn pending_approvals(&self) -> Option<Vec<PendingItem>> {
        let entries = self.doc.get("pending_approvals")?.as_array()?;
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match PendingItem::from_value(entry) {
                Some(item) if seen.insert(item.id.clone()) => items.push(item),
                Some(item) => {
                    tracing::warn!(id = %item.id, index, "duplicate pending id in snapshot, skipped");
                }
                None => {
                    tracing::warn!(index, "pending entry without a string id, skipped");
                }
            }
        }
        Some(items)
    }
}

/// Result of a successful push, echoed back to the agent.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub received_at: DateTime<Utc>,
    pub agents: String,
    /// False when the relay has no store and nothing was kept.
    pub persisted: bool,
}
