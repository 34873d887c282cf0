//! Change-event envelope and subscription filters.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use skypanel_core::types::Timestamp;

/// Kind of database change, as delivered by the platform's change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single database change pushed by the platform.
///
/// For `Delete` events `row` carries the old record; for inserts and
/// updates it carries the new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Collection (table) the change happened in, e.g. `"works"`.
    pub collection: String,

    pub kind: ChangeKind,

    /// The affected record as the platform serialized it.
    pub row: serde_json::Value,

    /// When the event was observed locally (UTC).
    pub timestamp: Timestamp,
}

impl ChangeEvent {
    pub fn new(collection: impl Into<String>, kind: ChangeKind, row: serde_json::Value) -> Self {
        Self {
            collection: collection.into(),
            kind,
            row,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventFilter
// ---------------------------------------------------------------------------

/// Client-side predicate selecting which change events a subscription sees.
///
/// A filter always names one collection and may further restrict by change
/// kind and by column equality. Multiple `column_eq` clauses are OR-ed: one
/// subscription with two clauses replaces a pair of single-column
/// server-side filters (the work lifecycle watches both
/// `assigned_technician_id` and `partner_technician_id` this way).
#[derive(Debug, Clone)]
pub struct EventFilter {
    collection: String,
    kind: Option<ChangeKind>,
    column_eq: Vec<(String, serde_json::Value)>,
}

impl EventFilter {
    /// Match every change in `collection`.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            kind: None,
            column_eq: Vec::new(),
        }
    }

    /// Restrict to a single change kind.
    pub fn kind(mut self, kind: ChangeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Add a column-equality clause. Clauses are OR-ed together.
    pub fn column_eq(mut self, column: impl Into<String>, value: serde_json::Value) -> Self {
        self.column_eq.push((column.into(), value));
        self
    }

    /// Does `event` pass this filter?
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.collection != self.collection {
            return false;
        }
        if let Some(kind) = self.kind {
            if event.kind != kind {
                return false;
            }
        }
        if self.column_eq.is_empty() {
            return true;
        }
        self.column_eq
            .iter()
            .any(|(column, value)| event.row.get(column) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn work_update(row: serde_json::Value) -> ChangeEvent {
        ChangeEvent::new("works", ChangeKind::Update, row)
    }

    #[test]
    fn collection_mismatch_never_matches() {
        let filter = EventFilter::collection("works");
        let event = ChangeEvent::new("users", ChangeKind::Update, json!({}));
        assert!(!filter.matches(&event));
    }

    #[test]
    fn bare_collection_filter_matches_all_kinds() {
        let filter = EventFilter::collection("works");
        assert!(filter.matches(&work_update(json!({"id": 1}))));
        assert!(filter.matches(&ChangeEvent::new("works", ChangeKind::Delete, json!({}))));
    }

    #[test]
    fn kind_filter_restricts() {
        let filter = EventFilter::collection("chat_messages").kind(ChangeKind::Insert);
        let insert = ChangeEvent::new("chat_messages", ChangeKind::Insert, json!({}));
        let update = ChangeEvent::new("chat_messages", ChangeKind::Update, json!({}));
        assert!(filter.matches(&insert));
        assert!(!filter.matches(&update));
    }

    #[test]
    fn column_clauses_are_or_ed() {
        let filter = EventFilter::collection("works")
            .column_eq("assigned_technician_id", json!(7))
            .column_eq("partner_technician_id", json!(7));

        assert!(filter.matches(&work_update(json!({"assigned_technician_id": 7}))));
        assert!(filter.matches(&work_update(
            json!({"assigned_technician_id": 3, "partner_technician_id": 7})
        )));
        assert!(!filter.matches(&work_update(
            json!({"assigned_technician_id": 3, "partner_technician_id": null})
        )));
    }

    #[test]
    fn missing_column_does_not_match() {
        let filter = EventFilter::collection("works").column_eq("locked_by", json!(5));
        assert!(!filter.matches(&work_update(json!({"id": 9}))));
    }
}
