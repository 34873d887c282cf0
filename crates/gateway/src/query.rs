//! Read-query model: predicates and ordering.
//!
//! The platform's query surface supports equality, inequality, membership,
//! range, and `or` predicates plus multi-key ordering. This module is the
//! client-side description of such a query; each gateway implementation
//! translates it (to URL parameters, or to in-memory evaluation).

use std::cmp::Ordering;

use serde_json::Value;

/// A filter predicate over a collection's rows. Top-level predicates on a
/// [`ReadQuery`] are AND-ed; `Or` provides disjunction where needed.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Neq(String, Value),
    /// Column value is one of the listed values.
    In(String, Vec<Value>),
    Gte(String, Value),
    Lte(String, Value),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Convenience constructor: `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.into(), value.into())
    }

    /// Evaluate against a row. Missing columns are treated as `null`.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Predicate::Eq(column, value) => column_of(row, column) == value,
            Predicate::Neq(column, value) => column_of(row, column) != value,
            Predicate::In(column, values) => values.contains(column_of(row, column)),
            Predicate::Gte(column, value) => {
                matches!(
                    compare_values(column_of(row, column), value),
                    Some(Ordering::Greater | Ordering::Equal)
                )
            }
            Predicate::Lte(column, value) => {
                matches!(
                    compare_values(column_of(row, column), value),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Predicate::Or(alternatives) => alternatives.iter().any(|p| p.matches(row)),
        }
    }
}

fn column_of<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One key of a multi-key ordering.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub column: String,
    pub direction: Direction,
}

/// Compare two rows under a multi-key ordering.
///
/// Null (and missing) values sort before everything else; incomparable
/// values are treated as equal so the sort stays total.
pub fn compare_rows(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering =
            compare_values(column_of(a, &key.column), column_of(b, &key.column)).unwrap_or(Ordering::Equal);
        let ordering = match key.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total-ish comparison over JSON scalars.
///
/// Numbers compare numerically, strings lexicographically (ISO-8601
/// timestamps order correctly this way), booleans false-before-true.
/// Mixed types are incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ReadQuery
// ---------------------------------------------------------------------------

/// A read against one collection.
#[derive(Debug, Clone)]
pub struct ReadQuery {
    pub collection: String,
    /// AND-ed predicates.
    pub predicates: Vec<Predicate>,
    pub order: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl ReadQuery {
    pub fn from(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push(SortKey {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Does `row` satisfy every predicate?
    pub fn matches(&self, row: &Value) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_and_neq() {
        let row = json!({"status": "PENDING", "archived": false});
        assert!(Predicate::eq("status", "PENDING").matches(&row));
        assert!(!Predicate::eq("status", "PAUSED").matches(&row));
        assert!(Predicate::Neq("status".into(), json!("PAUSED")).matches(&row));
    }

    #[test]
    fn missing_column_is_null() {
        let row = json!({"id": 1});
        assert!(Predicate::eq("partner_technician_id", Value::Null).matches(&row));
        assert!(!Predicate::eq("partner_technician_id", 5).matches(&row));
    }

    #[test]
    fn in_membership() {
        let row = json!({"status": "PAUSED"});
        let claimable = Predicate::In(
            "status".into(),
            vec![json!("PENDING"), json!("HIGH_PRIORITY"), json!("PAUSED")],
        );
        assert!(claimable.matches(&row));
        assert!(!claimable.matches(&json!({"status": "COMPLETED"})));
    }

    #[test]
    fn range_over_dates_as_strings() {
        let row = json!({"work_date": "2026-03-15"});
        assert!(Predicate::Gte("work_date".into(), json!("2026-03-01")).matches(&row));
        assert!(Predicate::Lte("work_date".into(), json!("2026-03-31")).matches(&row));
        assert!(!Predicate::Gte("work_date".into(), json!("2026-04-01")).matches(&row));
    }

    #[test]
    fn or_disjunction() {
        let mine = Predicate::Or(vec![
            Predicate::eq("assigned_technician_id", 7),
            Predicate::eq("partner_technician_id", 7),
        ]);
        assert!(mine.matches(&json!({"assigned_technician_id": 7})));
        assert!(mine.matches(&json!({"assigned_technician_id": 2, "partner_technician_id": 7})));
        assert!(!mine.matches(&json!({"assigned_technician_id": 2})));
    }

    #[test]
    fn pinned_first_then_newest() {
        let keys = [
            SortKey {
                column: "pinned".into(),
                direction: Direction::Desc,
            },
            SortKey {
                column: "created_at".into(),
                direction: Direction::Desc,
            },
        ];
        let pinned_old = json!({"pinned": true, "created_at": "2026-01-01T00:00:00Z"});
        let recent = json!({"pinned": false, "created_at": "2026-06-01T00:00:00Z"});
        let older = json!({"pinned": false, "created_at": "2026-02-01T00:00:00Z"});

        assert_eq!(compare_rows(&pinned_old, &recent, &keys), Ordering::Less);
        assert_eq!(compare_rows(&recent, &older, &keys), Ordering::Less);
    }

    #[test]
    fn null_sorts_first_ascending() {
        let keys = [SortKey {
            column: "completed_at".into(),
            direction: Direction::Asc,
        }];
        let unset = json!({"completed_at": null});
        let set = json!({"completed_at": "2026-01-01T00:00:00Z"});
        assert_eq!(compare_rows(&unset, &set, &keys), Ordering::Less);
    }

    #[test]
    fn query_matches_all_predicates() {
        let query = ReadQuery::from("works")
            .filter(Predicate::eq("archived", false))
            .filter(Predicate::eq("status", "PENDING"));
        assert!(query.matches(&json!({"archived": false, "status": "PENDING"})));
        assert!(!query.matches(&json!({"archived": true, "status": "PENDING"})));
    }
}
