//! In-memory platform double.
//!
//! [`MemoryGateway`] implements [`DataGateway`] and [`PlatformProcedures`]
//! against a `RwLock`-guarded store and publishes every mutation into a
//! [`ChangeFeed`], mirroring the hosted platform's change stream. The
//! procedures take a single write lock for their whole body, which gives
//! them the same atomicity the real platform guarantees: two concurrent
//! conditional claims of the same row see exactly one winner.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use skypanel_core::types::DbId;
use skypanel_core::work::WorkStatus;
use skypanel_events::{ChangeEvent, ChangeFeed, ChangeKind};

use crate::error::GatewayError;
use crate::query::{compare_rows, Predicate, ReadQuery};
use crate::{DataGateway, LoginOutcome, LoginSuccess, PlatformProcedures, Row};

#[derive(Default)]
struct Store {
    collections: HashMap<String, Vec<Value>>,
    next_id: DbId,
}

impl Store {
    fn rows_mut(&mut self, collection: &str) -> &mut Vec<Value> {
        self.collections.entry(collection.to_string()).or_default()
    }

    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory stand-in for the hosted platform.
pub struct MemoryGateway {
    state: RwLock<Store>,
    feed: ChangeFeed,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Store::default()),
            feed: ChangeFeed::default(),
        }
    }

    /// The feed mutations are published into. Clone it to subscribe.
    pub fn feed(&self) -> ChangeFeed {
        self.feed.clone()
    }

    /// Insert a row verbatim, without assigning an id or publishing an
    /// event. Test and demo setup only.
    pub async fn seed(&self, collection: &str, row: Value) {
        let mut store = self.state.write().await;
        if let Some(id) = row.get("id").and_then(Value::as_i64) {
            store.next_id = store.next_id.max(id);
        }
        store.rows_mut(collection).push(row);
    }

    fn publish(&self, collection: &str, kind: ChangeKind, row: Value) {
        self.feed.publish(ChangeEvent::new(collection, kind, row));
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn read(&self, query: ReadQuery) -> Result<Vec<Row>, GatewayError> {
        let store = self.state.read().await;
        let rows = store
            .collections
            .get(&query.collection)
            .ok_or_else(|| GatewayError::UnknownCollection(query.collection.clone()))?;

        let mut out: Vec<Value> = rows.iter().filter(|r| query.matches(r)).cloned().collect();
        if !query.order.is_empty() {
            out.sort_by(|a, b| compare_rows(a, b, &query.order));
        }
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn insert(&self, collection: &str, mut row: Row) -> Result<Row, GatewayError> {
        let mut store = self.state.write().await;
        let id = store.allocate_id();
        let object = row
            .as_object_mut()
            .ok_or_else(|| GatewayError::Transport("Insert body must be an object".into()))?;
        object.insert("id".into(), json!(id));
        // Fixed-width timestamps keep lexicographic and chronological order
        // identical.
        object
            .entry("created_at")
            .or_insert_with(|| json!(now_string()));

        store.rows_mut(collection).push(row.clone());
        drop(store);

        self.publish(collection, ChangeKind::Insert, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        collection: &str,
        id: DbId,
        patch: Row,
        condition: Option<Predicate>,
    ) -> Result<u64, GatewayError> {
        let mut store = self.state.write().await;
        let rows = store
            .collections
            .get_mut(collection)
            .ok_or_else(|| GatewayError::UnknownCollection(collection.to_string()))?;

        let Some(row) = rows
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
        else {
            return Ok(0);
        };
        if let Some(condition) = &condition {
            if !condition.matches(row) {
                return Ok(0);
            }
        }

        apply_patch(row, &patch)?;
        let updated = row.clone();
        drop(store);

        self.publish(collection, ChangeKind::Update, updated);
        Ok(1)
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn apply_patch(row: &mut Value, patch: &Value) -> Result<(), GatewayError> {
    let target = row
        .as_object_mut()
        .ok_or_else(|| GatewayError::Transport("Stored row is not an object".into()))?;
    let patch = patch
        .as_object()
        .ok_or_else(|| GatewayError::Transport("Patch body must be an object".into()))?;
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Procedures
// ---------------------------------------------------------------------------

/// Ordering used when picking the next work order to assign: pinned rows
/// first, then high-priority (by status or the priority flag) before
/// normal, then oldest first.
fn assignment_order(a: &Value, b: &Value) -> Ordering {
    let pinned = |r: &Value| r.get("pinned").and_then(Value::as_bool).unwrap_or(false);
    let high = |r: &Value| {
        r.get("status").and_then(Value::as_str) == Some(WorkStatus::HighPriority.as_str())
            || r.get("priority").and_then(Value::as_bool).unwrap_or(false)
    };
    let created = |r: &Value| {
        r.get("created_at")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };

    pinned(b)
        .cmp(&pinned(a))
        .then(high(b).cmp(&high(a)))
        .then(created(a).cmp(&created(b)))
}

impl MemoryGateway {
    /// Pick and claim the next eligible work order for `technician`.
    /// Caller holds the write lock; this is the atomic core shared by both
    /// assignment procedures.
    fn assign_next_locked(store: &mut Store, technician: DbId) -> Option<Value> {
        let now = json!(now_string());
        let rows = store.rows_mut("works");

        let eligible = [WorkStatus::Pending.as_str(), WorkStatus::HighPriority.as_str()];
        let mut candidates: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                let status = r.get("status").and_then(Value::as_str).unwrap_or("");
                let archived = r.get("archived").and_then(Value::as_bool).unwrap_or(false);
                eligible.contains(&status) && !archived
            })
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by(|&a, &b| assignment_order(&rows[a], &rows[b]));

        let index = *candidates.first()?;
        let row = &mut rows[index];
        let object = row.as_object_mut()?;
        object.insert("status".into(), json!(WorkStatus::InProgress.as_str()));
        object.insert("assigned_technician_id".into(), json!(technician));
        object.insert("locked_by".into(), json!(technician));
        object.insert("locked_at".into(), now.clone());
        object.insert("started_at".into(), now);
        Some(row.clone())
    }

    /// The work order `technician` is currently on, if any.
    fn current_work_locked(store: &Store, technician: DbId) -> Option<Value> {
        let rows = store.collections.get("works")?;
        rows.iter()
            .find(|r| {
                let status = r.get("status").and_then(Value::as_str);
                let assigned = r.get("assigned_technician_id").and_then(Value::as_i64);
                let partner = r.get("partner_technician_id").and_then(Value::as_i64);
                status == Some(WorkStatus::InProgress.as_str())
                    && (assigned == Some(technician) || partner == Some(technician))
            })
            .cloned()
    }
}

#[async_trait]
impl PlatformProcedures for MemoryGateway {
    async fn login_with_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, GatewayError> {
        let store = self.state.read().await;
        let Some(users) = store.collections.get("users") else {
            return Ok(LoginOutcome::Rejected("Invalid credentials".into()));
        };
        let Some(user) = users
            .iter()
            .find(|u| u.get("username").and_then(Value::as_str) == Some(username))
        else {
            return Ok(LoginOutcome::Rejected("Invalid credentials".into()));
        };

        // The double stores plaintext passwords; the hosted platform hashes.
        if user.get("password").and_then(Value::as_str) != Some(password) {
            return Ok(LoginOutcome::Rejected("Invalid credentials".into()));
        }
        if !user.get("is_active").and_then(Value::as_bool).unwrap_or(true) {
            return Ok(LoginOutcome::Rejected("Account is disabled".into()));
        }

        let profile: LoginSuccess = LoginSuccess {
            user_id: user
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| GatewayError::Transport("User row missing id".into()))?,
            username: username.to_string(),
            role: serde_json::from_value(
                user.get("role").cloned().unwrap_or(json!("TECHNICIAN")),
            )?,
            full_name: user
                .get("full_name")
                .and_then(Value::as_str)
                .unwrap_or(username)
                .to_string(),
            session_token: Uuid::new_v4().to_string(),
        };
        Ok(LoginOutcome::Success(profile))
    }

    async fn assign_next_work(&self, technician_id: DbId) -> Result<Option<Row>, GatewayError> {
        let mut store = self.state.write().await;

        // A technician already on a work order gets that order back rather
        // than a second assignment.
        if let Some(current) = Self::current_work_locked(&store, technician_id) {
            return Ok(Some(current));
        }

        let assigned = Self::assign_next_locked(&mut store, technician_id);
        drop(store);

        if let Some(row) = &assigned {
            self.publish("works", ChangeKind::Update, row.clone());
        }
        Ok(assigned)
    }

    async fn complete_and_get_next(
        &self,
        work_id: DbId,
        technician_id: DbId,
    ) -> Result<Option<Row>, GatewayError> {
        let mut store = self.state.write().await;
        let rows = store.rows_mut("works");

        let Some(row) = rows
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_i64) == Some(work_id))
        else {
            return Err(GatewayError::Procedure {
                name: "complete_and_get_next",
                message: format!("Work order {work_id} not found"),
            });
        };
        let holder = row.get("locked_by").and_then(Value::as_i64);
        if holder != Some(technician_id) {
            return Err(GatewayError::Procedure {
                name: "complete_and_get_next",
                message: format!("Work order {work_id} is not held by technician {technician_id}"),
            });
        }

        let object = row.as_object_mut().ok_or_else(|| GatewayError::Procedure {
            name: "complete_and_get_next",
            message: "Stored row is not an object".into(),
        })?;
        object.insert("status".into(), json!(WorkStatus::Completed.as_str()));
        object.insert("completed_at".into(), json!(now_string()));
        object.insert("locked_by".into(), Value::Null);
        object.insert("locked_at".into(), Value::Null);
        let completed = row.clone();

        let next = Self::assign_next_locked(&mut store, technician_id);
        drop(store);

        self.publish("works", ChangeKind::Update, completed);
        if let Some(row) = &next {
            self.publish("works", ChangeKind::Update, row.clone());
        }
        Ok(next)
    }
}
