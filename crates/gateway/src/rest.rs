//! HTTP gateway against the hosted platform's REST surface.
//!
//! Reads and mutations map onto the platform's PostgREST-style interface:
//! filters become query parameters (`status=eq.PENDING`,
//! `or=(assigned_technician_id.eq.7,partner_technician_id.eq.7)`), mutations
//! send `Prefer: return=representation` so the affected rows come back in
//! the response, and remote procedures POST to `/rest/v1/rpc/{name}`.

use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::{json, Value};

use skypanel_core::types::DbId;

use crate::error::GatewayError;
use crate::query::{Direction, Predicate, ReadQuery, SortKey};
use crate::{DataGateway, LoginOutcome, LoginSuccess, PlatformProcedures, Row};

/// REST client for the hosted platform.
pub struct RestGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Session token minted by login; sent as the bearer credential once set.
    session_token: RwLock<Option<String>>,
}

impl RestGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            session_token: RwLock::new(None),
        }
    }

    /// Install the session token for subsequent requests. `None` reverts to
    /// anonymous (api-key-only) access.
    pub fn set_session_token(&self, token: Option<String>) {
        *self.session_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{collection}", self.base_url)
    }

    fn headers(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| GatewayError::Transport(format!("Invalid api key: {e}")))?,
        );
        let token = self
            .session_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let bearer = token.as_deref().unwrap_or(&self.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {bearer}"))
                .map_err(|e| GatewayError::Transport(format!("Invalid bearer token: {e}")))?,
        );
        Ok(headers)
    }

    async fn decode_rows(response: reqwest::Response) -> Result<Vec<Row>, GatewayError> {
        let response = check_status(response).await?;
        let rows: Vec<Row> = response.json().await?;
        Ok(rows)
    }

    async fn call_procedure(
        &self,
        name: &'static str,
        args: Value,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/rest/v1/rpc/{name}", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&args)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(GatewayError::Unauthorized(body));
    }
    Err(GatewayError::Transport(format!("HTTP {status}: {body}")))
}

// ---------------------------------------------------------------------------
// Wire encoding
// ---------------------------------------------------------------------------

fn encode_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Encode a predicate as one query parameter.
fn encode_predicate(predicate: &Predicate) -> (String, String) {
    match predicate {
        Predicate::Eq(column, value) => (column.clone(), format!("eq.{}", encode_literal(value))),
        Predicate::Neq(column, value) => (column.clone(), format!("neq.{}", encode_literal(value))),
        Predicate::In(column, values) => {
            let list = values
                .iter()
                .map(encode_literal)
                .collect::<Vec<_>>()
                .join(",");
            (column.clone(), format!("in.({list})"))
        }
        Predicate::Gte(column, value) => (column.clone(), format!("gte.{}", encode_literal(value))),
        Predicate::Lte(column, value) => (column.clone(), format!("lte.{}", encode_literal(value))),
        Predicate::Or(alternatives) => {
            let clauses = alternatives
                .iter()
                .map(|p| {
                    let (column, operation) = encode_predicate(p);
                    format!("{column}.{operation}")
                })
                .collect::<Vec<_>>()
                .join(",");
            ("or".to_string(), format!("({clauses})"))
        }
    }
}

fn encode_order(keys: &[SortKey]) -> String {
    keys.iter()
        .map(|key| {
            let direction = match key.direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            format!("{}.{direction}", key.column)
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn encode_query(query: &ReadQuery) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> =
        query.predicates.iter().map(encode_predicate).collect();
    if !query.order.is_empty() {
        params.push(("order".to_string(), encode_order(&query.order)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

#[async_trait]
impl DataGateway for RestGateway {
    async fn read(&self, query: ReadQuery) -> Result<Vec<Row>, GatewayError> {
        let response = self
            .http
            .get(self.collection_url(&query.collection))
            .headers(self.headers()?)
            .query(&encode_query(&query))
            .send()
            .await?;
        Self::decode_rows(response).await
    }

    async fn insert(&self, collection: &str, row: Row) -> Result<Row, GatewayError> {
        let response = self
            .http
            .post(self.collection_url(collection))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let mut rows = Self::decode_rows(response).await?;
        rows.pop()
            .ok_or_else(|| GatewayError::Transport("Insert returned no representation".into()))
    }

    async fn update(
        &self,
        collection: &str,
        id: DbId,
        patch: Row,
        condition: Option<Predicate>,
    ) -> Result<u64, GatewayError> {
        let mut params = vec![("id".to_string(), format!("eq.{id}"))];
        if let Some(condition) = &condition {
            params.push(encode_predicate(condition));
        }

        let response = self
            .http
            .patch(self.collection_url(collection))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&patch)
            .send()
            .await?;
        // With return=representation the body lists exactly the patched rows.
        let rows = Self::decode_rows(response).await?;
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl PlatformProcedures for RestGateway {
    async fn login_with_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, GatewayError> {
        let result = self
            .call_procedure(
                "login_with_username",
                json!({"p_username": username, "p_password": password}),
            )
            .await?;

        if result.get("success").and_then(Value::as_bool) == Some(true) {
            let profile: LoginSuccess = serde_json::from_value(result)?;
            return Ok(LoginOutcome::Success(profile));
        }
        let reason = result
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Invalid credentials")
            .to_string();
        Ok(LoginOutcome::Rejected(reason))
    }

    async fn assign_next_work(&self, technician_id: DbId) -> Result<Option<Row>, GatewayError> {
        let result = self
            .call_procedure("assign_next_work", json!({"p_technician_id": technician_id}))
            .await?;
        Ok(row_or_none(result))
    }

    async fn complete_and_get_next(
        &self,
        work_id: DbId,
        technician_id: DbId,
    ) -> Result<Option<Row>, GatewayError> {
        let result = self
            .call_procedure(
                "complete_and_get_next",
                json!({"p_work_id": work_id, "p_technician_id": technician_id}),
            )
            .await?;
        Ok(row_or_none(result))
    }
}

/// Procedures returning a work order yield either the row object or `null`.
/// Some deployments wrap the row in a one-element array; accept both.
fn row_or_none(value: Value) -> Option<Row> {
    match value {
        Value::Null => None,
        Value::Array(mut rows) => {
            if rows.is_empty() {
                None
            } else {
                Some(rows.remove(0))
            }
        }
        row => Some(row),
    }
}
