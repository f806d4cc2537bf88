//! PostgREST / Supabase REST backend.
//!
//! Speaks the PostgREST dialect:
//! - `GET    /rest/v1/{table}?select=*&{column}=eq.{value}`
//! - `POST   /rest/v1/{table}` with `Prefer: return=representation`
//! - `PATCH  /rest/v1/{table}?{column}=eq.{value}` with `Prefer: return=representation`
//! - `POST   /rest/v1/rpc/{procedure}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{validate_identifier, Filter, Row, StoreError, StoreResult, TableStore};

/// PostgREST error code for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

const REST_PATH: &str = "/rest/v1";

/// REST backend configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project base URL (example: https://xyz.supabase.co).
    pub base_url: String,

    /// API key sent as `apikey` and as the bearer token.
    pub api_key: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `TableStore` over a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
}

impl RestStore {
    /// Create a new REST store client.
    pub fn new(config: &RestConfig) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| StoreError::InvalidRequest("API key is not a valid header".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| StoreError::InvalidRequest("API key is not a valid header".to_string()))?;
        headers.insert(HeaderName::from_static("apikey"), key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a URL for a path below the REST root.
    fn url(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PATH, path)
    }

    /// PostgREST query pairs for an equality filter.
    fn filter_query(filter: &Filter) -> StoreResult<(String, String)> {
        validate_identifier(&filter.column)?;
        let condition = match filter.value_text() {
            Some(text) => format!("eq.{text}"),
            None => "is.null".to_string(),
        };
        Ok((filter.column.clone(), condition))
    }

    /// Decode a successful response into rows, or map the error body.
    async fn rows(&self, table: &str, response: reqwest::Response) -> StoreResult<Vec<Row>> {
        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_error(table, response).await);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        into_rows(serde_json::from_str(&body)?)
    }

    /// Map an error response, recognising unique violations.
    async fn handle_error(&self, table: &str, response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let error: PostgrestError =
            serde_json::from_str(&body).unwrap_or_else(|_| PostgrestError {
                code: "unknown".to_string(),
                message: if body.is_empty() {
                    "Unknown error".to_string()
                } else {
                    body.clone()
                },
                details: None,
            });

        if error.code == UNIQUE_VIOLATION {
            return StoreError::UniqueViolation {
                table: table.to_string(),
                constraint: constraint_name(&error.message),
                message: error.details.unwrap_or(error.message),
            };
        }

        warn!(status, code = %error.code, message = %error.message, "REST store request failed");
        StoreError::Api {
            status,
            code: error.code,
            message: error.message,
        }
    }
}

#[async_trait]
impl TableStore for RestStore {
    fn backend(&self) -> &'static str {
        "rest"
    }

    async fn select(&self, table: &str, filter: Option<&Filter>) -> StoreResult<Vec<Row>> {
        let url = self.url(validate_identifier(table)?);
        let mut query = vec![("select".to_string(), "*".to_string())];
        if let Some(filter) = filter {
            query.push(Self::filter_query(filter)?);
        }
        debug!(url = %url, "REST select");

        let response = self.client.get(&url).query(&query).send().await?;
        self.rows(table, response).await
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row> {
        let url = self.url(validate_identifier(table)?);
        debug!(url = %url, "REST insert");

        let response = self
            .client
            .post(&url)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        self.rows(table, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::UnexpectedResponse("insert returned no rows".to_string()))
    }

    async fn update(&self, table: &str, changes: Row, filter: &Filter) -> StoreResult<Vec<Row>> {
        if changes.is_empty() {
            return Err(StoreError::InvalidRequest("update without changes".to_string()));
        }
        let url = self.url(validate_identifier(table)?);
        let query = vec![Self::filter_query(filter)?];
        debug!(url = %url, column = %filter.column, "REST update");

        let response = self
            .client
            .patch(&url)
            .query(&query)
            .header("Prefer", "return=representation")
            .json(&changes)
            .send()
            .await?;

        self.rows(table, response).await
    }

    async fn rpc(&self, procedure: &str, params: Row) -> StoreResult<Vec<Row>> {
        let url = self.url(&format!("rpc/{}", validate_identifier(procedure)?));
        debug!(url = %url, "REST rpc");

        let response = self.client.post(&url).json(&params).send().await?;
        self.rows(procedure, response).await
    }
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Option<String>,
}

/// Accepts an array of objects, a single object, or `null`.
fn into_rows(value: Value) -> StoreResult<Vec<Row>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(StoreError::UnexpectedResponse(format!(
                    "expected row object, got {other}"
                ))),
            })
            .collect(),
        other => Err(StoreError::UnexpectedResponse(format!(
            "expected rows, got {other}"
        ))),
    }
}

/// Extracts `name` from `... unique constraint "name"`.
fn constraint_name(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("constraint \"")?;
    let (name, _) = rest.split_once('"')?;
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_building() {
        let store = RestStore::new(&RestConfig::new("http://localhost:54321/", "key")).unwrap();
        assert_eq!(
            store.url("staff_allocation"),
            "http://localhost:54321/rest/v1/staff_allocation"
        );
    }

    #[test]
    fn test_filter_query() {
        let (column, condition) =
            RestStore::filter_query(&Filter::eq("staffnumber", "S1")).unwrap();
        assert_eq!(column, "staffnumber");
        assert_eq!(condition, "eq.S1");

        let (_, condition) = RestStore::filter_query(&Filter::eq("week", Value::Null)).unwrap();
        assert_eq!(condition, "is.null");

        assert!(RestStore::filter_query(&Filter::eq("a&b", "x")).is_err());
    }

    #[test]
    fn test_into_rows_shapes() {
        assert!(into_rows(Value::Null).unwrap().is_empty());
        assert_eq!(into_rows(json!({ "a": 1 })).unwrap().len(), 1);
        assert_eq!(into_rows(json!([{ "a": 1 }, { "a": 2 }])).unwrap().len(), 2);
        assert!(into_rows(json!([1, 2])).is_err());
        assert!(into_rows(json!("text")).is_err());
    }

    #[test]
    fn test_constraint_name() {
        assert_eq!(
            constraint_name(
                "duplicate key value violates unique constraint \"staff_allocation_staffnumber_key\""
            )
            .as_deref(),
            Some("staff_allocation_staffnumber_key")
        );
        assert_eq!(constraint_name("something else"), None);
    }
}
