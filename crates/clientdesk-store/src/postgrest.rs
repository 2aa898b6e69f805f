//! Hosted Postgres REST Store
//!
//! `RowStore` implementation over the hosted database's REST surface
//! (`/rest/v1/{table}` with `eq.`/`neq.` query operators). Requests carry
//! the service-role key, so row-level security is bypassed; this client is
//! for the backend only and must never reach a browser.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::{Filter, RowStore};

/// Connection settings for the hosted store
#[derive(Clone, Debug)]
pub struct PostgrestConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,

    /// Service-role key
    pub service_key: String,
}

impl PostgrestConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SUPABASE_URL")
            .map_err(|_| StoreError::Config("SUPABASE_URL not set".into()))?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| StoreError::Config("SUPABASE_SERVICE_ROLE_KEY not set".into()))?;

        Ok(Self {
            base_url,
            service_key,
        })
    }
}

/// `RowStore` backed by the hosted Postgres REST endpoint
pub struct PostgrestStore {
    http: reqwest::Client,
    config: PostgrestConfig,
}

impl PostgrestStore {
    /// Create a store from connection settings
    pub fn new(config: PostgrestConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(PostgrestConfig::from_env()?))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url.trim_end_matches('/'), table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.table_url(table))
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            // return=representation makes writes echo the affected rows,
            // which conditional updates rely on
            .header("Prefer", "return=representation")
    }

    async fn read_rows(response: reqwest::Response) -> Result<Vec<Value>> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StoreError::Query {
                status: status.as_u16(),
                message: body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RowStore for PostgrestStore {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(&filter.query_pairs())
            .send()
            .await?;

        Self::read_rows(response).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, table)
            // the REST surface takes a batch; wrap the single row
            .json(&Value::Array(vec![row]))
            .send()
            .await?;

        let mut rows = Self::read_rows(response).await?;
        rows.pop().ok_or_else(|| StoreError::Query {
            status: 500,
            message: format!("insert into {table} returned no representation"),
        })
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> Result<Vec<Value>> {
        let response = self
            .request(reqwest::Method::PATCH, table)
            .query(&filter.query_pairs())
            .json(&patch)
            .send()
            .await?;

        Self::read_rows(response).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, table)
            .query(&filter.query_pairs())
            .send()
            .await?;

        Self::read_rows(response).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "postgrest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_strips_trailing_slash() {
        let store = PostgrestStore::new(PostgrestConfig {
            base_url: "https://example.supabase.co/".into(),
            service_key: "key".into(),
        });
        assert_eq!(
            store.table_url("payments"),
            "https://example.supabase.co/rest/v1/payments"
        );
    }
}
