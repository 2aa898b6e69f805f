//! In-Memory Store
//!
//! For tests and local development. Applies the same filter semantics as
//! the hosted store and assigns uuid ids on insert the way the database
//! defaults would.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::{Filter, RowStore};

/// `RowStore` held entirely in process memory
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Number of rows currently in a table (test helper)
    pub fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().unwrap();
        tables.get(table).map_or(0, Vec::len)
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        let tables = self.tables.read().unwrap();
        let rows = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value> {
        if let Value::Object(ref mut map) = row {
            // the hosted database assigns ids; mirror that here
            if !map.contains_key("id") || map["id"].is_null() {
                map.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
            }
        }

        let mut tables = self.tables.write().unwrap();
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> Result<Vec<Value>> {
        let mut tables = self.tables.write().unwrap();
        let mut updated = Vec::new();

        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                if let (Value::Object(target), Value::Object(fields)) = (&mut *row, &patch) {
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|r| !filter.matches(r));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let store = MemoryStore::new();
        let row = store
            .insert("payments", json!({"amount": "100"}))
            .await
            .unwrap();
        assert!(row["id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_select_filters_rows() {
        let store = MemoryStore::new();
        store
            .insert("payments", json!({"id": "p1", "client_id": "c1"}))
            .await
            .unwrap();
        store
            .insert("payments", json!({"id": "p2", "client_id": "c2"}))
            .await
            .unwrap();

        let rows = store
            .select("payments", &Filter::all().eq("client_id", "c1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "p1");
    }

    #[tokio::test]
    async fn test_update_returns_only_matched_rows() {
        let store = MemoryStore::new();
        store
            .insert("payments", json!({"id": "p1", "status": "pending"}))
            .await
            .unwrap();
        store
            .insert("payments", json!({"id": "p2", "status": "received"}))
            .await
            .unwrap();

        let updated = store
            .update(
                "payments",
                &Filter::all().eq("id", "p2").neq("status", "received"),
                json!({"status": "received"}),
            )
            .await
            .unwrap();
        assert!(updated.is_empty());

        let updated = store
            .update(
                "payments",
                &Filter::all().eq("id", "p1").neq("status", "received"),
                json!({"status": "received", "transaction_id": "pi_1"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["transaction_id"], "pi_1");
    }

    #[tokio::test]
    async fn test_delete_removes_matching() {
        let store = MemoryStore::new();
        store
            .insert("payments", json!({"id": "p1"}))
            .await
            .unwrap();
        store
            .insert("payments", json!({"id": "p2"}))
            .await
            .unwrap();

        store
            .delete("payments", &Filter::all().eq("id", "p1"))
            .await
            .unwrap();
        assert_eq!(store.row_count("payments"), 1);
    }
}
