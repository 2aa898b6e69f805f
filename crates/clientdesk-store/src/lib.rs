//! # clientdesk-store
//!
//! Row-store access layer for clientdesk.
//!
//! The backend keeps its records in a hosted Postgres service exposed over
//! REST. This crate abstracts that surface behind the `RowStore` trait so
//! the domain crates can be exercised against an in-memory store in tests.
//!
//! ```text
//! ┌──────────────────┐     ┌───────────────────────────────┐
//! │  Domain crates   │────▶│  RowStore (trait)             │
//! │  (payments, ...) │     │   ├── PostgrestStore (hosted) │
//! └──────────────────┘     │   └── MemoryStore (tests/dev) │
//!                          └───────────────────────────────┘
//! ```
//!
//! Rows travel as `serde_json::Value` objects; typed wrappers live next to
//! the domain types that own each table.

mod error;
mod memory;
mod postgrest;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgrest::{PostgrestConfig, PostgrestStore};

use async_trait::async_trait;
use serde_json::Value;

/// A column comparison used to scope `select`/`update`/`delete` calls.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Op {
    Eq,
    Neq,
}

impl Op {
    fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Neq => "neq",
        }
    }
}

/// Conjunction of column filters.
///
/// Only `eq` and `neq` are modeled; that is the full set the backend needs,
/// including the conditional reconciliation write (`status != received`).
#[derive(Clone, Debug, Default)]
pub struct Filter {
    clauses: Vec<(String, Op, String)>,
}

impl Filter {
    /// Empty filter, matches every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Require `column = value`
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((column.into(), Op::Eq, value.into()));
        self
    }

    /// Require `column != value`
    #[must_use]
    pub fn neq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((column.into(), Op::Neq, value.into()));
        self
    }

    /// Render as REST query pairs (`column` → `eq.value`)
    pub(crate) fn query_pairs(&self) -> Vec<(String, String)> {
        self.clauses
            .iter()
            .map(|(col, op, val)| (col.clone(), format!("{}.{}", op.as_str(), val)))
            .collect()
    }

    /// Evaluate against an in-memory row
    pub(crate) fn matches(&self, row: &Value) -> bool {
        self.clauses.iter().all(|(col, op, val)| {
            let cell = row.get(col);
            let equal = match cell {
                Some(Value::String(s)) => s == val,
                Some(Value::Null) | None => false,
                Some(other) => other.to_string() == *val,
            };
            match op {
                Op::Eq => equal,
                Op::Neq => !equal,
            }
        })
    }

    /// Whether the filter has no clauses
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// CRUD over named tables (Strategy pattern)
///
/// Implement this per backing service: hosted Postgres REST, in-memory, etc.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Fetch rows matching the filter
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>>;

    /// Insert a row, returning it as stored (ids/defaults filled in)
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Patch matching rows, returning the rows that were updated.
    ///
    /// The returned set is how callers observe conditional updates: an
    /// empty result means the filter matched nothing.
    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> Result<Vec<Value>>;

    /// Delete matching rows
    async fn delete(&self, table: &str, filter: &Filter) -> Result<()>;

    /// Store name (for logs)
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_query_pairs() {
        let filter = Filter::all().eq("id", "p1").neq("status", "received");
        let pairs = filter.query_pairs();
        assert_eq!(pairs[0], ("id".into(), "eq.p1".into()));
        assert_eq!(pairs[1], ("status".into(), "neq.received".into()));
    }

    #[test]
    fn test_filter_matches_strings() {
        let row = json!({"id": "p1", "status": "pending"});
        assert!(Filter::all().eq("id", "p1").matches(&row));
        assert!(Filter::all().neq("status", "received").matches(&row));
        assert!(!Filter::all().eq("status", "received").matches(&row));
    }

    #[test]
    fn test_filter_missing_column_never_eq() {
        let row = json!({"id": "p1"});
        assert!(!Filter::all().eq("client_id", "c1").matches(&row));
        // neq on a missing column matches: the value is definitely not "c1"
        assert!(Filter::all().neq("client_id", "c1").matches(&row));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(Filter::all().matches(&json!({"anything": 1})));
    }
}
