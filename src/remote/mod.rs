//! Collection-level access to the hosted relational store.
//!
//! The store only understands equality filters, a single ordering column and
//! a row limit, which is everything the gateway needs.

pub mod memory;
pub mod refreshing;
pub mod rest;

use crate::errors::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use memory::MemoryStore;
pub use refreshing::RefreshingStore;
pub use rest::RestStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Habits,
    HabitLogs,
    Projects,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Habits => "habits",
            Table::HabitLogs => "habit_logs",
            Table::Projects => "projects",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        row.get(self.column) == Some(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Comma separated projection; `None` selects every column.
    pub columns: Option<&'static str>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &'static str) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_by(mut self, column: &'static str, ascending: bool) -> Self {
        self.order = Some(Order { column, ascending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Inserts one row and returns it as stored (with generated columns).
    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError>;

    async fn update(&self, table: Table, filters: &[Filter], patch: Value)
    -> Result<(), StoreError>;

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), StoreError>;
}

/// Collapses a result set to exactly one row, reporting anything else as the
/// store's "not found" condition.
pub fn single(mut rows: Vec<Value>) -> Result<Value, StoreError> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        0 => Err(StoreError::not_found("no rows returned for single row query")),
        n => Err(StoreError::not_found(format!(
            "{n} rows returned for single row query"
        ))),
    }
}

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(value)?)
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(decode).collect()
}
