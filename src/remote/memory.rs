use super::{Filter, Query, RemoteStore, Table};
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::{cmp::Ordering, collections::HashMap};
use tokio::sync::Mutex;

/// Process-local store with the same filtering and ordering semantics as the
/// hosted one. Used for `CHECKAPP_BACKEND=memory` and in tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self, table: Table) -> Vec<Value> {
        self.tables
            .lock()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|filter| filter.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        if let Some(order) = query.order {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(order.column), b.get(order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if let Some(columns) = query.columns {
            rows = rows.into_iter().map(|row| project(row, columns)).collect();
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let Value::Object(mut fields) = row else {
            return Err(StoreError::new("insert expects a JSON object"));
        };
        fields
            .entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

        let row = Value::Object(fields);
        self.tables
            .lock()
            .await
            .entry(table)
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<(), StoreError> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::new("update expects a JSON object"));
        };
        let mut tables = self.tables.lock().await;
        for row in tables.entry(table).or_default().iter_mut() {
            if !filters.iter().all(|filter| filter.matches(row)) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables
            .entry(table)
            .or_default()
            .retain(|row| !filters.iter().all(|filter| filter.matches(row)));
        Ok(())
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn project(row: Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row;
    }
    let Value::Object(fields) = row else {
        return row;
    };
    let mut selected = Map::new();
    for column in columns.split(',').map(str::trim) {
        if let Some(value) = fields.get(column) {
            selected.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_fills_generated_columns() {
        let store = MemoryStore::new();
        let row = store
            .insert(Table::Habits, json!({"name": "Leer"}))
            .await
            .unwrap();
        assert!(row["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(row["created_at"].is_string());
    }

    #[tokio::test]
    async fn select_orders_limits_and_projects() {
        let store = MemoryStore::new();
        for (name, position) in [("b", 1), ("c", 2), ("a", 0)] {
            store
                .insert(Table::Projects, json!({"name": name, "position": position}))
                .await
                .unwrap();
        }

        let query = Query::all()
            .columns("position")
            .order_by("position", false)
            .limit(1);
        let rows = store.select(Table::Projects, &query).await.unwrap();
        assert_eq!(rows, vec![json!({"position": 2})]);

        let ordered = store
            .select(Table::Projects, &Query::all().order_by("position", true))
            .await
            .unwrap();
        let names: Vec<_> = ordered.iter().map(|row| row["name"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[tokio::test]
    async fn update_and_delete_respect_filters() {
        let store = MemoryStore::new();
        let keep = store
            .insert(Table::Habits, json!({"name": "keep"}))
            .await
            .unwrap();
        let drop = store
            .insert(Table::Habits, json!({"name": "drop"}))
            .await
            .unwrap();

        store
            .update(
                Table::Habits,
                &[Filter::eq("id", keep["id"].clone())],
                json!({"name": "kept"}),
            )
            .await
            .unwrap();
        store
            .delete(Table::Habits, &[Filter::eq("id", drop["id"].clone())])
            .await
            .unwrap();

        let rows = store.rows(Table::Habits).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "kept");
    }
}
