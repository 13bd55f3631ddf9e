use super::{Filter, Query, RemoteStore, Table};
use crate::errors::StoreError;
use crate::identity::SessionStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

/// PostgREST endpoint of the hosted backend. Requests carry the project key
/// and, when signed in, the session's access token so row level security
/// applies to the current user.
pub struct RestStore {
    client: Client,
    base_url: String,
    anon_key: String,
    session: SessionStore,
}

impl RestStore {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        session: SessionStore,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session,
        }
    }

    fn url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let request = self
            .client
            .get(self.url(table))
            .query(&select_params(query));
        let response = self.authorize(request).send().await?;
        let body = checked(response).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let request = self
            .client
            .post(self.url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let response = self.authorize(request).send().await?;
        let rows: Vec<Value> = serde_json::from_value(checked(response).await?)?;
        super::single(rows)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<(), StoreError> {
        let request = self
            .client
            .patch(self.url(table))
            .query(&filter_params(filters))
            .json(&patch);
        let response = self.authorize(request).send().await?;
        checked(response).await.map(|_| ())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), StoreError> {
        let request = self
            .client
            .delete(self.url(table))
            .query(&filter_params(filters));
        let response = self.authorize(request).send().await?;
        checked(response).await.map(|_| ())
    }
}

fn select_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        query.columns.unwrap_or("*").replace(' ', ""),
    )];
    params.extend(filter_params(&query.filters));
    if let Some(order) = query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| {
            let value = match &filter.value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (filter.column.to_string(), format!("eq.{value}"))
        })
        .collect()
}

async fn checked(response: Response) -> Result<Value, StoreError> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    if status.is_success() {
        return Ok(body);
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());
    match body.get("code").and_then(Value::as_str) {
        Some(code) => Err(StoreError::with_code(code, message)),
        None if status == StatusCode::UNAUTHORIZED => Err(StoreError::jwt_rejected(message)),
        None => Err(StoreError::new(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_params_follow_postgrest_syntax() {
        let query = Query::all()
            .columns("habit_id, days")
            .eq("week", "2024-W05")
            .order_by("position", false)
            .limit(1);
        let params = select_params(&query);
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "habit_id,days".to_string()),
                ("week".to_string(), "eq.2024-W05".to_string()),
                ("order".to_string(), "position.desc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn numeric_filters_are_not_quoted() {
        let params = filter_params(&[Filter::eq("position", 3)]);
        assert_eq!(params, vec![("position".to_string(), "eq.3".to_string())]);
    }
}
