//! PostgREST-style entity store client
//!
//! Every collection is a table exposed at `{base_url}/rest/v1/{table}`.
//! Requests carry the API key both as `apikey` header and as bearer token.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{instrument, trace};

use super::{Collection, EntityStore};
use crate::error::FetchError;

/// HTTP client for a PostgREST-compatible entity store
#[derive(Debug, Clone)]
pub struct RestEntityStore {
    /// HTTP client (reused across requests)
    client: reqwest::Client,

    /// Base URL without the `/rest/v1` suffix
    base_url: String,

    /// API key, if the store requires one
    api_key: Option<String>,
}

impl RestEntityStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table_name())
    }
}

#[async_trait]
impl EntityStore for RestEntityStore {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    #[instrument(skip(self), fields(store = %self.base_url))]
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, FetchError> {
        let url = self.collection_url(collection);
        trace!("requesting {url}");

        let mut request = self.client.get(&url).query(&[("select", "*")]);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;

        match serde_json::from_str::<Value>(&body)? {
            Value::Array(rows) => Ok(rows),
            other => Err(FetchError::Decode(format!(
                "expected a JSON array for `{collection}`, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
