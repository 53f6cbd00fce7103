//! REST backend for entity handlers.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::dispatch::EntityHandler;
use crate::error::HandlerError;
use crate::tools::resource_name;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Forwards entity operations to `<base_url>/<resource>`.
///
/// | Operation | Request |
/// |-----------|---------|
/// | list | `GET /<resource>` |
/// | get | `GET /<resource>/{key}` |
/// | create | `POST /<resource>` |
/// | update | `PATCH /<resource>/{key}` |
/// | delete | `DELETE /<resource>/{key}` |
#[derive(Debug, Clone)]
pub struct RestHandler {
    client: Client,
    collection: String,
}

impl RestHandler {
    /// Handler for an explicit resource path segment.
    pub fn new(base_url: &str, resource: &str) -> Result<Self, HandlerError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| HandlerError::Network { source })?;
        let collection = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            resource.trim_matches('/')
        );
        Ok(Self { client, collection })
    }

    /// Handler for an entity model, using its snake case plural as the
    /// resource (`TodoItem` -> `/todo_items`).
    pub fn for_entity(base_url: &str, entity: &str) -> Result<Self, HandlerError> {
        Self::new(base_url, &resource_name(entity))
    }

    pub fn collection_url(&self) -> &str {
        &self.collection
    }

    fn item_url(&self, key: &Value) -> String {
        let segment = match key {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!("{}/{segment}", self.collection)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value, HandlerError> {
        let response = request
            .send()
            .map_err(|source| HandlerError::Network { source })?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|source| HandlerError::Network { source })?;
        debug!(status = status.as_u16(), "backend responded");

        if !status.is_success() {
            return Err(HandlerError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

impl EntityHandler for RestHandler {
    fn list(&self) -> Result<Value, HandlerError> {
        self.send(self.client.get(&self.collection))
    }

    fn get(&self, key: &Value) -> Result<Value, HandlerError> {
        self.send(self.client.get(self.item_url(key)))
    }

    fn create(&self, body: &Value) -> Result<Value, HandlerError> {
        self.send(self.client.post(&self.collection).json(body))
    }

    fn update(&self, key: &Value, patch: &Value) -> Result<Value, HandlerError> {
        self.send(self.client.patch(self.item_url(key)).json(patch))
    }

    fn delete(&self, key: &Value) -> Result<Value, HandlerError> {
        self.send(self.client.delete(self.item_url(key)))
    }
}
