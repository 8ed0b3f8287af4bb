//! Remote resource clients
//!
//! A resource client performs query/create/read/update/remove against one
//! resource collection at one base URI. The HTTP client maps those operations
//! onto plain REST verbs; the null client stands in when no endpoint is
//! configured and fails every call with the same reason.

use crate::errors::{ConsoleError, NO_ENDPOINT_REASON};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Builds a client for `(base_uri, resource_name)`; registered per service
pub type ClientBuilder = Arc<dyn Fn(&str, &str) -> Arc<dyn ResourceClient> + Send + Sync>;

/// Contract shared by every resource client
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Collection URI this client is bound to
    fn base_uri(&self) -> &str;

    /// List the collection, optionally filtered by query parameters
    async fn query(&self, params: &[(String, String)]) -> Result<Vec<Value>, ConsoleError>;

    async fn create(&self, body: &Value) -> Result<Value, ConsoleError>;

    async fn read(&self, id: &str) -> Result<Value, ConsoleError>;

    async fn update(&self, id: &str, body: &Value) -> Result<Value, ConsoleError>;

    async fn remove(&self, id: &str) -> Result<(), ConsoleError>;
}

/// REST client: `GET base`, `POST base`, `GET|PUT|DELETE base/:id`
pub struct HttpResourceClient {
    base_uri: String,
    resource: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpResourceClient {
    pub fn new(base_uri: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            resource: resource.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder producing HTTP clients that share one connection pool
    pub fn builder(client: reqwest::Client, timeout: Duration) -> ClientBuilder {
        Arc::new(move |base_uri: &str, resource: &str| -> Arc<dyn ResourceClient> {
            Arc::new(
                HttpResourceClient::new(base_uri, resource)
                    .with_client(client.clone())
                    .with_timeout(timeout),
            )
        })
    }

    fn member_uri(&self, id: &str) -> String {
        format!("{}/{}", self.base_uri, urlencoding::encode(id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>, ConsoleError> {
        let response = request
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(status, &self.base_uri, detail.trim()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Collection bodies are either a bare array or an object keyed by resource name
    fn collection_items(&self, body: Value) -> Vec<Value> {
        match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove(&self.resource) {
                Some(Value::Array(items)) => items,
                Some(other) => vec![other],
                None => vec![Value::Object(map)],
            },
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }
}

fn status_error(status: StatusCode, uri: &str, detail: &str) -> ConsoleError {
    let message = if detail.is_empty() {
        format!("HTTP {} from {}", status, uri)
    } else {
        format!("HTTP {} from {}: {}", status, uri, detail)
    };

    match status {
        StatusCode::NOT_FOUND => ConsoleError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ConsoleError::Validation(message)
        }
        _ => ConsoleError::Transport(message),
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    fn base_uri(&self) -> &str {
        &self.base_uri
    }

    async fn query(&self, params: &[(String, String)]) -> Result<Vec<Value>, ConsoleError> {
        let request = self.client.get(&self.base_uri).query(params);
        let body = self.send(request).await?;
        Ok(body.map(|body| self.collection_items(body)).unwrap_or_default())
    }

    async fn create(&self, body: &Value) -> Result<Value, ConsoleError> {
        let request = self.client.post(&self.base_uri).json(body);
        Ok(self.send(request).await?.unwrap_or(Value::Null))
    }

    async fn read(&self, id: &str) -> Result<Value, ConsoleError> {
        let request = self.client.get(self.member_uri(id));
        Ok(self.send(request).await?.unwrap_or(Value::Null))
    }

    async fn update(&self, id: &str, body: &Value) -> Result<Value, ConsoleError> {
        let request = self.client.put(self.member_uri(id)).json(body);
        Ok(self.send(request).await?.unwrap_or(Value::Null))
    }

    async fn remove(&self, id: &str) -> Result<(), ConsoleError> {
        let request = self.client.delete(self.member_uri(id));
        self.send(request).await?;
        Ok(())
    }
}

/// Client with no endpoint behind it; every operation fails immediately
#[derive(Debug, Clone, Default)]
pub struct NullResourceClient {
    base_uri: String,
}

impl NullResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Null client remembering the URI that could not be served
    pub fn for_uri(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, ConsoleError> {
        Err(ConsoleError::UnconfiguredEndpoint(NO_ENDPOINT_REASON.to_string()))
    }
}

#[async_trait]
impl ResourceClient for NullResourceClient {
    fn base_uri(&self) -> &str {
        &self.base_uri
    }

    async fn query(&self, _params: &[(String, String)]) -> Result<Vec<Value>, ConsoleError> {
        self.fail()
    }

    async fn create(&self, _body: &Value) -> Result<Value, ConsoleError> {
        self.fail()
    }

    async fn read(&self, _id: &str) -> Result<Value, ConsoleError> {
        self.fail()
    }

    async fn update(&self, _id: &str, _body: &Value) -> Result<Value, ConsoleError> {
        self.fail()
    }

    async fn remove(&self, _id: &str) -> Result<(), ConsoleError> {
        self.fail()
    }
}
