use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use displaydoc::Display;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Lazy sequence of raw `data` objects produced by a subscription.
/// Dropping it releases the underlying connection.
pub type RawStream = Pin<Box<dyn Stream<Item = Result<Value, TransportError>> + Send>>;

/// Represents errors raised while exchanging messages with the indexer.
#[derive(Debug, Display, Error)]
pub enum TransportError {
    /// HTTP request failed: {0}
    Http(#[from] reqwest::Error),
    /// WebSocket failure: {0}
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// Server returned errors: {0}
    GraphQl(GraphQlErrors),
    /// Unexpected message from server: {0}
    Protocol(String),
    /// Connection closed before the subscription completed
    Closed,
    /// Transport failure: {0}
    Other(String),
}

/// A single entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQlErrorEntry {
    /// Human readable message from the server.
    pub message: String,
}

/// The `errors` array of a GraphQL response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQlErrors(pub Vec<GraphQlErrorEntry>);

impl fmt::Display for GraphQlErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl GraphQlErrors {
    /// Parses an `errors` value, keeping only entries that carry a message.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let entries: Vec<GraphQlErrorEntry> = value
            .as_array()?
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect();
        if entries.is_empty() {
            None
        } else {
            Some(Self(entries))
        }
    }
}

/// A query, mutation or subscription document together with its variables.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    /// Label used in logs and errors. Not sent to the server.
    #[serde(skip)]
    pub name: &'static str,
    /// The GraphQL document.
    pub query: &'static str,
    /// Variables for the document.
    pub variables: Value,
}

impl GraphQlRequest {
    /// Creates a request without variables.
    pub fn new(name: &'static str, query: &'static str) -> Self {
        Self {
            name,
            query,
            variables: Value::Object(Default::default()),
        }
    }

    /// Replaces the variables of the request.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }
}

/// Request/response transport used for queries and mutations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the `data` object of the response.
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, TransportError>;
}

/// Duplex transport used for subscriptions. Each call opens one logical stream.
#[async_trait]
pub trait StreamingTransport: Send + Sync {
    /// Starts the subscription and returns its raw item stream.
    async fn subscribe(&self, request: &GraphQlRequest) -> Result<RawStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_skips_name() {
        let request = GraphQlRequest::new("latest_block", "query { block { hash } }")
            .with_variables(json!({"hash": "0x01"}));
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            json!({"query": "query { block { hash } }", "variables": {"hash": "0x01"}})
        );
    }

    #[test]
    fn test_graphql_errors_join_messages() {
        let errors = GraphQlErrors::from_value(&json!([
            {"message": "invalid offset"},
            {"message": "unknown block", "path": ["block"]},
            {"code": 1}
        ]))
        .unwrap();
        assert_eq!(errors.0.len(), 2);
        assert_eq!(errors.to_string(), "invalid offset; unknown block");
    }

    #[test]
    fn test_graphql_errors_empty_is_none() {
        assert!(GraphQlErrors::from_value(&json!([])).is_none());
        assert!(GraphQlErrors::from_value(&json!(null)).is_none());
    }
}
