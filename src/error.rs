use displaydoc::Display;
use thiserror::Error;

use crate::decode::DecodeError;
use crate::transport::TransportError;

/// Boxed error used where the cause comes from heterogeneous sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents errors that can occur when talking to the indexer.
///
/// Callers can tell "no result" from "operation failed": lookups that may
/// legitimately find nothing return `Ok(None)`, never an error.
#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to initialize connection to {endpoint}: {source}
    ConnectionInit {
        /// The endpoint that could not be set up.
        endpoint: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// Request {request} failed after {attempts} attempts: {source}
    QueryExecution {
        /// Name of the request that failed.
        request: &'static str,
        /// Number of attempts performed.
        attempts: u32,
        /// The failure of the last attempt.
        #[source]
        source: TransportError,
    },
    /// Subscription error: {0}
    Subscription(#[from] SubscriptionError),
    /// Failed to decode response: {0}
    Decode(#[from] DecodeError),
    /// Invalid input: {0}
    Validation(String),
    /// Authentication failed: {0}
    Authentication(String),
}

/// Errors raised by subscription streams. None of them are retried.
#[derive(Debug, Display, Error)]
pub enum SubscriptionError {
    /// No streaming endpoint was provided when the client was created
    NotConfigured,
    /// Subscription {subscription} failed in transport: {source}
    Transport {
        /// Name of the subscription.
        subscription: &'static str,
        #[source]
        source: TransportError,
    },
    /// Subscription {subscription} received an undecodable item: {source}
    Decode {
        /// Name of the subscription.
        subscription: &'static str,
        #[source]
        source: DecodeError,
    },
}

impl Error {
    /// Returns `true` when the error comes from a subscription.
    pub fn is_subscription(&self) -> bool {
        matches!(self, Error::Subscription(_))
    }

    /// Returns `true` when a query or mutation exhausted its retries.
    pub fn is_query_execution(&self) -> bool {
        matches!(self, Error::QueryExecution { .. })
    }

    pub(crate) fn connection_init(endpoint: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::ConnectionInit {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }
}
