use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::transport::{GraphQlErrors, GraphQlRequest, Transport, TransportError};

/// Sends queries and mutations as JSON `POST` requests.
///
/// A non-2xx response fails with its status, unless the body carries GraphQL
/// `errors`, which are reported instead.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    url: Url,
    client: Client,
}

impl HttpTransport {
    /// Creates a transport for the given endpoint. `timeout` applies to every request.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, Error> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::connection_init(
                url.as_str(),
                format!("unsupported scheme '{}', expected http or https", url.scheme()),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::connection_init(url.as_str(), e))?;
        Ok(Self { url, client })
    }

    /// Gets the endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Extracts `data` from a GraphQL response body.
pub(crate) fn response_data(mut body: Value) -> Result<Value, TransportError> {
    if let Some(errors) = body.get("errors").and_then(GraphQlErrors::from_value) {
        return Err(TransportError::GraphQl(errors));
    }
    match body.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => Err(TransportError::Protocol(
            "response carries neither data nor errors".to_string(),
        )),
        Some(data) => Ok(data),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, TransportError> {
        log::debug!("GraphQL request {} to {}", request.name, self.url);
        log::trace!("Variables: {}", request.variables);

        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await?;
        let status_error = response.error_for_status_ref().err();
        let bytes = response.bytes().await?;

        let body: Value = match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(e) => {
                return Err(match status_error {
                    Some(status_error) => status_error.into(),
                    None => TransportError::Protocol(format!("response is not JSON: {e}")),
                });
            }
        };
        log::trace!("GraphQL response {}: {body}", request.name);

        match (status_error, response_data(body)) {
            (Some(_), Err(e @ TransportError::GraphQl(_))) => Err(e),
            (Some(status_error), _) => Err(status_error.into()),
            (None, result) => result,
        }
    }
}
