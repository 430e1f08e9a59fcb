use async_trait::async_trait;
use futures::{SinkExt, StreamExt, stream};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::transport::{
    GraphQlErrorEntry, GraphQlErrors, GraphQlRequest, RawStream, StreamingTransport,
    TransportError,
};

/// Sub-protocol spoken by the indexer's subscription endpoint.
pub const GRAPHQL_TRANSPORT_WS: &str = "graphql-transport-ws";

/// Every connection carries exactly one subscription, so the id is fixed.
const SUBSCRIPTION_ID: &str = "1";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Streaming transport that opens one WebSocket connection per subscription.
#[derive(Clone, Debug)]
pub struct WsTransport {
    url: Url,
}

impl WsTransport {
    /// Creates a transport for the given `ws://` or `wss://` endpoint.
    /// No connection is made until a subscription starts.
    pub fn new(url: Url) -> Result<Self, Error> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::connection_init(
                url.as_str(),
                format!("unsupported scheme '{}', expected ws or wss", url.scheme()),
            ));
        }
        Ok(Self { url })
    }

    /// Gets the endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn connect(&self) -> Result<Socket, TransportError> {
        log::debug!("Connecting to websocket endpoint: {}", self.url);

        let mut request = self.url.as_str().into_client_request()?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(GRAPHQL_TRANSPORT_WS),
        );
        let (mut socket, _) = tokio_tungstenite::connect_async(request).await?;

        send_json(&mut socket, json!({"type": "connection_init", "payload": {}})).await?;
        loop {
            match next_message(&mut socket).await? {
                ServerMessage::ConnectionAck => break,
                ServerMessage::Ping => send_json(&mut socket, json!({"type": "pong"})).await?,
                other => {
                    return Err(TransportError::Protocol(format!(
                        "expected connection_ack, got {other:?}"
                    )));
                }
            }
        }

        log::info!("Connected to websocket endpoint: {}", self.url);
        Ok(socket)
    }
}

#[async_trait]
impl StreamingTransport for WsTransport {
    async fn subscribe(&self, request: &GraphQlRequest) -> Result<RawStream, TransportError> {
        let mut socket = self.connect().await?;
        send_json(
            &mut socket,
            json!({"id": SUBSCRIPTION_ID, "type": "subscribe", "payload": request}),
        )
        .await?;
        log::debug!("Started subscription {}", request.name);

        let name = request.name;
        let items = stream::unfold(Some(socket), move |state| async move {
            let mut socket = state?;
            loop {
                let message = match next_message(&mut socket).await {
                    Ok(message) => message,
                    Err(e) => return Some((Err(e), None)),
                };
                match message {
                    ServerMessage::Next(payload) => {
                        let item = next_payload_data(payload);
                        let state = item.is_ok().then_some(socket);
                        return Some((item, state));
                    }
                    ServerMessage::Error(payload) => {
                        let errors = GraphQlErrors::from_value(&payload).unwrap_or_else(|| {
                            GraphQlErrors(vec![GraphQlErrorEntry {
                                message: payload.to_string(),
                            }])
                        });
                        return Some((Err(TransportError::GraphQl(errors)), None));
                    }
                    ServerMessage::Complete => {
                        log::debug!("Subscription {name} completed by server");
                        return None;
                    }
                    ServerMessage::Ping => {
                        if let Err(e) = send_json(&mut socket, json!({"type": "pong"})).await {
                            return Some((Err(e), None));
                        }
                    }
                    ServerMessage::Pong => {}
                    ServerMessage::Unknown(kind) => {
                        let err = TransportError::Protocol(format!("unknown message type {kind}"));
                        return Some((Err(err), None));
                    }
                    ServerMessage::ConnectionAck => {
                        let err = TransportError::Protocol("duplicate connection_ack".to_string());
                        return Some((Err(err), None));
                    }
                }
            }
        });
        Ok(Box::pin(items))
    }
}

/// Messages of the `graphql-transport-ws` protocol the client reacts to.
#[derive(Debug)]
enum ServerMessage {
    ConnectionAck,
    Ping,
    Pong,
    Next(Value),
    Error(Value),
    Complete,
    Unknown(String),
}

impl ServerMessage {
    fn parse(text: &str) -> Result<Self, TransportError> {
        let mut value: Value = serde_json::from_str(text)
            .map_err(|e| TransportError::Protocol(format!("invalid message: {e}")))?;
        let payload = value.get_mut("payload").map(Value::take).unwrap_or(Value::Null);
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Protocol(format!("message without type: {text}")))?;
        Ok(match kind {
            "connection_ack" => ServerMessage::ConnectionAck,
            "ping" => ServerMessage::Ping,
            "pong" => ServerMessage::Pong,
            "next" => ServerMessage::Next(payload),
            "error" => ServerMessage::Error(payload),
            "complete" => ServerMessage::Complete,
            other => ServerMessage::Unknown(other.to_string()),
        })
    }
}

fn next_payload_data(payload: Value) -> Result<Value, TransportError> {
    if let Some(errors) = payload.get("errors").and_then(GraphQlErrors::from_value) {
        return Err(TransportError::GraphQl(errors));
    }
    match payload.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Err(TransportError::Protocol("next message without data".to_string())),
    }
}

async fn next_message(socket: &mut Socket) -> Result<ServerMessage, TransportError> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                log::trace!("Websocket message: {text}");
                return ServerMessage::parse(&text);
            }
            Some(Ok(Message::Ping(data))) => socket.send(Message::Pong(data)).await?,
            Some(Ok(Message::Close(frame))) => {
                log::debug!("Websocket closed by server: {frame:?}");
                return Err(TransportError::Closed);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Err(TransportError::Closed),
        }
    }
}

async fn send_json(socket: &mut Socket, message: Value) -> Result<(), TransportError> {
    socket.send(Message::Text(message.to_string())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_next_message() {
        let message =
            ServerMessage::parse(r#"{"id":"1","type":"next","payload":{"data":{"blocks":{}}}}"#)
                .unwrap();
        let ServerMessage::Next(payload) = message else {
            panic!("Expected next message");
        };
        assert_eq!(next_payload_data(payload).unwrap(), json!({"blocks": {}}));
    }

    #[test]
    fn test_next_with_errors_fails() {
        let payload = json!({"errors": [{"message": "session not found"}]});
        let err = next_payload_data(payload).unwrap_err();
        assert!(matches!(err, TransportError::GraphQl(_)));
    }

    #[test]
    fn test_parse_rejects_untyped_message() {
        assert!(ServerMessage::parse(r#"{"id":"1"}"#).is_err());
        assert!(ServerMessage::parse("not json").is_err());
    }

    #[test]
    fn test_parse_unknown_type() {
        let message = ServerMessage::parse(r#"{"type":"ka"}"#).unwrap();
        assert!(matches!(message, ServerMessage::Unknown(kind) if kind == "ka"));
    }

    #[test]
    fn test_rejects_http_scheme() {
        let url = Url::parse("http://localhost:8088/api/v1/graphql/ws").unwrap();
        assert!(WsTransport::new(url).is_err());
    }
}
