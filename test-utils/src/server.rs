//! Single-connection local servers for exercising the real HTTP and WebSocket transports.

use futures::{SinkExt, StreamExt};
use midnight_indexer_sdk::Url;
use midnight_indexer_sdk::ws::GRAPHQL_TRANSPORT_WS;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};

const PROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

/// One step of a scripted WebSocket conversation.
#[derive(Debug, Clone)]
pub enum WsStep {
    /// Send this JSON message as a text frame.
    Send(Value),
    /// Wait for the next text message from the client and record it.
    Expect,
    /// Send a close frame and stop.
    Close,
}

/// Serves one GraphQL POST with the given status and raw body.
/// The handle resolves to the JSON body the client sent.
pub async fn serve_http_once(
    status: u16,
    body: impl Into<String>,
) -> anyhow::Result<(Url, JoinHandle<anyhow::Result<Value>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = Url::parse(&format!(
        "http://{}/api/v1/graphql",
        listener.local_addr()?
    ))?;
    let body = body.into();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let request = read_http_request(&mut stream).await?;

        let reason = if status == 200 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(serde_json::from_slice(&request)?)
    });
    Ok((url, handle))
}

/// Reads one request and returns its body.
async fn read_http_request(stream: &mut tokio::net::TcpStream) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = find_header_end(&buf) {
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|value| value.trim().parse::<usize>())
                .transpose()?
                .unwrap_or(0);
            let body_start = end + 4;
            if buf.len() >= body_start + length {
                return Ok(buf[body_start..body_start + length].to_vec());
            }
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            anyhow::bail!("connection closed before the request was complete");
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Accepts one `graphql-transport-ws` connection and plays `steps` on it.
/// The handle resolves to the client messages recorded by [`WsStep::Expect`].
pub async fn serve_ws_once(
    steps: Vec<WsStep>,
) -> anyhow::Result<(Url, JoinHandle<anyhow::Result<Vec<Value>>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = Url::parse(&format!(
        "ws://{}/api/v1/graphql/ws",
        listener.local_addr()?
    ))?;

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let mut socket = tokio_tungstenite::accept_hdr_async(stream, negotiate_protocol).await?;
        let mut received = Vec::new();

        for step in steps {
            match step {
                WsStep::Send(message) => socket.send(Message::Text(message.to_string())).await?,
                WsStep::Expect => loop {
                    match socket.next().await {
                        Some(Ok(Message::Text(text))) => {
                            received.push(serde_json::from_str(&text)?);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => anyhow::bail!("client disconnected early"),
                    }
                },
                WsStep::Close => {
                    socket.close(None).await?;
                    break;
                }
            }
        }
        Ok(received)
    });
    Ok((url, handle))
}

fn negotiate_protocol(request: &Request, mut response: Response) -> Result<Response, ErrorResponse> {
    let requested = request
        .headers()
        .get(PROTOCOL_HEADER)
        .and_then(|value| value.to_str().ok());
    if requested != Some(GRAPHQL_TRANSPORT_WS) {
        let mut rejection = ErrorResponse::new(Some("unsupported sub-protocol".to_string()));
        *rejection.status_mut() = StatusCode::BAD_REQUEST;
        return Err(rejection);
    }
    response.headers_mut().insert(
        PROTOCOL_HEADER,
        HeaderValue::from_static(GRAPHQL_TRANSPORT_WS),
    );
    Ok(response)
}
