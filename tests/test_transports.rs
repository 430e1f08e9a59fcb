use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use midnight_indexer_sdk::MidnightClient;
use midnight_indexer_sdk::http::HttpTransport;
use midnight_indexer_sdk::transport::{
    GraphQlRequest, StreamingTransport, Transport, TransportError,
};
use midnight_indexer_sdk::ws::WsTransport;
use midnight_indexer_sdk_test_utils::{
    WsStep, init_logger, mock_block_at, serve_http_once, serve_ws_once,
};
use serde_json::{Value, json};

fn next(data: Value) -> WsStep {
    WsStep::Send(json!({"id": "1", "type": "next", "payload": {"data": data}}))
}

fn message_types(messages: &[Value]) -> Vec<&str> {
    messages
        .iter()
        .map(|m| m["type"].as_str().unwrap_or_default())
        .collect()
}

fn handshake() -> Vec<WsStep> {
    vec![
        WsStep::Expect,
        WsStep::Send(json!({"type": "ping"})),
        WsStep::Expect,
        WsStep::Send(json!({"type": "connection_ack"})),
        WsStep::Expect,
    ]
}

fn request() -> GraphQlRequest {
    GraphQlRequest::new("updates", "subscription { updates { x } }")
        .with_variables(json!({"from": 1}))
}

#[tokio::test]
async fn test_ws_subscription_completes() -> Result<()> {
    init_logger(true);
    let mut steps = handshake();
    steps.extend([
        next(json!({"x": 1})),
        next(json!({"x": 2})),
        WsStep::Send(json!({"type": "ping"})),
        WsStep::Expect,
        WsStep::Send(json!({"id": "1", "type": "complete"})),
    ]);
    let (url, server) = serve_ws_once(steps).await?;

    let transport = WsTransport::new(url)?;
    let items: Vec<_> = transport.subscribe(&request()).await?.collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().ok(), Some(&json!({"x": 1})));
    assert_eq!(items[1].as_ref().ok(), Some(&json!({"x": 2})));

    let received = server.await??;
    assert_eq!(
        message_types(&received),
        vec!["connection_init", "pong", "subscribe", "pong"]
    );
    assert_eq!(received[2]["id"], "1");
    assert_eq!(
        received[2]["payload"],
        json!({"query": "subscription { updates { x } }", "variables": {"from": 1}})
    );
    Ok(())
}

#[tokio::test]
async fn test_ws_close_before_complete() -> Result<()> {
    let mut steps = handshake();
    steps.extend([next(json!({"x": 1})), next(json!({"x": 2})), WsStep::Close]);
    let (url, server) = serve_ws_once(steps).await?;

    let transport = WsTransport::new(url)?;
    let items: Vec<_> = transport.subscribe(&request()).await?.collect().await;

    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    assert!(matches!(items[2], Err(TransportError::Closed)));

    server.await??;
    Ok(())
}

#[tokio::test]
async fn test_ws_error_message_ends_stream() -> Result<()> {
    let mut steps = handshake();
    steps.push(WsStep::Send(json!({
        "id": "1",
        "type": "error",
        "payload": [{"message": "invalid session id"}]
    })));
    let (url, server) = serve_ws_once(steps).await?;

    let transport = WsTransport::new(url)?;
    let items: Vec<_> = transport.subscribe(&request()).await?.collect().await;

    assert_eq!(items.len(), 1);
    let Err(TransportError::GraphQl(errors)) = &items[0] else {
        panic!("Expected GraphQL errors, got {:?}", items[0]);
    };
    assert_eq!(errors.to_string(), "invalid session id");

    server.await??;
    Ok(())
}

#[tokio::test]
async fn test_client_block_subscription_over_ws() -> Result<()> {
    let mut steps = vec![
        WsStep::Expect,
        WsStep::Send(json!({"type": "connection_ack"})),
        WsStep::Expect,
    ];
    steps.extend([
        next(json!({"blocks": mock_block_at(5)})),
        next(json!({"blocks": mock_block_at(6)})),
        WsStep::Send(json!({"id": "1", "type": "complete"})),
    ]);
    let (url, server) = serve_ws_once(steps).await?;

    let client = MidnightClient::new("http://127.0.0.1:1/api/v1/graphql", Some(url.as_str()))?;
    let heights: Vec<u64> = client
        .subscribe_to_blocks(Some(5))
        .await?
        .map(|block| block.map(|b| b.height))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

    assert_eq!(heights, vec![5, 6]);
    let received = server.await??;
    assert_eq!(received[1]["payload"]["variables"], json!({"offset": {"height": 5}}));
    Ok(())
}

#[tokio::test]
async fn test_http_returns_data() -> Result<()> {
    let (url, server) =
        serve_http_once(200, json!({"data": {"connect": "0xsession"}}).to_string()).await?;

    let transport = HttpTransport::new(url, Duration::from_secs(5))?;
    let request = GraphQlRequest::new("connect_wallet", "mutation { connect }")
        .with_variables(json!({"viewingKey": "viewing-key"}));
    let data = transport.execute(&request).await?;

    assert_eq!(data, json!({"connect": "0xsession"}));
    assert_eq!(
        server.await??,
        json!({"query": "mutation { connect }", "variables": {"viewingKey": "viewing-key"}})
    );
    Ok(())
}

#[tokio::test]
async fn test_http_error_status() -> Result<()> {
    let (url, server) = serve_http_once(500, json!({"message": "internal"}).to_string()).await?;

    let transport = HttpTransport::new(url, Duration::from_secs(5))?;
    let err = transport
        .execute(&GraphQlRequest::new("latest_block", "query { block { hash } }"))
        .await
        .unwrap_err();

    let TransportError::Http(e) = &err else {
        panic!("Expected HTTP error, got {err:?}");
    };
    assert_eq!(e.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
    server.await??;
    Ok(())
}

#[tokio::test]
async fn test_http_error_status_with_plain_body() -> Result<()> {
    let (url, server) = serve_http_once(502, "bad gateway").await?;

    let transport = HttpTransport::new(url, Duration::from_secs(5))?;
    let err = transport
        .execute(&GraphQlRequest::new("latest_block", "query { block { hash } }"))
        .await
        .unwrap_err();

    let TransportError::Http(e) = &err else {
        panic!("Expected HTTP error, got {err:?}");
    };
    assert_eq!(e.status(), Some(reqwest::StatusCode::BAD_GATEWAY));
    server.await??;
    Ok(())
}

#[tokio::test]
async fn test_http_error_status_keeps_graphql_errors() -> Result<()> {
    let body = json!({"errors": [{"message": "invalid viewing key"}]}).to_string();
    let (url, server) = serve_http_once(400, body).await?;

    let transport = HttpTransport::new(url, Duration::from_secs(5))?;
    let err = transport
        .execute(&GraphQlRequest::new("connect_wallet", "mutation { connect }"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::GraphQl(_)), "got {err:?}");
    assert_eq!(err.to_string(), "Server returned errors: invalid viewing key");
    server.await??;
    Ok(())
}

#[tokio::test]
async fn test_http_graphql_errors_body() -> Result<()> {
    let body = json!({"data": null, "errors": [{"message": "block not found"}]}).to_string();
    let (url, server) = serve_http_once(200, body).await?;

    let transport = HttpTransport::new(url, Duration::from_secs(5))?;
    let err = transport
        .execute(&GraphQlRequest::new("latest_block", "query { block { hash } }"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Server returned errors: block not found");
    server.await??;
    Ok(())
}

#[tokio::test]
async fn test_client_query_over_http() -> Result<()> {
    let (url, server) =
        serve_http_once(200, json!({"data": {"connect": "0xsession"}}).to_string()).await?;

    let client = MidnightClient::builder()
        .http_url(url.as_str())
        .retry_attempts(1)
        .build()?;
    assert_eq!(client.connect_wallet("viewing-key").await?, "0xsession");

    let sent = server.await??;
    assert_eq!(sent["variables"], json!({"viewingKey": "viewing-key"}));
    Ok(())
}
