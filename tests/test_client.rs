use std::sync::Arc;

use anyhow::Result;
use midnight_indexer_sdk::model::ContractActionKind;
use midnight_indexer_sdk::{ContractAction, Error, MidnightClient};
use midnight_indexer_sdk_test_utils::{
    CallResponse, MockTransport, init_logger, mock_block_at, mock_block_data, mock_client,
    mock_contract_action_data, mock_transaction_data,
};
use serde_json::json;

fn client_with(
    responses: impl IntoIterator<Item = CallResponse>,
) -> (MidnightClient, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::with_responses(responses));
    let (client, _delay) = mock_client(transport.clone(), None, 3);
    (client, transport)
}

#[tokio::test]
async fn test_get_latest_block() -> Result<()> {
    init_logger(true);
    let (client, transport) = client_with([CallResponse::Data(json!({"block": mock_block_data()}))]);

    let block = client.get_latest_block().await?;

    assert_eq!(block.hash, "0x123");
    assert_eq!(block.height, 100);
    assert_eq!(block.protocol_version, 1);
    assert_eq!(block.author.as_deref(), Some("0x456"));

    let parent = block.parent.as_deref().expect("block has a parent");
    assert_eq!(parent.hash, "0x789");
    assert_eq!(parent.height, 99);
    assert_eq!(parent.timestamp, 0);
    assert!(parent.is_stub());

    assert_eq!(block.transactions.len(), 1);
    let transaction = &block.transactions[0];
    assert_eq!(transaction.hash, "0xabc");
    assert_eq!(transaction.apply_stage, "APPLIED");
    assert_eq!(transaction.identifiers, vec!["0xdef".to_string()]);
    assert!(transaction.contract_actions.is_empty());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].name, "latest_block");
    Ok(())
}

#[tokio::test]
async fn test_latest_block_null_is_decode_error() {
    let (client, _transport) = client_with([CallResponse::Data(json!({"block": null}))]);

    let err = client.get_latest_block().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn test_get_block_by_hash() -> Result<()> {
    let (client, transport) = client_with([
        CallResponse::Data(json!({"block": mock_block_at(99)})),
        CallResponse::Data(json!({"block": null})),
    ]);

    let block = client.get_block_by_hash("0x0063").await?.expect("block exists");
    assert_eq!(block.height, 99);
    assert_eq!(block.parent.as_deref().map(|p| p.height), Some(98));

    assert!(client.get_block_by_hash("0xunknown").await?.is_none());

    let requests = transport.requests();
    assert_eq!(requests[0].variables, json!({"hash": "0x0063"}));
    assert_eq!(requests[1].variables, json!({"hash": "0xunknown"}));
    Ok(())
}

#[tokio::test]
async fn test_get_block_by_height() -> Result<()> {
    let (client, transport) = client_with([CallResponse::Data(json!({"block": mock_block_at(42)}))]);

    let block = client.get_block_by_height(42).await?.expect("block exists");
    assert_eq!(block.height, 42);
    assert_eq!(transport.requests()[0].variables, json!({"height": 42}));
    Ok(())
}

#[tokio::test]
async fn test_get_contract_action_call() -> Result<()> {
    let (client, transport) =
        client_with([CallResponse::Data(json!({"contractAction": mock_contract_action_data()}))]);

    let action = client.get_contract_action("0x123").await?.expect("action exists");

    assert_eq!(action.kind(), ContractActionKind::Call);
    let ContractAction::Call(call) = &action else {
        panic!("Expected a contract call, got {action:?}");
    };
    assert_eq!(call.address, "0x123");
    assert_eq!(call.state, "0xstate");
    assert_eq!(call.chain_state, "0xchainState");
    assert_eq!(call.entry_point, "0xentry");
    assert!(call.deploy.is_none());
    assert_eq!(call.transaction.hash, "0xabc");

    assert_eq!(transport.requests()[0].variables, json!({"address": "0x123"}));
    Ok(())
}

#[tokio::test]
async fn test_get_contract_action_deploy_and_missing() -> Result<()> {
    let deploy = json!({
        "__typename": "ContractDeploy",
        "address": "0x123",
        "state": "0xstate",
        "chainState": "0xchainState",
        "transaction": mock_transaction_data()
    });
    let (client, _transport) = client_with([
        CallResponse::Data(json!({"contractAction": deploy})),
        CallResponse::Data(json!({"contractAction": null})),
    ]);

    let action = client.get_contract_action("0x123").await?.expect("action exists");
    assert_eq!(action.kind(), ContractActionKind::Deploy);

    assert!(client.get_contract_action("0x123").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_get_contract_action_at_block() -> Result<()> {
    let update = json!({
        "__typename": "ContractUpdate",
        "address": "0x123",
        "state": "0xstate2",
        "chainState": "0xchainState2",
        "transaction": mock_transaction_data()
    });
    let (client, transport) = client_with([CallResponse::Data(json!({"contractAction": update}))]);

    let action = client
        .get_contract_action_at_block("0x123", "0x789")
        .await?
        .expect("action exists");

    assert_eq!(action.kind(), ContractActionKind::Update);
    assert_eq!(action.state(), "0xstate2");
    assert_eq!(
        transport.requests()[0].variables,
        json!({"address": "0x123", "hash": "0x789"})
    );
    Ok(())
}

#[tokio::test]
async fn test_get_transactions_by_identifier() -> Result<()> {
    let mut transaction = mock_transaction_data();
    transaction["block"] = json!({"hash": "0x123", "height": 100, "timestamp": 1234567890});
    transaction["contractActions"] = json!([mock_contract_action_data()]);
    let (client, transport) = client_with([
        CallResponse::Data(json!({"transactions": [transaction]})),
        CallResponse::Data(json!({"transactions": []})),
    ]);

    let transactions = client.get_transactions_by_identifier("0xdef").await?;
    assert_eq!(transactions.len(), 1);
    let block = transactions[0].block.as_deref().expect("transaction has a block");
    assert_eq!(block.height, 100);
    assert!(block.is_stub());
    assert_eq!(transactions[0].contract_actions.len(), 1);
    assert_eq!(
        transactions[0].contract_actions[0].kind(),
        ContractActionKind::Call
    );

    assert!(client.get_transactions_by_identifier("0xnone").await?.is_empty());
    assert_eq!(
        transport.requests()[0].variables,
        json!({"identifier": "0xdef"})
    );
    Ok(())
}

#[tokio::test]
async fn test_connect_and_disconnect_wallet() -> Result<()> {
    let (client, transport) = client_with([
        CallResponse::Data(json!({"connect": "0xsession"})),
        CallResponse::Data(json!({"disconnect": null})),
    ]);

    let session_id = client.connect_wallet("viewing-key").await?;
    assert_eq!(session_id, "0xsession");
    assert!(client.disconnect_wallet(&session_id).await?);

    let requests = transport.requests();
    assert_eq!(requests[0].name, "connect_wallet");
    assert_eq!(requests[0].variables, json!({"viewingKey": "viewing-key"}));
    assert_eq!(requests[1].name, "disconnect_wallet");
    assert_eq!(requests[1].variables, json!({"sessionId": "0xsession"}));
    Ok(())
}

#[tokio::test]
async fn test_missing_root_is_decode_error() {
    let (client, _transport) = client_with([CallResponse::Data(json!({"somethingElse": 1}))]);

    let err = client.get_block_by_height(1).await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn test_query_is_retried() -> Result<()> {
    init_logger(false);
    let transport = Arc::new(MockTransport::failing_then(
        2,
        json!({"block": mock_block_data()}),
    ));
    let (client, delay) = mock_client(transport.clone(), None, 3);

    let block = client.get_latest_block().await?;

    assert_eq!(block.height, 100);
    assert_eq!(transport.call_count(), 3);
    assert_eq!(delay.delays().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_query_fails_after_retries() {
    let transport = Arc::new(MockTransport::new());
    let (client, _delay) = mock_client(transport.clone(), None, 3);

    let err = client.get_block_by_hash("0x123").await.unwrap_err();

    assert!(err.is_query_execution());
    assert_eq!(
        err.to_string(),
        "Request block_by_hash failed after 3 attempts: Transport failure: no scripted response left"
    );
    assert_eq!(transport.call_count(), 3);
}
