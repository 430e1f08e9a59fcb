use std::sync::Arc;

use midnight_indexer_sdk::MidnightClient;
use midnight_indexer_sdk::executor::{RequestExecutor, RetryConfig};
use midnight_indexer_sdk::transport::{StreamingTransport, Transport};
use serde_json::{Value, json};

pub mod mock;
pub mod server;

pub use mock::{CallResponse, MockStreamingTransport, MockTransport, RecordingDelay, StreamScript};
pub use server::{WsStep, serve_http_once, serve_ws_once};

/// Default URL of a locally running indexer.
pub const INDEXER_URL: &str = "http://localhost:8088/api/v1/graphql";
/// Default WebSocket URL of a locally running indexer.
pub const INDEXER_WS_URL: &str = "ws://localhost:8088/api/v1/graphql/ws";

/// Initializes `env_logger` for tests. Safe to call more than once.
pub fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .is_test(true)
        .try_init();
}

/// Creates a client over mock transports that never sleeps between retries.
pub fn mock_client(
    transport: Arc<dyn Transport>,
    streaming: Option<Arc<dyn StreamingTransport>>,
    retry_attempts: u32,
) -> (MidnightClient, Arc<RecordingDelay>) {
    let delay = Arc::new(RecordingDelay::new());
    let config = RetryConfig {
        retry_attempts,
        ..Default::default()
    };
    let executor = RequestExecutor::new(transport, config).with_delay(delay.clone());
    (MidnightClient::from_parts(executor, streaming), delay)
}

/// A transaction fragment without contract actions or owning block.
pub fn mock_transaction_data() -> Value {
    json!({
        "hash": "0xabc",
        "protocolVersion": 1,
        "applyStage": "APPLIED",
        "identifiers": ["0xdef"],
        "raw": "0xraw",
        "merkleTreeRoot": "0xroot"
    })
}

/// Block fragment at height 100 with a stub parent and one transaction.
pub fn mock_block_data() -> Value {
    json!({
        "hash": "0x123",
        "height": 100,
        "protocolVersion": 1,
        "timestamp": 1234567890,
        "author": "0x456",
        "parent": {
            "hash": "0x789",
            "height": 99
        },
        "transactions": [mock_transaction_data()]
    })
}

/// A block at `height` whose parent is the block at `height - 1`.
pub fn mock_block_at(height: u64) -> Value {
    let mut block = mock_block_data();
    block["hash"] = json!(format!("0x{height:04x}"));
    block["height"] = json!(height);
    block["parent"] = json!({
        "hash": format!("0x{:04x}", height.saturating_sub(1)),
        "height": height.saturating_sub(1)
    });
    block
}

/// Contract call fragment with entry point `0xentry` and no deploy.
pub fn mock_contract_action_data() -> Value {
    json!({
        "address": "0x123",
        "state": "0xstate",
        "chainState": "0xchainState",
        "entryPoint": "0xentry",
        "transaction": mock_transaction_data()
    })
}

/// Wallet progress update fragment derived from `highest_index`.
pub fn mock_progress_update_data(highest_index: u64) -> Value {
    json!({
        "highestIndex": highest_index,
        "highestRelevantIndex": highest_index / 2,
        "highestRelevantWalletIndex": highest_index / 4
    })
}

/// Wallet relevant transaction fragment covering `[start, end)`.
pub fn mock_relevant_transaction_data(start: u64, end: u64) -> Value {
    json!({
        "transaction": mock_transaction_data(),
        "start": start,
        "end": end
    })
}
