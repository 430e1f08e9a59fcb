use std::sync::Arc;
use std::time::Duration;

use bon::bon;
use serde_json::json;
use url::Url;

use crate::decode;
use crate::error::{Error, SubscriptionError};
use crate::executor::{RequestExecutor, RetryConfig};
use crate::http::HttpTransport;
use crate::model::{Block, ContractAction, Transaction, WalletSyncEvent};
use crate::queries;
use crate::subscription::{ItemDecoder, SubscriptionStream};
use crate::transport::{GraphQlRequest, StreamingTransport};
use crate::ws::WsTransport;

/// Default timeout of a single query or mutation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of attempts per query or mutation.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// A client for reading and subscribing to Midnight indexer data.
///
/// Queries and mutations are retried with exponential backoff. Subscriptions are
/// never retried and require a streaming endpoint to be configured.
#[derive(Clone)]
pub struct MidnightClient {
    /// Executes queries and mutations.
    executor: RequestExecutor,
    /// Transport for subscriptions, if configured.
    streaming: Option<Arc<dyn StreamingTransport>>,
}

#[bon]
impl MidnightClient {
    /// Creates a new builder for `MidnightClient` with the given endpoints.
    /// Omitting `ws_url` disables subscriptions. `timeout` applies to queries and mutations only.
    #[builder]
    pub fn builder(
        #[builder(into)] http_url: String,
        #[builder(into)] ws_url: Option<String>,
        #[builder(default = DEFAULT_TIMEOUT)] timeout: Duration,
        #[builder(default = DEFAULT_RETRY_ATTEMPTS)] retry_attempts: u32,
    ) -> Result<Self, Error> {
        let http_url = parse_endpoint(&http_url)?;
        let http = HttpTransport::new(http_url, timeout)?;

        let streaming = match ws_url {
            Some(ws_url) => {
                let ws = WsTransport::new(parse_endpoint(&ws_url)?)?;
                Some(Arc::new(ws) as Arc<dyn StreamingTransport>)
            }
            None => None,
        };

        let config = RetryConfig {
            retry_attempts,
            ..Default::default()
        };
        Ok(Self::from_parts(
            RequestExecutor::new(Arc::new(http), config),
            streaming,
        ))
    }

    /// Creates a new client with default timeout and retry settings.
    pub fn new(http_url: &str, ws_url: Option<&str>) -> Result<Self, Error> {
        Self::builder()
            .http_url(http_url)
            .maybe_ws_url(ws_url)
            .build()
    }

    /// Creates a client from an existing executor and an optional streaming transport.
    pub fn from_parts(
        executor: RequestExecutor,
        streaming: Option<Arc<dyn StreamingTransport>>,
    ) -> Self {
        Self {
            executor,
            streaming,
        }
    }

    /// Gets the executor used for queries and mutations.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Returns `true` if a streaming endpoint was configured.
    pub fn has_subscriptions(&self) -> bool {
        self.streaming.is_some()
    }

    /// Gets the latest block.
    pub async fn get_latest_block(&self) -> Result<Block, Error> {
        let data = self
            .executor
            .execute(&GraphQlRequest::new("latest_block", queries::LATEST_BLOCK))
            .await?;
        Ok(decode::decode_block(decode::required_root(&data, "block")?)?)
    }

    /// Gets a block by its hash.
    /// Returns `None` if no block has that hash.
    pub async fn get_block_by_hash(&self, hash: &str) -> Result<Option<Block>, Error> {
        let request = GraphQlRequest::new("block_by_hash", queries::BLOCK_BY_HASH)
            .with_variables(json!({"hash": hash}));
        let data = self.executor.execute(&request).await?;
        Ok(decode::root(&data, "block")?
            .map(decode::decode_block)
            .transpose()?)
    }

    /// Gets a block by its height.
    /// Returns `None` if there is no block at that height yet.
    pub async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, Error> {
        let request = GraphQlRequest::new("block_by_height", queries::BLOCK_BY_HEIGHT)
            .with_variables(json!({"height": height}));
        let data = self.executor.execute(&request).await?;
        Ok(decode::root(&data, "block")?
            .map(decode::decode_block)
            .transpose()?)
    }

    /// Gets the latest action of the contract at `address`.
    pub async fn get_contract_action(&self, address: &str) -> Result<Option<ContractAction>, Error> {
        let request = GraphQlRequest::new("contract_action", queries::CONTRACT_ACTION)
            .with_variables(json!({"address": address}));
        let data = self.executor.execute(&request).await?;
        Ok(decode::root(&data, "contractAction")?
            .map(decode::decode_contract_action)
            .transpose()?)
    }

    /// Gets the action of the contract at `address` as of the block with hash `block_hash`.
    pub async fn get_contract_action_at_block(
        &self,
        address: &str,
        block_hash: &str,
    ) -> Result<Option<ContractAction>, Error> {
        let request =
            GraphQlRequest::new("contract_action_at_block", queries::CONTRACT_ACTION_AT_BLOCK)
                .with_variables(json!({"address": address, "hash": block_hash}));
        let data = self.executor.execute(&request).await?;
        Ok(decode::root(&data, "contractAction")?
            .map(decode::decode_contract_action)
            .transpose()?)
    }

    /// Gets all transactions carrying the given identifier.
    pub async fn get_transactions_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Vec<Transaction>, Error> {
        let request = GraphQlRequest::new(
            "transactions_by_identifier",
            queries::TRANSACTIONS_BY_IDENTIFIER,
        )
        .with_variables(json!({"identifier": identifier}));
        let data = self.executor.execute(&request).await?;
        Ok(decode::decode_transactions(decode::root(&data, "transactions")?)?)
    }

    /// Connects a wallet with its viewing key.
    /// Returns the session id used by [`Self::subscribe_to_wallet`].
    pub async fn connect_wallet(&self, viewing_key: &str) -> Result<String, Error> {
        let request = GraphQlRequest::new("connect_wallet", queries::CONNECT)
            .with_variables(json!({"viewingKey": viewing_key}));
        let data = self.executor.execute(&request).await?;
        let session_id = decode::decode_session_id(decode::required_root(&data, "connect")?)?;
        log::debug!("Connected wallet session {session_id}");
        Ok(session_id)
    }

    /// Disconnects the wallet session.
    /// Returns `true` once the server has accepted the request.
    pub async fn disconnect_wallet(&self, session_id: &str) -> Result<bool, Error> {
        let request = GraphQlRequest::new("disconnect_wallet", queries::DISCONNECT)
            .with_variables(json!({"sessionId": session_id}));
        self.executor.execute(&request).await?;
        log::debug!("Disconnected wallet session {session_id}");
        Ok(true)
    }

    /// Subscribes to blocks, starting at `start_height` or at the latest block.
    pub async fn subscribe_to_blocks(
        &self,
        start_height: Option<u64>,
    ) -> Result<SubscriptionStream<Block>, Error> {
        let request = GraphQlRequest::new("blocks", queries::BLOCKS_SUBSCRIPTION)
            .with_variables(json!({"offset": height_offset(start_height)}));
        self.subscribe(request, "blocks", decode::decode_block)
            .await
    }

    /// Subscribes to actions of the contract at `address`.
    pub async fn subscribe_to_contract_actions(
        &self,
        address: &str,
        start_height: Option<u64>,
    ) -> Result<SubscriptionStream<ContractAction>, Error> {
        let request =
            GraphQlRequest::new("contract_actions", queries::CONTRACT_ACTIONS_SUBSCRIPTION)
                .with_variables(json!({
                    "address": address,
                    "offset": height_offset(start_height),
                }));
        self.subscribe(
            request,
            "contractActions",
            decode::decode_contract_action,
        )
        .await
    }

    /// Subscribes to events of a connected wallet.
    /// Progress updates are only sent when `send_progress_updates` is set.
    pub async fn subscribe_to_wallet(
        &self,
        session_id: &str,
        start_index: Option<u64>,
        send_progress_updates: bool,
    ) -> Result<SubscriptionStream<WalletSyncEvent>, Error> {
        let request = GraphQlRequest::new("wallet", queries::WALLET_SUBSCRIPTION).with_variables(
            json!({
                "sessionId": session_id,
                "index": start_index,
                "sendProgressUpdates": send_progress_updates,
            }),
        );
        self.subscribe(request, "wallet", decode::decode_wallet_event)
            .await
    }

    /// Internal: opens a subscription. Fails immediately without a streaming transport.
    async fn subscribe<T>(
        &self,
        request: GraphQlRequest,
        root: &'static str,
        decode: ItemDecoder<T>,
    ) -> Result<SubscriptionStream<T>, Error> {
        let streaming = self
            .streaming
            .as_ref()
            .ok_or(SubscriptionError::NotConfigured)?;
        let raw = streaming
            .subscribe(&request)
            .await
            .map_err(|source| SubscriptionError::Transport {
                subscription: request.name,
                source,
            })?;
        Ok(SubscriptionStream::new(
            request.name,
            root,
            decode,
            raw,
        ))
    }
}

fn height_offset(height: Option<u64>) -> Option<serde_json::Value> {
    height.map(|height| json!({"height": height}))
}

fn parse_endpoint(endpoint: &str) -> Result<Url, Error> {
    Url::parse(endpoint).map_err(|e| Error::connection_init(endpoint, e))
}
