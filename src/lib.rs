// # Midnight Indexer SDK
//!
//! This SDK lets you read ledger data from a Midnight indexer from Rust: blocks,
//! transactions and contract actions, plus wallet sync events for connected
//! wallets. Data arrives either through queries, which return a single value,
//! or through subscriptions, which return a lazy [`futures::Stream`] of values.
//!
//! ```no_run
//! use futures::StreamExt;
//! use midnight_indexer_sdk::MidnightClient;
//!
//! # async fn run() -> Result<(), midnight_indexer_sdk::Error> {
//! let client = MidnightClient::new(
//!     "https://indexer.testnet.midnight.network/api/v1/graphql",
//!     Some("wss://indexer.testnet.midnight.network/api/v1/graphql/ws"),
//! )?;
//!
//! let block = client.get_latest_block().await?;
//! println!("Latest block {} at height {}", block.hash, block.height);
//!
//! let mut blocks = client.subscribe_to_blocks(Some(block.height)).await?;
//! while let Some(block) = blocks.next().await {
//!     println!("New block {}", block?.height);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Request Layers
//!
//! - Use [`MidnightClient`] for the named operations.
//! - Use [`RequestExecutor`](crate::executor::RequestExecutor) to run your own
//!   documents with the same retry policy.
//! - Implement [`Transport`](crate::transport::Transport) or
//!   [`StreamingTransport`](crate::transport::StreamingTransport) to replace the
//!   HTTP or WebSocket plumbing.
//!
//! Hex-encoded values such as hashes, states and identifiers are passed through as
//! opaque strings.

pub use client::MidnightClient;
pub use error::{Error, SubscriptionError};
pub use model::{
    Block, ContractAction, ContractCall, ContractDeploy, ContractUpdate,
    MerkleTreeCollapsedUpdate, ProgressUpdate, RelevantTransaction, Transaction, WalletSyncEvent,
};
pub use subscription::SubscriptionStream;
pub use url::Url;

/// Module for the indexer client.
/// Exposes the main client interface and its builder.
pub mod client;

/// Module for decoding raw responses into entities.
pub mod decode;

/// Module for error types.
pub mod error;

/// Module for retrying query and mutation execution.
pub mod executor;

/// Module for the HTTP transport used by queries and mutations.
pub mod http;

/// Module for indexer entities.
/// Defines blocks, transactions, contract actions and wallet events.
pub mod model;

/// Module for subscription streams.
pub mod subscription;

/// Module for transport abstractions and the GraphQL request type.
pub mod transport;

/// Module for the WebSocket transport used by subscriptions.
pub mod ws;

mod queries;
