use std::env;

use futures::StreamExt;
use log::info;
use midnight_indexer_sdk::{Block, MidnightClient};

const DEFAULT_INDEXER_URL: &str = "https://indexer.testnet-02.midnight.network/api/v1/graphql";
const BLOCKS_TO_FOLLOW: usize = 3;

fn log_block(label: &str, block: &Block) {
    let time = block
        .datetime()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown time".to_string());
    info!(
        "{label}: {} at height {} ({time}, {} transactions)",
        block.hash,
        block.height,
        block.transactions.len()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let http_url = env::var("MIDNIGHT_INDEXER_URL").unwrap_or_else(|_| DEFAULT_INDEXER_URL.into());
    let ws_url = env::var("MIDNIGHT_INDEXER_WS_URL").ok();

    let client = MidnightClient::builder()
        .http_url(http_url)
        .maybe_ws_url(ws_url)
        .build()?;

    info!("Fetching latest block...");
    let latest = client.get_latest_block().await?;
    log_block("Latest block", &latest);

    if let Some(parent) = &latest.parent {
        match client.get_block_by_hash(&parent.hash).await? {
            Some(parent) => log_block("Parent block", &parent),
            None => info!("Parent block {} is not indexed", parent.hash),
        }
    }

    if !client.has_subscriptions() {
        info!("MIDNIGHT_INDEXER_WS_URL is not set, skipping the block subscription");
        return Ok(());
    }

    info!("Following the next {BLOCKS_TO_FOLLOW} blocks...");
    let mut blocks = client
        .subscribe_to_blocks(Some(latest.height))
        .await?
        .take(BLOCKS_TO_FOLLOW);
    while let Some(block) = blocks.next().await {
        log_block("New block", &block?);
    }

    info!("Done");
    Ok(())
}
