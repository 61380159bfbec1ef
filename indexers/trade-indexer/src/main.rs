use anyhow::{Context, Result};
use tracing::info;

use trade_indexer::{IndexerConfig, TradeFilter, TradeIndexer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    info!("Starting trade indexer");

    let config = IndexerConfig::from_env()?;
    info!(
        "Loaded config: rpc={}, quote_mint={}, chunk_size={}",
        config.rpc_url, config.quote_mint, config.chunk_size
    );

    let pool_address = std::env::var("TARGET_POOL").context("TARGET_POOL not set")?;
    let indexer = TradeIndexer::new(&config);
    let filter = TradeFilter::default();

    let started = chrono::Utc::now();
    let stats = indexer.get_stats(&pool_address, &filter).await?;
    info!(
        "Stats for {}: {}",
        pool_address,
        serde_json::to_string(&stats)?
    );

    let recent = indexer.get_recent(&pool_address, 1, 10, &filter).await?;
    info!(
        "Most recent {} of {} trades (has_more={})",
        recent.items.len(),
        recent.total,
        recent.has_more
    );
    for tx in &recent.items {
        info!(
            "{} {} {:?} in={:.6} {} out={:.6} {} price={:.8}",
            tx.block_time,
            tx.signature,
            tx.action,
            tx.amount_in.value,
            tx.amount_in.mint,
            tx.amount_out.value,
            tx.amount_out.mint,
            tx.price
        );
    }

    let snapshot = indexer.metrics().snapshot();
    info!(
        "Run finished in {}ms: {} signatures, {} transactions fetched, {} fetch failures, {} trades",
        (chrono::Utc::now() - started).num_milliseconds(),
        snapshot.signatures_resolved,
        snapshot.transactions_fetched,
        snapshot.fetch_failures,
        snapshot.trades_classified
    );

    Ok(())
}
