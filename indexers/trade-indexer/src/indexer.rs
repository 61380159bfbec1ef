use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::classifier::{
    classify_transaction, IndexedTransaction, ProtocolPrograms, ProtocolVariant, TradeAction,
};
use crate::config::IndexerConfig;
use crate::fetcher::{LedgerFetcher, SignatureSelector};
use crate::metrics::IndexerMetrics;

/// Caller-supplied predicate over classified trades. Every field is
/// optional; an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub from_time: Option<i64>,
    pub to_time: Option<i64>,
    pub action: Option<TradeAction>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub counterparty: Option<String>,
    pub protocol_variant: Option<ProtocolVariant>,
}

impl TradeFilter {
    pub fn matches(&self, tx: &IndexedTransaction) -> bool {
        if let Some(from) = self.from_time {
            if tx.block_time < from {
                return false;
            }
        }
        if let Some(to) = self.to_time {
            if tx.block_time > to {
                return false;
            }
        }
        if let Some(action) = self.action {
            if tx.action != action {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if tx.amount_in.value < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if tx.amount_in.value > max {
                return false;
            }
        }
        if let Some(counterparty) = &self.counterparty {
            if &tx.user_address != counterparty {
                return false;
            }
        }
        if let Some(variant) = self.protocol_variant {
            if tx.protocol_variant != variant {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeStats {
    pub total_transactions: usize,
    pub total_volume: f64,
    pub buy_count: usize,
    pub sell_count: usize,
    pub average_price: f64,
    pub unique_users: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentPage {
    pub items: Vec<IndexedTransaction>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

/// Orchestrates the fetcher and the classifier: resolve signatures, fetch
/// parsed bodies in rate-limited chunks, classify each, apply the caller's
/// filter. Stateless per call; nothing is cached between runs.
pub struct TradeIndexer {
    fetcher: LedgerFetcher,
    quote_mint: String,
    programs: ProtocolPrograms,
    signature_limit: usize,
    metrics: Arc<IndexerMetrics>,
}

impl TradeIndexer {
    pub fn new(config: &IndexerConfig) -> Self {
        let metrics = Arc::new(IndexerMetrics::new());
        let fetcher = LedgerFetcher::new(
            &config.rpc_url,
            config.chunk_size,
            config.chunk_delay,
            metrics.clone(),
        );
        Self {
            fetcher,
            quote_mint: config.quote_mint.clone(),
            programs: config.protocol_programs(),
            signature_limit: config.signature_limit,
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<IndexerMetrics> {
        self.metrics.clone()
    }

    /// Trades that touched one pool, newest signatures first.
    pub async fn index_by_pool(
        &self,
        pool_address: &str,
        filter: &TradeFilter,
    ) -> Result<Vec<IndexedTransaction>> {
        self.run(
            SignatureSelector::Pool(pool_address.to_string()),
            Some(pool_address),
            None,
            filter,
        )
        .await
    }

    /// Trades produced by any recognized protocol program.
    pub async fn index_by_protocol(&self, filter: &TradeFilter) -> Result<Vec<IndexedTransaction>> {
        self.run(
            SignatureSelector::Programs(self.programs.program_ids()),
            None,
            None,
            filter,
        )
        .await
    }

    /// Trades made by one wallet, optionally narrowed to transactions that
    /// touched the given pool.
    pub async fn index_by_user(
        &self,
        user_address: &str,
        pool_address: Option<&str>,
        filter: &TradeFilter,
    ) -> Result<Vec<IndexedTransaction>> {
        self.run(
            SignatureSelector::Account(user_address.to_string()),
            pool_address,
            pool_address,
            filter,
        )
        .await
    }

    pub async fn get_stats(&self, pool_address: &str, filter: &TradeFilter) -> Result<TradeStats> {
        let trades = self.index_by_pool(pool_address, filter).await?;
        Ok(aggregate_stats(&trades))
    }

    /// Paginated view of the filtered trades for one pool, sorted by block
    /// time descending. Pages are 1-based.
    pub async fn get_recent(
        &self,
        pool_address: &str,
        page: usize,
        page_size: usize,
        filter: &TradeFilter,
    ) -> Result<RecentPage> {
        let trades = self.index_by_pool(pool_address, filter).await?;
        Ok(paginate(trades, page, page_size))
    }

    async fn run(
        &self,
        selector: SignatureSelector,
        pool_ctx: Option<&str>,
        required_account: Option<&str>,
        filter: &TradeFilter,
    ) -> Result<Vec<IndexedTransaction>> {
        let signatures = self
            .fetcher
            .resolve_signatures(&selector, self.signature_limit)
            .await?;
        debug!(count = signatures.len(), "indexing signatures");

        let transactions = self.fetcher.fetch_batch(&signatures).await;

        let mut trades = Vec::new();
        for tx in &transactions {
            if let Some(required) = required_account {
                if !tx.account_keys.iter().any(|key| key == required) {
                    continue;
                }
            }
            if let Some(trade) =
                classify_transaction(tx, pool_ctx, &self.quote_mint, &self.programs)
            {
                if filter.matches(&trade) {
                    trades.push(trade);
                }
            }
        }
        self.metrics.record_trades(trades.len());
        debug!(
            fetched = transactions.len(),
            classified = trades.len(),
            "indexing pass complete"
        );
        Ok(trades)
    }
}

/// Folds the filtered set into the aggregate the stats endpoint serves.
pub fn aggregate_stats(trades: &[IndexedTransaction]) -> TradeStats {
    let total_transactions = trades.len();
    let total_volume = trades.iter().map(|t| t.amount_in.value).sum();
    let buy_count = trades
        .iter()
        .filter(|t| t.action == TradeAction::Buy)
        .count();
    let sell_count = total_transactions - buy_count;
    let average_price = if total_transactions == 0 {
        0.0
    } else {
        trades.iter().map(|t| t.price).sum::<f64>() / total_transactions as f64
    };
    let unique_users = trades
        .iter()
        .map(|t| t.user_address.as_str())
        .collect::<HashSet<_>>()
        .len();

    TradeStats {
        total_transactions,
        total_volume,
        buy_count,
        sell_count,
        average_price,
        unique_users,
    }
}

/// Sorts by block time descending and windows into a 1-based page.
pub fn paginate(mut trades: Vec<IndexedTransaction>, page: usize, page_size: usize) -> RecentPage {
    trades.sort_by(|a, b| b.block_time.cmp(&a.block_time));
    let total = trades.len();
    let page = page.max(1);
    let offset = (page - 1) * page_size;
    let items: Vec<IndexedTransaction> = trades.into_iter().skip(offset).take(page_size).collect();
    let has_more = offset + items.len() < total;

    RecentPage {
        items,
        total,
        page,
        page_size,
        has_more,
    }
}
