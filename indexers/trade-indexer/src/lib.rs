// Library modules for trade-indexer
// This allows the binary and tests to access shared code

pub mod classifier;
pub mod config;
pub mod fetcher;
pub mod indexer;
pub mod metrics;

// Re-export commonly used types for easier testing
pub use classifier::{
    classify_transaction, IndexedTransaction, LedgerTransaction, ProtocolPrograms,
    ProtocolVariant, TokenAmount, TokenBalance, TradeAction,
};
pub use config::IndexerConfig;
pub use fetcher::{LedgerFetcher, SignatureSelector};
pub use indexer::{aggregate_stats, paginate, RecentPage, TradeFilter, TradeIndexer, TradeStats};
pub use metrics::{IndexerMetrics, IndexerMetricsSnapshot};
