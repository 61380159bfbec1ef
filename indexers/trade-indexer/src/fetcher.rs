use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionEncoding, UiTransactionTokenBalance,
};
use tracing::{debug, warn};

use crate::classifier::{LedgerTransaction, TokenBalance};
use crate::metrics::IndexerMetrics;

/// Which ledger address to pull signatures for.
#[derive(Debug, Clone)]
pub enum SignatureSelector {
    Pool(String),
    Programs(Vec<String>),
    Account(String),
}

/// Pulls signatures and parsed transaction bodies from the ledger RPC
/// endpoint, in rate-limited chunks.
pub struct LedgerFetcher {
    rpc: Arc<RpcClient>,
    chunk_size: usize,
    chunk_delay: Duration,
    metrics: Arc<IndexerMetrics>,
}

impl LedgerFetcher {
    pub fn new(
        rpc_url: &str,
        chunk_size: usize,
        chunk_delay: Duration,
        metrics: Arc<IndexerMetrics>,
    ) -> Self {
        let rpc = Arc::new(RpcClient::new_with_commitment(
            rpc_url.to_string(),
            CommitmentConfig::confirmed(),
        ));
        Self {
            rpc,
            chunk_size: chunk_size.max(1),
            chunk_delay,
            metrics,
        }
    }

    /// The most recent signatures for the selector, newest first. The
    /// multi-program selector fans out one lookup per program id, then the
    /// results are merged, deduplicated and truncated to `limit`.
    pub async fn resolve_signatures(
        &self,
        selector: &SignatureSelector,
        limit: usize,
    ) -> Result<Vec<String>> {
        let addresses: Vec<&str> = match selector {
            SignatureSelector::Pool(address) | SignatureSelector::Account(address) => {
                vec![address.as_str()]
            }
            SignatureSelector::Programs(ids) => ids.iter().map(String::as_str).collect(),
        };

        let mut per_address = Vec::with_capacity(addresses.len());
        for address in addresses {
            let pubkey = Pubkey::from_str(address)
                .with_context(|| format!("Invalid address: {address}"))?;
            let config = GetConfirmedSignaturesForAddress2Config {
                before: None,
                until: None,
                limit: Some(limit),
                commitment: Some(CommitmentConfig::confirmed()),
            };
            let statuses = self
                .rpc
                .get_signatures_for_address_with_config(&pubkey, config)
                .await
                .with_context(|| format!("Failed to fetch signatures for {address}"))?;
            debug!(address, count = statuses.len(), "resolved signatures");
            per_address.push(
                statuses
                    .into_iter()
                    .map(|status| (status.signature, status.slot))
                    .collect(),
            );
        }

        let merged = merge_newest_first(per_address, limit);
        self.metrics.record_signatures(merged.len());
        Ok(merged)
    }

    /// Fetches parsed bodies for `signatures` in fixed-size chunks with an
    /// inter-chunk delay. A failed fetch is logged and skipped; the
    /// remaining chunks still run, so indexing degrades instead of failing
    /// wholesale.
    pub async fn fetch_batch(&self, signatures: &[String]) -> Vec<LedgerTransaction> {
        let chunks: Vec<&[String]> = signatures.chunks(self.chunk_size).collect();
        let chunk_count = chunks.len();
        let mut transactions = Vec::with_capacity(signatures.len());

        for (index, chunk) in chunks.into_iter().enumerate() {
            let fetches = chunk.iter().map(|signature| self.fetch_one(signature));
            for (signature, fetched) in chunk.iter().zip(join_all(fetches).await) {
                match fetched {
                    Ok(tx) => {
                        self.metrics.record_fetched();
                        transactions.push(tx);
                    }
                    Err(e) => {
                        self.metrics.record_fetch_failure();
                        warn!(%signature, "skipping transaction: {e:#}");
                    }
                }
            }
            if index + 1 < chunk_count {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        transactions
    }

    async fn fetch_one(&self, signature: &str) -> Result<LedgerTransaction> {
        let parsed = Signature::from_str(signature)
            .with_context(|| format!("Invalid signature: {signature}"))?;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let tx = self
            .rpc
            .get_transaction_with_config(&parsed, config)
            .await
            .with_context(|| format!("Failed to fetch transaction {signature}"))?;
        into_ledger_transaction(signature, &tx)
    }
}

/// Merges per-address signature lists, newest (highest slot) first, dropping
/// duplicates and truncating to `limit`.
pub(crate) fn merge_newest_first(lists: Vec<Vec<(String, u64)>>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged: Vec<(String, u64)> = Vec::new();
    for (signature, slot) in lists.into_iter().flatten() {
        if seen.insert(signature.clone()) {
            merged.push((signature, slot));
        }
    }
    merged.sort_by(|a, b| b.1.cmp(&a.1));
    merged.truncate(limit);
    merged.into_iter().map(|(signature, _)| signature).collect()
}

fn into_ledger_transaction(
    signature: &str,
    tx: &EncodedConfirmedTransactionWithStatusMeta,
) -> Result<LedgerTransaction> {
    let meta = tx
        .transaction
        .meta
        .as_ref()
        .context("transaction is missing meta")?;

    let (account_keys, mut program_ids) = match &tx.transaction.transaction {
        EncodedTransaction::Json(ui_tx) => match &ui_tx.message {
            UiMessage::Parsed(message) => {
                let keys: Vec<String> = message
                    .account_keys
                    .iter()
                    .map(|key| key.pubkey.clone())
                    .collect();
                let programs: Vec<String> = message
                    .instructions
                    .iter()
                    .filter_map(|ix| instruction_program_id(ix, &keys))
                    .collect();
                (keys, programs)
            }
            UiMessage::Raw(message) => {
                let keys = message.account_keys.clone();
                let programs = message
                    .instructions
                    .iter()
                    .filter_map(|ix| keys.get(ix.program_id_index as usize).cloned())
                    .collect();
                (keys, programs)
            }
        },
        _ => anyhow::bail!("unsupported transaction encoding"),
    };

    // inner instructions carry program ids too (router-wrapped trades)
    if let OptionSerializer::Some(inner_sets) = &meta.inner_instructions {
        for set in inner_sets {
            for ix in &set.instructions {
                if let Some(program_id) = instruction_program_id(ix, &account_keys) {
                    program_ids.push(program_id);
                }
            }
        }
    }

    Ok(LedgerTransaction {
        signature: signature.to_string(),
        slot: tx.slot,
        block_time: tx.block_time,
        fee_lamports: meta.fee,
        account_keys,
        program_ids,
        pre_token_balances: token_balances(&meta.pre_token_balances),
        post_token_balances: token_balances(&meta.post_token_balances),
    })
}

fn instruction_program_id(instruction: &UiInstruction, account_keys: &[String]) -> Option<String> {
    match instruction {
        UiInstruction::Compiled(compiled) => {
            account_keys.get(compiled.program_id_index as usize).cloned()
        }
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => {
            Some(parsed.program_id.clone())
        }
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(decoded)) => {
            Some(decoded.program_id.clone())
        }
    }
}

fn token_balances(
    balances: &OptionSerializer<Vec<UiTransactionTokenBalance>>,
) -> Vec<TokenBalance> {
    match balances {
        OptionSerializer::Some(balances) => balances
            .iter()
            .map(|balance| TokenBalance {
                mint: balance.mint.clone(),
                owner: Option::<String>::from(balance.owner.clone()),
                ui_amount: balance.ui_token_amount.ui_amount.unwrap_or(0.0),
                decimals: balance.ui_token_amount.decimals,
            })
            .collect(),
        _ => Vec::new(),
    }
}
