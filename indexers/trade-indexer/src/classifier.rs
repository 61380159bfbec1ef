use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Smallest ui-amount movement treated as a real delta; anything below is
/// float noise from the snapshot arithmetic.
const DELTA_EPSILON: f64 = 1e-9;

/// Launch-platform program IDs
pub mod launch_programs {

    /// Pump.fun bonding-curve program ID
    pub const PUMP_BONDING_CURVE: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

    /// PumpSwap constant-product AMM program ID
    pub const PUMP_AMM: &str = "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA";

    pub fn is_launch_program(program_id: &str) -> bool {
        program_id == PUMP_BONDING_CURVE || program_id == PUMP_AMM
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// On-chain program family that produced a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolVariant {
    BondingCurve,
    Amm,
}

/// The recognized protocol program ids for one network.
#[derive(Debug, Clone)]
pub struct ProtocolPrograms {
    pub bonding_curve: String,
    pub amm: String,
}

impl ProtocolPrograms {
    pub fn program_ids(&self) -> Vec<String> {
        vec![self.bonding_curve.clone(), self.amm.clone()]
    }

    pub fn match_variant(&self, program_ids: &[String]) -> Option<ProtocolVariant> {
        if program_ids.iter().any(|id| *id == self.bonding_curve) {
            return Some(ProtocolVariant::BondingCurve);
        }
        if program_ids.iter().any(|id| *id == self.amm) {
            return Some(ProtocolVariant::Amm);
        }
        None
    }
}

impl Default for ProtocolPrograms {
    fn default() -> Self {
        Self {
            bonding_curve: launch_programs::PUMP_BONDING_CURVE.to_string(),
            amm: launch_programs::PUMP_AMM.to_string(),
        }
    }
}

/// One entry of a pre- or post-transaction token-balance snapshot.
#[derive(Debug, Clone)]
pub struct TokenBalance {
    pub mint: String,
    pub owner: Option<String>,
    pub ui_amount: f64,
    pub decimals: u8,
}

/// The slice of a parsed ledger transaction the classifier needs: identity,
/// cost, the programs its instructions targeted, and the token-balance
/// snapshots around it.
#[derive(Debug, Clone)]
pub struct LedgerTransaction {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub fee_lamports: u64,
    pub account_keys: Vec<String>,
    pub program_ids: Vec<String>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenAmount {
    pub value: f64,
    pub mint: String,
    pub decimals: u8,
}

/// A reconstructed buy or sell. Pure derived view: never mutated after
/// construction, only recomputed on a re-fetch.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedTransaction {
    pub signature: String,
    pub block_time: i64,
    pub action: TradeAction,
    pub protocol_variant: ProtocolVariant,
    pub amount_in: TokenAmount,
    pub amount_out: TokenAmount,
    pub price: f64,
    pub pool_address: String,
    pub user_address: String,
    pub fee: f64,
    pub slot: u64,
}

/// Classifies one parsed transaction as a buy or a sell by diffing its
/// token-balance snapshots, or returns None for anything that is not a
/// recognized single-asset trade.
///
/// Exactly one non-quote mint may move per transaction; multi-hop and
/// multi-asset routes are rejected rather than guessed at. Pure function,
/// safe to run for many transactions concurrently.
pub fn classify_transaction(
    tx: &LedgerTransaction,
    pool_ctx: Option<&str>,
    quote_mint: &str,
    programs: &ProtocolPrograms,
) -> Option<IndexedTransaction> {
    let variant = programs.match_variant(&tx.program_ids)?;

    // per-mint delta = sum(post) - sum(pre) across every snapshot entry
    let mut deltas: HashMap<String, (f64, u8)> = HashMap::new();
    for balance in &tx.pre_token_balances {
        let entry = deltas
            .entry(balance.mint.clone())
            .or_insert((0.0, balance.decimals));
        entry.0 -= balance.ui_amount;
    }
    for balance in &tx.post_token_balances {
        let entry = deltas
            .entry(balance.mint.clone())
            .or_insert((0.0, balance.decimals));
        entry.0 += balance.ui_amount;
    }

    let (quote_delta, quote_decimals) = deltas.get(quote_mint).copied().unwrap_or((0.0, 9));

    let moved: Vec<(&String, &(f64, u8))> = deltas
        .iter()
        .filter(|(mint, (delta, _))| mint.as_str() != quote_mint && delta.abs() > DELTA_EPSILON)
        .collect();
    if moved.len() != 1 {
        return None;
    }
    let (mint, &(asset_delta, asset_decimals)) = moved[0];
    let asset_mint = mint.clone();

    let (action, amount_in, amount_out) = if quote_delta < -DELTA_EPSILON
        && asset_delta > DELTA_EPSILON
    {
        (
            TradeAction::Buy,
            TokenAmount {
                value: -quote_delta,
                mint: quote_mint.to_string(),
                decimals: quote_decimals,
            },
            TokenAmount {
                value: asset_delta,
                mint: asset_mint.clone(),
                decimals: asset_decimals,
            },
        )
    } else if quote_delta > DELTA_EPSILON && asset_delta < -DELTA_EPSILON {
        (
            TradeAction::Sell,
            TokenAmount {
                value: -asset_delta,
                mint: asset_mint.clone(),
                decimals: asset_decimals,
            },
            TokenAmount {
                value: quote_delta,
                mint: quote_mint.to_string(),
                decimals: quote_decimals,
            },
        )
    } else {
        // both zero or both the same sign: not a trade
        return None;
    };

    let price = amount_in.value / amount_out.value;

    Some(IndexedTransaction {
        signature: tx.signature.clone(),
        block_time: tx.block_time.unwrap_or_default(),
        action,
        protocol_variant: variant,
        price,
        pool_address: pool_ctx
            .map(str::to_string)
            .unwrap_or_else(|| asset_mint.clone()),
        user_address: tx.account_keys.first().cloned().unwrap_or_default(),
        fee: tx.fee_lamports as f64 / LAMPORTS_PER_SOL,
        slot: tx.slot,
        amount_in,
        amount_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTE: &str = "So11111111111111111111111111111111111111112";
    const ASSET: &str = "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    fn balance(mint: &str, ui_amount: f64) -> TokenBalance {
        TokenBalance {
            mint: mint.to_string(),
            owner: Some("Owner111".to_string()),
            ui_amount,
            decimals: if mint == QUOTE { 9 } else { 6 },
        }
    }

    fn tx(pre: Vec<TokenBalance>, post: Vec<TokenBalance>) -> LedgerTransaction {
        LedgerTransaction {
            signature: "Sig111".to_string(),
            slot: 250_000_000,
            block_time: Some(1_700_000_000),
            fee_lamports: 5_000,
            account_keys: vec!["Actor111".to_string(), "Pool111".to_string()],
            program_ids: vec![launch_programs::PUMP_BONDING_CURVE.to_string()],
            pre_token_balances: pre,
            post_token_balances: post,
        }
    }

    #[test]
    fn test_quote_out_asset_in_is_a_buy() {
        let tx = tx(
            vec![balance(QUOTE, 100.0), balance(ASSET, 0.0)],
            vec![balance(QUOTE, 40.0), balance(ASSET, 500.0)],
        );

        let trade = classify_transaction(&tx, Some("Pool111"), QUOTE, &ProtocolPrograms::default())
            .expect("should classify as a trade");

        assert_eq!(trade.action, TradeAction::Buy);
        assert_eq!(trade.protocol_variant, ProtocolVariant::BondingCurve);
        assert!((trade.amount_in.value - 60.0).abs() < 1e-9);
        assert_eq!(trade.amount_in.mint, QUOTE);
        assert!((trade.amount_out.value - 500.0).abs() < 1e-9);
        assert_eq!(trade.amount_out.mint, ASSET);
        assert!((trade.price - 0.12).abs() < 1e-9);
        assert_eq!(trade.user_address, "Actor111");
        assert_eq!(trade.pool_address, "Pool111");
        assert_eq!(trade.slot, 250_000_000);
        assert_eq!(trade.block_time, 1_700_000_000);
        assert!((trade.fee - 0.000005).abs() < 1e-12);
    }

    #[test]
    fn test_asset_out_quote_in_is_a_sell() {
        let tx = tx(
            vec![balance(QUOTE, 40.0), balance(ASSET, 500.0)],
            vec![balance(QUOTE, 100.0), balance(ASSET, 200.0)],
        );

        let trade = classify_transaction(&tx, Some("Pool111"), QUOTE, &ProtocolPrograms::default())
            .expect("should classify as a trade");

        assert_eq!(trade.action, TradeAction::Sell);
        assert!((trade.amount_in.value - 300.0).abs() < 1e-9);
        assert_eq!(trade.amount_in.mint, ASSET);
        assert!((trade.amount_out.value - 60.0).abs() < 1e-9);
        assert_eq!(trade.amount_out.mint, QUOTE);
        assert!((trade.price - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_deltas_are_not_a_trade() {
        let tx = tx(
            vec![balance(QUOTE, 100.0), balance(ASSET, 500.0)],
            vec![balance(QUOTE, 100.0), balance(ASSET, 500.0)],
        );
        assert!(
            classify_transaction(&tx, None, QUOTE, &ProtocolPrograms::default()).is_none()
        );
    }

    #[test]
    fn test_same_sign_deltas_are_not_a_trade() {
        // both balances grew: airdrop / deposit, not a swap
        let tx = tx(
            vec![balance(QUOTE, 10.0), balance(ASSET, 10.0)],
            vec![balance(QUOTE, 20.0), balance(ASSET, 20.0)],
        );
        assert!(
            classify_transaction(&tx, None, QUOTE, &ProtocolPrograms::default()).is_none()
        );
    }

    #[test]
    fn test_unrecognized_program_is_rejected() {
        let mut tx = tx(
            vec![balance(QUOTE, 100.0), balance(ASSET, 0.0)],
            vec![balance(QUOTE, 40.0), balance(ASSET, 500.0)],
        );
        tx.program_ids = vec!["JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4".to_string()];
        assert!(
            classify_transaction(&tx, None, QUOTE, &ProtocolPrograms::default()).is_none()
        );
    }

    #[test]
    fn test_multi_asset_routes_are_rejected() {
        let other = "MintBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
        let tx = tx(
            vec![
                balance(QUOTE, 100.0),
                balance(ASSET, 0.0),
                balance(other, 0.0),
            ],
            vec![
                balance(QUOTE, 40.0),
                balance(ASSET, 500.0),
                balance(other, 7.0),
            ],
        );
        assert!(
            classify_transaction(&tx, None, QUOTE, &ProtocolPrograms::default()).is_none()
        );
    }

    #[test]
    fn test_launch_program_detection() {
        use launch_programs::*;

        assert!(is_launch_program(PUMP_BONDING_CURVE));
        assert!(is_launch_program(PUMP_AMM));
        assert!(!is_launch_program("11111111111111111111111111111111"));
    }

    #[test]
    fn test_amm_program_maps_to_amm_variant() {
        let mut tx = tx(
            vec![balance(QUOTE, 100.0), balance(ASSET, 0.0)],
            vec![balance(QUOTE, 40.0), balance(ASSET, 500.0)],
        );
        tx.program_ids = vec![launch_programs::PUMP_AMM.to_string()];

        let trade = classify_transaction(&tx, None, QUOTE, &ProtocolPrograms::default()).unwrap();
        assert_eq!(trade.protocol_variant, ProtocolVariant::Amm);
        // no pool context: the asset mint doubles as the pool key
        assert_eq!(trade.pool_address, ASSET);
    }

    #[test]
    fn test_balances_are_summed_per_mint_across_accounts() {
        // the trader's and the pool's token accounts both appear in the
        // snapshots; the per-mint fold must net them
        let tx = tx(
            vec![
                balance(QUOTE, 30.0),
                balance(QUOTE, 70.0),
                balance(ASSET, 0.0),
            ],
            vec![
                balance(QUOTE, 10.0),
                balance(QUOTE, 30.0),
                balance(ASSET, 500.0),
            ],
        );

        let trade =
            classify_transaction(&tx, Some("Pool111"), QUOTE, &ProtocolPrograms::default())
                .unwrap();
        assert_eq!(trade.action, TradeAction::Buy);
        assert!((trade.amount_in.value - 60.0).abs() < 1e-9);
    }
}
