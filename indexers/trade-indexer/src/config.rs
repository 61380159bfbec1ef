use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::classifier::{launch_programs, ProtocolPrograms};

/// Wrapped SOL: the reference (quote) mint trades are denominated against.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    // RPC endpoint
    pub rpc_url: String,

    // Classification
    pub quote_mint: String,
    pub bonding_curve_program: String,
    pub amm_program: String,

    // Fetch pacing
    pub signature_limit: usize,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
}

impl IndexerConfig {
    pub fn from_env() -> Result<Self> {
        // Build RPC URL using HELIUS_API_KEY if available
        let rpc_url = if let Ok(helius_key) = env::var("HELIUS_API_KEY") {
            let network = env::var("SOLANA_NETWORK").unwrap_or_else(|_| "mainnet".to_string());
            format!("https://{}.helius-rpc.com/?api-key={}", network, helius_key)
        } else {
            env::var("RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string())
        };

        Ok(Self {
            rpc_url,

            quote_mint: env::var("QUOTE_MINT").unwrap_or_else(|_| WSOL_MINT.to_string()),
            bonding_curve_program: env::var("BONDING_CURVE_PROGRAM_ID")
                .unwrap_or_else(|_| launch_programs::PUMP_BONDING_CURVE.to_string()),
            amm_program: env::var("AMM_PROGRAM_ID")
                .unwrap_or_else(|_| launch_programs::PUMP_AMM.to_string()),

            signature_limit: env::var("SIGNATURE_LIMIT")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("Invalid SIGNATURE_LIMIT")?,
            chunk_size: env::var("FETCH_CHUNK_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid FETCH_CHUNK_SIZE")?,
            chunk_delay: Duration::from_millis(
                env::var("FETCH_CHUNK_DELAY_MS")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()
                    .context("Invalid FETCH_CHUNK_DELAY_MS")?,
            ),
        })
    }

    pub fn protocol_programs(&self) -> ProtocolPrograms {
        ProtocolPrograms {
            bonding_curve: self.bonding_curve_program.clone(),
            amm: self.amm_program.clone(),
        }
    }
}
