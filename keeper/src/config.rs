//! Keeper configuration.
//!
//! TOML amounts are whole tokens (or basis points); they are scaled to WAD
//! when the world is built, since TOML integers cannot carry 1e18-scaled
//! values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Polling interval in seconds.
    pub poll_interval_secs: u64,

    /// Run a monetary-policy rate write every N polls.
    pub rate_write_every_ticks: u64,

    /// Maximum liquidations per poll.
    pub max_liquidations_per_batch: usize,

    /// Engine seconds per wall-clock second (accelerates the demo world).
    pub time_scale: u64,

    pub market: MarketConfig,
    pub policy: PolicyConfig,
    pub borrowers: BorrowersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// AMM amplification.
    pub amplification: u32,

    /// Collateral price, whole tokens.
    pub base_price_tokens: u64,

    /// AMM exchange fee in basis points.
    pub amm_fee_bps: u32,

    /// Loan-sizing discount in basis points.
    pub loan_discount_bps: u32,

    /// Liquidation discount in basis points.
    pub liquidation_discount_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Base borrow rate in APR basis points.
    pub rate0_apr_bps: u32,

    /// Rate sensitivity in basis points.
    pub sigma_bps: u32,

    /// Target stabilization-pool debt fraction in basis points.
    pub target_debt_fraction_bps: u32,

    /// Number of stabilization pools in the demo world.
    pub peg_keepers: u32,

    /// Debt declared by each pool, whole tokens.
    pub peg_keeper_debt_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowersConfig {
    /// Number of seeded demo positions.
    pub count: u64,

    /// Collateral per position, whole tokens.
    pub collateral_tokens: u64,

    /// Borrowed fraction of the maximum, in basis points.
    pub utilization_bps: u32,

    /// Band count per position.
    pub n_bands: i32,
}

impl Config {
    /// Load configuration from the TOML file named by `KEEPER_CONFIG`
    /// (default `keeper-config.toml`).
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("KEEPER_CONFIG").unwrap_or_else(|_| "keeper-config.toml".to_string());

        let config_str = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config file: {config_path}"))?;

        let config: Config = toml::from_str(&config_str).context("Failed to parse config TOML")?;
        Ok(config)
    }

    pub fn default_demo() -> Self {
        Self {
            poll_interval_secs: 1,
            rate_write_every_ticks: 5,
            max_liquidations_per_batch: 5,
            time_scale: 3600, // one engine hour per wall second
            market: MarketConfig {
                amplification: 25,
                base_price_tokens: 3000,
                amm_fee_bps: 0,
                loan_discount_bps: 900,
                liquidation_discount_bps: 600,
            },
            policy: PolicyConfig {
                rate0_apr_bps: 200,
                sigma_bps: 200,
                target_debt_fraction_bps: 500,
                peg_keepers: 4,
                peg_keeper_debt_tokens: 10_000,
            },
            borrowers: BorrowersConfig {
                count: 8,
                collateral_tokens: 10,
                utilization_bps: 9_900,
                n_bands: 5,
            },
        }
    }

    /// Write the default config to `path`.
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_demo();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        std::fs::write(path, toml_str).context(format!("Failed to write config to {path}"))?;
        log::info!("Created default config at {path}");
        Ok(())
    }
}
