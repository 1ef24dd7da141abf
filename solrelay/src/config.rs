//! Relay configuration.
//!
//! Loaded once from environment variables at startup into an immutable
//! [`RelayConfig`]. Missing or invalid required values abort startup with a
//! typed error so the process never runs half-configured.
//!
//! # Environment Variables
//!
//! - `SOL_WALLET` — receiving wallet address (required)
//! - `PRIVATE_KEY` — payout signer secret: JSON byte array or base58 (required)
//! - `SOLANA_RPC_URL` — RPC endpoint (default: mainnet-beta)
//! - `PAYOUT_MODE` — `native` or `token` (default: `native`)
//! - `TOKEN_ADDRESS` — token mint, required when `PAYOUT_MODE=token`
//! - `TOKEN_DECIMALS` — token decimals (default: 9)
//! - `EXCHANGE_RATE` — payout base units per SOL (default: 100000000)
//! - `MIN_PURCHASE_SOL` — minimum purchase (default: 0.1)
//! - `AMOUNT_TOLERANCE_SOL` — match tolerance (default: 0.01)
//! - `LOOKBACK_LIMIT` — verification window size (default: 10)
//! - `COMMITMENT` — `confirmed` or `finalized` (default: `confirmed`)
//! - `MAX_SUBMIT_RETRIES` — bounded submission retries (default: 3)
//! - `REQUEST_TIMEOUT_SECS` — end-to-end request deadline (default: 60)
//! - `CONFIRM_TIMEOUT_SECS` — per-submission confirmation wait (default: 30)
//! - `LEDGER_PATH` — consumed-signature file (default: in-memory only)
//! - `HOST`, `PORT` — bind address (defaults: `0.0.0.0`, 3000)

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use solana_commitment_config::CommitmentConfig;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;

/// Default public RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Configuration load failure. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// A value was present but could not be parsed or is out of range.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// The offending environment variable.
        key: &'static str,
        /// Parse failure description.
        reason: String,
    },
}

/// How the payout is delivered to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutMode {
    /// Native SOL transfer straight to the sender's address.
    Native,
    /// SPL token transfer into the sender's associated token account.
    Token {
        /// Token mint address.
        mint: Pubkey,
        /// Mint decimals, needed by `transfer_checked`.
        decimals: u8,
    },
}

/// Process-wide relay configuration, immutable after load.
pub struct RelayConfig {
    /// Chain RPC endpoint.
    pub rpc_url: String,
    /// Wallet on which inbound payments are verified.
    pub receiving_address: Pubkey,
    /// Keypair authorized to move funds out of the holding account.
    pub payout_signer: Arc<Keypair>,
    /// Selected disbursement strategy.
    pub payout: PayoutMode,
    /// Payout base units per SOL.
    pub exchange_rate: u64,
    /// Minimum accepted purchase in SOL.
    pub min_purchase: Decimal,
    /// Absolute amount-match tolerance in SOL.
    pub amount_tolerance: Decimal,
    /// Number of recent signatures scanned during verification.
    pub lookback_limit: usize,
    /// Commitment level for queries and confirmation.
    pub commitment: CommitmentConfig,
    /// Bounded retry count for transaction submission.
    pub max_submit_retries: u32,
    /// End-to-end deadline per request.
    pub request_timeout: Duration,
    /// Per-submission confirmation wait.
    pub confirm_timeout: Duration,
    /// Consumed-signature ledger file, if persistence is enabled.
    pub ledger_path: Option<PathBuf>,
    /// Server bind address.
    pub host: IpAddr,
    /// Server port.
    pub port: u16,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("rpc_url", &self.rpc_url)
            .field("receiving_address", &self.receiving_address)
            .field("payout", &self.payout)
            .field("exchange_rate", &self.exchange_rate)
            .field("min_purchase", &self.min_purchase)
            .field("amount_tolerance", &self.amount_tolerance)
            .field("lookback_limit", &self.lookback_limit)
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

impl RelayConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on any missing required variable or
    /// unparseable value; callers are expected to abort startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let receiving_address = parse_required("SOL_WALLET")?;
        let payout_signer = Arc::new(parse_signer(&required("PRIVATE_KEY")?)?);
        let payout = parse_payout_mode()?;

        let exchange_rate: u64 =
            ensure_positive("EXCHANGE_RATE", parse_or("EXCHANGE_RATE", 100_000_000)?)?;
        let min_purchase: Decimal = ensure_positive(
            "MIN_PURCHASE_SOL",
            parse_or("MIN_PURCHASE_SOL", Decimal::new(1, 1))?,
        )?;
        let amount_tolerance: Decimal = ensure_positive(
            "AMOUNT_TOLERANCE_SOL",
            parse_or("AMOUNT_TOLERANCE_SOL", Decimal::new(1, 2))?,
        )?;

        Ok(Self {
            rpc_url: std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_owned()),
            receiving_address,
            payout_signer,
            payout,
            exchange_rate,
            min_purchase,
            amount_tolerance,
            lookback_limit: ensure_positive("LOOKBACK_LIMIT", parse_or("LOOKBACK_LIMIT", 10)?)?,
            commitment: parse_commitment()?,
            max_submit_retries: parse_or("MAX_SUBMIT_RETRIES", 3)?,
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 60)?),
            confirm_timeout: Duration::from_secs(parse_or("CONFIRM_TIMEOUT_SECS", 30)?),
            ledger_path: std::env::var("LEDGER_PATH").ok().map(PathBuf::from),
            host: parse_or("HOST", IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)))?,
            port: parse_or("PORT", 3000)?,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parse_required<T>(key: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    required(key)?.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Rejects zero or negative values for settings that would otherwise
/// disable the relay outright: a zero tolerance or lookback window fails
/// every verification, a zero rate every payout.
fn ensure_positive<T>(key: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default,
{
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be positive".into(),
        });
    }
    Ok(value)
}

/// Parses the payout signer secret: a JSON byte array (the format exported
/// by common wallet tooling) or a base58-encoded 64-byte secret.
fn parse_signer(raw: &str) -> Result<Keypair, ConfigError> {
    let raw = raw.trim();
    let bytes: Vec<u8> = if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|e| ConfigError::Invalid {
            key: "PRIVATE_KEY",
            reason: format!("bad JSON byte array: {e}"),
        })?
    } else {
        bs58::decode(raw)
            .into_vec()
            .map_err(|e| ConfigError::Invalid {
                key: "PRIVATE_KEY",
                reason: format!("bad base58: {e}"),
            })?
    };
    Keypair::try_from(bytes.as_slice()).map_err(|e| ConfigError::Invalid {
        key: "PRIVATE_KEY",
        reason: e.to_string(),
    })
}

fn parse_payout_mode() -> Result<PayoutMode, ConfigError> {
    let mode = std::env::var("PAYOUT_MODE").unwrap_or_else(|_| "native".to_owned());
    match mode.trim().to_ascii_lowercase().as_str() {
        "native" => Ok(PayoutMode::Native),
        "token" => Ok(PayoutMode::Token {
            mint: parse_required("TOKEN_ADDRESS")?,
            decimals: parse_or("TOKEN_DECIMALS", 9)?,
        }),
        other => Err(ConfigError::Invalid {
            key: "PAYOUT_MODE",
            reason: format!("expected 'native' or 'token', got '{other}'"),
        }),
    }
}

fn parse_commitment() -> Result<CommitmentConfig, ConfigError> {
    let level = std::env::var("COMMITMENT").unwrap_or_else(|_| "confirmed".to_owned());
    match level.trim().to_ascii_lowercase().as_str() {
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(ConfigError::Invalid {
            key: "COMMITMENT",
            reason: format!("expected 'confirmed' or 'finalized', got '{other}'"),
        }),
    }
}
