#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Payment verification and disbursement core for the SOL payment relay.
//!
//! The relay accepts a claim of the form "address X paid Y SOL to the
//! receiving wallet", verifies it against recent chain history, and issues a
//! matching disbursement to the sender at a fixed exchange rate. This crate
//! holds the whole decision pipeline; the HTTP surface lives in
//! `solrelay-server`.
//!
//! # Architecture
//!
//! - [`request`] - validation of untrusted input into a [`DisbursementRequest`]
//! - [`verify`] - matching the claim against recent inbound transfers
//! - [`ledger`] - atomic consumption of redeemed payment signatures
//! - [`disburse`] - payout computation, strategy selection, and submission
//! - [`service`] - the per-request lifecycle tying the stages together
//! - [`chain`] - the [`chain::ChainClient`] boundary to the Solana RPC
//! - [`config`] - immutable process configuration loaded from the environment
//!
//! # Feature Flags
//!
//! - `test-util` - scripted chain client and fixtures for dependent crates

/// Chain access: client trait, RPC implementation, inbound transfer views.
pub mod chain;
/// Environment-sourced configuration.
pub mod config;
/// Payout computation and execution.
pub mod disburse;
/// Error taxonomy shared across the relay.
pub mod error;
/// Consumed-payment ledger.
pub mod ledger;
/// Request validation.
pub mod request;
/// Request lifecycle orchestration.
pub mod service;
/// Payment verification.
pub mod verify;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use chain::{ChainClient, ChainClientError, InboundTransfer, RpcChainClient};
pub use config::{ConfigError, PayoutMode, RelayConfig};
pub use disburse::{Disbursement, DisbursementExecutor, ExchangeRate};
pub use error::{DisbursementError, RelayError, ValidationError};
pub use ledger::{LedgerError, SignatureLedger};
pub use request::DisbursementRequest;
pub use service::RelayService;
pub use verify::PaymentVerifier;
