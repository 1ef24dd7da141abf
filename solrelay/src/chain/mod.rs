//! Solana chain access for the payment relay.
//!
//! The relay talks to the chain through the [`ChainClient`] trait so that the
//! verification and disbursement logic stays independent of the concrete RPC
//! transport. [`RpcChainClient`] is the production implementation backed by
//! the nonblocking Solana RPC client.
//!
//! # Key Types
//!
//! - [`ChainClient`] - read/write access to the ledger (signature lookup,
//!   transaction fetch, submission with confirmation)
//! - [`RpcChainClient`] - JSON-RPC implementation of [`ChainClient`]
//! - [`InboundTransfer`] - read-only view of a native transfer credited to
//!   the receiving wallet

/// Inbound transfer records parsed from fetched transactions.
pub mod types;
pub use types::*;

/// The chain client trait and its RPC implementation.
pub mod provider;
pub use provider::*;
