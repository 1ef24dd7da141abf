//! Error taxonomy for the payment relay.
//!
//! Every failure path is typed. Validation and verification failures are
//! user-correctable (HTTP 400); infrastructure failures during verification
//! are retryable (503); disbursement failures are operator-actionable (500)
//! and must not be silently retried since a partial transfer may have
//! occurred.

use rust_decimal::Decimal;
use solana_signature::Signature;

use crate::chain::ChainClientError;

/// Rejection of untrusted request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Missing or malformed sender address, or a non-positive amount.
    #[error("Invalid sender or amount")]
    InvalidRequest,
    /// Amount below the configured minimum purchase.
    #[error("Minimum purchase amount is {0} SOL")]
    BelowMinimum(Decimal),
}

/// Failure while executing the outbound transfer.
#[derive(Debug, thiserror::Error)]
pub enum DisbursementError {
    /// The payout signer cannot cover the transfer plus fees.
    #[error("payout wallet has insufficient funds: {needed} lamports needed, {available} available")]
    InsufficientFunds {
        /// Lamports required for the transfer and fee reserve.
        needed: u64,
        /// Lamports currently available on the payout signer.
        available: u64,
    },
    /// The destination (or source) account could not be resolved.
    #[error("could not resolve payout account: {0}")]
    AccountResolutionFailed(String),
    /// The chain did not confirm the transaction in time. The broadcast may
    /// still land, so this is never retried automatically.
    #[error("transaction confirmation timed out")]
    ConfirmationTimeout,
    /// Submission failed after the bounded retry count.
    #[error("transaction submission failed: {0}")]
    SubmissionFailed(String),
}

/// Top-level result of processing a disbursement request.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The request failed input validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No matching inbound payment was found in the lookback window.
    #[error("SOL payment not found")]
    PaymentNotVerified,
    /// The matching inbound payment was already redeemed.
    #[error("payment {0} already redeemed")]
    AlreadyConsumed(Signature),
    /// Chain queries failed during verification; the client should retry.
    #[error("payment verification unavailable: {0}")]
    VerificationInfrastructure(#[from] ChainClientError),
    /// The outbound transfer failed.
    #[error(transparent)]
    Disbursement(#[from] DisbursementError),
    /// The end-to-end request deadline expired.
    #[error("request timed out")]
    Timeout,
}
