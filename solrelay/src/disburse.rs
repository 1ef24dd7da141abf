//! Disbursement execution.
//!
//! Once a payment is verified, the executor computes the payout from the
//! configured exchange rate and submits a single transaction carrying the
//! outbound transfer. The transfer itself is produced by a
//! [`DisbursementStrategy`]: either a native System-program transfer or an
//! SPL token transfer into the recipient's associated token account,
//! selected by configuration rather than duplicated request paths.
//!
//! The payout signer's on-chain account is shared mutable state across
//! concurrent requests, so all submissions are serialized through one lock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use solana_instruction::Instruction;
use solana_keypair::Keypair;
use solana_message::Message;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::Transaction;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account;

use crate::chain::{ChainClient, ChainClientError};
use crate::error::DisbursementError;

/// Lamports kept aside for transaction fees when checking signer balance.
const FEE_RESERVE_LAMPORTS: u64 = 5_000;

/// Fixed multiplier from SOL display units to payout base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeRate(u64);

impl ExchangeRate {
    /// Creates an exchange rate from a positive integer multiplier.
    #[must_use]
    pub const fn new(rate: u64) -> Self {
        Self(rate)
    }

    /// Computes `amount * rate` in base units.
    ///
    /// Exact for the default rate of 100,000,000 and amounts with at most
    /// eight decimal places; sub-base-unit remainders are truncated. Returns
    /// `None` when the product is zero or does not fit in a `u64`.
    #[must_use]
    pub fn payout_base_units(&self, amount: Decimal) -> Option<u64> {
        let payout = amount.checked_mul(Decimal::from(self.0))?.trunc().to_u64()?;
        if payout == 0 { None } else { Some(payout) }
    }
}

/// The completed outbound transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disbursement {
    /// Signature of the confirmed payout transaction.
    pub transaction_id: Signature,
    /// Disbursed amount in base units.
    pub amount_disbursed: u64,
}

/// Produces the transfer instructions for one payout variant.
#[async_trait::async_trait]
pub trait DisbursementStrategy: Send + Sync + fmt::Debug {
    /// Builds the instruction list moving `base_units` from `payer` to the
    /// destination resolved for `recipient`.
    async fn instructions(
        &self,
        chain: &dyn ChainClient,
        payer: &Pubkey,
        recipient: &Pubkey,
        base_units: u64,
    ) -> Result<Vec<Instruction>, DisbursementError>;

    /// Lamports the payout must move, on top of the fee reserve, for the
    /// signer balance check.
    fn lamports_required(&self, base_units: u64) -> u64;
}

/// Native SOL payout: a single System-program transfer to the sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTransfer;

#[async_trait::async_trait]
impl DisbursementStrategy for NativeTransfer {
    async fn instructions(
        &self,
        _chain: &dyn ChainClient,
        payer: &Pubkey,
        recipient: &Pubkey,
        base_units: u64,
    ) -> Result<Vec<Instruction>, DisbursementError> {
        Ok(vec![solana_system_interface::instruction::transfer(
            payer, recipient, base_units,
        )])
    }

    fn lamports_required(&self, base_units: u64) -> u64 {
        base_units
    }
}

/// SPL token payout into the recipient's associated token account.
///
/// The recipient's ATA is created in the same transaction when it does not
/// exist yet. The payout signer's own ATA must exist and hold the tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenTransfer {
    mint: Pubkey,
    decimals: u8,
}

impl TokenTransfer {
    /// Creates a token payout strategy for the given mint.
    #[must_use]
    pub const fn new(mint: Pubkey, decimals: u8) -> Self {
        Self { mint, decimals }
    }
}

#[async_trait::async_trait]
impl DisbursementStrategy for TokenTransfer {
    async fn instructions(
        &self,
        chain: &dyn ChainClient,
        payer: &Pubkey,
        recipient: &Pubkey,
        base_units: u64,
    ) -> Result<Vec<Instruction>, DisbursementError> {
        let source = get_associated_token_address_with_program_id(payer, &self.mint, &spl_token::ID);
        let exists = chain
            .account_exists(&source)
            .await
            .map_err(resolution_failed)?;
        if !exists {
            return Err(DisbursementError::AccountResolutionFailed(format!(
                "payout token account {source} does not exist"
            )));
        }

        let destination =
            get_associated_token_address_with_program_id(recipient, &self.mint, &spl_token::ID);
        let mut instructions = Vec::with_capacity(2);
        let destination_exists = chain
            .account_exists(&destination)
            .await
            .map_err(resolution_failed)?;
        if !destination_exists {
            instructions.push(create_associated_token_account(
                payer,
                recipient,
                &self.mint,
                &spl_token::ID,
            ));
        }
        let transfer = spl_token::instruction::transfer_checked(
            &spl_token::ID,
            &source,
            &self.mint,
            &destination,
            payer,
            &[],
            base_units,
            self.decimals,
        )
        .map_err(|e| DisbursementError::AccountResolutionFailed(e.to_string()))?;
        instructions.push(transfer);
        Ok(instructions)
    }

    fn lamports_required(&self, _base_units: u64) -> u64 {
        // Token payouts move no lamports beyond fees and possible rent for
        // the destination ATA; the fee reserve covers both.
        0
    }
}

fn resolution_failed(e: ChainClientError) -> DisbursementError {
    DisbursementError::AccountResolutionFailed(e.to_string())
}

/// Submits payout transactions on behalf of the payout signer.
pub struct DisbursementExecutor {
    chain: Arc<dyn ChainClient>,
    signer: Arc<Keypair>,
    strategy: Box<dyn DisbursementStrategy>,
    max_retries: u32,
    confirm_timeout: Duration,
    submit_lock: tokio::sync::Mutex<()>,
}

impl fmt::Debug for DisbursementExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisbursementExecutor")
            .field("strategy", &self.strategy)
            .field("max_retries", &self.max_retries)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish_non_exhaustive()
    }
}

impl DisbursementExecutor {
    /// Creates an executor for the given signer and payout strategy.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        signer: Arc<Keypair>,
        strategy: Box<dyn DisbursementStrategy>,
        max_retries: u32,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            signer,
            strategy,
            max_retries,
            confirm_timeout,
            submit_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Executes the outbound transfer of `base_units` to `recipient`.
    ///
    /// A fresh blockhash is attached immediately before every signing so the
    /// transaction cannot be built against an expired one. Submission is
    /// retried up to the bounded retry count; a confirmation timeout is not
    /// retried because the broadcast may still land.
    ///
    /// # Errors
    ///
    /// Returns a [`DisbursementError`] naming the failure: insufficient
    /// signer funds, unresolvable accounts, confirmation timeout, or
    /// submission failure after retries.
    pub async fn disburse(
        &self,
        recipient: &Pubkey,
        base_units: u64,
    ) -> Result<Disbursement, DisbursementError> {
        let payer = self.signer.pubkey();

        // One submission at a time per signer. The balance check must run
        // under the same lock, or concurrent requests would all pass it
        // against the same funds before any submission lands.
        let _guard = self.submit_lock.lock().await;

        let available = self
            .chain
            .balance(&payer)
            .await
            .map_err(|e| DisbursementError::SubmissionFailed(e.to_string()))?;
        let needed = self
            .strategy
            .lamports_required(base_units)
            .saturating_add(FEE_RESERVE_LAMPORTS);
        if available < needed {
            return Err(DisbursementError::InsufficientFunds { needed, available });
        }

        let instructions = self
            .strategy
            .instructions(self.chain.as_ref(), &payer, recipient, base_units)
            .await?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let blockhash = match self.chain.latest_blockhash().await {
                Ok(blockhash) => blockhash,
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(attempt, error = %e, "blockhash fetch failed, retrying");
                    continue;
                }
                Err(e) => {
                    return Err(DisbursementError::SubmissionFailed(format!(
                        "{e} (after {attempt} attempts)"
                    )));
                }
            };
            let message = Message::new_with_blockhash(&instructions, Some(&payer), &blockhash);
            let signer: &Keypair = self.signer.as_ref();
            let transaction = Transaction::new(&[signer], message, blockhash);

            let send = self.chain.send_and_confirm(&transaction);
            match tokio::time::timeout(self.confirm_timeout, send).await {
                Err(_) => {
                    tracing::error!(
                        recipient = %recipient,
                        base_units,
                        attempt,
                        "confirmation wait expired; transaction may still land"
                    );
                    return Err(DisbursementError::ConfirmationTimeout);
                }
                Ok(Ok(signature)) => {
                    tracing::info!(
                        transaction = %signature,
                        recipient = %recipient,
                        base_units,
                        attempt,
                        "disbursement confirmed"
                    );
                    return Ok(Disbursement {
                        transaction_id: signature,
                        amount_disbursed: base_units,
                    });
                }
                Ok(Err(e)) if attempt < self.max_retries => {
                    tracing::warn!(attempt, error = %e, "submission failed, retrying");
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        recipient = %recipient,
                        base_units,
                        attempt,
                        error = %e,
                        "disbursement failed"
                    );
                    return Err(DisbursementError::SubmissionFailed(format!(
                        "{e} (after {attempt} attempts)"
                    )));
                }
            }
        }
    }
}
