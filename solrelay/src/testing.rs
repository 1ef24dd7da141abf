//! Test doubles and fixtures.
//!
//! Available to dependent crates through the `test-util` feature so the
//! server's router tests can drive the full service against a scripted
//! chain.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use solana_commitment_config::CommitmentConfig;
use solana_hash::Hash;
use solana_keypair::Keypair;
use solana_message::{Message, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::Transaction;
use solana_transaction::versioned::VersionedTransaction;

use crate::chain::{ChainClient, ChainClientError};
use crate::config::{PayoutMode, RelayConfig};

/// Builds an inbound native-transfer transaction as the chain would return
/// it: the sender is the fee payer (first account key) and the first
/// instruction is a System transfer to `to`.
#[must_use]
pub fn transfer_transaction(from: &Pubkey, to: &Pubkey, lamports: u64) -> VersionedTransaction {
    let instruction = solana_system_interface::instruction::transfer(from, to, lamports);
    let message = Message::new_with_blockhash(&[instruction], Some(from), &Hash::default());
    VersionedTransaction {
        signatures: vec![Signature::default()],
        message: VersionedMessage::Legacy(message),
    }
}

/// A [`RelayConfig`] with test defaults: native payout, rate 100,000,000,
/// minimum purchase 0.1 SOL, tolerance 0.01, window 10.
#[must_use]
pub fn test_config() -> RelayConfig {
    RelayConfig {
        rpc_url: "http://127.0.0.1:8899".to_owned(),
        receiving_address: Pubkey::new_unique(),
        payout_signer: Arc::new(Keypair::new()),
        payout: PayoutMode::Native,
        exchange_rate: 100_000_000,
        min_purchase: rust_decimal::Decimal::new(1, 1),
        amount_tolerance: rust_decimal::Decimal::new(1, 2),
        lookback_limit: 10,
        commitment: CommitmentConfig::confirmed(),
        max_submit_retries: 3,
        request_timeout: Duration::from_secs(5),
        confirm_timeout: Duration::from_secs(5),
        ledger_path: None,
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
    }
}

/// Scripted [`ChainClient`] for tests.
///
/// Inbound transfers are returned most-recent-first in insertion-reverse
/// order; submitted transactions are recorded for inspection.
#[derive(Debug, Default)]
pub struct MockChain {
    transfers: Vec<(Signature, Option<VersionedTransaction>)>,
    accounts: Vec<Pubkey>,
    balance: AtomicU64,
    drain_on_send: bool,
    fail_rpc: bool,
    fail_sends: AtomicU32,
    hang_sends: bool,
    send_attempts: AtomicU32,
    submissions: Mutex<Vec<Transaction>>,
}

impl MockChain {
    /// An empty chain: no transfers, no accounts, zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends an inbound transfer, making it the most recent one.
    #[must_use]
    pub fn with_transfer(mut self, signature: Signature, transaction: VersionedTransaction) -> Self {
        self.transfers.insert(0, (signature, Some(transaction)));
        self
    }

    /// Prepends a signature whose transaction cannot be fetched, as when the
    /// node has pruned its history.
    #[must_use]
    pub fn with_unfetchable_signature(mut self, signature: Signature) -> Self {
        self.transfers.insert(0, (signature, None));
        self
    }

    /// Marks an account as existing on chain.
    #[must_use]
    pub fn with_account(mut self, address: Pubkey) -> Self {
        self.accounts.push(address);
        self
    }

    /// Sets the balance reported for every account.
    #[must_use]
    pub fn with_balance(self, lamports: u64) -> Self {
        self.balance.store(lamports, Ordering::SeqCst);
        self
    }

    /// Sets the balance and drains it to zero after the first successful
    /// submission.
    #[must_use]
    pub fn with_draining_balance(mut self, lamports: u64) -> Self {
        self.drain_on_send = true;
        self.with_balance(lamports)
    }

    /// Makes all query RPCs fail.
    #[must_use]
    pub const fn failing_rpc(mut self) -> Self {
        self.fail_rpc = true;
        self
    }

    /// Makes the next `count` submissions fail before succeeding.
    #[must_use]
    pub fn failing_sends(self, count: u32) -> Self {
        self.fail_sends.store(count, Ordering::SeqCst);
        self
    }

    /// Makes every submission hang until the caller's deadline fires.
    #[must_use]
    pub const fn hanging_sends(mut self) -> Self {
        self.hang_sends = true;
        self
    }

    /// Number of submission attempts made so far, including failed and
    /// hanging ones.
    #[must_use]
    pub fn send_attempts(&self) -> u32 {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Transactions submitted so far.
    ///
    /// # Panics
    ///
    /// Panics if the submission record lock is poisoned.
    #[must_use]
    pub fn submissions(&self) -> Vec<Transaction> {
        self.submissions.lock().expect("submissions lock").clone()
    }

    fn check_rpc(&self) -> Result<(), ChainClientError> {
        if self.fail_rpc {
            Err(ChainClientError::Rpc("mock RPC failure".to_owned()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ChainClient for MockChain {
    async fn recent_signatures(
        &self,
        _address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<Signature>, ChainClientError> {
        self.check_rpc()?;
        Ok(self
            .transfers
            .iter()
            .take(limit)
            .map(|(signature, _)| *signature)
            .collect())
    }

    async fn transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<VersionedTransaction>, ChainClientError> {
        self.check_rpc()?;
        Ok(self
            .transfers
            .iter()
            .find(|(candidate, _)| candidate == signature)
            .and_then(|(_, transaction)| transaction.clone()))
    }

    async fn latest_blockhash(&self) -> Result<Hash, ChainClientError> {
        self.check_rpc()?;
        Ok(Hash::new_unique())
    }

    async fn send_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, ChainClientError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang_sends {
            std::future::pending::<()>().await;
        }
        let remaining = self.fail_sends.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_sends.store(remaining - 1, Ordering::SeqCst);
            return Err(ChainClientError::Rpc("mock send failure".to_owned()));
        }
        self.submissions
            .lock()
            .expect("submissions lock")
            .push(transaction.clone());
        if self.drain_on_send {
            self.balance.store(0, Ordering::SeqCst);
        }
        Ok(Signature::new_unique())
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, ChainClientError> {
        self.check_rpc()?;
        Ok(self.accounts.contains(address))
    }

    async fn balance(&self, _address: &Pubkey) -> Result<u64, ChainClientError> {
        self.check_rpc()?;
        Ok(self.balance.load(Ordering::SeqCst))
    }
}
