//! Request lifecycle orchestration.
//!
//! A request moves through `Received -> Validated -> Verified -> Disbursed ->
//! Completed`, exiting early on rejection or failure. Exactly one
//! verification attempt gates at most one disbursement attempt; the consumed
//! ledger is the only state shared across requests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::chain::ChainClient;
use crate::config::{PayoutMode, RelayConfig};
use crate::disburse::{
    Disbursement, DisbursementExecutor, DisbursementStrategy, ExchangeRate, NativeTransfer,
    TokenTransfer,
};
use crate::error::{RelayError, ValidationError};
use crate::ledger::SignatureLedger;
use crate::request::DisbursementRequest;
use crate::verify::PaymentVerifier;

/// Orchestrates validation, verification, and disbursement for one request.
pub struct RelayService {
    verifier: PaymentVerifier,
    executor: DisbursementExecutor,
    ledger: Arc<SignatureLedger>,
    rate: ExchangeRate,
    min_purchase: Decimal,
    request_timeout: Duration,
}

impl fmt::Debug for RelayService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayService")
            .field("rate", &self.rate)
            .field("min_purchase", &self.min_purchase)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl RelayService {
    /// Assembles the service from configuration and shared collaborators.
    #[must_use]
    pub fn new(
        config: &RelayConfig,
        chain: Arc<dyn ChainClient>,
        ledger: Arc<SignatureLedger>,
    ) -> Self {
        let strategy: Box<dyn DisbursementStrategy> = match config.payout {
            PayoutMode::Native => Box::new(NativeTransfer),
            PayoutMode::Token { mint, decimals } => Box::new(TokenTransfer::new(mint, decimals)),
        };
        let verifier = PaymentVerifier::new(
            Arc::clone(&chain),
            Arc::clone(&ledger),
            config.receiving_address,
            config.lookback_limit,
            config.amount_tolerance,
        );
        let executor = DisbursementExecutor::new(
            chain,
            Arc::clone(&config.payout_signer),
            strategy,
            config.max_submit_retries,
            config.confirm_timeout,
        );
        Self {
            verifier,
            executor,
            ledger,
            rate: ExchangeRate::new(config.exchange_rate),
            min_purchase: config.min_purchase,
            request_timeout: config.request_timeout,
        }
    }

    /// Processes one disbursement request end to end, under the configured
    /// deadline.
    ///
    /// # Errors
    ///
    /// Returns the [`RelayError`] describing the first stage that failed.
    pub async fn process(
        &self,
        raw_sender: &str,
        amount: Decimal,
    ) -> Result<Disbursement, RelayError> {
        match tokio::time::timeout(self.request_timeout, self.run(raw_sender, amount)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(sender = raw_sender, %amount, "request deadline expired");
                Err(RelayError::Timeout)
            }
        }
    }

    async fn run(&self, raw_sender: &str, amount: Decimal) -> Result<Disbursement, RelayError> {
        let request = DisbursementRequest::validate(raw_sender, amount, self.min_purchase)?;
        let base_units = self
            .rate
            .payout_base_units(request.amount)
            .ok_or(ValidationError::InvalidRequest)?;
        tracing::debug!(sender = %request.sender, amount = %request.amount, base_units, "request validated");

        let transfer = self
            .verifier
            .verify(&request)
            .await?
            .ok_or(RelayError::PaymentNotVerified)?;

        // Check-and-insert before any funds move; a lost race means another
        // request already claimed this payment.
        if !self.ledger.try_consume(&transfer.signature) {
            return Err(RelayError::AlreadyConsumed(transfer.signature));
        }

        let disbursement = self.executor.disburse(&request.sender, base_units).await?;
        tracing::info!(
            sender = %request.sender,
            transaction = %disbursement.transaction_id,
            amount_disbursed = disbursement.amount_disbursed,
            "request completed"
        );
        Ok(disbursement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DisbursementError;
    use crate::testing::{MockChain, test_config, transfer_transaction};
    use solana_pubkey::Pubkey;
    use solana_signature::Signature;

    fn service(config: &RelayConfig, chain: MockChain) -> (RelayService, Arc<MockChain>) {
        let chain = Arc::new(chain);
        let ledger = Arc::new(SignatureLedger::in_memory());
        let service = RelayService::new(config, Arc::clone(&chain) as Arc<dyn ChainClient>, ledger);
        (service, chain)
    }

    #[tokio::test]
    async fn verified_payment_is_disbursed_at_the_exchange_rate() {
        let config = test_config();
        let sender = Pubkey::new_unique();
        let chain = MockChain::new()
            .with_balance(10_000_000_000)
            .with_transfer(
                Signature::new_unique(),
                transfer_transaction(&sender, &config.receiving_address, 1_000_000_000),
            );
        let (service, chain) = service(&config, chain);

        let disbursement = service
            .process(&sender.to_string(), "1".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(disbursement.amount_disbursed, 100_000_000);
        assert_eq!(chain.submissions().len(), 1);
    }

    #[tokio::test]
    async fn unverified_payment_never_reaches_the_executor() {
        let config = test_config();
        let (service, chain) = service(&config, MockChain::new().with_balance(10_000_000_000));

        let err = service
            .process(&Pubkey::new_unique().to_string(), "1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::PaymentNotVerified));
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn second_claim_of_the_same_payment_is_rejected() {
        let config = test_config();
        let sender = Pubkey::new_unique();
        let signature = Signature::new_unique();
        let chain = MockChain::new()
            .with_balance(10_000_000_000)
            .with_transfer(
                signature,
                transfer_transaction(&sender, &config.receiving_address, 1_000_000_000),
            );
        let (service, _) = service(&config, chain);

        assert!(service
            .process(&sender.to_string(), "1".parse().unwrap())
            .await
            .is_ok());
        let err = service
            .process(&sender.to_string(), "1".parse().unwrap())
            .await
            .unwrap_err();
        // The consumed record is skipped during the rescan, so the second
        // claim reports no payment found.
        assert!(matches!(err, RelayError::PaymentNotVerified));
    }

    #[tokio::test]
    async fn expired_request_deadline_maps_to_timeout() {
        let mut config = test_config();
        config.request_timeout = Duration::from_millis(20);
        let sender = Pubkey::new_unique();
        let chain = MockChain::new()
            .with_balance(10_000_000_000)
            .hanging_sends()
            .with_transfer(
                Signature::new_unique(),
                transfer_transaction(&sender, &config.receiving_address, 1_000_000_000),
            );
        let (service, _) = service(&config, chain);

        let err = service
            .process(&sender.to_string(), "1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout));
    }

    #[tokio::test]
    async fn payment_consumed_after_the_scan_is_already_redeemed() {
        let config = test_config();
        let sender = Pubkey::new_unique();
        let signature = Signature::new_unique();
        let chain: Arc<dyn ChainClient> = Arc::new(
            MockChain::new().with_balance(10_000_000_000).with_transfer(
                signature,
                transfer_transaction(&sender, &config.receiving_address, 1_000_000_000),
            ),
        );
        // A competing request can consume the payment between the scan and
        // the claim. The verifier is given a view from before that claim
        // landed, so the match is still visible while the consume is lost.
        let ledger = Arc::new(SignatureLedger::in_memory());
        let verifier = PaymentVerifier::new(
            Arc::clone(&chain),
            Arc::new(SignatureLedger::in_memory()),
            config.receiving_address,
            config.lookback_limit,
            config.amount_tolerance,
        );
        let executor = DisbursementExecutor::new(
            chain,
            Arc::clone(&config.payout_signer),
            Box::new(NativeTransfer),
            config.max_submit_retries,
            config.confirm_timeout,
        );
        let service = RelayService {
            verifier,
            executor,
            ledger: Arc::clone(&ledger),
            rate: ExchangeRate::new(config.exchange_rate),
            min_purchase: config.min_purchase,
            request_timeout: config.request_timeout,
        };
        assert!(ledger.try_consume(&signature));

        let err = service
            .process(&sender.to_string(), "1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::AlreadyConsumed(s) if s == signature));
    }

    #[tokio::test]
    async fn validation_failures_skip_chain_access() {
        let config = test_config();
        let (service, chain) = service(&config, MockChain::new().failing_rpc());

        let err = service
            .process("not-an-address", "1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::Validation(ValidationError::InvalidRequest)
        ));
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn disbursement_failure_surfaces_typed() {
        let config = test_config();
        let sender = Pubkey::new_unique();
        let chain = MockChain::new()
            // No balance on the payout signer.
            .with_transfer(
                Signature::new_unique(),
                transfer_transaction(&sender, &config.receiving_address, 1_000_000_000),
            );
        let (service, _) = service(&config, chain);

        let err = service
            .process(&sender.to_string(), "1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::Disbursement(DisbursementError::InsufficientFunds { .. })
        ));
    }
}
