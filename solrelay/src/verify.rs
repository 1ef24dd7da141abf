//! Payment verification against recent chain history.
//!
//! The verifier scans the most recent confirmed transactions of the
//! receiving wallet and looks for a native transfer whose originating
//! account matches the claimed sender and whose amount lies within the
//! configured tolerance of the claimed amount. Transfers already recorded in
//! the consumed ledger are skipped so a redeemed payment cannot back a
//! second claim.
//!
//! Scanning stays bounded by the lookback window: a matching payment older
//! than the window is not found. Window size and tolerance are configuration,
//! not constants.

use std::sync::Arc;

use rust_decimal::Decimal;
use solana_pubkey::Pubkey;

use crate::chain::{ChainClient, ChainClientError, InboundTransfer};
use crate::ledger::SignatureLedger;
use crate::request::DisbursementRequest;

/// Matches disbursement requests against recent inbound payments.
#[derive(Debug)]
pub struct PaymentVerifier {
    chain: Arc<dyn ChainClient>,
    ledger: Arc<SignatureLedger>,
    receiving_address: Pubkey,
    lookback_limit: usize,
    tolerance: Decimal,
}

impl PaymentVerifier {
    /// Creates a verifier for the given receiving wallet.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        ledger: Arc<SignatureLedger>,
        receiving_address: Pubkey,
        lookback_limit: usize,
        tolerance: Decimal,
    ) -> Self {
        Self {
            chain,
            ledger,
            receiving_address,
            lookback_limit,
            tolerance,
        }
    }

    /// Looks for an unconsumed inbound payment matching the request.
    ///
    /// Returns the first matching transfer (most recent first), or `None`
    /// when the lookback window holds no match.
    ///
    /// # Errors
    ///
    /// Returns [`ChainClientError`] when a chain query fails. An
    /// infrastructure failure is never reported as "no payment found".
    pub async fn verify(
        &self,
        request: &DisbursementRequest,
    ) -> Result<Option<InboundTransfer>, ChainClientError> {
        let signatures = self
            .chain
            .recent_signatures(&self.receiving_address, self.lookback_limit)
            .await?;
        tracing::debug!(
            sender = %request.sender,
            amount = %request.amount,
            window = signatures.len(),
            "scanning recent inbound transactions"
        );

        for signature in signatures {
            let Some(transaction) = self.chain.transaction(&signature).await? else {
                continue;
            };
            let Some(transfer) =
                InboundTransfer::from_transaction(&signature, &transaction, &self.receiving_address)
            else {
                continue;
            };
            if self.ledger.contains(&transfer.signature) {
                tracing::debug!(%signature, "skipping already redeemed payment");
                continue;
            }
            if transfer.sender == request.sender && self.amount_matches(&transfer, request.amount) {
                tracing::info!(
                    %signature,
                    sender = %transfer.sender,
                    lamports = transfer.lamports,
                    "matching inbound payment found"
                );
                return Ok(Some(transfer));
            }
        }
        Ok(None)
    }

    fn amount_matches(&self, transfer: &InboundTransfer, requested: Decimal) -> bool {
        (transfer.amount_sol() - requested).abs() < self.tolerance
    }
}
