//! Validation of untrusted disbursement requests.

use rust_decimal::Decimal;
use solana_pubkey::Pubkey;

use crate::error::ValidationError;

/// A validated disbursement request.
///
/// Constructed only through [`DisbursementRequest::validate`] and never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisbursementRequest {
    /// The claimed sender of the inbound payment and recipient of the payout.
    pub sender: Pubkey,
    /// Claimed payment amount in SOL display units.
    pub amount: Decimal,
}

impl DisbursementRequest {
    /// Validates raw request input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRequest`] for an empty or
    /// non-base58 sender or a non-positive amount, and
    /// [`ValidationError::BelowMinimum`] for amounts under `min_purchase`.
    pub fn validate(
        raw_sender: &str,
        amount: Decimal,
        min_purchase: Decimal,
    ) -> Result<Self, ValidationError> {
        let raw_sender = raw_sender.trim();
        if raw_sender.is_empty() {
            return Err(ValidationError::InvalidRequest);
        }
        let sender: Pubkey = raw_sender
            .parse()
            .map_err(|_| ValidationError::InvalidRequest)?;
        if amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidRequest);
        }
        if amount < min_purchase {
            return Err(ValidationError::BelowMinimum(min_purchase));
        }
        Ok(Self { sender, amount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min() -> Decimal {
        "0.1".parse().unwrap()
    }

    #[test]
    fn accepts_valid_request() {
        let sender = Pubkey::new_unique();
        let request =
            DisbursementRequest::validate(&sender.to_string(), "1".parse().unwrap(), min())
                .unwrap();
        assert_eq!(request.sender, sender);
        assert_eq!(request.amount, "1".parse().unwrap());
    }

    #[test]
    fn rejects_empty_sender() {
        let err = DisbursementRequest::validate("  ", "1".parse().unwrap(), min()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidRequest);
    }

    #[test]
    fn rejects_non_base58_sender() {
        let err = DisbursementRequest::validate("not-an-address!", "1".parse().unwrap(), min())
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidRequest);
    }

    #[test]
    fn rejects_zero_and_negative_amounts() {
        let sender = Pubkey::new_unique().to_string();
        for amount in ["0", "-0.5"] {
            let err = DisbursementRequest::validate(&sender, amount.parse().unwrap(), min())
                .unwrap_err();
            assert_eq!(err, ValidationError::InvalidRequest);
        }
    }

    #[test]
    fn rejects_amount_below_minimum() {
        let sender = Pubkey::new_unique().to_string();
        let err =
            DisbursementRequest::validate(&sender, "0.05".parse().unwrap(), min()).unwrap_err();
        assert_eq!(err, ValidationError::BelowMinimum(min()));
        assert_eq!(err.to_string(), "Minimum purchase amount is 0.1 SOL");
    }

    #[test]
    fn amount_equal_to_minimum_is_accepted() {
        let sender = Pubkey::new_unique().to_string();
        assert!(DisbursementRequest::validate(&sender, min(), min()).is_ok());
    }
}
