//! Read-only views of on-chain payment activity.

use rust_decimal::Decimal;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// System program instruction discriminant for `Transfer`.
const SYSTEM_TRANSFER_TAG: u32 = 2;

/// A native SOL transfer credited to the receiving wallet.
///
/// Parsed from a fetched transaction and discarded after the verification
/// decision; the relay never persists these records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundTransfer {
    /// Signature of the transaction that carried the transfer.
    pub signature: Signature,
    /// The originating account (first static account key, the fee payer).
    pub sender: Pubkey,
    /// Transferred amount in lamports.
    pub lamports: u64,
}

impl InboundTransfer {
    /// Extracts an inbound transfer from a fetched transaction.
    ///
    /// The first instruction must be a System program transfer whose
    /// destination is `receiving`; anything else yields `None` and the
    /// transaction is ignored by the verifier.
    #[must_use]
    pub fn from_transaction(
        signature: &Signature,
        transaction: &VersionedTransaction,
        receiving: &Pubkey,
    ) -> Option<Self> {
        let account_keys = transaction.message.static_account_keys();
        let sender = *account_keys.first()?;
        let instruction = transaction.message.instructions().first()?;
        if solana_system_interface::program::ID.ne(instruction.program_id(account_keys)) {
            return None;
        }
        let lamports = parse_transfer_lamports(&instruction.data)?;
        let destination_index = *instruction.accounts.get(1)? as usize;
        if account_keys.get(destination_index)? != receiving {
            return None;
        }
        Some(Self {
            signature: *signature,
            sender,
            lamports,
        })
    }

    /// The transferred amount in SOL display units.
    #[must_use]
    pub fn amount_sol(&self) -> Decimal {
        Decimal::from(self.lamports) / Decimal::from(LAMPORTS_PER_SOL)
    }
}

/// Parses the lamport amount out of a System program `Transfer` instruction.
///
/// Layout is the bincode encoding of `SystemInstruction::Transfer`: a 4-byte
/// little-endian discriminant followed by the 8-byte lamport amount.
fn parse_transfer_lamports(data: &[u8]) -> Option<u64> {
    if data.len() != 12 {
        return None;
    }
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&data[0..4]);
    if u32::from_le_bytes(tag) != SYSTEM_TRANSFER_TAG {
        return None;
    }
    let mut lamports = [0u8; 8];
    lamports.copy_from_slice(&data[4..12]);
    Some(u64::from_le_bytes(lamports))
}
