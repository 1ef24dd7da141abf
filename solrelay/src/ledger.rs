//! Consumed-payment ledger.
//!
//! An inbound payment may only satisfy one disbursement. The ledger is an
//! atomic check-and-insert set of consumed transaction signatures, consulted
//! before every disbursement. Without it, the same legitimate payment could
//! be replayed against `/pay` any number of times.
//!
//! Persistence is an optional append-only file of base58 signatures, loaded
//! at startup so consumption survives restarts.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

use dashmap::DashSet;
use solana_signature::Signature;

/// Errors raised while loading or recording ledger state.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The ledger file could not be read or created.
    #[error("ledger file error: {0}")]
    Io(#[from] std::io::Error),
    /// A persisted line is not a valid signature.
    #[error("corrupt ledger entry {line}: {reason}")]
    CorruptEntry {
        /// 1-based line number of the bad entry.
        line: usize,
        /// Parse failure description.
        reason: String,
    },
}

/// Atomic set of consumed inbound payment signatures.
#[derive(Debug)]
pub struct SignatureLedger {
    consumed: DashSet<Signature>,
    persist: Option<Mutex<File>>,
}

impl SignatureLedger {
    /// Creates an in-memory ledger with no persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            consumed: DashSet::new(),
            persist: None,
        }
    }

    /// Opens (or creates) a file-backed ledger, loading all previously
    /// consumed signatures.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the file cannot be opened or contains an
    /// entry that does not parse as a signature.
    pub fn with_file(path: &Path) -> Result<Self, LedgerError> {
        let consumed = DashSet::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for (index, line) in reader.lines().enumerate() {
                let line = line?;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let signature: Signature =
                    line.parse().map_err(|e| LedgerError::CorruptEntry {
                        line: index + 1,
                        reason: format!("{e}"),
                    })?;
                consumed.insert(signature);
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            consumed,
            persist: Some(Mutex::new(file)),
        })
    }

    /// Whether a signature has already been consumed.
    #[must_use]
    pub fn contains(&self, signature: &Signature) -> bool {
        self.consumed.contains(signature)
    }

    /// Atomically marks a signature as consumed.
    ///
    /// Returns `false` if it was already consumed, in which case the caller
    /// must not disburse. A persistence failure is logged but does not fail
    /// the request; the in-memory set remains authoritative for the process.
    pub fn try_consume(&self, signature: &Signature) -> bool {
        if !self.consumed.insert(*signature) {
            return false;
        }
        if let Some(file) = &self.persist {
            match file.lock() {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{signature}") {
                        tracing::error!(%signature, error = %e, "failed to persist consumed signature");
                    }
                }
                Err(e) => {
                    tracing::error!(%signature, error = %e, "consumed-signature file lock poisoned");
                }
            }
        }
        true
    }

    /// Number of consumed signatures known to this process.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    /// Whether no signature has been consumed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}
