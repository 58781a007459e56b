//! Shared types for the NAVPOKE updater.
//!
//! These types form the data model used across all modules: the off-chain
//! observation, the on-chain registry snapshot, the signing account, and the
//! update transaction, plus the error taxonomy for a pipeline run.

use alloy_primitives::{Address, Bytes, B256, U256};
use chrono::DateTime;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// A validated NAV/yield observation for one instrument.
///
/// Constructed only by the validator (`validate::validate`), so every
/// `Observation` satisfies the sanity bounds: `0 < nav < 1e11`,
/// `-3 < ytm < 1000`, and `as_of_date` aligned to midnight UTC.
/// Immutable for the rest of the run and discarded at its end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub ticker: String,
    /// Epoch seconds, truncated to midnight UTC of the as-of day.
    pub as_of_date: i64,
    /// Net asset value per unit, exact decimal as printed on the page.
    pub nav: Decimal,
    /// Yield-to-worst as a fraction (page shows percent).
    pub ytm: Decimal,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = DateTime::from_timestamp(self.as_of_date, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| self.as_of_date.to_string());
        write!(
            f,
            "{} nav={} ytm={}% as_of={day}",
            self.ticker,
            self.nav,
            self.ytm * Decimal::ONE_HUNDRED,
        )
    }
}

// ---------------------------------------------------------------------------
// Chain-side snapshots
// ---------------------------------------------------------------------------

/// Last recorded state for a ticker in the registry contract.
///
/// Read-only snapshot of external ledger state; `price` is fixed-point with
/// scale 1e18.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRecord {
    pub ticker: String,
    pub quantity: U256,
    pub price: U256,
}

impl fmt::Display for ChainRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} qty={} price={}", self.ticker, self.quantity, self.price)
    }
}

/// Decoded confirmation receipt for a mined transaction.
#[derive(Debug, Clone)]
pub struct TxConfirmation {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    /// Execution status; `false` means the transaction reverted.
    pub status: bool,
}

impl fmt::Display for TxConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} block={} status={}",
            self.transaction_hash,
            self.block_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string()),
            if self.status { "ok" } else { "reverted" },
        )
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// The signing account for registry updates.
///
/// The private key is held as a `SecretString` and is only parsed into key
/// material inside the signing step. `Debug` never reveals it.
#[derive(Clone)]
pub struct Account {
    pub address: Address,
    pub private_key: SecretString,
}

impl Account {
    pub fn new(address: Address, private_key: SecretString) -> Self {
        Self {
            address,
            private_key,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Update transaction
// ---------------------------------------------------------------------------

/// A signed `update(ticker, ts, price)` call, immutable once signed and
/// submitted at most once per run.
#[derive(Debug, Clone)]
pub struct UpdateTransaction {
    pub ticker: String,
    pub as_of_date: i64,
    pub price_scaled: U256,
    pub nonce: u64,
    /// RLP-encoded signed transaction bytes.
    pub raw: Bytes,
    pub hash: B256,
}

impl fmt::Display for UpdateTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "update({}, {}, {}) nonce={} hash={}",
            self.ticker, self.as_of_date, self.price_scaled, self.nonce, self.hash,
        )
    }
}

// ---------------------------------------------------------------------------
// Run outcome
// ---------------------------------------------------------------------------

/// Terminal outcome of one pipeline run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// On-chain price already equals the freshly scaled NAV; nothing sent.
    Skipped { ticker: String, price: U256 },
    /// An update was submitted and a receipt observed.
    Confirmed {
        ticker: String,
        transaction: UpdateTransaction,
        confirmation: TxConfirmation,
    },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Skipped { ticker, price } => {
                write!(f, "{ticker}: no-op (price {price} unchanged)")
            }
            RunOutcome::Confirmed {
                ticker,
                transaction,
                confirmation,
            } => write!(f, "{ticker}: confirmed {} ({confirmation})", transaction.hash),
        }
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Fatal errors for a pipeline run.
///
/// Every variant aborts the current run entirely; a retried run restarts
/// from fetch. The no-op outcome is not an error.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Page or redirect target unreachable/unreadable at the transport level.
    #[error("Fetch error ({url}): {message}")]
    Fetch { url: String, message: String },

    /// Expected field absent or unparseable; aborts before validation.
    #[error("Extraction error ({field}): {message}")]
    Extraction {
        field: &'static str,
        message: String,
    },

    /// A sanity bound violated; aborts before any chain interaction.
    #[error("Validation failed ({bound}): {detail}")]
    Validation {
        bound: &'static str,
        detail: String,
    },

    /// Registry read failed; aborts before building a transaction.
    #[error("Chain read error: {0}")]
    ChainRead(String),

    /// Nonce fetch, build, signing, or submission failed.
    #[error("Chain write error ({stage}): {message}")]
    ChainWrite {
        stage: &'static str,
        message: String,
    },

    /// Broadcast succeeded but no receipt was observed within the bound.
    /// The transaction's fate is unknown; the next run reconciles from
    /// registry state.
    #[error("Confirmation timeout: no receipt for {tx_hash} after {waited_secs}s")]
    ConfirmationTimeout { tx_hash: B256, waited_secs: u64 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
