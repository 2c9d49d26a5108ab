//! Typed errors for the faucet core.

use thiserror::Error;

/// Terminal failure of a transfer submission.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Recipient failed the final pre-submission address check.
    #[error("invalid recipient address")]
    InvalidAddress,

    /// The node could not be reached, or did not deliver a terminal
    /// response within the confirmation timeout.
    #[error("node unreachable: {0}")]
    NodeUnreachable(String),

    /// Key material could not produce a signature. Fatal, never retried.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The node accepted the request but rejected the transfer
    /// (insufficient faucet balance, malformed call, non-zero tx code).
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

/// Errors converting a configured decimal amount to base units.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmountError {
    #[error("'{0}' is not a valid decimal amount")]
    InvalidDecimal(String),

    #[error("amount must not be negative")]
    Negative,

    #[error("amount has more fractional digits than the configured {decimals} decimals")]
    ExcessPrecision { decimals: u32 },

    #[error("amount does not fit in the largest representable coin value")]
    Overflow,
}
