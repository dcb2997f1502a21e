use canal_types::{Address, Amount, AmountError, ChannelId, CodecError};
use thiserror::Error;

/// Errors raised by channel actions. Every class rejects the action before
/// any state mutation; none are retried.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Malformed input: bad id bytes, equal parties, oversized amount.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),
    #[error("balance of {0} not found")]
    BalanceNotFound(Address),
    #[error("insufficient balance of {address}: needs {needs}, has {has}")]
    InsufficientBalance {
        address: Address,
        needs: Amount,
        has: Amount,
    },
    /// Channel is not in the status the action requires.
    #[error("invalid channel state: {0}")]
    InvalidState(String),
    /// A claim does not reconcile with stored state: split/locked mismatch,
    /// replayed exchange checker, reuse with different parties.
    #[error("consistency check failed: {0}")]
    Consistency(String),
    #[error("signature verify failed: {0}")]
    Signature(String),
    /// Arithmetic left the representable range, e.g. during interest
    /// compounding. Fails the whole settlement, never clamped.
    #[error("amount arithmetic error: {0}")]
    Amount(#[from] AmountError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
