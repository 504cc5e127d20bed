//! Error types for the escrow lifecycle
//!
//! Every expected failure of a lifecycle operation is one of these values.
//! Callers branch on the variant; nothing here is meant to be swallowed or
//! retried by the manager itself.

use crate::models::{EscrowId, EscrowStatus};
use thiserror::Error;

/// Failure reported by the external value-transfer capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Source principal does not hold enough of the asset
    #[error("insufficient funds: {principal} holds {available}, needs {required}")]
    InsufficientFunds {
        principal: String,
        available: u64,
        required: u64,
    },

    /// Capability refused to move value between the two principals
    #[error("transfer denied from {from} to {to}")]
    TransferDenied { from: String, to: String },

    /// Crediting the principal would exceed the representable balance
    #[error("balance overflow for {principal}")]
    BalanceOverflow { principal: String },
}

/// Main error type for escrow operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// No record for the referenced identifier
    #[error("escrow {0} not found")]
    NotFound(EscrowId),

    /// Refund attempted while the deadline has not yet passed
    #[error("deadline {deadline} not reached at height {current_height}")]
    DeadlineNotReached {
        deadline: u64,
        current_height: u64,
    },

    /// Caller lacks the required relationship to the record
    #[error("{caller} is not authorized to {operation} escrow {escrow_id}")]
    Unauthorized {
        escrow_id: EscrowId,
        caller: String,
        operation: &'static str,
    },

    /// Record status does not permit the requested transition
    #[error("cannot {operation} escrow {escrow_id} in status {status}")]
    InvalidState {
        escrow_id: EscrowId,
        status: EscrowStatus,
        operation: &'static str,
    },

    /// Dispute requested on a record without an arbiter
    #[error("escrow {0} has no arbiter")]
    NoArbiter(EscrowId),

    /// Value transfer failed; the operation had no effect
    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// Rejected creation arguments
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

impl EscrowError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn unauthorized(escrow_id: EscrowId, caller: &str, operation: &'static str) -> Self {
        Self::Unauthorized {
            escrow_id,
            caller: caller.to_string(),
            operation,
        }
    }

    pub(crate) fn invalid_state(
        escrow_id: EscrowId,
        status: EscrowStatus,
        operation: &'static str,
    ) -> Self {
        Self::InvalidState {
            escrow_id,
            status,
            operation,
        }
    }
}

impl From<::config::ConfigError> for EscrowError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
