//! Coarse numeric error codes for callers expecting `{ ok, err }` results
//!
//! Deadline, authorization and state failures share one code here even
//! though [`EscrowError`] keeps them apart.

use crate::{error::EscrowError, EscrowResult};
use serde::{Deserialize, Serialize};

pub const ERR_NOT_FOUND: u32 = 101;
pub const ERR_DEADLINE: u32 = 102;
pub const ERR_NO_ARBITER: u32 = 103;
pub const ERR_TRANSFER: u32 = 104;
pub const ERR_INVALID_ARGUMENT: u32 = 105;
pub const ERR_CONFIG: u32 = 106;

impl EscrowError {
    /// Legacy code for this error
    pub fn legacy_code(&self) -> u32 {
        match self {
            Self::NotFound(_) => ERR_NOT_FOUND,
            Self::DeadlineNotReached { .. } | Self::Unauthorized { .. } | Self::InvalidState { .. } => {
                ERR_DEADLINE
            }
            Self::NoArbiter(_) => ERR_NO_ARBITER,
            Self::TransferFailed(_) => ERR_TRANSFER,
            Self::Validation(_) => ERR_INVALID_ARGUMENT,
            Self::Config(_) => ERR_CONFIG,
        }
    }
}

/// Result flattened to a success flag and optional code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<u32>,
}

impl<T> From<&EscrowResult<T>> for LegacyOutcome {
    fn from(result: &EscrowResult<T>) -> Self {
        match result {
            Ok(_) => Self { ok: true, err: None },
            Err(e) => Self {
                ok: false,
                err: Some(e.legacy_code()),
            },
        }
    }
}
