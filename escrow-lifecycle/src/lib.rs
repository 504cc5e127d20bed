//! Escrow lifecycle manager
//!
//! This crate implements the state machine behind an escrow of value
//! between a buyer and a seller:
//! - Creation locks the buyer's funds with an external transfer capability
//! - Release pays the seller, refund returns funds after a block-height deadline
//! - Disputes hand the decision to an arbiter
//! - Every committed transition is appended to an audit trail

pub mod clock;
pub mod compat;
pub mod config;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod models;

pub use clock::{BlockClock, Clock};
pub use compat::LegacyOutcome;
pub use config::{EscrowManagerConfig, ReleasePolicy};
pub use error::{EscrowError, TransferError};
pub use ledger::{InMemoryLedger, TransferCapability};
pub use manager::{CreateEscrowRequest, EscrowManager};
pub use models::{
    BlockHeight, DisputeOutcome, EscrowEvent, EscrowEventKind, EscrowId, EscrowRecord,
    EscrowStatus,
};

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
