//! Core data models for the escrow lifecycle
//!
//! Escrow records, the status state machine, dispute outcomes and the
//! audit events emitted when a transition commits.

use crate::{error::EscrowError, EscrowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier assigned to an escrow at creation
pub type EscrowId = u64;

/// Clock value in block-height units
pub type BlockHeight = u64;

/// Escrow state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Funds locked, awaiting release, refund or dispute
    Active,
    /// Funds paid to the seller
    Released,
    /// Funds returned to the buyer after the deadline
    Refunded,
    /// Under arbitration
    Disputed,
    /// Arbiter paid out to one side
    Resolved,
}

impl EscrowStatus {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded | Self::Resolved)
    }

    /// Check if this state allows release
    pub fn can_release(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this state allows refund
    pub fn can_refund(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this state allows disputes
    pub fn can_dispute(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this state allows arbitration
    pub fn can_resolve(&self) -> bool {
        matches!(self, Self::Disputed)
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Released => write!(f, "Released"),
            Self::Refunded => write!(f, "Refunded"),
            Self::Disputed => write!(f, "Disputed"),
            Self::Resolved => write!(f, "Resolved"),
        }
    }
}

/// Side the arbiter awards the locked amount to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeOutcome {
    Buyer,
    Seller,
}

/// Escrow record tracking a commitment of value between buyer and seller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub escrow_id: EscrowId,

    // Parties
    pub buyer: String,
    pub seller: String,
    pub arbiter: Option<String>,

    // Terms
    pub amount: u64,
    pub token: Option<String>,
    pub deadline: BlockHeight,

    pub status: EscrowStatus,

    // Dispute
    pub disputed_by: Option<String>,
    pub resolution: Option<DisputeOutcome>,

    // Heights
    pub created_at_height: BlockHeight,
    pub settled_at_height: Option<BlockHeight>,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscrowRecord {
    /// Create a new active record
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        escrow_id: EscrowId,
        buyer: String,
        seller: String,
        amount: u64,
        deadline: BlockHeight,
        token: Option<String>,
        arbiter: Option<String>,
        created_at_height: BlockHeight,
    ) -> Self {
        let now = Utc::now();
        Self {
            escrow_id,
            buyer,
            seller,
            arbiter,
            amount,
            token,
            deadline,
            status: EscrowStatus::Active,
            disputed_by: None,
            resolution: None,
            created_at_height,
            settled_at_height: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `principal` is the buyer or the seller
    pub fn is_party(&self, principal: &str) -> bool {
        self.buyer == principal || self.seller == principal
    }

    /// Whether `principal` is the configured arbiter
    pub fn is_arbiter(&self, principal: &str) -> bool {
        self.arbiter.as_deref() == Some(principal)
    }

    /// Whether `principal` appears on the record in any role
    pub fn involves(&self, principal: &str) -> bool {
        self.is_party(principal) || self.is_arbiter(principal)
    }

    /// Principal receiving the locked amount for an arbitration outcome
    pub fn beneficiary(&self, outcome: DisputeOutcome) -> &str {
        match outcome {
            DisputeOutcome::Buyer => &self.buyer,
            DisputeOutcome::Seller => &self.seller,
        }
    }

    /// Validate a state transition
    pub fn validate_transition(
        &self,
        to_status: EscrowStatus,
        operation: &'static str,
    ) -> EscrowResult<()> {
        let valid = match to_status {
            EscrowStatus::Released => self.status.can_release(),
            EscrowStatus::Refunded => self.status.can_refund(),
            EscrowStatus::Disputed => self.status.can_dispute(),
            EscrowStatus::Resolved => self.status.can_resolve(),
            EscrowStatus::Active => false,
        };

        if valid {
            Ok(())
        } else {
            Err(EscrowError::invalid_state(
                self.escrow_id,
                self.status,
                operation,
            ))
        }
    }

    /// Apply a validated transition
    pub(crate) fn transition(&mut self, to_status: EscrowStatus) {
        self.status = to_status;
        self.updated_at = Utc::now();
    }
}

/// Kind of committed lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowEventKind {
    Created,
    Released,
    Refunded,
    Disputed,
    Resolved,
}

/// Escrow event for audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowEvent {
    pub id: Uuid,
    pub escrow_id: EscrowId,
    pub kind: EscrowEventKind,

    // Actor
    pub actor: String,

    // Event data
    pub status: EscrowStatus,
    pub amount: u64,
    pub metadata: Option<serde_json::Value>,

    // Timestamp (immutable)
    pub created_at: DateTime<Utc>,
}

impl EscrowEvent {
    /// Create a new event for a record snapshot
    pub fn new(
        kind: EscrowEventKind,
        record: &EscrowRecord,
        actor: &str,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            escrow_id: record.escrow_id,
            kind,
            actor: actor.to_string(),
            status: record.status,
            amount: record.amount,
            metadata,
            created_at: Utc::now(),
        }
    }
}
