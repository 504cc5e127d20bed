//! Escrow Manager - Owns escrow records and drives their state transitions
//!
//! Every record sits behind its own async mutex. An operation holds that
//! mutex across its whole check, transfer and commit sequence, so a record
//! sees at most one transition in flight while distinct records proceed
//! concurrently. The status change is written only after the transfer
//! capability reports success; any failure leaves the record untouched.
//!
//! Once a transfer has succeeded the rest of the operation runs without an
//! await point: the record map and the audit trail sit behind blocking locks
//! held only for an insert or a push, so dropping the future can never
//! separate moved funds from their record or a transition from its event.

use crate::{
    clock::Clock,
    config::EscrowManagerConfig,
    error::{EscrowError, TransferError},
    ledger::TransferCapability,
    models::{
        BlockHeight, DisputeOutcome, EscrowEvent, EscrowEventKind, EscrowId, EscrowRecord,
        EscrowStatus,
    },
    EscrowResult,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};
use tokio::sync::Mutex;
use tracing::{info, warn};

type EscrowSlot = Arc<Mutex<EscrowRecord>>;

/// Escrow creation request
#[derive(Debug, Clone)]
pub struct CreateEscrowRequest {
    pub buyer: String,
    pub seller: String,
    pub amount: u64,
    pub deadline: BlockHeight,
    pub token: Option<String>,
    pub arbiter: Option<String>,
}

/// Lifecycle manager for escrow records
pub struct EscrowManager {
    /// Configuration
    config: EscrowManagerConfig,
    /// Record storage; records are never removed
    escrows: RwLock<HashMap<EscrowId, EscrowSlot>>,
    /// Audit trail in commit order
    escrow_events: RwLock<Vec<EscrowEvent>>,
    /// Next identifier to hand out
    next_id: AtomicU64,
    /// External value transfer
    ledger: Arc<dyn TransferCapability>,
    /// Block height oracle
    clock: Arc<dyn Clock>,
}

impl EscrowManager {
    /// Create a new escrow manager
    pub fn new(
        config: EscrowManagerConfig,
        ledger: Arc<dyn TransferCapability>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            escrows: RwLock::new(HashMap::new()),
            escrow_events: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            ledger,
            clock,
        }
    }

    /// Create an escrow and lock the buyer's funds in custody
    pub async fn create(&self, request: CreateEscrowRequest) -> EscrowResult<EscrowId> {
        info!(
            buyer = %request.buyer,
            seller = %request.seller,
            amount = request.amount,
            deadline = request.deadline,
            "Creating escrow"
        );

        let current_height = self.clock.current_height();
        if let Err(err) = self.validate_create_request(&request, current_height) {
            warn!(buyer = %request.buyer, %err, "Escrow creation rejected");
            return Err(err);
        }

        let escrow_id = self.next_id.fetch_add(1, Ordering::SeqCst);

        self.ledger
            .transfer(
                &request.buyer,
                &self.config.custody_account,
                request.amount,
                request.token.as_deref(),
            )
            .await
            .map_err(|e| rejected("create", escrow_id, &request.buyer, e.into()))?;

        let record = EscrowRecord::new(
            escrow_id,
            request.buyer,
            request.seller,
            request.amount,
            request.deadline,
            request.token,
            request.arbiter,
            current_height,
        );

        self.record_event(
            EscrowEventKind::Created,
            &record,
            &record.buyer,
            Some(serde_json::json!({
                "seller": record.seller,
                "deadline": record.deadline,
                "token": record.token,
                "arbiter": record.arbiter,
                "height": current_height
            })),
        );

        self.escrows_mut()
            .insert(escrow_id, Arc::new(Mutex::new(record)));

        info!(escrow_id, "Created escrow");

        Ok(escrow_id)
    }

    /// Return locked funds to the buyer once the deadline has passed
    ///
    /// Checks run in a fixed order: existence, caller is buyer, record is
    /// `Active`, `current_height > deadline`.
    pub async fn refund(
        &self,
        escrow_id: EscrowId,
        caller: &str,
        current_height: BlockHeight,
    ) -> EscrowResult<EscrowRecord> {
        info!(escrow_id, caller, current_height, "Refunding escrow");

        let slot = self.slot(escrow_id)?;
        let mut escrow = slot.lock().await;

        self.validate_refund(&escrow, caller, current_height)
            .map_err(|e| rejected("refund", escrow_id, caller, e))?;

        self.pay_out(&escrow, &escrow.buyer)
            .await
            .map_err(|e| rejected("refund", escrow_id, caller, e.into()))?;

        escrow.transition(EscrowStatus::Refunded);
        escrow.settled_at_height = Some(current_height);

        self.record_event(
            EscrowEventKind::Refunded,
            &escrow,
            caller,
            Some(serde_json::json!({ "height": current_height })),
        );

        info!(escrow_id, "Refunded escrow");

        Ok(escrow.clone())
    }

    /// Pay locked funds to the seller
    pub async fn release(
        &self,
        escrow_id: EscrowId,
        caller: &str,
        current_height: BlockHeight,
    ) -> EscrowResult<EscrowRecord> {
        info!(escrow_id, caller, current_height, "Releasing escrow");

        let slot = self.slot(escrow_id)?;
        let mut escrow = slot.lock().await;

        self.validate_release(&escrow, caller)
            .map_err(|e| rejected("release", escrow_id, caller, e))?;

        self.pay_out(&escrow, &escrow.seller)
            .await
            .map_err(|e| rejected("release", escrow_id, caller, e.into()))?;

        escrow.transition(EscrowStatus::Released);
        escrow.settled_at_height = Some(current_height);

        self.record_event(
            EscrowEventKind::Released,
            &escrow,
            caller,
            Some(serde_json::json!({ "height": current_height })),
        );

        info!(escrow_id, "Released escrow");

        Ok(escrow.clone())
    }

    /// Move an active escrow into arbitration
    pub async fn dispute(&self, escrow_id: EscrowId, caller: &str) -> EscrowResult<EscrowRecord> {
        info!(escrow_id, caller, "Disputing escrow");

        let slot = self.slot(escrow_id)?;
        let mut escrow = slot.lock().await;

        self.validate_dispute(&escrow, caller)
            .map_err(|e| rejected("dispute", escrow_id, caller, e))?;

        escrow.transition(EscrowStatus::Disputed);
        escrow.disputed_by = Some(caller.to_string());

        self.record_event(EscrowEventKind::Disputed, &escrow, caller, None);

        warn!(escrow_id, caller, "Escrow under dispute");

        Ok(escrow.clone())
    }

    /// Arbiter settles a dispute by paying one side
    pub async fn resolve_dispute(
        &self,
        escrow_id: EscrowId,
        caller: &str,
        outcome: DisputeOutcome,
    ) -> EscrowResult<EscrowRecord> {
        info!(escrow_id, caller, ?outcome, "Resolving dispute");

        let slot = self.slot(escrow_id)?;
        let mut escrow = slot.lock().await;

        self.validate_resolution(&escrow, caller)
            .map_err(|e| rejected("resolve", escrow_id, caller, e))?;

        self.pay_out(&escrow, escrow.beneficiary(outcome))
            .await
            .map_err(|e| rejected("resolve", escrow_id, caller, e.into()))?;

        let current_height = self.clock.current_height();
        escrow.transition(EscrowStatus::Resolved);
        escrow.resolution = Some(outcome);
        escrow.settled_at_height = Some(current_height);

        self.record_event(
            EscrowEventKind::Resolved,
            &escrow,
            caller,
            Some(serde_json::json!({
                "outcome": outcome,
                "beneficiary": escrow.beneficiary(outcome),
                "height": current_height
            })),
        );

        info!(escrow_id, ?outcome, "Resolved dispute");

        Ok(escrow.clone())
    }

    /// Get an escrow snapshot by ID
    pub async fn get_escrow(&self, escrow_id: EscrowId) -> EscrowResult<EscrowRecord> {
        let slot = self.slot(escrow_id)?;
        let escrow = slot.lock().await;
        Ok(escrow.clone())
    }

    /// Get all escrows a principal takes part in, ordered by ID
    pub async fn escrows_for_principal(&self, principal: &str) -> Vec<EscrowRecord> {
        let mut slots: Vec<(EscrowId, EscrowSlot)> = self
            .escrows()
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();
        slots.sort_by_key(|(id, _)| *id);

        let mut records = Vec::new();
        for (_, slot) in slots {
            let escrow = slot.lock().await;
            if escrow.involves(principal) {
                records.push(escrow.clone());
            }
        }
        records
    }

    /// Get escrow events for a record in commit order
    pub async fn events_for(&self, escrow_id: EscrowId) -> EscrowResult<Vec<EscrowEvent>> {
        if !self.escrows().contains_key(&escrow_id) {
            return Err(EscrowError::NotFound(escrow_id));
        }

        let events = self
            .escrow_events
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(events
            .iter()
            .filter(|event| event.escrow_id == escrow_id)
            .cloned()
            .collect())
    }

    /// Number of records ever created
    pub async fn escrow_count(&self) -> usize {
        self.escrows().len()
    }

    fn escrows(&self) -> RwLockReadGuard<'_, HashMap<EscrowId, EscrowSlot>> {
        self.escrows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn escrows_mut(&self) -> RwLockWriteGuard<'_, HashMap<EscrowId, EscrowSlot>> {
        self.escrows.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, escrow_id: EscrowId) -> EscrowResult<EscrowSlot> {
        self.escrows()
            .get(&escrow_id)
            .cloned()
            .ok_or_else(|| {
                warn!(escrow_id, "Escrow not found");
                EscrowError::NotFound(escrow_id)
            })
    }

    async fn pay_out(&self, escrow: &EscrowRecord, to: &str) -> Result<(), TransferError> {
        self.ledger
            .transfer(
                &self.config.custody_account,
                to,
                escrow.amount,
                escrow.token.as_deref(),
            )
            .await
    }

    fn record_event(
        &self,
        kind: EscrowEventKind,
        escrow: &EscrowRecord,
        actor: &str,
        metadata: Option<serde_json::Value>,
    ) {
        let event = EscrowEvent::new(kind, escrow, actor, metadata);
        self.escrow_events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Validate escrow creation request
    fn validate_create_request(
        &self,
        request: &CreateEscrowRequest,
        current_height: BlockHeight,
    ) -> EscrowResult<()> {
        if request.buyer.trim().is_empty() {
            return Err(EscrowError::validation("Buyer cannot be empty"));
        }

        if request.seller.trim().is_empty() {
            return Err(EscrowError::validation("Seller cannot be empty"));
        }

        if request.buyer == request.seller {
            return Err(EscrowError::validation("Buyer and seller must differ"));
        }

        let custody = &self.config.custody_account;
        if &request.buyer == custody || &request.seller == custody {
            return Err(EscrowError::validation(
                "Custody account cannot be a party to an escrow",
            ));
        }

        if let Some(arbiter) = &request.arbiter {
            if arbiter.trim().is_empty() {
                return Err(EscrowError::validation("Arbiter cannot be empty"));
            }
            if arbiter == custody {
                return Err(EscrowError::validation(
                    "Custody account cannot arbitrate an escrow",
                ));
            }
            if arbiter == &request.buyer || arbiter == &request.seller {
                return Err(EscrowError::validation(
                    "Arbiter cannot be the buyer or the seller",
                ));
            }
        }

        if request.amount == 0 {
            return Err(EscrowError::validation("Amount must be greater than 0"));
        }

        if let Some(max_amount) = self.config.max_amount {
            if request.amount > max_amount {
                return Err(EscrowError::validation(format!(
                    "Amount {} exceeds maximum {}",
                    request.amount, max_amount
                )));
            }
        }

        if request.deadline <= current_height {
            return Err(EscrowError::validation(format!(
                "Deadline {} must be after current height {}",
                request.deadline, current_height
            )));
        }

        Ok(())
    }

    /// Validate refund request
    fn validate_refund(
        &self,
        escrow: &EscrowRecord,
        caller: &str,
        current_height: BlockHeight,
    ) -> EscrowResult<()> {
        if caller != escrow.buyer {
            return Err(EscrowError::unauthorized(escrow.escrow_id, caller, "refund"));
        }

        escrow.validate_transition(EscrowStatus::Refunded, "refund")?;

        if current_height <= escrow.deadline {
            return Err(EscrowError::DeadlineNotReached {
                deadline: escrow.deadline,
                current_height,
            });
        }

        Ok(())
    }

    /// Validate release request
    fn validate_release(&self, escrow: &EscrowRecord, caller: &str) -> EscrowResult<()> {
        if !self
            .config
            .release_policy
            .permits(caller, &escrow.buyer, escrow.arbiter.as_deref())
        {
            return Err(EscrowError::unauthorized(escrow.escrow_id, caller, "release"));
        }

        escrow.validate_transition(EscrowStatus::Released, "release")
    }

    /// Validate dispute request
    fn validate_dispute(&self, escrow: &EscrowRecord, caller: &str) -> EscrowResult<()> {
        if !escrow.is_party(caller) {
            return Err(EscrowError::unauthorized(escrow.escrow_id, caller, "dispute"));
        }

        escrow.validate_transition(EscrowStatus::Disputed, "dispute")?;

        if escrow.arbiter.is_none() {
            return Err(EscrowError::NoArbiter(escrow.escrow_id));
        }

        Ok(())
    }

    /// Validate arbitration request
    fn validate_resolution(&self, escrow: &EscrowRecord, caller: &str) -> EscrowResult<()> {
        if !escrow.is_arbiter(caller) {
            return Err(EscrowError::unauthorized(escrow.escrow_id, caller, "resolve"));
        }

        escrow.validate_transition(EscrowStatus::Resolved, "resolve")
    }
}

fn rejected(
    operation: &'static str,
    escrow_id: EscrowId,
    caller: &str,
    err: EscrowError,
) -> EscrowError {
    warn!(operation, escrow_id, caller, %err, "Escrow operation rejected");
    err
}
