//! Scripted escrow sessions
//!
//! A script seeds ledger balances, sets the starting block height and then
//! runs lifecycle steps in order. Rejected steps are reported, not fatal.

use escrow_lifecycle::{
    BlockClock, BlockHeight, Clock, CreateEscrowRequest, DisputeOutcome, EscrowEvent,
    EscrowId, EscrowManager, EscrowManagerConfig, EscrowRecord, EscrowResult,
    InMemoryLedger, LegacyOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub start_height: BlockHeight,
    #[serde(default)]
    pub balances: Vec<Balance>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct Balance {
    pub principal: String,
    pub amount: u64,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Create {
        buyer: String,
        seller: String,
        amount: u64,
        deadline: BlockHeight,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        arbiter: Option<String>,
    },
    /// `height` defaults to the clock's current height
    Refund {
        escrow_id: EscrowId,
        caller: String,
        #[serde(default)]
        height: Option<BlockHeight>,
    },
    Release {
        escrow_id: EscrowId,
        caller: String,
        #[serde(default)]
        height: Option<BlockHeight>,
    },
    Dispute {
        escrow_id: EscrowId,
        caller: String,
    },
    Resolve {
        escrow_id: EscrowId,
        caller: String,
        outcome: DisputeOutcome,
    },
    Advance {
        blocks: u64,
    },
    Show {
        escrow_id: EscrowId,
    },
}

/// Value produced by a successful step
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StepResult {
    Created {
        escrow_id: EscrowId,
    },
    Record(EscrowRecord),
    Height {
        height: BlockHeight,
    },
    Detail {
        escrow: EscrowRecord,
        events: Vec<EscrowEvent>,
    },
}

/// One line of output per executed step
#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub op: Step,
    #[serde(flatten)]
    pub outcome: LegacyOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Session {
    manager: EscrowManager,
    clock: Arc<BlockClock>,
}

impl Session {
    pub async fn new(config: EscrowManagerConfig, script: &Script) -> EscrowResult<Self> {
        let ledger = Arc::new(InMemoryLedger::new());
        for balance in &script.balances {
            ledger
                .deposit(&balance.principal, balance.amount, balance.token.as_deref())
                .await?;
        }
        let clock = Arc::new(BlockClock::new(script.start_height));
        let manager = EscrowManager::new(config, ledger, clock.clone());
        Ok(Self { manager, clock })
    }

    pub async fn run(&self, steps: &[Step]) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let result = self.execute(step).await;
            let outcome = LegacyOutcome::from(&result);
            let (result, error) = match result {
                Ok(value) => (Some(value), None),
                Err(err) => (None, Some(err.to_string())),
            };
            reports.push(StepReport {
                step: index,
                op: step.clone(),
                outcome,
                result,
                error,
            });
        }
        reports
    }

    async fn execute(&self, step: &Step) -> EscrowResult<StepResult> {
        let result = match step {
            Step::Create {
                buyer,
                seller,
                amount,
                deadline,
                token,
                arbiter,
            } => {
                let escrow_id = self
                    .manager
                    .create(CreateEscrowRequest {
                        buyer: buyer.clone(),
                        seller: seller.clone(),
                        amount: *amount,
                        deadline: *deadline,
                        token: token.clone(),
                        arbiter: arbiter.clone(),
                    })
                    .await?;
                StepResult::Created { escrow_id }
            }
            Step::Refund {
                escrow_id,
                caller,
                height,
            } => {
                let height = height.unwrap_or_else(|| self.clock.current_height());
                StepResult::Record(self.manager.refund(*escrow_id, caller, height).await?)
            }
            Step::Release {
                escrow_id,
                caller,
                height,
            } => {
                let height = height.unwrap_or_else(|| self.clock.current_height());
                StepResult::Record(self.manager.release(*escrow_id, caller, height).await?)
            }
            Step::Dispute { escrow_id, caller } => {
                StepResult::Record(self.manager.dispute(*escrow_id, caller).await?)
            }
            Step::Resolve {
                escrow_id,
                caller,
                outcome,
            } => StepResult::Record(
                self.manager
                    .resolve_dispute(*escrow_id, caller, *outcome)
                    .await?,
            ),
            Step::Advance { blocks } => StepResult::Height {
                height: self.clock.advance(*blocks),
            },
            Step::Show { escrow_id } => {
                let escrow = self.manager.get_escrow(*escrow_id).await?;
                let events = self.manager.events_for(*escrow_id).await?;
                StepResult::Detail { escrow, events }
            }
        };
        Ok(result)
    }
}
