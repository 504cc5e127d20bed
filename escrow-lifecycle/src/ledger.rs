//! Value transfer capability
//!
//! The lifecycle manager only decides whether and to whom value moves; the
//! actual movement is delegated to a [`TransferCapability`]. An in-memory
//! ledger is provided for tests and the CLI.

use crate::error::TransferError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Moves value between two principals atomically
#[async_trait]
pub trait TransferCapability: Send + Sync {
    /// Move `amount` of `token` (native asset when `None`) from `from` to `to`
    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        token: Option<&str>,
    ) -> Result<(), TransferError>;
}

#[derive(Debug, Default)]
struct LedgerState {
    /// (principal, token) -> balance
    balances: HashMap<(String, Option<String>), u64>,
    /// Principals whose transfers are refused in either direction
    denied: HashSet<String>,
}

/// Balance book kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `principal` out of thin air
    pub async fn deposit(
        &self,
        principal: &str,
        amount: u64,
        token: Option<&str>,
    ) -> Result<(), TransferError> {
        let mut state = self.state.write().await;
        let balance = state
            .balances
            .entry((principal.to_string(), token.map(str::to_string)))
            .or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::BalanceOverflow {
                principal: principal.to_string(),
            })?;
        Ok(())
    }

    /// Current balance of `principal` in `token`
    pub async fn balance(&self, principal: &str, token: Option<&str>) -> u64 {
        self.state
            .read()
            .await
            .balances
            .get(&(principal.to_string(), token.map(str::to_string)))
            .copied()
            .unwrap_or(0)
    }

    /// Refuse every future transfer to or from `principal`
    pub async fn deny(&self, principal: &str) {
        self.state.write().await.denied.insert(principal.to_string());
    }

    /// Lift a previous [`deny`](Self::deny)
    pub async fn allow(&self, principal: &str) {
        self.state.write().await.denied.remove(principal);
    }
}

#[async_trait]
impl TransferCapability for InMemoryLedger {
    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        token: Option<&str>,
    ) -> Result<(), TransferError> {
        let mut state = self.state.write().await;

        if state.denied.contains(from) || state.denied.contains(to) {
            return Err(TransferError::TransferDenied {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let token = token.map(str::to_string);
        let source = (from.to_string(), token.clone());
        let available = state.balances.get(&source).copied().unwrap_or(0);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                principal: from.to_string(),
                available,
                required: amount,
            });
        }

        let target = (to.to_string(), token);
        // Both sides are checked before either balance changes.
        let credited = if target == source {
            available
        } else {
            state
                .balances
                .get(&target)
                .copied()
                .unwrap_or(0)
                .checked_add(amount)
                .ok_or_else(|| TransferError::BalanceOverflow {
                    principal: to.to_string(),
                })?
        };

        state.balances.insert(source, available - amount);
        state.balances.insert(target, credited);

        debug!(from, to, amount, "ledger transfer applied");

        Ok(())
    }
}
