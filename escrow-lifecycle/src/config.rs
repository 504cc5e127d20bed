//! Lifecycle manager configuration
//!
//! Defaults, optionally overridden by a config file and then by `ESCROW_*`
//! environment variables.

use crate::EscrowResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Who may release locked funds to the seller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Only the buyer
    #[default]
    BuyerOnly,
    /// The buyer, or the record's arbiter when one is configured
    BuyerOrArbiter,
}

impl ReleasePolicy {
    /// Whether `caller` may release funds under this policy
    pub fn permits(&self, caller: &str, buyer: &str, arbiter: Option<&str>) -> bool {
        match self {
            Self::BuyerOnly => caller == buyer,
            Self::BuyerOrArbiter => caller == buyer || arbiter == Some(caller),
        }
    }
}

/// Configuration for the escrow manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowManagerConfig {
    /// Principal holding locked funds between creation and settlement
    pub custody_account: String,
    /// Release authorization rule
    pub release_policy: ReleasePolicy,
    /// Upper bound on a single escrow amount
    pub max_amount: Option<u64>,
}

impl Default for EscrowManagerConfig {
    fn default() -> Self {
        Self {
            custody_account: "escrow-custody".to_string(),
            release_policy: ReleasePolicy::BuyerOnly,
            max_amount: None,
        }
    }
}

impl EscrowManagerConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> EscrowResult<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(::config::Environment::with_prefix("ESCROW").try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;

        if config.custody_account.trim().is_empty() {
            return Err(crate::EscrowError::config("custody_account cannot be empty"));
        }

        Ok(config)
    }
}
