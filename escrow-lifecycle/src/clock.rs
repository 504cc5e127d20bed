//! Block-height clock oracle
//!
//! The manager reads the current height at creation time to validate the
//! deadline and when an arbiter settles a dispute. Heights never decrease.

use crate::models::BlockHeight;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current block height
pub trait Clock: Send + Sync {
    /// Current height, monotonically non-decreasing across calls
    fn current_height(&self) -> BlockHeight;
}

/// Clock driven by an in-process height counter
#[derive(Debug, Default)]
pub struct BlockClock {
    height: AtomicU64,
}

impl BlockClock {
    pub fn new(height: BlockHeight) -> Self {
        Self {
            height: AtomicU64::new(height),
        }
    }

    /// Advance by `blocks` and return the new height
    pub fn advance(&self, blocks: u64) -> BlockHeight {
        let previous = self
            .height
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |h| {
                Some(h.saturating_add(blocks))
            })
            .unwrap_or_else(|h| h);
        previous.saturating_add(blocks)
    }

    /// Move to `height` if it is ahead of the current one; returns the resulting height
    pub fn set(&self, height: BlockHeight) -> BlockHeight {
        let previous = self.height.fetch_max(height, Ordering::SeqCst);
        previous.max(height)
    }
}

impl Clock for BlockClock {
    fn current_height(&self) -> BlockHeight {
        self.height.load(Ordering::SeqCst)
    }
}
