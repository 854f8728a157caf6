//! World configuration.
//!
//! Every field has a default, so an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::period::Tick;

/// When a `set` on an irreversible variable (or a persistent latch firing)
/// propagates to periods that already exist later in the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FutureReconciliation {
    /// Reconcile immediately, before evaluating latches.
    #[default]
    Eager,
    /// Leave later periods alone; travel still refuses contradictions.
    Deferred,
}

/// Tunables for a [`World`](crate::World).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Tick the world starts at.
    pub start_tick: Tick,
    /// Observe the prior value of a variable before writing it.
    pub observe_prior_on_set: bool,
    /// Observe the new value of a variable after writing it.
    pub observe_new_on_set: bool,
    /// Propagation policy for irreversible changes.
    pub future_reconciliation: FutureReconciliation,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            start_tick: 0,
            observe_prior_on_set: true,
            observe_new_on_set: true,
            future_reconciliation: FutureReconciliation::Eager,
        }
    }
}

impl WorldConfig {
    /// Checks that the options can be combined.
    pub fn validate(&self) -> Result<(), ValidationError> {
        // Unobserved writes never reach a departure state, so eager
        // reconciliation would carry nothing forward.
        if self.future_reconciliation == FutureReconciliation::Eager && !self.observe_new_on_set {
            return Err(ValidationError::InvalidConfig {
                reason: "eager future reconciliation requires observe_new_on_set".to_string(),
            });
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(s: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(s).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("deserialize config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Builder-style setter for the starting tick.
    #[must_use]
    pub const fn with_start_tick(mut self, tick: Tick) -> Self {
        self.start_tick = tick;
        self
    }

    /// Sets the reconciliation policy.
    #[must_use]
    pub const fn with_future_reconciliation(mut self, mode: FutureReconciliation) -> Self {
        self.future_reconciliation = mode;
        self
    }
}
