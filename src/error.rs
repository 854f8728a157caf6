//! Error types for paradox.
//!
//! All errors are strongly typed using thiserror. Travel refusals are not
//! errors: they are ordinary puzzle feedback and are reported through
//! [`TravelOutcome`](crate::world::TravelOutcome). Everything here is either
//! bad input or a violated engine invariant.

use thiserror::Error;

use crate::period::Tick;
use crate::variable::VariableId;

/// Validation errors raised while declaring variables or loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Variable name cannot be empty")]
    EmptyVariableName,

    #[error("Variable '{name}' is declared more than once")]
    DuplicateVariable {
        name: String,
    },

    #[error("Variable '{name}' depends on {dependency}, which is not declared in this graph")]
    UnknownDependency {
        name: String,
        dependency: VariableId,
    },

    #[error("Numeric variable '{name}' starts at {starting_value}, above its maximum {max_value}")]
    NumericOutOfRange {
        name: String,
        starting_value: u64,
        max_value: u64,
    },

    #[error("Numeric variable '{name}' needs at least one non-zero weight")]
    EmptyWeights {
        name: String,
    },

    #[error("Invalid world configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Travel booth needs at least one allowed tick")]
    EmptyTravelSchedule,
}

/// Violated engine invariants.
///
/// These are never puzzle outcomes. Each one means the engine reached a state
/// that earlier write- or travel-time checks should have made impossible, and
/// the operation is aborted rather than continuing on corrupt knowledge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("internal invariant violated: knowledge at tick {tick} is contradictory while resolving '{variable}'")]
    UnresolvableContradiction {
        tick: Tick,
        variable: String,
    },

    #[error("internal invariant violated: start state of '{variable}' at tick {tick} is already fixed")]
    StartStateAlreadyFixed {
        tick: Tick,
        variable: String,
    },

    #[error("internal invariant violated: antecedent of '{trigger}' at tick {tick} cannot be reconciled: {reason}")]
    AntecedentReconciliation {
        tick: Tick,
        trigger: String,
        reason: String,
    },
}

/// Top-level error type for paradox.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParadoxError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Invariant(#[from] InvariantError),

    #[error("Unknown variable: {id}")]
    UnknownVariable {
        id: VariableId,
    },

    #[error("Variable '{name}' is not mutable")]
    NotMutable {
        name: String,
    },

    #[error("Variable '{name}' is irreversible and cannot return to its default")]
    IrreversibleChange {
        name: String,
    },
}

impl ParadoxError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a violated engine invariant.
    #[must_use]
    pub const fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Returns true if the caller asked for something the world forbids
    /// (unknown, derived or irreversible target).
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::UnknownVariable { .. } | Self::NotMutable { .. } | Self::IrreversibleChange { .. }
        )
    }
}

/// Result type alias for paradox operations.
pub type ParadoxResult<T> = Result<T, ParadoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_duplicate() {
        let err = ValidationError::DuplicateVariable {
            name: "lever1".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("lever1"));
        assert!(msg.contains("more than once"));
    }

    #[test]
    fn test_validation_error_numeric_range() {
        let err = ValidationError::NumericOutOfRange {
            name: "dial".to_string(),
            starting_value: 9,
            max_value: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains('9'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_invariant_errors_are_labeled_internal() {
        let errors = [
            InvariantError::UnresolvableContradiction {
                tick: 0,
                variable: "door".to_string(),
            },
            InvariantError::StartStateAlreadyFixed {
                tick: -1,
                variable: "lever".to_string(),
            },
            InvariantError::AntecedentReconciliation {
                tick: 2,
                trigger: "robot".to_string(),
                reason: "start fixed".to_string(),
            },
        ];
        for err in errors {
            assert!(format!("{err}").starts_with("internal invariant violated"));
        }
    }

    #[test]
    fn test_paradox_error_from_validation() {
        let err: ParadoxError = ValidationError::EmptyVariableName.into();
        assert!(err.is_validation());
        assert!(!err.is_invariant());
        assert!(!err.is_usage());
    }

    #[test]
    fn test_paradox_error_from_invariant() {
        let err: ParadoxError = InvariantError::StartStateAlreadyFixed {
            tick: 0,
            variable: "x".to_string(),
        }
        .into();
        assert!(err.is_invariant());
        assert!(format!("{err}").contains("already fixed"));
    }

    #[test]
    fn test_paradox_error_usage() {
        let err = ParadoxError::NotMutable {
            name: "door".to_string(),
        };
        assert!(err.is_usage());
        assert!(format!("{err}").contains("not mutable"));
    }
}
