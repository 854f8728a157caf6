//! Variable declarations.
//!
//! A variable is an immutable, named node of the world's constraint graph.
//! Only its *value in a given period* ever changes; the declaration itself is
//! fixed once the graph is built.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state::ConcreteState;

/// Stable identifier of a variable within one [`VariableGraph`](crate::VariableGraph).
///
/// Identifiers are handed out in declaration order, so comparing two ids
/// compares declaration positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(u32);

impl VariableId {
    pub(crate) fn from_index(index: usize) -> Self {
        // Graphs are puzzle-sized; u32 is never exceeded in practice.
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Position of the variable in declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pure boolean function over a complete assignment.
pub type Formula = Arc<dyn Fn(&ConcreteState) -> bool + Send + Sync>;

/// The kind of a variable and its kind-specific data.
#[derive(Clone)]
pub enum VariableKind {
    /// A source of truth the caller may write.
    Mutable {
        /// Assumed value when nothing else is known.
        default: bool,
        /// Non-reversible variables can never return to their default once changed.
        reversible: bool,
    },

    /// A value fully determined by other variables.
    Derived {
        /// Direct dependencies, in the order they were declared on this variable.
        dependencies: Vec<VariableId>,
        /// Value of the variable given a complete assignment.
        formula: Formula,
    },

    /// A one-way latch that becomes true when its predicate holds.
    Triggered {
        /// Direct dependencies.
        dependencies: Vec<VariableId>,
        /// Firing condition.
        predicate: Formula,
        /// Persistent latches are irrevocable story events.
        persistent: bool,
    },
}

impl fmt::Debug for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutable {
                default,
                reversible,
            } => f
                .debug_struct("Mutable")
                .field("default", default)
                .field("reversible", reversible)
                .finish(),
            Self::Derived { dependencies, .. } => f
                .debug_struct("Derived")
                .field("dependencies", dependencies)
                .finish_non_exhaustive(),
            Self::Triggered {
                dependencies,
                persistent,
                ..
            } => f
                .debug_struct("Triggered")
                .field("dependencies", dependencies)
                .field("persistent", persistent)
                .finish_non_exhaustive(),
        }
    }
}

/// A declared variable.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    name: String,
    kind: VariableKind,
    closure: BTreeSet<VariableId>,
}

impl Variable {
    pub(crate) fn new(
        id: VariableId,
        name: String,
        kind: VariableKind,
        closure: BTreeSet<VariableId>,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            closure,
        }
    }

    /// Declaration-order id.
    #[must_use]
    pub const fn id(&self) -> VariableId {
        self.id
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the value is produced.
    #[must_use]
    pub const fn kind(&self) -> &VariableKind {
        &self.kind
    }

    /// True for player-settable variables.
    #[must_use]
    pub const fn is_mutable(&self) -> bool {
        matches!(self.kind, VariableKind::Mutable { .. })
    }

    /// True for formula-backed variables.
    #[must_use]
    pub const fn is_derived(&self) -> bool {
        matches!(self.kind, VariableKind::Derived { .. })
    }

    /// True for latches.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        matches!(self.kind, VariableKind::Triggered { .. })
    }

    /// Default value of a mutable variable; `None` for every other kind.
    #[must_use]
    pub const fn default_value(&self) -> Option<bool> {
        match self.kind {
            VariableKind::Mutable { default, .. } => Some(default),
            _ => None,
        }
    }

    /// Only mutable variables can be irreversible.
    #[must_use]
    pub const fn is_reversible(&self) -> bool {
        match self.kind {
            VariableKind::Mutable { reversible, .. } => reversible,
            _ => true,
        }
    }

    /// True for latches that survive forward travel.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        matches!(self.kind, VariableKind::Triggered { persistent: true, .. })
    }

    /// Direct dependencies; empty for mutable variables.
    #[must_use]
    pub fn dependencies(&self) -> &[VariableId] {
        match &self.kind {
            VariableKind::Mutable { .. } => &[],
            VariableKind::Derived { dependencies, .. }
            | VariableKind::Triggered { dependencies, .. } => dependencies,
        }
    }

    /// Every variable this one depends on, directly or through other
    /// derived/triggered variables.
    #[must_use]
    pub const fn closure(&self) -> &BTreeSet<VariableId> {
        &self.closure
    }

    /// True if `other` is a direct dependency or a dependency of a dependency.
    #[must_use]
    pub fn is_dependent_on(&self, other: VariableId) -> bool {
        self.closure.contains(&other)
    }

    /// Evaluates a derived variable's formula. `None` for other kinds.
    #[must_use]
    pub fn derive_value(&self, state: &ConcreteState) -> Option<bool> {
        match &self.kind {
            VariableKind::Derived { formula, .. } => Some(formula(state)),
            _ => None,
        }
    }

    /// Evaluates a triggered variable's predicate. `None` for other kinds.
    #[must_use]
    pub fn should_trigger(&self, state: &ConcreteState) -> Option<bool> {
        match &self.kind {
            VariableKind::Triggered { predicate, .. } => Some(predicate(state)),
            _ => None,
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for Variable {}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
