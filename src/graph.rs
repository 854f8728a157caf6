//! The variable graph.
//!
//! A [`VariableGraph`] is declared once, at world-setup time, through a
//! [`VariableGraphBuilder`] and is immutable afterwards. Dependencies must be
//! declared before their dependents, which makes every graph acyclic by
//! construction and makes declaration order a valid evaluation order.
//!
//! # Examples
//!
//! ```
//! use paradox::VariableGraph;
//!
//! let mut builder = VariableGraph::builder();
//! let lever = builder.mutable("lever", true).unwrap();
//! let door = builder.derived("door", [lever], move |s| !s.get(lever)).unwrap();
//! let graph = builder.build();
//!
//! assert!(graph.is_dependent_on(door, lever));
//! assert_eq!(graph.by_name("door"), Some(door));
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::ValidationError;
use crate::numeric::{bit_count, encode, weighted_index, NumericVariableProxy};
use crate::state::ConcreteState;
use crate::variable::{Formula, Variable, VariableId, VariableKind};

/// Immutable declaration of every variable in a world.
#[derive(Debug, Clone)]
pub struct VariableGraph {
    variables: Vec<Variable>,
    names: HashMap<String, VariableId>,
    mutables: Vec<VariableId>,
    derived: Vec<VariableId>,
    triggered: Vec<VariableId>,
    evaluation_order: Vec<VariableId>,
    numerics: Vec<NumericVariableProxy>,
    dependents: Vec<Vec<VariableId>>,
}

impl VariableGraph {
    /// Starts an empty declaration.
    #[must_use]
    pub fn builder() -> VariableGraphBuilder {
        VariableGraphBuilder::default()
    }

    /// Number of declared variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True when nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// True if `id` was declared.
    #[must_use]
    pub fn contains(&self, id: VariableId) -> bool {
        id.index() < self.variables.len()
    }

    /// The declaration behind `id`.
    #[must_use]
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    /// Name of a variable, or its id rendering if it is not part of this graph.
    #[must_use]
    pub fn name(&self, id: VariableId) -> String {
        self.variable(id)
            .map_or_else(|| id.to_string(), |v| v.name().to_string())
    }

    /// Looks a variable up by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<VariableId> {
        self.names.get(name).copied()
    }

    /// All variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// All variable ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variables.iter().map(Variable::id)
    }

    /// Mutable ids, in declaration order.
    #[must_use]
    pub fn mutables(&self) -> &[VariableId] {
        &self.mutables
    }

    /// Derived ids, in declaration order.
    #[must_use]
    pub fn derived(&self) -> &[VariableId] {
        &self.derived
    }

    /// Latch ids, in declaration order.
    #[must_use]
    pub fn triggered(&self) -> &[VariableId] {
        &self.triggered
    }

    /// Declared numeric proxies.
    #[must_use]
    pub fn numerics(&self) -> &[NumericVariableProxy] {
        &self.numerics
    }

    /// Derived and triggered variables, dependencies first.
    #[must_use]
    pub fn evaluation_order(&self) -> &[VariableId] {
        &self.evaluation_order
    }

    /// True if `dependency` is in the transitive dependency closure of `dependent`.
    #[must_use]
    pub fn is_dependent_on(&self, dependent: VariableId, dependency: VariableId) -> bool {
        self.variable(dependent)
            .is_some_and(|v| v.is_dependent_on(dependency))
    }

    /// Every derived or triggered variable whose closure contains `id`,
    /// in declaration order.
    #[must_use]
    pub fn dependents(&self, id: VariableId) -> &[VariableId] {
        self.dependents.get(id.index()).map_or(&[][..], Vec::as_slice)
    }

    /// Transitive dependency closure of `id`.
    #[must_use]
    pub fn closure(&self, id: VariableId) -> Option<&BTreeSet<VariableId>> {
        self.variable(id).map(Variable::closure)
    }

    /// Mutable variables in the closure of `id`.
    pub fn mutable_sources(&self, id: VariableId) -> impl Iterator<Item = VariableId> + '_ {
        self.closure(id)
            .into_iter()
            .flatten()
            .copied()
            .filter(|dep| self.variable(*dep).is_some_and(Variable::is_mutable))
    }

    /// Default of a mutable; `None` otherwise.
    #[must_use]
    pub fn default_value(&self, id: VariableId) -> Option<bool> {
        self.variable(id).and_then(Variable::default_value)
    }

    /// Evaluates a derived variable against `state`.
    #[must_use]
    pub fn derive_value(&self, id: VariableId, state: &ConcreteState) -> Option<bool> {
        self.variable(id).and_then(|v| v.derive_value(state))
    }

    /// Evaluates a latch condition against `state`.
    #[must_use]
    pub fn should_trigger(&self, id: VariableId, state: &ConcreteState) -> Option<bool> {
        self.variable(id).and_then(|v| v.should_trigger(state))
    }
}

/// Declares the variables of a [`VariableGraph`].
///
/// Every declaration returns the new variable's id, which later declarations
/// use as a dependency and formulas use to read values.
#[derive(Default)]
pub struct VariableGraphBuilder {
    variables: Vec<Variable>,
    names: HashMap<String, VariableId>,
    numerics: Vec<NumericVariableProxy>,
}

impl VariableGraphBuilder {
    /// Declares a reversible mutable variable.
    pub fn mutable(&mut self, name: impl Into<String>, default: bool) -> Result<VariableId, ValidationError> {
        self.push(
            name.into(),
            VariableKind::Mutable {
                default,
                reversible: true,
            },
        )
    }

    /// Declares a mutable variable that can never return to `default` once changed.
    pub fn irreversible(
        &mut self,
        name: impl Into<String>,
        default: bool,
    ) -> Result<VariableId, ValidationError> {
        self.push(
            name.into(),
            VariableKind::Mutable {
                default,
                reversible: false,
            },
        )
    }

    /// Declares a derived variable.
    pub fn derived<F>(
        &mut self,
        name: impl Into<String>,
        dependencies: impl IntoIterator<Item = VariableId>,
        formula: F,
    ) -> Result<VariableId, ValidationError>
    where
        F: Fn(&ConcreteState) -> bool + Send + Sync + 'static,
    {
        let formula: Formula = Arc::new(formula);
        self.push(
            name.into(),
            VariableKind::Derived {
                dependencies: dependencies.into_iter().collect(),
                formula,
            },
        )
    }

    /// Declares a non-persistent latch.
    pub fn triggered<F>(
        &mut self,
        name: impl Into<String>,
        dependencies: impl IntoIterator<Item = VariableId>,
        predicate: F,
    ) -> Result<VariableId, ValidationError>
    where
        F: Fn(&ConcreteState) -> bool + Send + Sync + 'static,
    {
        self.push_trigger(name.into(), dependencies, Arc::new(predicate), false)
    }

    /// Declares a persistent latch: an irrevocable story event.
    pub fn persistent_trigger<F>(
        &mut self,
        name: impl Into<String>,
        dependencies: impl IntoIterator<Item = VariableId>,
        predicate: F,
    ) -> Result<VariableId, ValidationError>
    where
        F: Fn(&ConcreteState) -> bool + Send + Sync + 'static,
    {
        self.push_trigger(name.into(), dependencies, Arc::new(predicate), true)
    }

    /// Declares a numeric value in `0..=max_value`, starting at `starting_value`.
    ///
    /// The bits are declared as reversible mutables named `name[i]`.
    pub fn numeric(
        &mut self,
        name: impl Into<String>,
        starting_value: u64,
        max_value: u64,
    ) -> Result<NumericVariableProxy, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyVariableName);
        }
        if starting_value > max_value {
            return Err(ValidationError::NumericOutOfRange {
                name,
                starting_value,
                max_value,
            });
        }

        let width = bit_count(max_value);
        let bit_names: Vec<String> = (0..width).map(|i| format!("{name}[{i}]")).collect();
        if let Some(taken) = bit_names.iter().find(|n| self.names.contains_key(*n)) {
            return Err(ValidationError::DuplicateVariable {
                name: taken.clone(),
            });
        }

        let mut bits = Vec::with_capacity(width);
        for (bit_name, default) in bit_names.into_iter().zip(encode(starting_value, width)) {
            bits.push(self.mutable(bit_name, default)?);
        }

        let proxy = NumericVariableProxy::new(name, bits, starting_value, max_value);
        self.numerics.push(proxy.clone());
        Ok(proxy)
    }

    /// Declares a numeric value whose starting value is drawn from `weights`.
    ///
    /// `max_value` is `weights.len() - 1`; `roll` picks the starting value
    /// deterministically (see [`weighted_index`]).
    pub fn weighted_numeric(
        &mut self,
        name: impl Into<String>,
        weights: &[u32],
        roll: u64,
    ) -> Result<NumericVariableProxy, ValidationError> {
        let name = name.into();
        let Some(starting) = weighted_index(weights, roll) else {
            return Err(ValidationError::EmptyWeights { name });
        };
        self.numeric(name, starting as u64, (weights.len() - 1) as u64)
    }

    /// Finishes the graph, building the typed sub-lists and the
    /// reverse-dependency index.
    #[must_use]
    pub fn build(self) -> VariableGraph {
        let mut mutables = Vec::new();
        let mut derived = Vec::new();
        let mut triggered = Vec::new();
        let mut evaluation_order = Vec::new();
        let mut dependents = vec![Vec::new(); self.variables.len()];

        for variable in &self.variables {
            match variable.kind() {
                VariableKind::Mutable { .. } => mutables.push(variable.id()),
                VariableKind::Derived { .. } => {
                    derived.push(variable.id());
                    evaluation_order.push(variable.id());
                }
                VariableKind::Triggered { .. } => {
                    triggered.push(variable.id());
                    evaluation_order.push(variable.id());
                }
            }
            for dependency in variable.closure() {
                dependents[dependency.index()].push(variable.id());
            }
        }

        VariableGraph {
            variables: self.variables,
            names: self.names,
            mutables,
            derived,
            triggered,
            evaluation_order,
            numerics: self.numerics,
            dependents,
        }
    }

    fn push_trigger(
        &mut self,
        name: String,
        dependencies: impl IntoIterator<Item = VariableId>,
        predicate: Formula,
        persistent: bool,
    ) -> Result<VariableId, ValidationError> {
        self.push(
            name,
            VariableKind::Triggered {
                dependencies: dependencies.into_iter().collect(),
                predicate,
                persistent,
            },
        )
    }

    fn push(&mut self, name: String, kind: VariableKind) -> Result<VariableId, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyVariableName);
        }
        if self.names.contains_key(&name) {
            return Err(ValidationError::DuplicateVariable { name });
        }

        let id = VariableId::from_index(self.variables.len());
        let mut closure = BTreeSet::new();
        for dependency in dependency_list(&kind) {
            let Some(declared) = self.variables.get(dependency.index()) else {
                return Err(ValidationError::UnknownDependency {
                    name,
                    dependency: *dependency,
                });
            };
            closure.insert(*dependency);
            closure.extend(declared.closure().iter().copied());
        }

        self.names.insert(name.clone(), id);
        self.variables.push(Variable::new(id, name, kind, closure));
        Ok(id)
    }
}

fn dependency_list(kind: &VariableKind) -> &[VariableId] {
    match kind {
        VariableKind::Mutable { .. } => &[],
        VariableKind::Derived { dependencies, .. }
        | VariableKind::Triggered { dependencies, .. } => dependencies,
    }
}
