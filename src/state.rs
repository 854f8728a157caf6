//! Concrete and partial assignments, and the completion search.
//!
//! A [`PartialState`] holds the values that are actually known. Completing it
//! fills every unobserved mutable with its default, evaluates derived and
//! triggered variables in dependency order, and checks every numeric proxy.
//! When that default completion is contradictory, [`PartialState::find_consistent_state`]
//! searches for the first set of mutables to flip away from their defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::graph::VariableGraph;
use crate::variable::{VariableId, VariableKind};

/// A total assignment of every variable in a graph.
///
/// Instances returned by [`PartialState::to_concrete_state`] satisfy every
/// declared constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConcreteState {
    values: Vec<bool>,
}

impl ConcreteState {
    pub(crate) fn from_values(values: Vec<bool>) -> Self {
        Self { values }
    }

    /// Value of `variable`.
    ///
    /// # Panics
    ///
    /// Panics if `variable` does not belong to the graph this state was built from.
    #[must_use]
    pub fn get(&self, variable: VariableId) -> bool {
        self.values[variable.index()]
    }

    /// Number of variables covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(variable, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (VariableId, bool)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (VariableId::from_index(i), *v))
    }

    fn set(&mut self, variable: VariableId, value: bool) {
        self.values[variable.index()] = value;
    }
}

/// How recorded trigger values are reconciled with their predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriggerMode {
    /// A recorded `false` that should have fired is a contradiction; a
    /// recorded `true` is accepted even if the predicate no longer holds.
    #[default]
    Latching,

    /// Like `Latching`, except the named trigger must agree exactly with its
    /// predicate. Used when rebuilding the moment a latch fired.
    Exact(VariableId),
}

/// Two partial states disagreeing on a shared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeConflict {
    /// The contested variable.
    pub variable: VariableId,
    /// Value on the receiving side of the merge.
    pub left: bool,
    /// Value on the merged-in side.
    pub right: bool,
}

/// A set of known values over a variable graph.
#[derive(Clone)]
pub struct PartialState {
    graph: Arc<VariableGraph>,
    observed: BTreeMap<VariableId, bool>,
}

impl PartialState {
    /// An empty partial state: every variable takes its default.
    #[must_use]
    pub fn new(graph: Arc<VariableGraph>) -> Self {
        Self {
            graph,
            observed: BTreeMap::new(),
        }
    }

    /// A partial state with the given observations.
    #[must_use]
    pub fn with_observations(
        graph: Arc<VariableGraph>,
        observations: impl IntoIterator<Item = (VariableId, bool)>,
    ) -> Self {
        Self {
            graph,
            observed: observations.into_iter().collect(),
        }
    }

    /// The shared variable graph.
    #[must_use]
    pub fn graph(&self) -> &Arc<VariableGraph> {
        &self.graph
    }

    /// The known values.
    #[must_use]
    pub const fn observed_values(&self) -> &BTreeMap<VariableId, bool> {
        &self.observed
    }

    /// Observed value of `variable`, if any.
    #[must_use]
    pub fn get(&self, variable: VariableId) -> Option<bool> {
        self.observed.get(&variable).copied()
    }

    /// True if `variable` is known.
    #[must_use]
    pub fn contains(&self, variable: VariableId) -> bool {
        self.observed.contains_key(&variable)
    }

    /// Number of known values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observed.len()
    }

    /// True when nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    /// Records (or replaces) a known value.
    pub fn insert(&mut self, variable: VariableId, value: bool) {
        self.observed.insert(variable, value);
    }

    /// Forgets a known value.
    pub fn remove(&mut self, variable: VariableId) -> Option<bool> {
        self.observed.remove(&variable)
    }

    /// Keeps only the observations for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(VariableId, bool) -> bool) {
        self.observed.retain(|v, value| keep(*v, *value));
    }

    /// A copy with `variable` pinned to `value`.
    #[must_use]
    pub fn with_value(&self, variable: VariableId, value: bool) -> Self {
        let mut next = self.clone();
        next.insert(variable, value);
        next
    }

    /// Union of two partial states.
    ///
    /// Fails on the first shared variable the two disagree on.
    pub fn merge(&self, other: &Self) -> Result<Self, MergeConflict> {
        let mut merged = self.clone();
        for (variable, value) in &other.observed {
            match merged.observed.get(variable) {
                Some(existing) if existing != value => {
                    return Err(MergeConflict {
                        variable: *variable,
                        left: *existing,
                        right: *value,
                    });
                }
                Some(_) => {}
                None => {
                    merged.observed.insert(*variable, *value);
                }
            }
        }
        Ok(merged)
    }

    /// Default completion in latching mode.
    #[must_use]
    pub fn to_concrete_state(&self) -> Option<ConcreteState> {
        self.to_concrete_state_with(TriggerMode::Latching)
    }

    /// Completes the known values into a full assignment, or returns `None`
    /// if the default completion violates any constraint.
    #[must_use]
    pub fn to_concrete_state_with(&self, mode: TriggerMode) -> Option<ConcreteState> {
        let graph = &self.graph;
        let mut state = ConcreteState::from_values(
            graph
                .variables()
                .map(|v| {
                    self.get(v.id())
                        .or_else(|| v.default_value())
                        .unwrap_or(false)
                })
                .collect(),
        );

        for &id in graph.evaluation_order() {
            let variable = graph.variable(id)?;
            let recorded = self.get(id);
            let value = match variable.kind() {
                VariableKind::Mutable { .. } => continue,
                VariableKind::Derived { formula, .. } => {
                    let computed = formula(&state);
                    if recorded.is_some_and(|r| r != computed) {
                        return None;
                    }
                    computed
                }
                VariableKind::Triggered { predicate, .. } => {
                    let fires = predicate(&state);
                    match (recorded, mode) {
                        (Some(r), TriggerMode::Exact(focus)) if focus == id => {
                            if r != fires {
                                return None;
                            }
                            r
                        }
                        // A latch that should have fired cannot read false.
                        (Some(false), _) if fires => return None,
                        (Some(r), _) => r,
                        (None, _) => fires,
                    }
                }
            };
            state.set(id, value);
        }

        if graph.numerics().iter().all(|n| n.is_valid(&state)) {
            Some(state)
        } else {
            None
        }
    }

    /// True if the default completion (latching mode) is contradictory.
    #[must_use]
    pub fn is_default_contradictory(&self) -> bool {
        self.is_contradictory(TriggerMode::Latching)
    }

    /// True when no default completion exists under `mode`.
    #[must_use]
    pub fn is_contradictory(&self, mode: TriggerMode) -> bool {
        self.to_concrete_state_with(mode).is_none()
    }

    /// Latching-mode search over every unobserved mutable.
    #[must_use]
    pub fn find_consistent_state(&self) -> Option<Self> {
        self.find_consistent_state_with(TriggerMode::Latching)
    }

    /// Like `find_consistent_state`, under `mode`.
    #[must_use]
    pub fn find_consistent_state_with(&self, mode: TriggerMode) -> Option<Self> {
        let candidates: Vec<VariableId> = self
            .graph
            .mutables()
            .iter()
            .copied()
            .filter(|v| !self.contains(*v))
            .collect();
        self.search(&candidates, mode)
    }

    /// Like [`find_consistent_state_with`](Self::find_consistent_state_with),
    /// but only flips mutables inside `scope`.
    #[must_use]
    pub fn find_consistent_state_within(
        &self,
        mode: TriggerMode,
        scope: &BTreeSet<VariableId>,
    ) -> Option<Self> {
        let candidates: Vec<VariableId> = self
            .graph
            .mutables()
            .iter()
            .copied()
            .filter(|v| scope.contains(v) && !self.contains(*v))
            .collect();
        self.search(&candidates, mode)
    }

    fn search(&self, candidates: &[VariableId], mode: TriggerMode) -> Option<Self> {
        let found = self.search_from(candidates, 0, mode);
        match &found {
            Some(state) => tracing::trace!(
                pinned = state.len() - self.len(),
                "found consistent completion"
            ),
            None => tracing::trace!(candidates = candidates.len(), "no consistent completion"),
        }
        found
    }

    // Depth-first over subsets of flips, in declaration order. Each level only
    // extends with candidates after the last flip: any subset reachable by
    // flipping an earlier candidate later was already tried on an earlier
    // branch, so the first hit is the same as the unrestricted order.
    fn search_from(&self, candidates: &[VariableId], start: usize, mode: TriggerMode) -> Option<Self> {
        if !self.is_contradictory(mode) {
            return Some(self.clone());
        }
        for (offset, &variable) in candidates[start..].iter().enumerate() {
            let default = self.graph.default_value(variable).unwrap_or(false);
            let flipped = self.with_value(variable, !default);
            if let Some(found) = flipped.search_from(candidates, start + offset + 1, mode) {
                return Some(found);
            }
        }
        None
    }

    /// Observed value if present, otherwise the default completion's value.
    ///
    /// `None` if `variable` is unobserved and the state is contradictory.
    #[must_use]
    pub fn get_concrete_value(&self, variable: VariableId) -> Option<bool> {
        self.get(variable)
            .or_else(|| self.to_concrete_state().map(|s| s.get(variable)))
    }

    /// Multi-line `name = value` listing, in declaration order.
    #[must_use]
    pub fn inspect(&self) -> String {
        self.observed
            .iter()
            .map(|(v, value)| format!("{} = {value}", self.graph.name(*v)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Debug for PartialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.observed
                    .iter()
                    .map(|(v, value)| (self.graph.name(*v), value)),
            )
            .finish()
    }
}

impl PartialEq for PartialState {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.graph, &other.graph) && self.observed == other.observed
    }
}
