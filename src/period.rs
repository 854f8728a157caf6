//! Per-tick provenance ledgers.
//!
//! A [`TimePeriod`] never stores a full assignment. For each variable it tracks
//! what is actually known: the value locked in at the start of the period, the
//! value it holds now, the last value someone looked at, and whether it may have
//! drifted since either of those. Travel reads these ledgers to decide what a
//! departure carries and what an arrival already commits to.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::InvariantError;
use crate::graph::VariableGraph;
use crate::state::PartialState;
use crate::variable::VariableId;

/// Discrete, ordered moment in the world's timeline.
pub type Tick = i64;

/// What one period knows about one variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableLedger {
    /// Value the variable held when the period began, once known.
    pub start: Option<bool>,
    /// True if `start` was written by travel rather than observed.
    pub start_overridden: bool,
    /// Value the variable holds now, if known.
    pub current: Option<bool>,
    /// Last observed value.
    pub last_observed: Option<bool>,
    /// The variable may no longer hold its start value.
    pub modified_after_start: bool,
    /// The variable may no longer hold its last observed value.
    pub modified_since_observed: bool,
}

impl VariableLedger {
    fn peek(&self) -> Option<bool> {
        self.current
            .or(if self.modified_after_start { None } else { self.start })
    }

    // A modified mutable only counts as drift if it moved away from a known start.
    fn has_drifted(&self) -> bool {
        self.modified_after_start && (self.start.is_none() || self.current != self.start)
    }
}

/// Values known for a trigger's dependency closure when it fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Antecedent {
    /// `None` means the value was unknown at firing time.
    pub values: BTreeMap<VariableId, Option<bool>>,
}

impl Antecedent {
    /// The recorded values that were actually known.
    pub fn known(&self) -> impl Iterator<Item = (VariableId, bool)> + '_ {
        self.values
            .iter()
            .filter_map(|(v, value)| value.map(|value| (*v, value)))
    }
}

/// Knowledge about one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePeriod {
    tick: Tick,
    ledgers: Vec<VariableLedger>,
    antecedents: BTreeMap<VariableId, Antecedent>,
}

impl TimePeriod {
    /// A period that knows nothing yet.
    #[must_use]
    pub fn new(tick: Tick, graph: &VariableGraph) -> Self {
        Self {
            tick,
            ledgers: vec![VariableLedger::default(); graph.len()],
            antecedents: BTreeMap::new(),
        }
    }

    /// Tick this period starts at.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// The ledger of `variable`.
    #[must_use]
    pub fn ledger(&self, variable: VariableId) -> Option<&VariableLedger> {
        self.ledgers.get(variable.index())
    }

    /// Ledgers in declaration order.
    pub fn ledgers(&self) -> impl Iterator<Item = (VariableId, &VariableLedger)> {
        self.ledgers
            .iter()
            .enumerate()
            .map(|(i, l)| (VariableId::from_index(i), l))
    }

    /// What `trigger` saw when it fired here.
    #[must_use]
    pub fn antecedent(&self, trigger: VariableId) -> Option<&Antecedent> {
        self.antecedents.get(&trigger)
    }

    /// All recorded antecedents, by latch.
    #[must_use]
    pub const fn antecedents(&self) -> &BTreeMap<VariableId, Antecedent> {
        &self.antecedents
    }

    /// Records that `variable` was seen holding `value`.
    ///
    /// The first observation before any drift also locks the start value.
    pub fn variable_was_observed(&mut self, variable: VariableId, value: bool) {
        let Some(ledger) = self.ledgers.get_mut(variable.index()) else {
            return;
        };
        ledger.last_observed = Some(value);
        ledger.current = Some(value);
        if !ledger.modified_after_start && ledger.start.is_none() {
            ledger.start = Some(value);
        }
        ledger.modified_since_observed = false;
    }

    /// Records a write to `variable` and invalidates every derived dependent.
    pub fn variable_was_modified(&mut self, graph: &VariableGraph, variable: VariableId, value: bool) {
        let Some(ledger) = self.ledgers.get_mut(variable.index()) else {
            return;
        };
        ledger.current = Some(value);
        ledger.modified_after_start = true;
        ledger.modified_since_observed = true;

        for &dependent in graph.dependents(variable) {
            if !graph.variable(dependent).is_some_and(|v| v.is_derived()) {
                continue;
            }
            let drifted = graph
                .mutable_sources(dependent)
                .any(|m| self.ledgers[m.index()].has_drifted());
            let ledger = &mut self.ledgers[dependent.index()];
            ledger.current = None;
            ledger.modified_since_observed = true;
            ledger.modified_after_start = drifted;
        }
    }

    /// Latches `trigger`, recording what was known about its closure first.
    pub fn variable_was_triggered(&mut self, graph: &VariableGraph, trigger: VariableId) {
        let values = graph
            .closure(trigger)
            .into_iter()
            .flatten()
            .map(|v| (*v, self.peek_value(*v)))
            .collect();
        self.antecedents.insert(trigger, Antecedent { values });
        self.variable_was_modified(graph, trigger, true);
    }

    /// Best known value of `variable` right now, without any solving.
    #[must_use]
    pub fn peek_value(&self, variable: VariableId) -> Option<bool> {
        self.ledger(variable).and_then(VariableLedger::peek)
    }

    /// True if travel may still decide what `variable` started as.
    #[must_use]
    pub fn can_override_start(&self, variable: VariableId) -> bool {
        self.ledger(variable)
            .is_some_and(|l| l.start.is_none() && l.last_observed.is_none())
    }

    /// Fixes the start value of `variable` on behalf of an arriving traveller.
    ///
    /// Fails once the start is known or the variable has been observed.
    pub fn override_start_state(
        &mut self,
        graph: &VariableGraph,
        variable: VariableId,
        value: bool,
    ) -> Result<(), InvariantError> {
        let tick = self.tick;
        let Some(ledger) = self.ledgers.get_mut(variable.index()) else {
            return Ok(());
        };
        if ledger.start.is_some() || ledger.last_observed.is_some() {
            return Err(InvariantError::StartStateAlreadyFixed {
                tick,
                variable: graph.name(variable),
            });
        }
        ledger.start = Some(value);
        ledger.start_overridden = true;
        Ok(())
    }

    /// Values known to hold when the period is left.
    #[must_use]
    pub fn to_partial_end_state(&self, graph: &Arc<VariableGraph>) -> PartialState {
        self.collect(graph, |l| {
            if l.modified_since_observed {
                None
            } else {
                l.peek()
            }
        })
    }

    /// Values known to have held when the period began.
    #[must_use]
    pub fn to_partial_start_state(&self, graph: &Arc<VariableGraph>) -> PartialState {
        self.collect(graph, |l| l.start)
    }

    /// Everything currently known, drifted or not.
    #[must_use]
    pub fn to_partial_current_state(&self, graph: &Arc<VariableGraph>) -> PartialState {
        self.collect(graph, VariableLedger::peek)
    }

    fn collect(
        &self,
        graph: &Arc<VariableGraph>,
        pick: impl Fn(&VariableLedger) -> Option<bool>,
    ) -> PartialState {
        PartialState::with_observations(
            Arc::clone(graph),
            self.ledgers()
                .filter_map(|(v, l)| pick(l).map(|value| (v, value))),
        )
    }
}
