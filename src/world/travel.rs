//! Time travel and reconciliation.
//!
//! Moving forward merges what the departing period knows at its end with what
//! the destination already knows about its start, searches for a consistent
//! completion, and patches the destination's open start values to match.
//! Latches recorded at the destination are then replayed against their
//! antecedents so history that was already witnessed stays explainable.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{SetReport, World};
use crate::error::{InvariantError, ParadoxResult};
use crate::period::{Tick, TimePeriod};
use crate::state::{ConcreteState, PartialState, TriggerMode};
use crate::variable::{Variable, VariableId};

/// Why a forward travel was refused.
///
/// Refusals are puzzle feedback, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Refusal {
    /// The departure and the destination disagree on a known value.
    DirectContradiction {
        /// First shared variable the two sides disagree on.
        variable: VariableId,
    },
    /// No assignment of the open variables satisfies every constraint.
    LogicalContradiction,
    /// A latch already witnessed at the destination could no longer have fired.
    AntecedentContradiction {
        /// The latch whose firing can no longer be explained.
        trigger: VariableId,
    },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectContradiction { variable } => {
                write!(f, "direct contradiction on {variable}")
            }
            Self::LogicalContradiction => f.write_str("logical contradiction"),
            Self::AntecedentContradiction { trigger } => {
                write!(f, "latch {trigger} could not have fired")
            }
        }
    }
}

/// Result of a travel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TravelOutcome {
    /// The world is now at `tick`.
    Arrived {
        /// Destination tick.
        tick: Tick,
    },
    /// The world stayed where it was.
    Refused(Refusal),
}

impl TravelOutcome {
    /// True if the travel happened.
    #[must_use]
    pub const fn is_arrived(&self) -> bool {
        matches!(self, Self::Arrived { .. })
    }

    /// The refusal, if refused.
    #[must_use]
    pub const fn refusal(&self) -> Option<Refusal> {
        match self {
            Self::Arrived { .. } => None,
            Self::Refused(refusal) => Some(*refusal),
        }
    }
}

/// Start-state writes needed to make one period follow from another.
struct TravelPlan {
    destination: Tick,
    start_patch: BTreeMap<VariableId, bool>,
    resolved: ConcreteState,
}

enum Planned {
    Ready(TravelPlan),
    Refused(Refusal),
}

impl World {
    /// True if [`travel_to`](Self::travel_to) would arrive. Changes nothing.
    pub fn can_travel_to(&self, tick: Tick) -> ParadoxResult<bool> {
        if tick <= self.current {
            return Ok(true);
        }
        Ok(matches!(self.plan(self.current, tick)?, Planned::Ready(_)))
    }

    /// Moves the world to `tick`.
    ///
    /// Travel backwards always arrives. Travel forwards arrives only if the
    /// current period's end can lead to what the destination already knows.
    pub fn travel_to(&mut self, tick: Tick) -> ParadoxResult<TravelOutcome> {
        if tick == self.current {
            return Ok(TravelOutcome::Arrived { tick });
        }

        if tick < self.current {
            let graph = &self.graph;
            self.periods
                .entry(tick)
                .or_insert_with(|| TimePeriod::new(tick, graph));
            tracing::info!(world = %self.id, from = self.current, tick, "travelled back");
            self.current = tick;
            return Ok(TravelOutcome::Arrived { tick });
        }

        match self.plan(self.current, tick)? {
            Planned::Refused(refusal) => {
                tracing::info!(world = %self.id, from = self.current, tick, %refusal, "travel refused");
                Ok(TravelOutcome::Refused(refusal))
            }
            Planned::Ready(plan) => {
                self.commit(&plan)?;
                tracing::info!(
                    world = %self.id,
                    from = self.current,
                    tick,
                    patched = plan.start_patch.len(),
                    "travelled forward"
                );
                self.current = tick;
                Ok(TravelOutcome::Arrived { tick })
            }
        }
    }

    /// Knowledge that leaves `period`: its end state with non-persistent
    /// latches dropped and known-true persistent latches kept.
    fn departure_state(&self, period: &TimePeriod) -> PartialState {
        let graph = &self.graph;
        let mut departure = period.to_partial_end_state(graph);
        departure.retain(|v, _| !graph.variable(v).is_some_and(Variable::is_triggered));
        for &trigger in graph.triggered() {
            let persistent = graph.variable(trigger).is_some_and(Variable::is_persistent);
            if persistent && period.peek_value(trigger) == Some(true) {
                departure.insert(trigger, true);
            }
        }
        departure
    }

    fn plan(&self, from: Tick, to: Tick) -> ParadoxResult<Planned> {
        let graph = &self.graph;
        let Some(origin) = self.periods.get(&from) else {
            return Ok(Planned::Refused(Refusal::LogicalContradiction));
        };
        let fresh;
        let destination = match self.periods.get(&to) {
            Some(period) => period,
            None => {
                fresh = TimePeriod::new(to, graph);
                &fresh
            }
        };

        let arrival = destination.to_partial_start_state(graph);
        let merged = match self.departure_state(origin).merge(&arrival) {
            Ok(merged) => merged,
            Err(conflict) => {
                tracing::debug!(
                    from,
                    to,
                    variable = %graph.name(conflict.variable),
                    "departure disagrees with arrival"
                );
                return Ok(Planned::Refused(Refusal::DirectContradiction {
                    variable: conflict.variable,
                }));
            }
        };

        let Some(resolved) = merged.find_consistent_state() else {
            tracing::debug!(from, to, "no consistent arrival state");
            return Ok(Planned::Refused(Refusal::LogicalContradiction));
        };
        let resolved_state = resolved.to_concrete_state().ok_or_else(|| {
            InvariantError::UnresolvableContradiction {
                tick: to,
                variable: "<arrival>".to_string(),
            }
        })?;

        // What the destination would assume about its start on its own.
        let baseline = arrival
            .find_consistent_state()
            .and_then(|s| s.to_concrete_state());

        let mut start_patch = BTreeMap::new();
        for id in graph.ids() {
            let value = resolved_state.get(id);
            let differs = baseline.as_ref().map_or(true, |b| b.get(id) != value);
            if differs && destination.can_override_start(id) {
                start_patch.insert(id, value);
            }
        }

        let mut fixed = resolved;
        for (id, value) in &start_patch {
            fixed.insert(*id, *value);
        }

        for (&trigger, antecedent) in destination.antecedents() {
            let Some(scope) = graph.closure(trigger) else {
                continue;
            };
            let mut hypothesis = fixed.clone();
            hypothesis.retain(|v, _| scope.contains(&v));
            for (v, value) in antecedent.known() {
                hypothesis.insert(v, value);
            }
            hypothesis.insert(trigger, true);

            let mode = TriggerMode::Exact(trigger);
            if !hypothesis.is_contradictory(mode) {
                continue;
            }
            let Some(explained) = hypothesis.find_consistent_state_within(mode, scope) else {
                tracing::debug!(
                    from,
                    to,
                    trigger = %graph.name(trigger),
                    "latch antecedent cannot be replayed"
                );
                return Ok(Planned::Refused(Refusal::AntecedentContradiction { trigger }));
            };

            for (&v, &value) in explained.observed_values() {
                if hypothesis.contains(v) {
                    continue;
                }
                if destination.can_override_start(v) {
                    start_patch.insert(v, value);
                    fixed.insert(v, value);
                } else if destination.ledger(v).and_then(|l| l.start) != Some(value) {
                    return Err(InvariantError::AntecedentReconciliation {
                        tick: to,
                        trigger: graph.name(trigger),
                        reason: format!("start of '{}' is already fixed", graph.name(v)),
                    }
                    .into());
                }
            }
        }

        Ok(Planned::Ready(TravelPlan {
            destination: to,
            start_patch,
            resolved: resolved_state,
        }))
    }

    fn commit(&mut self, plan: &TravelPlan) -> ParadoxResult<()> {
        let graph = &self.graph;
        let period = self
            .periods
            .entry(plan.destination)
            .or_insert_with(|| TimePeriod::new(plan.destination, graph));
        for (&variable, &value) in &plan.start_patch {
            period.override_start_state(graph, variable, value)?;
        }
        Ok(())
    }

    /// Propagates the current period's knowledge to every later period that
    /// already exists, stopping at the first one that refuses.
    pub(super) fn reconcile_future(&mut self, report: &mut SetReport) -> ParadoxResult<()> {
        let later: Vec<Tick> = self
            .periods
            .range((Excluded(self.current), Unbounded))
            .map(|(tick, _)| *tick)
            .collect();

        let mut from = self.current;
        for to in later {
            match self.plan(from, to)? {
                Planned::Refused(refusal) => {
                    tracing::warn!(
                        world = %self.id,
                        from,
                        to,
                        %refusal,
                        "future period cannot be reconciled"
                    );
                    report.unreconciled = Some(to);
                    return Ok(());
                }
                Planned::Ready(plan) => {
                    if from == self.current {
                        let Some(pins) = self.current_start_pins(&plan.resolved) else {
                            tracing::warn!(
                                world = %self.id,
                                from,
                                to,
                                "future period contradicts what is known now"
                            );
                            report.unreconciled = Some(to);
                            return Ok(());
                        };
                        let graph = Arc::clone(&self.graph);
                        let period = self.current_period_mut();
                        for (mutable, value) in pins {
                            period.override_start_state(&graph, mutable, value)?;
                        }
                    }
                    self.commit(&plan)?;
                    report.reconciled.push(to);
                }
            }
            from = to;
        }
        Ok(())
    }

    // Untouched mutables of the current period held their start value all
    // along, so whatever the next period needed them to be, they started as.
    // `None` when those values contradict what the current period has seen.
    fn current_start_pins(&self, resolved: &ConcreteState) -> Option<BTreeMap<VariableId, bool>> {
        let graph = &self.graph;
        let period = self.current_period();
        let knowledge = period.to_partial_current_state(graph);
        let baseline = knowledge
            .find_consistent_state()
            .and_then(|s| s.to_concrete_state());

        let pins: BTreeMap<VariableId, bool> = graph
            .mutables()
            .iter()
            .filter(|m| period.ledger(**m).is_some_and(|l| !l.modified_after_start))
            .filter(|m| period.can_override_start(**m))
            .map(|m| (*m, resolved.get(*m)))
            .filter(|(m, value)| baseline.as_ref().map_or(true, |b| b.get(*m) != *value))
            .collect();

        let mut pinned = knowledge;
        for (&mutable, &value) in &pins {
            pinned.insert(mutable, value);
        }
        pinned.find_consistent_state().map(|_| pins)
    }
}
