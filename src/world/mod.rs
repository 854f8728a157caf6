//! The world: reads, writes and travel over a timeline of periods.
//!
//! A [`World`] owns the variable graph and every [`TimePeriod`] visited so far.
//! All mutation of a period goes through [`World::get`], [`World::set`] and
//! [`World::travel_to`]; collaborators only ever see shared references.
//!
//! # Examples
//!
//! ```
//! use paradox::{VariableGraph, World};
//!
//! let mut builder = VariableGraph::builder();
//! let lever = builder.mutable("lever", true).unwrap();
//! let door = builder.derived("door", [lever], move |s| !s.get(lever)).unwrap();
//! let mut world = World::new(builder.build());
//!
//! assert!(!world.peek(door).unwrap());
//! world.set(lever, false).unwrap();
//! assert!(world.get(door).unwrap());
//! assert!(world.travel_to(-1).unwrap().is_arrived());
//! ```

mod travel;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{FutureReconciliation, WorldConfig};
use crate::error::{InvariantError, ParadoxError, ParadoxResult, ValidationError};
use crate::graph::VariableGraph;
use crate::period::{Tick, TimePeriod};
use crate::snapshot::WorldSnapshot;
use crate::variable::{Variable, VariableId};

pub use travel::{Refusal, TravelOutcome};

/// Unique identifier for a world, used to correlate log lines and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(Uuid);

impl WorldId {
    /// Creates a new random world ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a [`World::set`] call caused beyond the write itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetReport {
    /// Latches that fired, in declaration order.
    pub triggered: Vec<VariableId>,
    /// Later periods whose start state was reconciled with the change.
    pub reconciled: Vec<Tick>,
    /// First later period that could not be reconciled, if any.
    pub unreconciled: Option<Tick>,
}

impl SetReport {
    /// True if the change reached every existing later period.
    #[must_use]
    pub const fn is_fully_reconciled(&self) -> bool {
        self.unreconciled.is_none()
    }
}

/// A timeline of periods over one variable graph.
#[derive(Debug, Clone)]
pub struct World {
    id: WorldId,
    graph: Arc<VariableGraph>,
    config: WorldConfig,
    periods: BTreeMap<Tick, TimePeriod>,
    current: Tick,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new(graph: impl Into<Arc<VariableGraph>>) -> Self {
        Self::build(graph.into(), WorldConfig::default())
    }

    /// Creates a world with a validated configuration.
    pub fn with_config(
        graph: impl Into<Arc<VariableGraph>>,
        config: WorldConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self::build(graph.into(), config))
    }

    fn build(graph: Arc<VariableGraph>, config: WorldConfig) -> Self {
        let current = config.start_tick;
        let mut periods = BTreeMap::new();
        periods.insert(current, TimePeriod::new(current, &graph));
        let world = Self {
            id: WorldId::new(),
            graph,
            config,
            periods,
            current,
        };
        tracing::debug!(
            world = %world.id,
            variables = world.graph.len(),
            tick = current,
            "world created"
        );
        world
    }

    /// This world's id.
    #[must_use]
    pub const fn id(&self) -> WorldId {
        self.id
    }

    /// The shared variable graph.
    #[must_use]
    pub fn graph(&self) -> &Arc<VariableGraph> {
        &self.graph
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The tick the world is currently at.
    #[must_use]
    pub const fn current_time(&self) -> Tick {
        self.current
    }

    /// Knowledge about the current tick.
    #[must_use]
    pub fn current_period(&self) -> &TimePeriod {
        // The current tick always has a period: it is created before the pointer moves.
        &self.periods[&self.current]
    }

    /// The period starting at `tick`, if visited.
    #[must_use]
    pub fn period(&self, tick: Tick) -> Option<&TimePeriod> {
        self.periods.get(&tick)
    }

    /// Visited periods in tick order.
    pub fn periods(&self) -> impl Iterator<Item = &TimePeriod> {
        self.periods.values()
    }

    /// Serializable view of every period's ledgers.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self)
    }

    /// Value of `variable` now, without recording an observation.
    pub fn peek(&self, variable: VariableId) -> ParadoxResult<bool> {
        self.lookup(variable)?;
        self.resolve(self.current_period(), variable)
    }

    /// Value of `variable` now, recorded as observed.
    pub fn get(&mut self, variable: VariableId) -> ParadoxResult<bool> {
        let value = self.peek(variable)?;
        self.current_period_mut().variable_was_observed(variable, value);
        Ok(value)
    }

    /// Writes a mutable variable and fires any latch the write satisfies.
    ///
    /// # Errors
    ///
    /// Fails if `variable` is unknown or not mutable, if it is irreversible and
    /// the write would return it to its default, or if knowledge of the
    /// current period turns out to be contradictory.
    pub fn set(&mut self, variable: VariableId, value: bool) -> ParadoxResult<SetReport> {
        let declared = self.lookup(variable)?;
        if !declared.is_mutable() {
            return Err(ParadoxError::NotMutable {
                name: declared.name().to_string(),
            });
        }
        let reversible = declared.is_reversible();
        let default = declared.default_value().unwrap_or(false);

        let prior = self.peek(variable)?;
        if !reversible && prior != default && value == default {
            return Err(ParadoxError::IrreversibleChange {
                name: self.graph.name(variable),
            });
        }

        let graph = Arc::clone(&self.graph);
        let observe_prior = self.config.observe_prior_on_set;
        let observe_new = self.config.observe_new_on_set;
        let period = self.current_period_mut();
        if observe_prior {
            period.variable_was_observed(variable, prior);
        }
        period.variable_was_modified(&graph, variable, value);
        if observe_new {
            period.variable_was_observed(variable, value);
        }
        tracing::debug!(
            world = %self.id,
            tick = self.current,
            variable = %graph.name(variable),
            prior,
            value,
            "variable set"
        );

        let eager = self.config.future_reconciliation == FutureReconciliation::Eager;
        let mut report = SetReport::default();
        if !reversible && eager {
            self.reconcile_future(&mut report)?;
        }

        self.fire_triggers(variable, &mut report)?;

        let persistent_fired = report
            .triggered
            .iter()
            .any(|t| graph.variable(*t).is_some_and(Variable::is_persistent));
        if persistent_fired && eager {
            self.reconcile_future(&mut report)?;
        }
        Ok(report)
    }

    fn fire_triggers(&mut self, changed: VariableId, report: &mut SetReport) -> ParadoxResult<()> {
        let graph = Arc::clone(&self.graph);
        let latches: Vec<VariableId> = graph
            .dependents(changed)
            .iter()
            .copied()
            .filter(|v| graph.variable(*v).is_some_and(Variable::is_triggered))
            .collect();

        for &trigger in &latches {
            let period = self.current_period();
            if period.peek_value(trigger) == Some(true) {
                continue;
            }

            // Any latch the write may still fire is unknown until evaluated,
            // whatever it was last seen as.
            let mut knowledge = period.to_partial_current_state(&graph);
            for &latch in &latches {
                if period.peek_value(latch) != Some(true) {
                    knowledge.remove(latch);
                }
            }
            let state = knowledge
                .find_consistent_state()
                .and_then(|s| s.to_concrete_state())
                .ok_or_else(|| InvariantError::UnresolvableContradiction {
                    tick: self.current,
                    variable: graph.name(trigger),
                })?;

            if graph.should_trigger(trigger, &state) == Some(true) {
                self.current_period_mut()
                    .variable_was_triggered(&graph, trigger);
                tracing::info!(
                    world = %self.id,
                    tick = self.current,
                    trigger = %graph.name(trigger),
                    "latch fired"
                );
                report.triggered.push(trigger);
            }
        }
        Ok(())
    }

    fn lookup(&self, variable: VariableId) -> ParadoxResult<&Variable> {
        self.graph
            .variable(variable)
            .ok_or(ParadoxError::UnknownVariable { id: variable })
    }

    fn resolve(&self, period: &TimePeriod, variable: VariableId) -> ParadoxResult<bool> {
        if let Some(value) = period.peek_value(variable) {
            return Ok(value);
        }
        period
            .to_partial_current_state(&self.graph)
            .find_consistent_state()
            .and_then(|s| s.get_concrete_value(variable))
            .ok_or_else(|| {
                InvariantError::UnresolvableContradiction {
                    tick: period.tick(),
                    variable: self.graph.name(variable),
                }
                .into()
            })
    }

    fn current_period_mut(&mut self) -> &mut TimePeriod {
        let graph = &self.graph;
        self.periods
            .entry(self.current)
            .or_insert_with(|| TimePeriod::new(self.current, graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Levers {
        world: World,
        lever1: VariableId,
        lever2: VariableId,
        door_a: VariableId,
        door_b: VariableId,
        door_c: VariableId,
    }

    // Door A opens when lever 1 is pulled down, door B needs both levers up,
    // and the robot behind door C runs once door A has opened.
    fn robot_world() -> Levers {
        let mut b = VariableGraph::builder();
        let lever1 = b.mutable("lever1", true).unwrap();
        let lever2 = b.mutable("lever2", false).unwrap();
        let door_a = b.derived("doorAOpen", [lever1], move |s| !s.get(lever1)).unwrap();
        let door_b = b
            .derived("doorBOpen", [lever1, lever2], move |s| s.get(lever1) && s.get(lever2))
            .unwrap();
        let door_c = b.triggered("doorCOpen", [door_a], move |s| s.get(door_a)).unwrap();
        Levers {
            world: World::new(b.build()),
            lever1,
            lever2,
            door_a,
            door_b,
            door_c,
        }
    }

    #[test]
    fn get_records_observation_peek_does_not() {
        let Levers { mut world, door_a, .. } = robot_world();
        assert!(!world.peek(door_a).unwrap());
        assert_eq!(world.current_period().peek_value(door_a), None);
        assert!(!world.get(door_a).unwrap());
        assert_eq!(world.current_period().peek_value(door_a), Some(false));
    }

    #[test]
    fn set_rejects_derived_and_unknown_targets() {
        let Levers { mut world, door_a, .. } = robot_world();
        let err = world.set(door_a, true).unwrap_err();
        assert!(matches!(err, ParadoxError::NotMutable { .. }));

        let err = world.set(VariableId::from_index(99), true).unwrap_err();
        assert!(matches!(err, ParadoxError::UnknownVariable { .. }));
        assert!(world.peek(VariableId::from_index(99)).is_err());
    }

    #[test]
    fn setting_lever_fires_latch_once() {
        let Levers {
            mut world,
            lever1,
            lever2,
            door_a,
            door_b,
            door_c,
        } = robot_world();
        assert!(!world.get(door_c).unwrap());

        let report = world.set(lever1, false).unwrap();
        assert_eq!(report.triggered, vec![door_c]);
        assert!(world.get(door_a).unwrap());
        assert!(world.get(door_c).unwrap());

        world.set(lever2, true).unwrap();
        let report = world.set(lever1, true).unwrap();
        assert!(report.triggered.is_empty());
        assert!(!world.get(door_a).unwrap());
        assert!(world.get(door_c).unwrap());
        assert!(world.get(door_b).unwrap());
    }

    #[test]
    fn latches_sharing_a_door_both_fire() {
        let mut b = VariableGraph::builder();
        let lever = b.mutable("lever", true).unwrap();
        let door = b.derived("door", [lever], move |s| !s.get(lever)).unwrap();
        let robot_a = b.triggered("robotA", [door], move |s| s.get(door)).unwrap();
        let robot_b = b.triggered("robotB", [door], move |s| s.get(door)).unwrap();
        let mut world = World::new(b.build());

        assert!(!world.get(robot_a).unwrap());
        assert!(!world.get(robot_b).unwrap());

        let report = world.set(lever, false).unwrap();
        assert_eq!(report.triggered, vec![robot_a, robot_b]);
        assert!(world.get(robot_a).unwrap());
        assert!(world.get(robot_b).unwrap());
        assert!(world.get(door).unwrap());
    }

    #[test]
    fn irreversible_variable_cannot_return_to_default() {
        let mut b = VariableGraph::builder();
        let button = b.irreversible("button", false).unwrap();
        let mut world = World::new(b.build());

        world.set(button, true).unwrap();
        world.set(button, true).unwrap();
        let err = world.set(button, false).unwrap_err();
        assert_eq!(
            err,
            ParadoxError::IrreversibleChange {
                name: "button".to_string()
            }
        );
        assert!(err.is_usage());
    }

    #[test]
    fn config_start_tick_is_respected() {
        let mut b = VariableGraph::builder();
        b.mutable("lever", false).unwrap();
        let world = World::with_config(b.build(), WorldConfig::default().with_start_tick(5)).unwrap();
        assert_eq!(world.current_time(), 5);
        assert_eq!(world.current_period().tick(), 5);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let b = VariableGraph::builder();
        let config = WorldConfig {
            observe_new_on_set: false,
            ..WorldConfig::default()
        };
        assert!(World::with_config(b.build(), config).is_err());
    }
}
