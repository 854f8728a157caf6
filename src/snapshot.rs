//! Serializable views of a world's timeline.
//!
//! Snapshots are read-only debugging and tooling output. They name variables
//! rather than exposing ids so they stay readable on their own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::period::{Tick, TimePeriod, VariableLedger};
use crate::world::{World, WorldId};

/// One variable's ledger in a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Variable name.
    pub name: String,
    /// Value at the start of the period.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<bool>,
    /// Latest known value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<bool>,
    /// Value the player last saw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observed: Option<bool>,
    /// Start was fixed by travel.
    pub start_overridden: bool,
    /// Changed since the period began.
    pub modified_after_start: bool,
    /// Changed since last observed.
    pub modified_since_observed: bool,
}

/// Everything one period knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    /// Tick this period starts at.
    pub tick: Tick,
    /// Ledgers in declaration order.
    pub variables: Vec<LedgerSnapshot>,
    /// Latch name to the values recorded for its closure when it fired.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub antecedents: BTreeMap<String, BTreeMap<String, Option<bool>>>,
}

/// Every visited period, in tick order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// World the snapshot was taken from.
    pub world_id: WorldId,
    /// Tick the world was at when captured.
    pub current_tick: Tick,
    /// Visited periods, earliest first.
    pub periods: Vec<PeriodSnapshot>,
}

impl WorldSnapshot {
    pub(crate) fn capture(world: &World) -> Self {
        Self {
            world_id: world.id(),
            current_tick: world.current_time(),
            periods: world
                .periods()
                .map(|period| PeriodSnapshot::capture(world, period))
                .collect(),
        }
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// The period starting at `tick`, if visited.
    #[must_use]
    pub fn period(&self, tick: Tick) -> Option<&PeriodSnapshot> {
        self.periods.iter().find(|p| p.tick == tick)
    }
}

impl PeriodSnapshot {
    fn capture(world: &World, period: &TimePeriod) -> Self {
        let graph = world.graph();
        Self {
            tick: period.tick(),
            variables: period
                .ledgers()
                .map(|(id, ledger)| LedgerSnapshot::from_ledger(graph.name(id), ledger))
                .collect(),
            antecedents: period
                .antecedents()
                .iter()
                .map(|(trigger, antecedent)| {
                    let values = antecedent
                        .values
                        .iter()
                        .map(|(v, value)| (graph.name(*v), *value))
                        .collect();
                    (graph.name(*trigger), values)
                })
                .collect(),
        }
    }

    /// The ledger of the variable called `name`.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&LedgerSnapshot> {
        self.variables.iter().find(|l| l.name == name)
    }
}

impl LedgerSnapshot {
    fn from_ledger(name: String, ledger: &VariableLedger) -> Self {
        Self {
            name,
            start: ledger.start,
            current: ledger.current,
            last_observed: ledger.last_observed,
            start_overridden: ledger.start_overridden,
            modified_after_start: ledger.modified_after_start,
            modified_since_observed: ledger.modified_since_observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VariableGraph;

    #[test]
    fn snapshot_lists_periods_and_latches() {
        let mut b = VariableGraph::builder();
        let lever = b.mutable("lever", true).unwrap();
        let robot = b.triggered("robot", [lever], move |s| !s.get(lever)).unwrap();
        let mut world = World::new(b.build());

        world.set(lever, false).unwrap();
        world.travel_to(-2).unwrap();

        let snapshot = world.snapshot();
        assert_eq!(snapshot.current_tick, -2);
        assert_eq!(snapshot.periods.len(), 2);
        assert_eq!(snapshot.periods[0].tick, -2);

        let now = snapshot.period(0).unwrap();
        let lever_ledger = now.variable("lever").unwrap();
        assert_eq!(lever_ledger.start, Some(true));
        assert_eq!(lever_ledger.current, Some(false));
        assert_eq!(now.variable("robot").unwrap().current, Some(true));
        assert_eq!(now.antecedents["robot"]["lever"], Some(false));
        assert_eq!(world.period(0).unwrap().peek_value(robot), Some(true));
    }

    #[test]
    fn snapshot_json_names_variables() {
        let mut b = VariableGraph::builder();
        let lever = b.mutable("lever", true).unwrap();
        let mut world = World::new(b.build());
        world.get(lever).unwrap();

        let json = world.snapshot().to_json().unwrap();
        let decoded: WorldSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.world_id, world.id());
        assert!(json.contains("\"name\": \"lever\""));
        assert!(!json.contains("antecedents"));
    }
}
