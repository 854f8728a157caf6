use std::collections::BTreeMap;
use std::sync::Arc;

use paradox::{ConcreteState, PartialState, VariableGraph, VariableId, World};
use proptest::prelude::*;

/// Formula shape; operands index into the variables declared so far.
#[derive(Debug, Clone, Copy)]
enum Op {
    And(usize, usize),
    Or(usize, usize),
    Xor(usize, usize),
    Not(usize),
}

#[derive(Debug, Clone, Copy)]
enum Expr {
    And(VariableId, VariableId),
    Or(VariableId, VariableId),
    Xor(VariableId, VariableId),
    Not(VariableId),
}

impl Expr {
    fn resolve(op: Op, declared: &[VariableId]) -> Self {
        let pick = |i: usize| declared[i % declared.len()];
        match op {
            Op::And(a, b) => Self::And(pick(a), pick(b)),
            Op::Or(a, b) => Self::Or(pick(a), pick(b)),
            Op::Xor(a, b) => Self::Xor(pick(a), pick(b)),
            Op::Not(a) => Self::Not(pick(a)),
        }
    }

    fn dependencies(self) -> Vec<VariableId> {
        match self {
            Self::And(a, b) | Self::Or(a, b) | Self::Xor(a, b) => vec![a, b],
            Self::Not(a) => vec![a],
        }
    }

    fn eval(self, s: &ConcreteState) -> bool {
        match self {
            Self::And(a, b) => s.get(a) && s.get(b),
            Self::Or(a, b) => s.get(a) || s.get(b),
            Self::Xor(a, b) => s.get(a) != s.get(b),
            Self::Not(a) => !s.get(a),
        }
    }
}

struct Model {
    graph: Arc<VariableGraph>,
    mutables: Vec<VariableId>,
    derived: Vec<(VariableId, Expr)>,
    trigger: (VariableId, Expr),
}

fn build_model(defaults: &[bool], ops: &[Op], trigger_op: Op) -> Model {
    let mut b = VariableGraph::builder();
    let mut declared = Vec::new();
    let mut mutables = Vec::new();
    for (i, default) in defaults.iter().enumerate() {
        let id = b.mutable(format!("m{i}"), *default).unwrap();
        mutables.push(id);
        declared.push(id);
    }

    let mut derived = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        let expr = Expr::resolve(*op, &declared);
        let id = b
            .derived(format!("d{i}"), expr.dependencies(), move |s| expr.eval(s))
            .unwrap();
        derived.push((id, expr));
        declared.push(id);
    }

    let expr = Expr::resolve(trigger_op, &declared);
    let trigger = b
        .triggered("t", expr.dependencies(), move |s| expr.eval(s))
        .unwrap();

    Model {
        graph: Arc::new(b.build()),
        mutables,
        derived,
        trigger: (trigger, expr),
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::And(a, b)),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Or(a, b)),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Xor(a, b)),
        any::<usize>().prop_map(Op::Not),
    ]
}

fn observations(model: &Model, raw: &[(usize, bool)]) -> BTreeMap<VariableId, bool> {
    let ids: Vec<VariableId> = model.graph.ids().collect();
    raw.iter()
        .map(|(i, value)| (ids[i % ids.len()], *value))
        .collect()
}

fn check_sound(model: &Model, observed: &BTreeMap<VariableId, bool>, state: &ConcreteState) {
    for (id, value) in observed {
        if *id != model.trigger.0 {
            assert_eq!(state.get(*id), *value);
        }
    }
    for (id, expr) in &model.derived {
        assert_eq!(state.get(*id), expr.eval(state));
    }
    let (trigger, expr) = model.trigger;
    if !state.get(trigger) {
        assert!(!expr.eval(state));
    }
}

proptest! {
    #[test]
    fn completion_is_sound(
        defaults in prop::collection::vec(any::<bool>(), 1..=4),
        ops in prop::collection::vec(op_strategy(), 0..4),
        trigger_op in op_strategy(),
        raw in prop::collection::vec((any::<usize>(), any::<bool>()), 0..5),
    ) {
        let model = build_model(&defaults, &ops, trigger_op);
        let observed = observations(&model, &raw);
        let state = PartialState::with_observations(model.graph.clone(), observed.clone());

        if let Some(concrete) = state.to_concrete_state() {
            check_sound(&model, &observed, &concrete);
        }
        if let Some(found) = state.find_consistent_state() {
            let concrete = found.to_concrete_state();
            prop_assert!(concrete.is_some());
            check_sound(&model, found.observed_values(), &concrete.unwrap());
        }
    }

    #[test]
    fn search_matches_brute_force(
        defaults in prop::collection::vec(any::<bool>(), 1..=4),
        ops in prop::collection::vec(op_strategy(), 0..4),
        trigger_op in op_strategy(),
        raw in prop::collection::vec((any::<usize>(), any::<bool>()), 0..5),
    ) {
        let model = build_model(&defaults, &ops, trigger_op);
        let observed = observations(&model, &raw);
        let state = PartialState::with_observations(model.graph.clone(), observed.clone());

        let open: Vec<VariableId> = model
            .mutables
            .iter()
            .copied()
            .filter(|m| !observed.contains_key(m))
            .collect();
        let satisfiable = (0..1u32 << open.len()).any(|mask| {
            let mut candidate = state.clone();
            for (bit, id) in open.iter().enumerate() {
                candidate.insert(*id, mask & (1 << bit) != 0);
            }
            candidate.to_concrete_state().is_some()
        });

        prop_assert_eq!(state.find_consistent_state().is_some(), satisfiable);
    }

    #[test]
    fn search_is_deterministic(
        defaults in prop::collection::vec(any::<bool>(), 1..=4),
        ops in prop::collection::vec(op_strategy(), 0..4),
        trigger_op in op_strategy(),
        raw in prop::collection::vec((any::<usize>(), any::<bool>()), 0..5),
    ) {
        let model = build_model(&defaults, &ops, trigger_op);
        let observed = observations(&model, &raw);
        let first = PartialState::with_observations(model.graph.clone(), observed.clone());
        let second = PartialState::with_observations(model.graph.clone(), observed);

        prop_assert_eq!(
            first.find_consistent_state().map(|s| s.observed_values().clone()),
            second.find_consistent_state().map(|s| s.observed_values().clone())
        );
    }

    #[test]
    fn numeric_round_trip(max in 0u64..64, pick in any::<u64>()) {
        let mut b = VariableGraph::builder();
        let dial = b.numeric("dial", 0, max).unwrap();
        let graph = Arc::new(b.build());

        let value = pick % (max + 1);
        let state = PartialState::with_observations(graph.clone(), dial.assignments(value).unwrap());
        let concrete = state.to_concrete_state().unwrap();
        prop_assert_eq!(dial.value(&concrete), value);

        // Every raw bit pattern is valid exactly when it decodes within range.
        let width = dial.bits().len();
        let raw = if width == 0 { 0 } else { pick % (1u64 << width) };
        let bits = dial
            .bits()
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, raw & (1 << i) != 0));
        let state = PartialState::with_observations(graph, bits);
        prop_assert_eq!(state.to_concrete_state().is_some(), raw <= max);
    }

    #[test]
    fn backward_travel_always_arrives(
        defaults in prop::collection::vec(any::<bool>(), 1..=4),
        ops in prop::collection::vec(op_strategy(), 0..4),
        trigger_op in op_strategy(),
        actions in prop::collection::vec(
            (any::<usize>(), any::<bool>(), any::<usize>(), -3i64..4),
            0..8,
        ),
        back in 1i64..5,
    ) {
        let model = build_model(&defaults, &ops, trigger_op);
        let ids: Vec<VariableId> = model.graph.ids().collect();
        let mut world = World::new(model.graph.clone());

        for (index, value, looked_at, tick) in actions {
            let mutable = model.mutables[index % model.mutables.len()];
            // Usage errors are fine; the engine must never corrupt itself.
            if let Err(err) = world.set(mutable, value) {
                prop_assert!(!err.is_invariant(), "set: {err}");
            }
            if let Err(err) = world.get(ids[looked_at % ids.len()]) {
                prop_assert!(!err.is_invariant(), "get: {err}");
            }
            if let Err(err) = world.travel_to(tick) {
                prop_assert!(!err.is_invariant(), "travel: {err}");
            }
        }

        let target = world.current_time() - back;
        prop_assert!(world.can_travel_to(target).unwrap());
        prop_assert!(world.travel_to(target).unwrap().is_arrived());
        prop_assert_eq!(world.current_time(), target);
    }

    #[test]
    fn latches_never_silently_reset(
        persistent in any::<bool>(),
        actions in prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 0..10),
    ) {
        let mut b = VariableGraph::builder();
        let lever1 = b.mutable("lever1", true).unwrap();
        let lever2 = b.mutable("lever2", false).unwrap();
        let door = b.derived("door", [lever1], move |s| !s.get(lever1)).unwrap();
        let robot = if persistent {
            b.persistent_trigger("robot", [door], move |s| s.get(door)).unwrap()
        } else {
            b.triggered("robot", [door], move |s| s.get(door)).unwrap()
        };
        let mut world = World::new(b.build());

        world.set(lever1, false).unwrap();
        prop_assert!(world.get(robot).unwrap());

        for (first, value, travel) in actions {
            let lever = if first { lever1 } else { lever2 };
            world.set(lever, value).unwrap();
            // Only persistent latches survive forward travel.
            if travel && persistent {
                let next = world.current_time() + 1;
                prop_assert!(world.travel_to(next).unwrap().is_arrived());
            }
            prop_assert!(world.get(robot).unwrap());
        }
    }
}
