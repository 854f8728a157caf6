//! # paradox - A time-travel consistency engine
//!
//! paradox keeps a world of boolean variables consistent while an observer
//! reads, writes and hops between discrete ticks. It either produces one
//! assignment of every variable that agrees with everything observed so far,
//! or refuses the move that would break it.
//!
//! ## Core Concepts
//!
//! - **Variable**: a mutable source, a derived formula, or a one-way latch
//! - **VariableGraph**: the immutable, acyclic declaration of every variable
//! - **PartialState**: known values, completed by a deterministic search
//! - **TimePeriod**: what one tick knows, and how it came to know it
//! - **World**: the timeline, with `get`/`set` and `travel_to`
//!
//! ## Usage
//!
//! ```rust
//! use paradox::{VariableGraph, World};
//!
//! let mut builder = VariableGraph::builder();
//! let lever1 = builder.mutable("lever1", true)?;
//! let lever2 = builder.mutable("lever2", false)?;
//! let lab_c = builder.derived("labCOpen", [lever1, lever2], move |s| {
//!     s.get(lever1) || s.get(lever2)
//! })?;
//! let mut world = World::new(builder.build());
//!
//! // The lab is open now, so whatever happens in the past must keep it open.
//! assert!(world.get(lab_c)?);
//! world.travel_to(-1)?;
//! world.set(lever1, false)?;
//! assert!(world.travel_to(0)?.is_arrived());
//! assert!(world.get(lever2)?);
//! # Ok::<(), paradox::ParadoxError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod graph;
pub mod interact;
pub mod numeric;
pub mod period;
pub mod snapshot;
pub mod state;
pub mod variable;
pub mod world;

// Re-export primary types at crate root for convenience
pub use config::{FutureReconciliation, WorldConfig};
pub use error::{InvariantError, ParadoxError, ParadoxResult, ValidationError};
pub use graph::{VariableGraph, VariableGraphBuilder};
pub use interact::{Toggle, TravelBooth};
pub use numeric::NumericVariableProxy;
pub use period::{Antecedent, Tick, TimePeriod, VariableLedger};
pub use snapshot::{LedgerSnapshot, PeriodSnapshot, WorldSnapshot};
pub use state::{ConcreteState, MergeConflict, PartialState, TriggerMode};
pub use variable::{Formula, Variable, VariableId, VariableKind};
pub use world::{Refusal, SetReport, TravelOutcome, World, WorldId};
