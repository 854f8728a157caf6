//! In-world interactables built on the [`World`] surface.
//!
//! These never touch a period directly; they are thin wrappers over
//! [`World::get`], [`World::set`] and [`World::travel_to`].

use crate::error::{ParadoxError, ParadoxResult, ValidationError};
use crate::period::Tick;
use crate::variable::{Variable, VariableId};
use crate::world::{SetReport, TravelOutcome, World};

/// A lever or switch bound to one mutable variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    variable: VariableId,
}

impl Toggle {
    /// Binds a toggle to `variable`, which must be mutable.
    pub fn new(world: &World, variable: VariableId) -> ParadoxResult<Self> {
        let declared = world
            .graph()
            .variable(variable)
            .ok_or(ParadoxError::UnknownVariable { id: variable })?;
        if !declared.is_mutable() {
            return Err(ParadoxError::NotMutable {
                name: declared.name().to_string(),
            });
        }
        Ok(Self { variable })
    }

    /// The bound variable.
    #[must_use]
    pub const fn variable(&self) -> VariableId {
        self.variable
    }

    /// Looks at the toggle, recording the observation.
    pub fn value(&self, world: &mut World) -> ParadoxResult<bool> {
        world.get(self.variable)
    }

    /// False once an irreversible toggle has left its default.
    pub fn can_toggle(&self, world: &World) -> ParadoxResult<bool> {
        let graph = world.graph();
        let reversible = graph
            .variable(self.variable)
            .map_or(true, Variable::is_reversible);
        if reversible {
            return Ok(true);
        }
        let default = graph.default_value(self.variable).unwrap_or(false);
        Ok(world.peek(self.variable)? == default)
    }

    /// Flips the toggle.
    pub fn toggle(&self, world: &mut World) -> ParadoxResult<SetReport> {
        let value = world.get(self.variable)?;
        world.set(self.variable, !value)
    }
}

/// A booth that can send the player to one of a fixed list of ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelBooth {
    allowed: Vec<Tick>,
    cursor: usize,
}

impl TravelBooth {
    /// Builds a booth over `allowed`, selecting the first entry.
    pub fn new(allowed: Vec<Tick>) -> Result<Self, ValidationError> {
        if allowed.is_empty() {
            return Err(ValidationError::EmptyTravelSchedule);
        }
        Ok(Self { allowed, cursor: 0 })
    }

    /// The currently selected destination.
    #[must_use]
    pub fn selected(&self) -> Tick {
        // `new` guarantees at least one tick and `cycle` keeps the cursor in range.
        self.allowed[self.cursor]
    }

    /// All destinations, in cycle order.
    #[must_use]
    pub fn allowed(&self) -> &[Tick] {
        &self.allowed
    }

    /// Advances to the next destination, wrapping around.
    pub fn cycle(&mut self) -> Tick {
        self.cursor = (self.cursor + 1) % self.allowed.len();
        self.selected()
    }

    /// Attempts to travel to the selected destination.
    pub fn travel(&self, world: &mut World) -> ParadoxResult<TravelOutcome> {
        world.travel_to(self.selected())
    }
}
