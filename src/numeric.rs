//! Multi-bit numeric encodings.
//!
//! A [`NumericVariableProxy`] is not a variable itself: it groups mutable bit
//! variables that jointly encode an unsigned integer in little-endian binary.
//! Any bit combination that decodes above the proxy's maximum is a
//! contradiction.

use serde::{Deserialize, Serialize};

use crate::state::ConcreteState;
use crate::variable::VariableId;

/// Number of bits needed to encode every value in `0..=max_value`.
#[must_use]
pub const fn bit_count(max_value: u64) -> usize {
    (u64::BITS - max_value.leading_zeros()) as usize
}

/// Little-endian bit pattern of `value` over `bits` bits.
#[must_use]
pub fn encode(value: u64, bits: usize) -> Vec<bool> {
    (0..bits).map(|i| (value >> i) & 1 == 1).collect()
}

/// Grouping of mutable bits encoding an integer in `0..=max_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericVariableProxy {
    name: String,
    bits: Vec<VariableId>,
    starting_value: u64,
    max_value: u64,
}

impl NumericVariableProxy {
    pub(crate) fn new(
        name: String,
        bits: Vec<VariableId>,
        starting_value: u64,
        max_value: u64,
    ) -> Self {
        Self {
            name,
            bits,
            starting_value,
            max_value,
        }
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bit variables, least significant first.
    #[must_use]
    pub fn bits(&self) -> &[VariableId] {
        &self.bits
    }

    /// Value the bits encode when every bit holds its default.
    #[must_use]
    pub const fn starting_value(&self) -> u64 {
        self.starting_value
    }

    /// Largest valid value.
    #[must_use]
    pub const fn max_value(&self) -> u64 {
        self.max_value
    }

    /// Decodes the integer held by the bits in `state`.
    #[must_use]
    pub fn value(&self, state: &ConcreteState) -> u64 {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, bit)| state.get(**bit))
            .fold(0u64, |acc, (i, _)| acc | (1u64 << i))
    }

    /// True if the bits decode to a value within range.
    #[must_use]
    pub fn is_valid(&self, state: &ConcreteState) -> bool {
        self.value(state) <= self.max_value
    }

    /// Bit assignments encoding `value`, paired with their variables.
    ///
    /// Returns `None` when `value` is out of range.
    #[must_use]
    pub fn assignments(&self, value: u64) -> Option<Vec<(VariableId, bool)>> {
        if value > self.max_value {
            return None;
        }
        Some(
            self.bits
                .iter()
                .copied()
                .zip(encode(value, self.bits.len()))
                .collect(),
        )
    }
}

/// Picks an index from `weights` using a caller-supplied `roll`.
///
/// The roll is reduced modulo the total weight and matched against the
/// cumulative weights, so equal rolls always pick the same index.
#[must_use]
pub fn weighted_index(weights: &[u32], roll: u64) -> Option<usize> {
    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if total == 0 {
        return None;
    }
    let target = roll % total;
    let mut cumulative = 0u64;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += u64::from(*weight);
        if target < cumulative {
            return Some(index);
        }
    }
    None
}
