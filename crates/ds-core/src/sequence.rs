//! Migration sequence numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a migration unit in the total execution order.
///
/// `SequenceNumber::ZERO` is the implicit checkpoint of a store that has
/// never been migrated; registered units start at 1.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    /// Checkpoint value before any unit has been applied.
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for SequenceNumber {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{:03}", self.0)
    }
}
