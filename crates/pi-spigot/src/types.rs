//! Common type definitions shared by the scheduler, pool and workers.
//!
//! ## Types
//! - [`DigitPosition`]: index into the hexadecimal expansion of pi, where `0`
//!   is the integer digit `3`.
//! - [`Assignment`]: the work handed to one worker for one cycle.
//! - [`DigitResult`]: a computed hex digit tagged with its position.

/// Index into the hexadecimal expansion of pi. Position `0` is the integer
/// part.
pub type DigitPosition = u64;

/// Work given to a single worker for a single cycle.
///
/// Cycles with fewer positions than workers leave the trailing workers with
/// [`Assignment::NoWork`]; they still take part in the round and answer with
/// an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Nothing to compute this round.
    NoWork,
    /// Positions to compute, in order.
    Positions(Vec<DigitPosition>),
}

impl Assignment {
    /// Number of positions carried by this assignment.
    pub fn len(&self) -> usize {
        self.positions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions().is_empty()
    }

    /// The assigned positions, empty for [`Assignment::NoWork`].
    pub fn positions(&self) -> &[DigitPosition] {
        match self {
            Self::NoWork => &[],
            Self::Positions(positions) => positions,
        }
    }
}

impl From<Vec<DigitPosition>> for Assignment {
    fn from(positions: Vec<DigitPosition>) -> Self {
        if positions.is_empty() {
            Self::NoWork
        } else {
            Self::Positions(positions)
        }
    }
}

/// A single computed hexadecimal digit of pi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DigitResult {
    pub position: DigitPosition,
    /// Lowercase hex digit, `'0'..='9'` or `'a'..='f'`.
    pub digit: char,
}

impl DigitResult {
    pub const fn new(position: DigitPosition, digit: char) -> Self {
        Self { position, digit }
    }
}
