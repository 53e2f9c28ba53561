//! Expected transmission lifecycles.
//!
//! A multicast transmission reports `Pending` when created, `Partial` once the
//! relay has sent it, and `Success` when the destination acknowledges delivery.
//! [`ExpectedSequence`] is the ordered list of states a scenario requires,
//! along with the position whose status must read "transmission sent".

use crate::envelope::{Status, TransmissionState};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status code attached to the `Partial` checkpoint.
pub const SENT_CODE: i32 = 211;
/// Status message attached to the `Partial` checkpoint.
pub const SENT_MESSAGE: &str = "transmission sent";
/// Status code attached to the final `Success` state.
pub const DELIVERED_CODE: i32 = 200;
/// Status message attached to the final `Success` state.
pub const DELIVERED_MESSAGE: &str = "transmission successful";

/// Status required at the partial checkpoint.
pub fn sent_status() -> Status {
    Status::new(SENT_CODE, SENT_MESSAGE)
}

/// Status required on the final state.
pub fn delivered_status() -> Status {
    Status::new(DELIVERED_CODE, DELIVERED_MESSAGE)
}

/// Errors building an [`ExpectedSequence`]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SequenceError {
    #[error("expected sequence is empty")]
    Empty,

    #[error("expected sequence must start with Pending, found {found}")]
    FirstNotPending { found: TransmissionState },

    #[error("expected sequence must end with Success, found {found}")]
    LastNotSuccess { found: TransmissionState },

    #[error("partial checkpoint {position} is outside a sequence of {len} states")]
    CheckpointOutOfRange { position: usize, len: usize },

    #[error("invalid state in sequence: {0}")]
    InvalidState(String),
}

/// Ordered lifecycle states one tracked operation must report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedSequence {
    states: Vec<TransmissionState>,
    partial_checkpoint: Option<usize>,
}

impl ExpectedSequence {
    /// Build a sequence. The checkpoint defaults to the first `Partial`
    /// position, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError`] unless the sequence is non-empty, starts
    /// with `Pending`, and ends with `Success`.
    pub fn new(states: Vec<TransmissionState>) -> Result<Self, SequenceError> {
        let first = *states.first().ok_or(SequenceError::Empty)?;
        if first != TransmissionState::Pending {
            return Err(SequenceError::FirstNotPending { found: first });
        }
        let last = states[states.len() - 1];
        if last != TransmissionState::Success {
            return Err(SequenceError::LastNotSuccess { found: last });
        }
        let partial_checkpoint = states.iter().position(|s| *s == TransmissionState::Partial);
        Ok(Self {
            states,
            partial_checkpoint,
        })
    }

    /// `[Pending, Partial, Success]`, the lifecycle of a relayed multicast.
    pub fn standard() -> Self {
        Self {
            states: vec![
                TransmissionState::Pending,
                TransmissionState::Partial,
                TransmissionState::Success,
            ],
            partial_checkpoint: Some(1),
        }
    }

    /// Override the checkpoint position (0-based).
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::CheckpointOutOfRange`] if `position` is past
    /// the end of the sequence.
    pub fn with_partial_checkpoint(mut self, position: Option<usize>) -> Result<Self, SequenceError> {
        if let Some(position) = position
            && position >= self.states.len()
        {
            return Err(SequenceError::CheckpointOutOfRange {
                position,
                len: self.states.len(),
            });
        }
        self.partial_checkpoint = position;
        Ok(self)
    }

    pub fn states(&self) -> &[TransmissionState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false; construction rejects empty sequences.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TransmissionState> {
        self.states.get(index).copied()
    }

    pub fn partial_checkpoint(&self) -> Option<usize> {
        self.partial_checkpoint
    }
}

impl Default for ExpectedSequence {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for ExpectedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.states.iter().map(|s| s.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Parses a comma-separated list such as `Pending,Partial,Success`.
impl FromStr for ExpectedSequence {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let states = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<TransmissionState>()
                    .map_err(|_| SequenceError::InvalidState(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(states)
    }
}
