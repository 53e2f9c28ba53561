//! Scenario verdicts.
//!
//! The verdict's kind and detail string are the only diagnostic a scenario
//! reports. Envelope dumps stay in the debug log.

use std::fmt;

/// Entity-envelope progress reported with [`Verdict::DeadlineExceeded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityProgress {
    pub envelope_type: String,
    pub observed: u32,
    pub expected: u32,
}

/// Outcome of one tracked operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every expected state arrived in order with the required statuses.
    Success,
    /// Wrong state, order, status, or identity; carries expected vs actual.
    StateMismatch(String),
    /// The deadline elapsed before the sequence completed.
    DeadlineExceeded {
        observed: usize,
        expected: usize,
        entity: Option<EntityProgress>,
    },
    /// The trigger request failed or returned no usable operation.
    TriggerFailed(String),
    /// The push channel closed or failed while the scenario was running.
    ChannelDropped(String),
}

impl Verdict {
    pub fn deadline_exceeded(observed: usize, expected: usize) -> Self {
        Self::DeadlineExceeded {
            observed,
            expected,
            entity: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::StateMismatch(_) => "StateMismatch",
            Self::DeadlineExceeded { .. } => "DeadlineExceeded",
            Self::TriggerFailed(_) => "TriggerFailed",
            Self::ChannelDropped(_) => "ChannelDropped",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Self::Success => "all expected states observed".to_string(),
            Self::StateMismatch(detail) | Self::TriggerFailed(detail) | Self::ChannelDropped(detail) => {
                detail.clone()
            }
            Self::DeadlineExceeded {
                observed,
                expected,
                entity,
            } => {
                let mut detail = format!("observed {observed} of {expected} expected transmission states");
                if let Some(progress) = entity {
                    detail.push_str(&format!(
                        ", {} of {} {} envelopes",
                        progress.observed, progress.expected, progress.envelope_type
                    ));
                }
                detail
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.detail())
    }
}
