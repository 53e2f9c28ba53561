//! Expected-sequence validator.
//!
//! One [`Validator`] follows one tracked operation. It starts [`Empty`]
//! (created before the trigger so the subscriber can be opened first), moves
//! to [`Matching`] once bound to an operation, and ends in one of the terminal
//! states [`Satisfied`] or [`Violated`]. Observations after a terminal state
//! are ignored.
//!
//! [`Empty`]: ValidatorState::Empty
//! [`Matching`]: ValidatorState::Matching
//! [`Satisfied`]: ValidatorState::Satisfied
//! [`Violated`]: ValidatorState::Violated

use crate::envelope::{Destination, Status, TransmissionRecord, TransmissionState};
use crate::matcher::{EntityWatch, MatchResult};
use crate::operation::TrackedOperation;
use crate::sequence::{delivered_status, sent_status, ExpectedSequence};
use crate::verdict::{EntityProgress, Verdict};
use tracing::debug;

/// Validator progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorState {
    /// Not yet bound to an operation id.
    Empty,
    /// Waiting for the state at this 0-based position (equal to the number of
    /// transmission updates accepted so far).
    Matching(usize),
    Satisfied,
    Violated(String),
}

impl ValidatorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Satisfied | Self::Violated(_))
    }
}

/// A transmission update accepted by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTransmission {
    /// 1-based position in the operation's sequence.
    pub sequence_index: u32,
    pub record: TransmissionRecord,
}

/// State machine over the expected lifecycle of one operation.
#[derive(Debug, Clone)]
pub struct Validator {
    expected: ExpectedSequence,
    transmission_id: Option<String>,
    destination: Option<Destination>,
    entity: Option<EntityWatch>,
    entity_count: u32,
    observed: Vec<ObservedTransmission>,
    state: ValidatorState,
}

impl Validator {
    pub fn new(expected: ExpectedSequence) -> Self {
        Self {
            expected,
            transmission_id: None,
            destination: None,
            entity: None,
            entity_count: 0,
            observed: Vec::new(),
            state: ValidatorState::Empty,
        }
    }

    /// A validator already bound to `operation`.
    pub fn for_operation(operation: &TrackedOperation) -> Self {
        let mut validator = Self::new(operation.expected.clone());
        validator.bind(operation);
        validator
    }

    /// Bind to the operation the trigger created and start matching. Only
    /// an [`ValidatorState::Empty`] validator can be bound.
    pub fn bind(&mut self, operation: &TrackedOperation) {
        if self.state != ValidatorState::Empty {
            return;
        }
        self.transmission_id = operation.transmission_id.clone();
        self.destination = operation.destination.clone();
        self.entity = operation.entity.clone();
        self.state = ValidatorState::Matching(0);
    }

    pub fn state(&self) -> &ValidatorState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn expected(&self) -> &ExpectedSequence {
        &self.expected
    }

    pub fn observed(&self) -> &[ObservedTransmission] {
        &self.observed
    }

    pub fn observed_states(&self) -> Vec<TransmissionState> {
        self.observed.iter().map(|o| o.record.state).collect()
    }

    pub fn entity_count(&self) -> u32 {
        self.entity_count
    }

    /// Feed one match result and return the new state.
    pub fn advance(&mut self, result: MatchResult) -> &ValidatorState {
        if !matches!(self.state, ValidatorState::Matching(_)) {
            return &self.state;
        }
        match result {
            MatchResult::Unrelated => {}
            MatchResult::RelatedEntityUpdate(update) => self.on_entity(&update.id),
            MatchResult::RelatedTransmissionUpdate(record) => self.on_transmission(record),
        }
        &self.state
    }

    /// Verdict for the current state. A non-terminal validator reports how
    /// far it got.
    pub fn verdict(&self) -> Verdict {
        match &self.state {
            ValidatorState::Satisfied => Verdict::Success,
            ValidatorState::Violated(reason) => Verdict::StateMismatch(reason.clone()),
            ValidatorState::Empty | ValidatorState::Matching(_) => Verdict::DeadlineExceeded {
                observed: self.observed.len(),
                expected: self.expected.len(),
                entity: self
                    .entity
                    .as_ref()
                    .filter(|watch| self.entity_count < watch.expected_count)
                    .map(|watch| EntityProgress {
                        envelope_type: watch.envelope_type.clone(),
                        observed: self.entity_count,
                        expected: watch.expected_count,
                    }),
            },
        }
    }

    fn on_entity(&mut self, entity_id: &str) {
        let Some(watch) = &self.entity else {
            return;
        };
        self.entity_count += 1;
        debug!(
            envelope_type = %watch.envelope_type,
            entity_id,
            count = self.entity_count,
            "entity update"
        );
        if self.entity_count > watch.expected_count {
            self.state = ValidatorState::Violated(format!(
                "received {} {} envelopes for {}, expected {}",
                self.entity_count, watch.envelope_type, watch.entity_id, watch.expected_count
            ));
            return;
        }
        self.settle();
    }

    fn on_transmission(&mut self, record: TransmissionRecord) {
        let position = self.observed.len() + 1;
        match self.check(position, &record) {
            Ok(()) => {
                debug!(
                    transmission_id = %record.id,
                    state = %record.state,
                    position,
                    "transmission update accepted"
                );
                self.observed.push(ObservedTransmission {
                    sequence_index: u32::try_from(position).unwrap_or(u32::MAX),
                    record,
                });
                self.settle();
            }
            Err(reason) => self.state = ValidatorState::Violated(reason),
        }
    }

    fn check(&self, position: usize, record: &TransmissionRecord) -> Result<(), String> {
        let Some(expected) = self.expected.get(position - 1) else {
            return Err(format!(
                "position {position}: unexpected {} after the complete sequence {}",
                record.state, self.expected
            ));
        };
        if record.state != expected {
            return Err(format!(
                "position {position}: expected state {expected}, got {}",
                record.state
            ));
        }
        if let Some(id) = &self.transmission_id
            && record.id != *id
        {
            return Err(format!(
                "position {position}: expected transmission id {id}, got {}",
                record.id
            ));
        }
        if let Some(destination) = &self.destination {
            if record.destination.kind != destination.kind {
                return Err(format!(
                    "position {position}: expected destination type {}, got {}",
                    destination.kind, record.destination.kind
                ));
            }
            if record.destination.id != destination.id {
                return Err(format!(
                    "position {position}: expected destination id {}, got {}",
                    destination.id, record.destination.id
                ));
            }
        }
        if self.expected.partial_checkpoint() == Some(position - 1) {
            check_status(position, record, &sent_status())?;
        }
        if position == self.expected.len() {
            check_status(position, record, &delivered_status())?;
        }
        Ok(())
    }

    // Move to Satisfied once both the sequence and the entity count are complete.
    fn settle(&mut self) {
        let sequence_done = self.observed.len() == self.expected.len();
        let entity_done = self
            .entity
            .as_ref()
            .is_none_or(|watch| self.entity_count >= watch.expected_count);
        self.state = if sequence_done && entity_done {
            ValidatorState::Satisfied
        } else {
            ValidatorState::Matching(self.observed.len())
        };
    }
}

fn check_status(
    position: usize,
    record: &TransmissionRecord,
    required: &Status,
) -> Result<(), String> {
    match &record.status {
        Some(status) if status == required => Ok(()),
        Some(status) => Err(format!(
            "position {position}: expected status {required}, got {status}"
        )),
        None => Err(format!(
            "position {position}: expected status {required}, got none"
        )),
    }
}
