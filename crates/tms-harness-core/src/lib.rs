//! Core of the TMS transmission-verification harness.
//!
//! A multicast request against the fleet-tracking platform is fire-and-forget:
//! the HTTP call returns an operation id, and the delivery pipeline then
//! reports each transmission's lifecycle on the push channel. This crate holds
//! the synchronous pieces that decide whether that lifecycle was correct:
//!
//! - [`envelope`] and [`codec`] decode push-channel frames (JSON or protobuf).
//! - [`matcher`] correlates envelopes with a tracked operation id.
//! - [`sequence`] and [`validator`] check the ordered lifecycle and statuses.
//! - [`operation`] turns a trigger response into a tracked operation.
//! - [`verdict`] is the one-line outcome of a scenario.
//!
//! The async channel, session, and supervisor live in the `tms-harness` crate.

pub mod codec;
pub mod config;
pub mod envelope;
pub mod logging;
pub mod matcher;
pub mod operation;
pub mod sequence;
pub mod validator;
pub mod verdict;

pub use codec::{Codec, Frame};
pub use envelope::{
    DecodeError, Destination, EntityUpdate, Envelope, Payload, Status, TransmissionRecord,
    TransmissionState, TRANSMISSION_UPDATE,
};
pub use matcher::{match_envelope, EntityWatch, MatchResult, MatchRule};
pub use operation::{
    extract_receipt, OperationPlan, OperationReceipt, TrackedOperation, TriggerError, TriggerResult,
};
pub use sequence::{ExpectedSequence, SequenceError};
pub use validator::{ObservedTransmission, Validator, ValidatorState};
pub use verdict::{EntityProgress, Verdict};
