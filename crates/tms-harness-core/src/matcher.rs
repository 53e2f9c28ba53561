//! Correlates push-channel envelopes with a tracked operation.
//!
//! The channel is a broadcast of every change on the platform, so envelopes for
//! concurrent operations, other users, and unrelated objects interleave freely.
//! [`match_envelope`] keeps only envelopes whose correlation field equals the
//! tracked identifier exactly. It is a pure function: the same envelope and
//! rule always produce the same [`MatchResult`].

use crate::envelope::{Envelope, EntityUpdate, Payload, TransmissionRecord, TRANSMISSION_UPDATE};

/// An entity envelope kind watched alongside the transmissions of an
/// operation, e.g. the `Incident/CLOSE` emitted when an incident is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityWatch {
    /// Envelope `type` to watch.
    pub envelope_type: String,
    /// Entity id the envelope must carry.
    pub entity_id: String,
    /// Number of matching envelopes the scenario expects.
    pub expected_count: u32,
}

impl EntityWatch {
    pub fn new(envelope_type: impl Into<String>, entity_id: impl Into<String>, expected_count: u32) -> Self {
        Self {
            envelope_type: envelope_type.into(),
            entity_id: entity_id.into(),
            expected_count,
        }
    }
}

/// What makes an envelope related to one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    /// Operation identifier; transmission records carry it as `parentId`.
    pub operation_id: String,
    /// Envelope type carrying transmission updates for this operation class.
    pub transmission_type: String,
    /// Optional entity envelope kind correlated by entity id.
    pub entity: Option<EntityWatch>,
}

impl MatchRule {
    /// Rule for `Transmission/UPDATE` envelopes of `operation_id`.
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            transmission_type: TRANSMISSION_UPDATE.to_string(),
            entity: None,
        }
    }

    pub fn with_transmission_type(mut self, envelope_type: impl Into<String>) -> Self {
        self.transmission_type = envelope_type.into();
        self
    }

    pub fn with_entity(mut self, watch: EntityWatch) -> Self {
        self.entity = Some(watch);
        self
    }
}

/// Outcome of correlating one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Not for this operation; discard.
    Unrelated,
    /// Entity envelope for the watched entity.
    RelatedEntityUpdate(EntityUpdate),
    /// Transmission update whose `parentId` is the operation id.
    RelatedTransmissionUpdate(TransmissionRecord),
}

impl MatchResult {
    pub fn is_related(&self) -> bool {
        !matches!(self, Self::Unrelated)
    }
}

/// Decide whether `envelope` belongs to the operation described by `rule`.
///
/// Both the envelope `type` and the correlation id must match exactly;
/// there is no prefix, substring, or case-insensitive matching.
pub fn match_envelope(envelope: &Envelope, rule: &MatchRule) -> MatchResult {
    match &envelope.payload {
        Payload::Transmission(record)
            if envelope.kind == rule.transmission_type && record.parent_id == rule.operation_id =>
        {
            MatchResult::RelatedTransmissionUpdate(record.clone())
        }
        Payload::Entity(entity) => match &rule.entity {
            Some(watch) if envelope.kind == watch.envelope_type && entity.id == watch.entity_id => {
                MatchResult::RelatedEntityUpdate(entity.clone())
            }
            _ => MatchResult::Unrelated,
        },
        _ => MatchResult::Unrelated,
    }
}
