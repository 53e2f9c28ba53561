//! Trigger responses and tracked operations.
//!
//! A multicast request answers `201 Created` with the new operation:
//!
//! ```json
//! {"id":"OP1","transmissions":[{"id":"T1","destination":{...}}],...}
//! ```
//!
//! The operation `id` is the correlation identifier every transmission update
//! carries as `parentId`. [`OperationPlan::track`] turns a trigger result into
//! a [`TrackedOperation`] or a [`TriggerError`].

use crate::envelope::{Destination, TRANSMISSION_UPDATE};
use crate::matcher::{EntityWatch, MatchRule};
use crate::sequence::ExpectedSequence;
use crate::verdict::Verdict;
use serde_json::Value;
use thiserror::Error;

/// Raw outcome of an HTTP trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerResult {
    pub status: u16,
    pub body: Value,
}

impl TriggerResult {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a trigger did not produce a trackable operation. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("trigger returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("trigger response has no operation id")]
    MissingOperationId,

    #[error("operation {operation_id} has no transmissions")]
    NoTransmissions { operation_id: String },

    #[error("operation {operation_id} has {actual} transmissions, expected {expected}")]
    TransmissionCount {
        operation_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("trigger request failed: {0}")]
    Transport(String),
}

impl From<TriggerError> for Verdict {
    fn from(err: TriggerError) -> Self {
        Verdict::TriggerFailed(err.to_string())
    }
}

/// Identifiers pulled from a successful trigger response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReceipt {
    pub operation_id: String,
    pub transmission_ids: Vec<String>,
}

/// Extract the operation id and transmission ids from a trigger response.
///
/// # Errors
///
/// Returns [`TriggerError::Status`] for a non-2xx status,
/// [`TriggerError::MissingOperationId`] when `id` is absent or empty, and
/// [`TriggerError::NoTransmissions`] when the transmission list is absent or
/// empty.
pub fn extract_receipt(result: &TriggerResult) -> Result<OperationReceipt, TriggerError> {
    if !result.is_success() {
        return Err(TriggerError::Status {
            status: result.status,
            body: result.body.to_string(),
        });
    }

    let operation_id = result
        .body
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(TriggerError::MissingOperationId)?
        .to_string();

    let transmission_ids: Vec<String> = result
        .body
        .get("transmissions")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|t| t.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if transmission_ids.is_empty() {
        return Err(TriggerError::NoTransmissions { operation_id });
    }

    Ok(OperationReceipt {
        operation_id,
        transmission_ids,
    })
}

/// What a scenario expects from the operation it is about to trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    pub expected: ExpectedSequence,
    /// Destination every transmission update must carry, when known upfront.
    pub destination: Option<Destination>,
    pub entity: Option<EntityWatch>,
    pub transmission_type: String,
    /// Exact number of transmissions the response must list; `None` accepts any
    /// non-empty list.
    pub exact_transmissions: Option<usize>,
}

impl OperationPlan {
    pub fn new(expected: ExpectedSequence) -> Self {
        Self {
            expected,
            destination: None,
            entity: None,
            transmission_type: TRANSMISSION_UPDATE.to_string(),
            exact_transmissions: None,
        }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_entity(mut self, watch: EntityWatch) -> Self {
        self.entity = Some(watch);
        self
    }

    pub fn with_transmission_type(mut self, envelope_type: impl Into<String>) -> Self {
        self.transmission_type = envelope_type.into();
        self
    }

    pub fn with_exact_transmissions(mut self, count: usize) -> Self {
        self.exact_transmissions = Some(count);
        self
    }

    /// Bind the plan to the operation a trigger created.
    ///
    /// # Errors
    ///
    /// Any [`TriggerError`] from [`extract_receipt`], or
    /// [`TriggerError::TransmissionCount`] when the plan requires an exact
    /// count the response does not have.
    pub fn track(&self, result: &TriggerResult) -> Result<TrackedOperation, TriggerError> {
        let receipt = extract_receipt(result)?;
        if let Some(expected) = self.exact_transmissions
            && receipt.transmission_ids.len() != expected
        {
            return Err(TriggerError::TransmissionCount {
                operation_id: receipt.operation_id,
                expected,
                actual: receipt.transmission_ids.len(),
            });
        }

        let transmission_id = receipt.transmission_ids.into_iter().next();
        Ok(TrackedOperation {
            operation_id: receipt.operation_id,
            transmission_id,
            expected: self.expected.clone(),
            destination: self.destination.clone(),
            entity: self.entity.clone(),
            transmission_type: self.transmission_type.clone(),
        })
    }
}

/// An operation whose transmission updates are being followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOperation {
    pub operation_id: String,
    /// First transmission listed by the trigger response.
    pub transmission_id: Option<String>,
    pub expected: ExpectedSequence,
    pub destination: Option<Destination>,
    pub entity: Option<EntityWatch>,
    pub transmission_type: String,
}

impl TrackedOperation {
    pub fn match_rule(&self) -> MatchRule {
        let rule = MatchRule::new(self.operation_id.clone())
            .with_transmission_type(self.transmission_type.clone());
        match &self.entity {
            Some(watch) => rule.with_entity(watch.clone()),
            None => rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn created(body: Value) -> TriggerResult {
        TriggerResult::new(201, body)
    }

    #[test]
    fn test_extract_receipt() {
        let receipt = extract_receipt(&created(json!({
            "id": "OP1",
            "transmissions": [{"id": "T1"}, {"id": "T2"}]
        })))
        .unwrap();
        assert_eq!(receipt.operation_id, "OP1");
        assert_eq!(receipt.transmission_ids, vec!["T1", "T2"]);
    }

    #[test]
    fn test_non_success_status_fails() {
        let err = extract_receipt(&TriggerResult::new(400, json!({"error": "bad site"}))).unwrap_err();
        assert!(matches!(err, TriggerError::Status { status: 400, .. }));
        assert!(err.to_string().contains("bad site"));
    }

    #[test]
    fn test_missing_id_or_transmissions_fails() {
        assert_eq!(
            extract_receipt(&created(json!({"transmissions": [{"id": "T1"}]}))),
            Err(TriggerError::MissingOperationId)
        );
        assert_eq!(
            extract_receipt(&created(json!({"id": "", "transmissions": [{"id": "T1"}]}))),
            Err(TriggerError::MissingOperationId)
        );
        assert_eq!(
            extract_receipt(&created(json!({"id": "OP1", "transmissions": []}))),
            Err(TriggerError::NoTransmissions {
                operation_id: "OP1".to_string()
            })
        );
        assert!(matches!(
            extract_receipt(&created(json!({"id": "OP1"}))),
            Err(TriggerError::NoTransmissions { .. })
        ));
    }

    #[test]
    fn test_track_binds_first_transmission() {
        let plan = OperationPlan::new(ExpectedSequence::standard())
            .with_destination(Destination::new("prisma.tms.moc.Site", "S2"))
            .with_entity(EntityWatch::new("Incident/CLOSE", "I1", 1));
        let tracked = plan
            .track(&created(json!({"id": "OP1", "transmissions": [{"id": "T1"}]})))
            .unwrap();
        assert_eq!(tracked.operation_id, "OP1");
        assert_eq!(tracked.transmission_id.as_deref(), Some("T1"));

        let rule = tracked.match_rule();
        assert_eq!(rule.operation_id, "OP1");
        assert_eq!(rule.transmission_type, TRANSMISSION_UPDATE);
        assert_eq!(rule.entity.unwrap().entity_id, "I1");
    }

    #[test]
    fn test_track_enforces_exact_count() {
        let plan = OperationPlan::new(ExpectedSequence::standard()).with_exact_transmissions(1);
        let err = plan
            .track(&created(json!({"id": "OP1", "transmissions": [{"id": "T1"}, {"id": "T2"}]})))
            .unwrap_err();
        assert_eq!(
            err,
            TriggerError::TransmissionCount {
                operation_id: "OP1".to_string(),
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(
            Verdict::from(err).kind(),
            "TriggerFailed"
        );
    }
}
