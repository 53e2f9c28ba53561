//! Multicast scenarios.
//!
//! Each builder knows the trigger path, the request body, and the plan to
//! verify the resulting operation with. Both multicast kinds must create
//! exactly one transmission.

use serde_json::{json, Value};
use tms_harness_core::{Destination, EntityWatch, ExpectedSequence, OperationPlan};

/// Destination type of a transmission to a site.
pub const SITE_DESTINATION_TYPE: &str = "prisma.tms.moc.Site";
const INCIDENT_PAYLOAD_TYPE: &str = "prisma.tms.moc.Incident";
const DEVICE_CONFIGURATION_TYPE: &str = "type.googleapis.com/prisma.tms.moc.DeviceConfiguration";
const OMNICOM_CONFIGURATION_TYPE: &str = "type.googleapis.com/prisma.tms.omnicom.OmnicomConfiguration";

/// Envelope kind published when a forwarded incident closes locally.
pub const INCIDENT_CLOSE: &str = "Incident/CLOSE";
/// Envelope kind published when a device record changes.
pub const DEVICE_UPDATE: &str = "Device/UPDATE";

/// A trigger request plus the plan that verifies it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    /// API path relative to the REST base, e.g. `multicast/site/2`
    pub path: String,
    pub body: Value,
    pub plan: OperationPlan,
}

/// Forward an incident to another site.
#[derive(Debug, Clone)]
pub struct IncidentForwarding {
    site_id: String,
    incident_id: String,
    expected: ExpectedSequence,
    close_count: u32,
}

impl IncidentForwarding {
    pub fn new(site_id: impl Into<String>, incident_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            incident_id: incident_id.into(),
            expected: ExpectedSequence::standard(),
            close_count: 1,
        }
    }

    pub fn with_expected(mut self, expected: ExpectedSequence) -> Self {
        self.expected = expected;
        self
    }

    /// Number of `Incident/CLOSE` envelopes expected for the incident.
    pub fn with_close_count(mut self, count: u32) -> Self {
        self.close_count = count;
        self
    }

    pub fn build(&self) -> Scenario {
        let mut plan = OperationPlan::new(self.expected.clone())
            .with_destination(Destination::new(SITE_DESTINATION_TYPE, self.site_id.clone()))
            .with_exact_transmissions(1);
        if self.close_count > 0 {
            plan = plan.with_entity(EntityWatch::new(INCIDENT_CLOSE, self.incident_id.clone(), self.close_count));
        }
        Scenario {
            name: format!("forward incident {} to site {}", self.incident_id, self.site_id),
            path: format!("multicast/site/{}", self.site_id),
            body: json!({
                "payload": {
                    "@type": INCIDENT_PAYLOAD_TYPE,
                    "id": self.incident_id,
                }
            }),
            plan,
        }
    }
}

/// Send an Omnicom configuration action to a device.
#[derive(Debug, Clone)]
pub struct DeviceConfiguration {
    device_id: String,
    action: String,
    destination: Option<Destination>,
    expected: ExpectedSequence,
    update_count: Option<u32>,
}

impl DeviceConfiguration {
    /// `action` is an Omnicom action such as `RequestGlobalParameters`.
    pub fn new(device_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            action: action.into(),
            destination: None,
            expected: ExpectedSequence::standard(),
            update_count: None,
        }
    }

    /// Network the transmission must go out on, e.g. `iridium` and the
    /// device's subscriber id.
    pub fn via_network(mut self, provider: impl Into<String>, subscriber_id: impl Into<String>) -> Self {
        self.destination = Some(Destination::new(provider, subscriber_id));
        self
    }

    pub fn with_expected(mut self, expected: ExpectedSequence) -> Self {
        self.expected = expected;
        self
    }

    /// Also require this many `Device/UPDATE` envelopes for the device.
    pub fn expect_device_updates(mut self, count: u32) -> Self {
        self.update_count = Some(count);
        self
    }

    pub fn build(&self) -> Scenario {
        let mut plan = OperationPlan::new(self.expected.clone()).with_exact_transmissions(1);
        if let Some(destination) = &self.destination {
            plan = plan.with_destination(destination.clone());
        }
        if let Some(count) = self.update_count {
            plan = plan.with_entity(EntityWatch::new(DEVICE_UPDATE, self.device_id.clone(), count));
        }
        Scenario {
            name: format!("configure device {} ({})", self.device_id, self.action),
            path: format!("multicast/device/{}", self.device_id),
            body: json!({
                "payload": {
                    "@type": DEVICE_CONFIGURATION_TYPE,
                    "id": self.device_id,
                    "configuration": {
                        "@type": OMNICOM_CONFIGURATION_TYPE,
                        "action": self.action,
                    }
                }
            }),
            plan,
        }
    }
}

/// Any multicast path with a caller-supplied body. Requires at least one
/// transmission.
pub fn custom(path: impl Into<String>, body: Value, plan: OperationPlan) -> Scenario {
    let path = path.into();
    Scenario {
        name: format!("POST {path}"),
        path,
        body,
        plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incident_forwarding_scenario() {
        let scenario = IncidentForwarding::new("S2", "I9").build();
        assert_eq!(scenario.path, "multicast/site/S2");
        assert_eq!(scenario.body["payload"]["@type"], "prisma.tms.moc.Incident");
        assert_eq!(scenario.body["payload"]["id"], "I9");
        assert_eq!(
            scenario.plan.destination,
            Some(Destination::new("prisma.tms.moc.Site", "S2"))
        );
        assert_eq!(scenario.plan.exact_transmissions, Some(1));
        let watch = scenario.plan.entity.unwrap();
        assert_eq!(watch.envelope_type, "Incident/CLOSE");
        assert_eq!(watch.entity_id, "I9");
        assert_eq!(watch.expected_count, 1);

        let no_watch = IncidentForwarding::new("S2", "I9").with_close_count(0).build();
        assert!(no_watch.plan.entity.is_none());
    }

    #[test]
    fn test_device_configuration_scenario() {
        let scenario = DeviceConfiguration::new("D4", "RequestGlobalParameters")
            .via_network("iridium", "333234010030454")
            .build();
        assert_eq!(scenario.path, "multicast/device/D4");
        assert_eq!(
            scenario.body["payload"]["configuration"]["action"],
            "RequestGlobalParameters"
        );
        assert_eq!(
            scenario.body["payload"]["@type"],
            "type.googleapis.com/prisma.tms.moc.DeviceConfiguration"
        );
        assert_eq!(
            scenario.plan.destination,
            Some(Destination::new("iridium", "333234010030454"))
        );
        assert!(scenario.plan.entity.is_none());

        let watched = DeviceConfiguration::new("D4", "RequestGlobalParameters")
            .expect_device_updates(1)
            .build();
        assert_eq!(watched.plan.entity.unwrap().envelope_type, "Device/UPDATE");
    }

    #[test]
    fn test_custom_scenario_accepts_any_count() {
        let scenario = custom(
            "multicast/site/7",
            json!({"payload": {}}),
            OperationPlan::new(ExpectedSequence::standard()),
        );
        assert_eq!(scenario.plan.exact_transmissions, None);
        assert_eq!(scenario.name, "POST multicast/site/7");
    }
}
