//! Asynchronous transmission-verification harness.
//!
//! Drives multicast scenarios against a live TMS deployment: log in, open the
//! push channel, fire the multicast, and verify the lifecycle of the
//! transmission it creates. Synchronous matching and validation live in
//! [`tms_harness_core`].

pub mod channel;
pub mod fixtures;
pub mod scenarios;
pub mod scope;
pub mod session;
pub mod supervisor;

pub use channel::{ChannelConnector, ChannelError, ChannelRequest, PushChannel, Received};
pub use fixtures::{with_fixtures, FixtureError, FixturePlan, FixtureStore, MemoryFixtureStore};
pub use scenarios::{DeviceConfiguration, IncidentForwarding, Scenario};
pub use session::{with_session, Session, SessionError};
pub use supervisor::Supervisor;
