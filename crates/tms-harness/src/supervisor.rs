//! Operation trigger and timeout supervisor.
//!
//! [`Supervisor::run`] drives one scenario:
//!
//! 1. open the push channel (before the trigger, so no early update is missed);
//! 2. fire the trigger and bind the plan to the operation it created;
//! 3. loop until the validator is terminal: check the overall deadline, then
//!    wait for one envelope for at most `min(per_message_timeout, remaining)`;
//! 4. derive the verdict and close the channel on every exit path.
//!
//! Each loop iteration makes one deadline check and at most one receive, and
//! an envelope that the receive returned is always processed before the next
//! deadline check. An envelope arriving at the deadline instant therefore
//! yields exactly one outcome.
//!
//! [`Supervisor::run_all`] tracks several operations over one channel; every
//! envelope goes through every tracker's matcher, so updates for one operation
//! never advance another.

use crate::channel::{ChannelConnector, ChannelError, ChannelRequest, PushChannel, Received};
use crate::scope;
use std::future::Future;
use std::time::Duration;
use tms_harness_core::config::TimingConfig;
use tms_harness_core::{
    match_envelope, MatchRule, OperationPlan, TriggerError, TriggerResult, Validator, Verdict,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Runs scenarios against one push-channel endpoint.
#[derive(Debug)]
pub struct Supervisor<C> {
    connector: C,
    request: ChannelRequest,
    overall_deadline: Duration,
    per_message_timeout: Duration,
}

struct Tracker {
    operation_id: String,
    rule: MatchRule,
    validator: Validator,
}

impl<C: ChannelConnector> Supervisor<C> {
    pub fn new(connector: C, request: ChannelRequest, timing: &TimingConfig) -> Self {
        Self {
            connector,
            request,
            overall_deadline: timing.overall_deadline(),
            per_message_timeout: timing.per_message_timeout(),
        }
    }

    pub fn with_deadlines(mut self, overall: Duration, per_message: Duration) -> Self {
        self.overall_deadline = overall;
        self.per_message_timeout = per_message;
        self
    }

    pub fn overall_deadline(&self) -> Duration {
        self.overall_deadline
    }

    pub fn per_message_timeout(&self) -> Duration {
        self.per_message_timeout
    }

    /// Trigger one operation and verify its lifecycle.
    ///
    /// The trigger future is not polled until the channel is open.
    pub async fn run<F>(&self, trigger: F, plan: &OperationPlan) -> Verdict
    where
        F: Future<Output = Result<TriggerResult, TriggerError>>,
    {
        let mut verdicts = self.run_all(vec![(trigger, plan.clone())]).await;
        verdicts.pop().unwrap_or_else(|| Verdict::TriggerFailed("no operation ran".to_string()))
    }

    /// Trigger several operations in order and verify them concurrently over
    /// one channel. Verdicts come back in input order.
    pub async fn run_all<F>(&self, operations: Vec<(F, OperationPlan)>) -> Vec<Verdict>
    where
        F: Future<Output = Result<TriggerResult, TriggerError>>,
    {
        let mut channel = match self.connector.open(&self.request).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!("{e}");
                return operations
                    .iter()
                    .map(|_| Verdict::ChannelDropped(e.to_string()))
                    .collect();
            }
        };

        let outcome = scope::guarded(self.drive(channel.as_mut(), operations)).await;
        channel.close().await;
        scope::finish(outcome)
    }

    async fn drive<F>(&self, channel: &mut dyn PushChannel, operations: Vec<(F, OperationPlan)>) -> Vec<Verdict>
    where
        F: Future<Output = Result<TriggerResult, TriggerError>>,
    {
        let mut verdicts: Vec<Option<Verdict>> = Vec::with_capacity(operations.len());
        let mut trackers: Vec<(usize, Tracker)> = Vec::new();

        for (index, (trigger, plan)) in operations.into_iter().enumerate() {
            let mut validator = Validator::new(plan.expected.clone());
            let tracked = match trigger.await.and_then(|result| plan.track(&result)) {
                Ok(tracked) => tracked,
                Err(e) => {
                    warn!("trigger failed: {e}");
                    verdicts.push(Some(e.into()));
                    continue;
                }
            };
            validator.bind(&tracked);
            info!(
                operation_id = %tracked.operation_id,
                transmission_id = ?tracked.transmission_id,
                expected = %tracked.expected,
                "tracking operation"
            );
            verdicts.push(None);
            trackers.push((
                index,
                Tracker {
                    operation_id: tracked.operation_id.clone(),
                    rule: tracked.match_rule(),
                    validator,
                },
            ));
        }

        let dropped = self.receive_loop(channel, &mut trackers).await.err();

        for (index, tracker) in trackers {
            let verdict = match &dropped {
                Some(e) if !tracker.validator.is_terminal() => Verdict::ChannelDropped(e.to_string()),
                _ => tracker.validator.verdict(),
            };
            info!(operation_id = %tracker.operation_id, %verdict, "operation finished");
            verdicts[index] = Some(verdict);
        }

        verdicts
            .into_iter()
            .map(|v| v.unwrap_or_else(|| Verdict::TriggerFailed("operation was not tracked".to_string())))
            .collect()
    }

    async fn receive_loop(
        &self,
        channel: &mut dyn PushChannel,
        trackers: &mut [(usize, Tracker)],
    ) -> Result<(), ChannelError> {
        let start = Instant::now();
        while trackers.iter().any(|(_, t)| !t.validator.is_terminal()) {
            let elapsed = start.elapsed();
            if elapsed >= self.overall_deadline {
                debug!(?elapsed, "overall deadline reached");
                break;
            }
            let wait = self.per_message_timeout.min(self.overall_deadline - elapsed);

            match channel.receive_next(wait).await {
                Ok(Received::Timeout) => debug!(?wait, "no envelope"),
                Ok(Received::Undecodable(e)) => warn!("discarding undecodable envelope: {e}"),
                Ok(Received::Envelope(envelope)) => {
                    debug!(kind = %envelope.kind, "envelope");
                    for (_, tracker) in trackers.iter_mut() {
                        let result = match_envelope(&envelope, &tracker.rule);
                        if result.is_related() {
                            let state = tracker.validator.advance(result);
                            debug!(operation_id = %tracker.operation_id, ?state, "validator advanced");
                        }
                    }
                }
                Err(e) => {
                    warn!("{e}");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
