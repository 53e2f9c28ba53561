//! CLI command dispatch and execution

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tms_harness::channel::WebSocketConnector;
use tms_harness::{with_session, Scenario, Session, Supervisor};
use tms_harness_core::config::{home_dir, resolve_config, ConfigOverrides, HarnessConfig};
use tms_harness_core::{Codec, ExpectedSequence, Verdict};

mod device_config;
mod forward_incident;
mod run;

/// tms-harness - verify multicast transmission lifecycles
#[derive(Parser, Debug)]
#[command(
    name = "tms-harness",
    version,
    about = "Verify multicast transmission lifecycles over the TMS push channel"
)]
pub struct Cli {
    /// Config file (default: .tms-harness.toml up to the git root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log envelopes and validator progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Overall deadline for the receive loop, in seconds
    #[arg(long, global = true)]
    deadline_secs: Option<u64>,

    /// Longest single wait for the next envelope, in seconds
    #[arg(long, global = true)]
    message_timeout_secs: Option<u64>,

    /// Envelope serialization: json, protobuf or auto
    #[arg(long, global = true)]
    codec: Option<Codec>,

    /// Override the REST API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Override the push-channel base URL
    #[arg(long, global = true)]
    channel_url: Option<String>,

    /// Log in as this user
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Forward an incident to a site and verify the transmission
    ForwardIncident(forward_incident::ForwardIncidentArgs),

    /// Send a configuration action to a device and verify the transmission
    DeviceConfig(device_config::DeviceConfigArgs),

    /// POST any multicast body and verify the transmission
    Run(run::RunArgs),
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Execute the CLI command. Returns whether the verdict was `Success`.
    pub async fn execute(self) -> Result<bool> {
        let overrides = ConfigOverrides {
            config_path: self.config,
            base_url: self.api_url,
            channel_url: self.channel_url,
            username: self.user,
            deadline_secs: self.deadline_secs,
            per_message_timeout_secs: self.message_timeout_secs,
            codec: self.codec,
        };
        let current_dir = std::env::current_dir().context("cannot read current directory")?;
        let home = home_dir()?;
        let config = resolve_config(&overrides, &current_dir, &home).context("failed to resolve configuration")?;

        let scenario = match self.command {
            Commands::ForwardIncident(args) => forward_incident::scenario(args),
            Commands::DeviceConfig(args) => device_config::scenario(args),
            Commands::Run(args) => run::scenario(args)?,
        };

        let verdict = execute_scenario(&config, scenario).await?;
        println!("{verdict}");
        Ok(verdict.is_success())
    }
}

/// Parse `--expect`, defaulting to `Pending,Partial,Success`.
pub(crate) fn expected_or_standard(expect: Option<ExpectedSequence>) -> ExpectedSequence {
    expect.unwrap_or_else(ExpectedSequence::standard)
}

async fn execute_scenario(config: &HarnessConfig, scenario: Scenario) -> Result<Verdict> {
    tracing::info!(scenario = %scenario.name, "starting");
    let verdict = with_session(&config.api, &config.credentials, |session: Arc<Session>| async move {
        let supervisor = Supervisor::new(
            WebSocketConnector::new(config.api.accept_invalid_certs),
            session.channel_request(config.channel.codec),
            &config.timing,
        );
        supervisor
            .run(session.post_json(&scenario.path, &scenario.body), &scenario.plan)
            .await
    })
    .await
    .context("login failed")?;
    Ok(verdict)
}
