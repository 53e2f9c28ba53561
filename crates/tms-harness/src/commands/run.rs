//! run command

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use tms_harness::scenarios::custom;
use tms_harness::Scenario;
use tms_harness_core::{Destination, EntityWatch, ExpectedSequence, OperationPlan};

use super::expected_or_standard;

/// POST any multicast body
#[derive(Args, Debug)]
pub struct RunArgs {
    /// API path relative to the REST base, e.g. multicast/site/2
    #[arg(long)]
    path: String,

    /// JSON file holding the request body
    #[arg(long)]
    body: PathBuf,

    /// Destination type every transmission update must carry
    #[arg(long, requires = "destination_id")]
    destination_type: Option<String>,

    /// Destination id every transmission update must carry
    #[arg(long, requires = "destination_type")]
    destination_id: Option<String>,

    /// Exact number of transmissions the response must list
    #[arg(long)]
    transmissions: Option<usize>,

    /// Entity envelope kind to count, e.g. Incident/CLOSE
    #[arg(long, requires = "watch_id")]
    watch_type: Option<String>,

    /// Entity id the watched envelopes must carry
    #[arg(long, requires = "watch_type")]
    watch_id: Option<String>,

    /// Number of watched envelopes expected
    #[arg(long, default_value_t = 1)]
    watch_count: u32,

    /// Expected lifecycle, e.g. Pending,Partial,Success
    #[arg(long)]
    expect: Option<ExpectedSequence>,
}

pub(super) fn scenario(args: RunArgs) -> Result<Scenario> {
    let text = std::fs::read_to_string(&args.body)
        .with_context(|| format!("cannot read request body {}", args.body.display()))?;
    let body: Value = serde_json::from_str(&text)
        .with_context(|| format!("request body {} is not JSON", args.body.display()))?;

    let mut plan = OperationPlan::new(expected_or_standard(args.expect));
    if let (Some(kind), Some(id)) = (args.destination_type, args.destination_id) {
        plan = plan.with_destination(Destination::new(kind, id));
    }
    if let Some(count) = args.transmissions {
        plan = plan.with_exact_transmissions(count);
    }
    if let (Some(kind), Some(id)) = (args.watch_type, args.watch_id) {
        plan = plan.with_entity(EntityWatch::new(kind, id, args.watch_count));
    }
    Ok(custom(args.path, body, plan))
}
