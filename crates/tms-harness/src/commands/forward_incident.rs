//! forward-incident command

use clap::Args;
use tms_harness::{IncidentForwarding, Scenario};
use tms_harness_core::ExpectedSequence;

use super::expected_or_standard;

/// Forward an incident to a site
#[derive(Args, Debug)]
pub struct ForwardIncidentArgs {
    /// Destination site id
    #[arg(long)]
    site: String,

    /// Incident to forward
    #[arg(long)]
    incident: String,

    /// Expected lifecycle, e.g. Pending,Partial,Success
    #[arg(long)]
    expect: Option<ExpectedSequence>,

    /// Incident/CLOSE envelopes expected for the incident (0 to skip)
    #[arg(long, default_value_t = 1)]
    close_count: u32,
}

pub(super) fn scenario(args: ForwardIncidentArgs) -> Scenario {
    IncidentForwarding::new(args.site, args.incident)
        .with_expected(expected_or_standard(args.expect))
        .with_close_count(args.close_count)
        .build()
}
