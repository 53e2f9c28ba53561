//! device-config command

use clap::Args;
use tms_harness::{DeviceConfiguration, Scenario};
use tms_harness_core::ExpectedSequence;

use super::expected_or_standard;

/// Send a configuration action to a device
#[derive(Args, Debug)]
pub struct DeviceConfigArgs {
    /// Device id
    #[arg(long)]
    device: String,

    /// Omnicom action
    #[arg(long, default_value = "RequestGlobalParameters")]
    action: String,

    /// Network provider the transmission must use, e.g. iridium
    #[arg(long, requires = "subscriber")]
    provider: Option<String>,

    /// Subscriber id on that network
    #[arg(long, requires = "provider")]
    subscriber: Option<String>,

    /// Expected lifecycle, e.g. Pending,Partial,Success
    #[arg(long)]
    expect: Option<ExpectedSequence>,

    /// Also require this many Device/UPDATE envelopes
    #[arg(long)]
    device_updates: Option<u32>,
}

pub(super) fn scenario(args: DeviceConfigArgs) -> Scenario {
    let mut builder =
        DeviceConfiguration::new(args.device, args.action).with_expected(expected_or_standard(args.expect));
    if let (Some(provider), Some(subscriber)) = (args.provider, args.subscriber) {
        builder = builder.via_network(provider, subscriber);
    }
    if let Some(count) = args.device_updates {
        builder = builder.expect_device_updates(count);
    }
    builder.build()
}
