//! Configuration resolution
//!
//! Resolves configuration from multiple sources with priority:
//! 1. Command-line flags (passed as parameters)
//! 2. Environment variables (`TMS_HARNESS_*`)
//! 3. Explicit config file, or repo-local config (.tms-harness.toml)
//! 4. Global config (~/.config/tms-harness/config.toml)
//! 5. Defaults

mod discovery;
mod types;

pub use discovery::{home_dir, resolve_config, ConfigError, ConfigOverrides};
pub use types::{ApiConfig, ChannelConfig, CredentialsConfig, HarnessConfig, TimingConfig};
