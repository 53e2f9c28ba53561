//! Configuration discovery and resolution

use super::types::HarnessConfig;
use crate::codec::Codec;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const REPO_CONFIG_FILE: &str = ".tms-harness.toml";
const GLOBAL_CONFIG_FILE: &str = ".config/tms-harness/config.toml";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Explicit config file does not exist
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Resolved values are unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// No home directory to look for the global config in
    #[error("cannot determine home directory")]
    NoHomeDir,
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Config file to use instead of the repo-local search
    pub config_path: Option<PathBuf>,
    /// Override the REST API base URL
    pub base_url: Option<String>,
    /// Override the push-channel base URL
    pub channel_url: Option<String>,
    /// Override the login name
    pub username: Option<String>,
    /// Override the overall deadline
    pub deadline_secs: Option<u64>,
    /// Override the per-message timeout
    pub per_message_timeout_secs: Option<u64>,
    /// Override the channel codec
    pub codec: Option<Codec>,
}

/// Home directory for the global config: `TMS_HARNESS_HOME` if set and
/// non-empty, else the platform home.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(home) = std::env::var("TMS_HARNESS_HOME")
        && !home.trim().is_empty()
    {
        return Ok(PathBuf::from(home.trim()));
    }
    dirs::home_dir().ok_or(ConfigError::NoHomeDir)
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables
/// 3. `overrides.config_path`, or repo-local `.tms-harness.toml` (current dir
///    up to the git root)
/// 4. Global config (~/.config/tms-harness/config.toml)
/// 5. Defaults
///
/// Files are merged key by key, so a repo-local file that only sets
/// `[timing]` keeps the global `[api]` section.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<HarnessConfig, ConfigError> {
    let mut merged = toml::Table::new();

    // 4. Try global config
    let global_config_path = home_dir.join(GLOBAL_CONFIG_FILE);
    if global_config_path.exists() {
        match load_table(&global_config_path) {
            Ok(table) => merge_tables(&mut merged, table),
            Err(e) => warn!("Failed to parse global config at {global_config_path:?}: {e}"),
        }
    }

    // 3. Explicit file (must load) or repo-local config
    if let Some(path) = &overrides.config_path {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.clone()));
        }
        merge_tables(&mut merged, load_table(path)?);
    } else if let Some(repo_config) = find_repo_local_config(current_dir) {
        match load_table(&repo_config) {
            Ok(table) => merge_tables(&mut merged, table),
            Err(e) => warn!("Failed to parse repo config at {repo_config:?}: {e}"),
        }
    }

    let mut config: HarnessConfig = toml::Value::Table(merged).try_into()?;

    // 2. Apply environment variables
    apply_env_overrides(&mut config);

    // 1. Apply command-line overrides
    apply_cli_overrides(&mut config, overrides);

    validate(&config)?;
    Ok(config)
}

/// Find repo-local config file
///
/// Searches current directory and parent directories up to git root
fn find_repo_local_config(current_dir: &Path) -> Option<PathBuf> {
    let mut dir = current_dir;

    loop {
        let config_path = dir.join(REPO_CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if dir.join(".git").exists() {
            break;
        }

        dir = dir.parent()?;
    }

    None
}

fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Overlay `file` onto `base`; nested tables merge, everything else replaces.
fn merge_tables(base: &mut toml::Table, file: toml::Table) {
    for (key, value) in file {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_value(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {name}={raw:?}: not a valid value");
            None
        }
    }
}

/// Apply environment variable overrides. Empty values are ignored.
fn apply_env_overrides(config: &mut HarnessConfig) {
    if let Some(url) = env_value("TMS_HARNESS_API_URL") {
        config.api.base_url = url;
    }
    if let Some(url) = env_value("TMS_HARNESS_AUTH_URL") {
        config.api.auth_url = url;
    }
    if let Some(url) = env_value("TMS_HARNESS_CHANNEL_URL") {
        config.api.channel_url = url;
    }
    if let Some(path) = env_value("TMS_HARNESS_CHANNEL_PATH") {
        config.api.channel_path = path;
    }
    if let Some(insecure) = env_value("TMS_HARNESS_INSECURE") {
        config.api.accept_invalid_certs = matches!(insecure.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(username) = env_value("TMS_HARNESS_USERNAME") {
        config.credentials.username = username;
    }
    if let Some(password) = env_value("TMS_HARNESS_PASSWORD") {
        config.credentials.password = password;
    }
    if let Some(secs) = env_parsed("TMS_HARNESS_DEADLINE_SECS") {
        config.timing.overall_deadline_secs = secs;
    }
    if let Some(secs) = env_parsed("TMS_HARNESS_MESSAGE_TIMEOUT_SECS") {
        config.timing.per_message_timeout_secs = secs;
    }
    if let Some(codec) = env_parsed::<Codec>("TMS_HARNESS_CODEC") {
        config.channel.codec = codec;
    }
}

/// Apply command-line overrides
fn apply_cli_overrides(config: &mut HarnessConfig, overrides: &ConfigOverrides) {
    if let Some(ref url) = overrides.base_url {
        config.api.base_url = url.clone();
    }
    if let Some(ref url) = overrides.channel_url {
        config.api.channel_url = url.clone();
    }
    if let Some(ref username) = overrides.username {
        config.credentials.username = username.clone();
    }
    if let Some(secs) = overrides.deadline_secs {
        config.timing.overall_deadline_secs = secs;
    }
    if let Some(secs) = overrides.per_message_timeout_secs {
        config.timing.per_message_timeout_secs = secs;
    }
    if let Some(codec) = overrides.codec {
        config.channel.codec = codec;
    }
}

fn validate(config: &HarnessConfig) -> Result<(), ConfigError> {
    if config.timing.overall_deadline_secs == 0 {
        return Err(ConfigError::Invalid("overall_deadline_secs must be positive".to_string()));
    }
    if config.timing.per_message_timeout_secs == 0 {
        return Err(ConfigError::Invalid("per_message_timeout_secs must be positive".to_string()));
    }
    for (name, url) in [
        ("base_url", &config.api.base_url),
        ("auth_url", &config.api.auth_url),
        ("channel_url", &config.api.channel_url),
    ] {
        if url.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{name} is empty")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "TMS_HARNESS_API_URL",
        "TMS_HARNESS_AUTH_URL",
        "TMS_HARNESS_CHANNEL_URL",
        "TMS_HARNESS_CHANNEL_PATH",
        "TMS_HARNESS_INSECURE",
        "TMS_HARNESS_USERNAME",
        "TMS_HARNESS_PASSWORD",
        "TMS_HARNESS_DEADLINE_SECS",
        "TMS_HARNESS_MESSAGE_TIMEOUT_SECS",
        "TMS_HARNESS_CODEC",
    ];

    fn clear_env() {
        unsafe {
            for name in ENV_VARS {
                env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        let temp = TempDir::new().unwrap();

        let config = resolve_config(&ConfigOverrides::default(), temp.path(), temp.path()).unwrap();

        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.timing.overall_deadline_secs, 10);
        assert_eq!(config.timing.per_message_timeout_secs, 20);
        assert_eq!(config.api.channel_endpoint(), "wss://localhost:8080/ws/v2/");
        assert_eq!(config.channel.codec, Codec::Auto);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        let temp = TempDir::new().unwrap();

        unsafe {
            env::set_var("TMS_HARNESS_API_URL", "https://tms.test/api/v2");
            env::set_var("TMS_HARNESS_DEADLINE_SECS", "30");
            env::set_var("TMS_HARNESS_CODEC", "protobuf");
            env::set_var("TMS_HARNESS_USERNAME", "");
            env::set_var("TMS_HARNESS_MESSAGE_TIMEOUT_SECS", "soon");
        }

        let config = resolve_config(&ConfigOverrides::default(), temp.path(), temp.path()).unwrap();

        assert_eq!(config.api.base_url, "https://tms.test/api/v2");
        assert_eq!(config.timing.overall_deadline_secs, 30);
        assert_eq!(config.channel.codec, Codec::Protobuf);
        // empty and unparsable values leave defaults in place
        assert_eq!(config.credentials.username, "admin");
        assert_eq!(config.timing.per_message_timeout_secs, 20);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_cli_overrides_beat_env() {
        clear_env();
        let temp = TempDir::new().unwrap();
        unsafe {
            env::set_var("TMS_HARNESS_DEADLINE_SECS", "30");
        }

        let overrides = ConfigOverrides {
            deadline_secs: Some(5),
            codec: Some(Codec::Json),
            username: Some("fleetmanager".to_string()),
            ..Default::default()
        };
        let config = resolve_config(&overrides, temp.path(), temp.path()).unwrap();

        assert_eq!(config.timing.overall_deadline_secs, 5);
        assert_eq!(config.channel.codec, Codec::Json);
        assert_eq!(config.credentials.username, "fleetmanager");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_repo_config_merges_over_global() {
        clear_env();
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join(".git")).unwrap();
        let subdir = repo.path().join("tests/acceptance");
        std::fs::create_dir_all(&subdir).unwrap();

        let global_dir = home.path().join(".config/tms-harness");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
[api]
base_url = "https://global/api/v2"
channel_url = "wss://global/ws/v2"

[credentials]
username = "incident"
password = "manager"
"#,
        )
        .unwrap();
        std::fs::write(
            repo.path().join(".tms-harness.toml"),
            r#"
[api]
channel_url = "wss://repo/ws/v2"

[timing]
overall_deadline_secs = 15

[channel]
codec = "json"
"#,
        )
        .unwrap();

        let config = resolve_config(&ConfigOverrides::default(), &subdir, home.path()).unwrap();

        assert_eq!(config.api.base_url, "https://global/api/v2");
        assert_eq!(config.api.channel_url, "wss://repo/ws/v2");
        assert_eq!(config.credentials.username, "incident");
        assert_eq!(config.timing.overall_deadline_secs, 15);
        assert_eq!(config.timing.per_message_timeout_secs, 20);
        assert_eq!(config.channel.codec, Codec::Json);
    }

    #[test]
    #[serial]
    fn test_malformed_repo_config_is_skipped() {
        clear_env();
        let repo = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join(".git")).unwrap();
        std::fs::write(repo.path().join(".tms-harness.toml"), "invalid toml [[[").unwrap();

        let config = resolve_config(&ConfigOverrides::default(), repo.path(), repo.path()).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    #[serial]
    fn test_explicit_config_path_errors_are_fatal() {
        clear_env();
        let temp = TempDir::new().unwrap();

        let missing = ConfigOverrides {
            config_path: Some(temp.path().join("nope.toml")),
            ..Default::default()
        };
        assert!(matches!(
            resolve_config(&missing, temp.path(), temp.path()),
            Err(ConfigError::NotFound(_))
        ));

        let bad = temp.path().join("bad.toml");
        std::fs::write(&bad, "[timing\n").unwrap();
        let overrides = ConfigOverrides {
            config_path: Some(bad),
            ..Default::default()
        };
        assert!(matches!(
            resolve_config(&overrides, temp.path(), temp.path()),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    #[serial]
    fn test_zero_deadline_is_invalid() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            deadline_secs: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            resolve_config(&overrides, temp.path(), temp.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_merge_tables_is_deep() {
        let mut base: toml::Table = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Table = toml::from_str("[a]\ny = 3\n[b]\nz = 4\n").unwrap();
        merge_tables(&mut base, overlay);
        assert_eq!(base["a"]["x"].as_integer(), Some(1));
        assert_eq!(base["a"]["y"].as_integer(), Some(3));
        assert_eq!(base["b"]["z"].as_integer(), Some(4));
    }
}
