//! Configuration loading and types for blobcheck.
//!
//! Configuration is read from an optional YAML file and deserialized into
//! the [`Config`] struct.  The platform then gets the last word: the
//! `PORT`, `SERVICE_NAME`, `SERVICE_PLAN` and `REGION` environment
//! variables override whatever the file says (see
//! [`Config::apply_env_overrides`]).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Which platform service binding to look for.
    #[serde(default)]
    pub binding: BindingSettings,

    /// Storage client settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Round-trip check settings.
    #[serde(default)]
    pub check: CheckConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Service binding selection.
#[derive(Debug, Clone, Deserialize)]
pub struct BindingSettings {
    /// Label of the blob service to bind to (`SERVICE_NAME`).
    #[serde(default)]
    pub service_label: String,

    /// Plan name reported by `/info` (`SERVICE_PLAN`).
    #[serde(default)]
    pub service_plan: String,

    /// Region handed to the storage client (`REGION`).
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for BindingSettings {
    fn default() -> Self {
        Self {
            service_label: String::new(),
            service_plan: String::new(),
            region: default_region(),
        }
    }
}

/// Storage client configuration.
///
/// The defaults reproduce the legacy platform blobstore setup: plain
/// HTTP to the endpoint and SDK request logging switched on.  Both are
/// kept as named switches so a deployment can turn them off.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Talk to the endpoint over plain HTTP when the bound host has no scheme.
    #[serde(default = "default_true")]
    pub disable_ssl: bool,

    /// Force path-style URL addressing.
    #[serde(default = "default_true")]
    pub force_path_style: bool,

    /// Log every storage request at debug level.
    #[serde(default = "default_true")]
    pub verbose_logging: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            disable_ssl: true,
            force_path_style: true,
            verbose_logging: true,
        }
    }
}

/// Round-trip check configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    /// Local file uploaded on every check.  Its file name is the object key.
    #[serde(default = "default_fixture_path")]
    pub fixture_path: PathBuf,

    /// Local file the downloaded object is written to.
    #[serde(default = "default_scratch_path")]
    pub scratch_path: PathBuf,

    /// Give every invocation its own object key and scratch file.
    ///
    /// Off by default: with a fixed key, concurrent checks can delete each
    /// other's objects.
    #[serde(default)]
    pub unique_object_key: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            fixture_path: default_fixture_path(),
            scratch_path: default_scratch_path(),
            unique_object_key: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

impl Config {
    /// Apply platform environment variables on top of the loaded file.
    ///
    /// `lookup` is usually `|name| std::env::var(name).ok()`.  Unset and
    /// empty variables leave the current value alone; an unparseable
    /// `PORT` is an error.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(port) = get("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT value '{port}': {e}"))?;
        }
        if let Some(label) = get("SERVICE_NAME") {
            self.binding.service_label = label;
        }
        if let Some(plan) = get("SERVICE_PLAN") {
            self.binding.service_plan = plan;
        }
        if let Some(region) = get("REGION") {
            self.binding.region = region;
        }
        Ok(())
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_fixture_path() -> PathBuf {
    PathBuf::from("tasmanian_devil.png")
}

fn default_scratch_path() -> PathBuf {
    PathBuf::from("outfile.png")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.binding.region, "us-east-1");
        assert!(config.storage.disable_ssl);
        assert!(config.storage.verbose_logging);
        assert!(!config.check.unique_object_key);
        assert_eq!(
            config.check.fixture_path,
            PathBuf::from("tasmanian_devil.png")
        );
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
server:
  port: 8080
storage:
  disable_ssl: false
check:
  unique_object_key: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(!config.storage.disable_ssl);
        assert!(config.storage.force_path_style);
        assert!(config.check.unique_object_key);
        assert_eq!(config.check.scratch_path, PathBuf::from("outfile.png"));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("PORT", "8081"),
            ("SERVICE_NAME", "blobstore"),
            ("SERVICE_PLAN", "Tiered"),
            ("REGION", "us-west-2"),
        ]);
        let mut config = Config::default();
        config
            .apply_env_overrides(|name| vars.get(name).cloned())
            .unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.binding.service_label, "blobstore");
        assert_eq!(config.binding.service_plan, "Tiered");
        assert_eq!(config.binding.region, "us-west-2");
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let vars = env(&[("PORT", ""), ("REGION", "")]);
        let mut config = Config::default();
        config
            .apply_env_overrides(|name| vars.get(name).cloned())
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.binding.region, "us-east-1");
    }

    #[test]
    fn test_invalid_port_rejected() {
        let vars = env(&[("PORT", "ninety")]);
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(|name| vars.get(name).cloned())
            .unwrap_err();
        assert!(err.to_string().contains("invalid PORT"));
    }

    #[test]
    fn test_example_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/blobcheck.example.yaml");
        let config = load_config(path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.binding.service_label, "blobstore");
        assert!(config.storage.disable_ssl);
        assert!(!config.check.unique_object_key);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("blobcheck.yaml");
        std::fs::write(&path, "binding:\n  service_label: blob-store\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.binding.service_label, "blob-store");
    }
}
