//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over `logging.level`.  With `storage.verbose_logging`
//! the AWS SDK targets are raised to debug so every storage request is
//! logged.

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::storage::s3::SDK_LOG_TARGETS;

/// Build the log filter from `RUST_LOG` (if set and valid) or the config.
pub fn env_filter(config: &Config, rust_log: Option<&str>) -> anyhow::Result<EnvFilter> {
    let mut filter = match rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        Some(filter) => filter,
        None => EnvFilter::try_new(&config.logging.level)?,
    };
    if config.storage.verbose_logging {
        for target in SDK_LOG_TARGETS {
            filter = filter.add_directive(format!("{target}=debug").parse()?);
        }
    }
    Ok(filter)
}

/// Install the global tracing subscriber.
pub fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(config, rust_log.as_deref())?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.storage.verbose_logging = false;
        config
    }

    #[test]
    fn test_verbose_logging_raises_sdk_targets() {
        let config = Config::default();
        let filter = env_filter(&config, None).unwrap().to_string();
        for target in SDK_LOG_TARGETS {
            assert!(filter.contains(&format!("{target}=debug")), "{filter}");
        }
        assert!(filter.contains("info"), "{filter}");
    }

    #[test]
    fn test_quiet_storage_logging_leaves_sdk_alone() {
        let filter = env_filter(&quiet_config(), None).unwrap().to_string();
        assert!(!filter.contains("aws_sdk_s3"), "{filter}");
        assert!(!filter.contains("aws_smithy_runtime"), "{filter}");
    }

    #[test]
    fn test_rust_log_overrides_level() {
        let filter = env_filter(&quiet_config(), Some("blobcheck=trace"))
            .unwrap()
            .to_string();
        assert!(filter.contains("blobcheck=trace"), "{filter}");
        assert!(!filter.contains("info"), "{filter}");
    }

    #[test]
    fn test_invalid_rust_log_falls_back_to_config() {
        let mut config = quiet_config();
        config.logging.level = "warn".to_string();
        let filter = env_filter(&config, Some("blobcheck=loud"))
            .unwrap()
            .to_string();
        assert!(filter.contains("warn"), "{filter}");
        assert!(!filter.contains("blobcheck"), "{filter}");
    }

    #[test]
    fn test_invalid_level_is_error() {
        let mut config = quiet_config();
        config.logging.level = "loud".to_string();
        assert!(env_filter(&config, None).is_err());
    }
}
