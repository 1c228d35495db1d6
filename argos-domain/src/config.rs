use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<ArgosConfig> = OnceLock::new();

/// Central configuration for Argos.
/// Loaded from embedded argos.yml at startup.
#[derive(Debug, Clone)]
pub struct ArgosConfig {
    // Scheduler settings
    pub scheduler_tick_ms: u64,

    // Sample store settings
    pub sample_retention_seconds: u64,

    // Persistence port settings
    pub store_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigData {
    #[serde(default)]
    scheduler: SchedulerConfig,
    #[serde(default)]
    samples: SampleConfig,
    #[serde(default)]
    store: StoreConfig,
}

#[derive(Debug, Deserialize)]
struct SchedulerConfig {
    #[serde(default = "default_1000")]
    #[serde(rename = "tickMs")]
    tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_ms: 1000 }
    }
}

#[derive(Debug, Deserialize)]
struct SampleConfig {
    #[serde(default = "default_3600")]
    #[serde(rename = "retentionSeconds")]
    retention_seconds: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            retention_seconds: 3600,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoreConfig {
    #[serde(default = "default_5000")]
    #[serde(rename = "operationTimeoutMs")]
    operation_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5000,
        }
    }
}

fn default_1000() -> u64 {
    1000
}
fn default_3600() -> u64 {
    3600
}
fn default_5000() -> u64 {
    5000
}

impl ArgosConfig {
    /// Returns the global configuration singleton.
    pub fn get() -> &'static ArgosConfig {
        CONFIG.get_or_init(Self::load_default)
    }

    /// Initializes configuration from YAML string.
    pub fn init_from_yaml(yaml: &str) -> &'static ArgosConfig {
        CONFIG.get_or_init(|| Self::from_yaml(yaml))
    }

    /// Parses configuration from a YAML string.
    fn from_yaml(yaml: &str) -> ArgosConfig {
        match serde_yaml::from_str::<ConfigData>(yaml) {
            Ok(data) => Self::from_data(data),
            Err(e) => {
                eprintln!("Warning: Error parsing argos.yml: {e}, using defaults");
                Self::from_data(ConfigData::default())
            }
        }
    }

    /// Creates default configuration.
    fn load_default() -> ArgosConfig {
        Self::from_data(ConfigData::default())
    }

    fn from_data(data: ConfigData) -> ArgosConfig {
        ArgosConfig {
            scheduler_tick_ms: data.scheduler.tick_ms,
            sample_retention_seconds: data.samples.retention_seconds,
            store_timeout_ms: data.store.operation_timeout_ms,
        }
    }

    /// Interval between scheduler passes over the registered watches.
    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_millis(self.scheduler_tick_ms)
    }

    /// Minimum time a sample stays retrievable, regardless of rule periods.
    pub fn sample_retention(&self) -> Duration {
        Duration::from_secs(self.sample_retention_seconds)
    }

    /// Timeout for a single blocking persistence-port operation.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ArgosConfig::from_data(ConfigData::default());
        assert_eq!(config.scheduler_tick(), Duration::from_millis(1000));
        assert_eq!(config.sample_retention(), Duration::from_secs(3600));
        assert_eq!(config.store_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
scheduler:
  tickMs: 250
samples:
  retentionSeconds: 7200
"#;
        let config = ArgosConfig::from_yaml(yaml);
        assert_eq!(config.scheduler_tick_ms, 250);
        assert_eq!(config.sample_retention_seconds, 7200);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.store_timeout_ms, 5000);
    }

    #[test]
    fn test_from_yaml_invalid_falls_back() {
        let config = ArgosConfig::from_yaml(": not yaml :");
        assert_eq!(config.scheduler_tick_ms, 1000);
    }
}
