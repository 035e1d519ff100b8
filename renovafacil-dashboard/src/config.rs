use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend: BackendConfig,
    pub inbox: InboxConfig,
    pub metrics: MetricsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct InboxConfig {
    /// Upper bound on conversations requested per refresh
    pub conversation_limit: u32,
    pub conversation_poll_secs: u64,
    pub message_poll_secs: u64,
    /// How many visible conversations get their contact info prefetched
    pub contact_prefetch: usize,
    pub test_phone_prefixes: Vec<String>,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            conversation_limit: 100,
            conversation_poll_secs: 30,
            message_poll_secs: 10,
            contact_prefetch: 20,
            test_phone_prefixes: vec![
                "test".to_string(),
                "final".to_string(),
                "conflict".to_string(),
                "sim".to_string(),
            ],
        }
    }
}

impl InboxConfig {
    pub fn conversation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.conversation_poll_secs.max(1))
    }

    pub fn message_poll_interval(&self) -> Duration {
        Duration::from_secs(self.message_poll_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub poll_secs: u64,
}

impl MetricsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { poll_secs: 15 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the default location of the local state database
    pub path: Option<PathBuf>,
}

const DEFAULT_CONFIG: &str = r#"
[backend]
# Base URL of the Renovafacil bot backend
base_url = "http://127.0.0.1:8000"
timeout_secs = 30

[inbox]
conversation_limit = 100
conversation_poll_secs = 30
message_poll_secs = 10
contact_prefetch = 20
# Phones starting with any of these are treated as test conversations
test_phone_prefixes = ["test", "final", "conflict", "sim"]

[metrics]
poll_secs = 15

[storage]
# path = "/var/lib/renovafacil/dashboard.sqlite3"
"#;

impl DashboardConfig {
    /// Loads the config file (creating a commented default on first run),
    /// then applies `RENOVAFACIL_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            .add_source(
                Environment::with_prefix("RENOVAFACIL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("inbox.test_phone_prefixes"),
            )
            .build()?;

        let config: DashboardConfig = builder.try_deserialize()?;

        Ok((config, config_path))
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("renovafacil").join("dashboard.toml")
    } else {
        PathBuf::from("dashboard.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_run_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dashboard.toml");

        let (config, used_path) = DashboardConfig::load(Some(&path)).unwrap();

        assert_eq!(used_path, path);
        assert!(path.exists());
        assert_eq!(config.inbox.conversation_limit, 100);
        assert_eq!(config.inbox.conversation_poll_secs, 30);
        assert_eq!(config.inbox.message_poll_secs, 10);
        assert_eq!(config.inbox.contact_prefetch, 20);
        assert_eq!(config.metrics.poll_secs, 15);
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.toml");
        std::fs::write(
            &path,
            "[backend]\nbase_url = \"https://bot.renovafacil.example\"\n\n[inbox]\nmessage_poll_secs = 5\n",
        )
        .unwrap();

        let (config, _) = DashboardConfig::load(Some(&path)).unwrap();

        assert_eq!(config.backend.base_url, "https://bot.renovafacil.example");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.inbox.message_poll_secs, 5);
        assert_eq!(config.inbox.conversation_poll_secs, 30);
        assert_eq!(config.inbox.test_phone_prefixes.len(), 4);
    }

    #[test]
    fn test_intervals_never_zero() {
        let inbox = InboxConfig {
            conversation_poll_secs: 0,
            message_poll_secs: 0,
            ..InboxConfig::default()
        };
        assert_eq!(inbox.conversation_poll_interval(), Duration::from_secs(1));
        assert_eq!(inbox.message_poll_interval(), Duration::from_secs(1));
    }
}
