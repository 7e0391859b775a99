use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "docshift.toml";

/// Configuration stored in docshift.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocshiftConfig {
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub migrations: MigrationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSettings {
    /// Key namespace for documents and the checkpoint record
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    "docshift".to_string()
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub redis_url: Option<String>,
    pub prefix: Option<String>,
}

/// Fully resolved connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub redis_url: String,
    pub prefix: String,
    /// Config file that was read, if any
    pub source: Option<PathBuf>,
}

impl DocshiftConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

impl Settings {
    /// Resolve settings from an explicit or default config file plus overrides.
    ///
    /// An explicit `--config` path must exist; the default file is optional.
    pub fn load(overrides: Overrides, working_dir: &Path) -> Result<Self> {
        let (config, source) = match overrides.config_path {
            Some(path) => (DocshiftConfig::from_file(&path)?, Some(path)),
            None => {
                let path = working_dir.join(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    (DocshiftConfig::from_file(&path)?, Some(path))
                } else {
                    (DocshiftConfig::default(), None)
                }
            }
        };

        let redis_url = match overrides.redis_url {
            Some(url) => url,
            None => expand_env(&config.redis.url)?,
        };
        let prefix = overrides.prefix.unwrap_or(config.migrations.prefix);
        if prefix.is_empty() {
            anyhow::bail!("Key prefix must not be empty");
        }

        Ok(Self {
            redis_url,
            prefix,
            source,
        })
    }
}

/// Expand a `${VAR}` value from the environment; other values pass through.
pub fn expand_env(value: &str) -> Result<String> {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) => {
            std::env::var(var_name).with_context(|| format!("Environment variable {var_name} not set"))
        }
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DocshiftConfig::default();
        assert_eq!(config.redis.url, "${REDIS_URL}");
        assert_eq!(config.migrations.prefix, "docshift");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DocshiftConfig = toml::from_str("[migrations]\nprefix = \"shop\"\n").unwrap();
        assert_eq!(config.migrations.prefix, "shop");
        assert_eq!(config.redis.url, "${REDIS_URL}");
    }

    #[test]
    fn test_expand_env_passthrough() {
        assert_eq!(expand_env("redis://127.0.0.1/").unwrap(), "redis://127.0.0.1/");
    }

    #[test]
    fn test_expand_env_missing_variable() {
        let err = expand_env("${DOCSHIFT_TEST_SURELY_UNSET_VARIABLE}").unwrap_err();
        assert!(err.to_string().contains("DOCSHIFT_TEST_SURELY_UNSET_VARIABLE"));
    }

    #[test]
    fn test_load_reads_default_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[redis]\nurl = \"redis://example:6379/\"\n[migrations]\nprefix = \"app\"\n",
        )
        .unwrap();

        let settings = Settings::load(Overrides::default(), dir.path()).unwrap();
        assert_eq!(settings.redis_url, "redis://example:6379/");
        assert_eq!(settings.prefix, "app");
        assert_eq!(settings.source, Some(dir.path().join(DEFAULT_CONFIG_FILE)));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[redis]\nurl = \"redis://example:6379/\"\n",
        )
        .unwrap();

        let overrides = Overrides {
            redis_url: Some("redis://127.0.0.1/".to_string()),
            prefix: Some("other".to_string()),
            ..Default::default()
        };
        let settings = Settings::load(overrides, dir.path()).unwrap();
        assert_eq!(settings.redis_url, "redis://127.0.0.1/");
        assert_eq!(settings.prefix, "other");
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides {
            config_path: Some(dir.path().join("missing.toml")),
            redis_url: Some("redis://127.0.0.1/".to_string()),
            ..Default::default()
        };
        assert!(Settings::load(overrides, dir.path()).is_err());
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides {
            redis_url: Some("redis://127.0.0.1/".to_string()),
            prefix: Some(String::new()),
            ..Default::default()
        };
        assert!(Settings::load(overrides, dir.path()).is_err());
    }
}
