//! Configuration loader with tier-based merging.

use super::merge::deep_merge_all;
use super::types::{Config, PROJECT_DIR_NAME, USER_DIR_NAME};
use crate::format::OutputFormat;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    /// `$CWD/pm-agent/`
    Project = 1,
    /// `~/.pm-agent/`
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        let user_dir = std::env::var("PM_AGENT_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(USER_DIR_NAME)));

        let project_dir = std::env::var("PM_AGENT_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from(PROJECT_DIR_NAME)));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    /// The config file for a tier, if that tier has a directory.
    pub fn config_file(&self, tier: ConfigTier) -> Option<PathBuf> {
        match tier {
            ConfigTier::Project => self.project_dir.as_ref().map(|d| d.join("config.yaml")),
            ConfigTier::User => self.user_dir.as_ref().map(|d| d.join("config.yaml")),
            ConfigTier::Defaults | ConfigTier::Environment => None,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Config files that contributed, lowest tier first.
    sources: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers.
    ///
    /// `explicit` (from `--config`) or `PM_AGENT_CONFIG_PATH` replaces the
    /// project and user tiers with a single file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("PM_AGENT_CONFIG_PATH").ok().map(PathBuf::from));
        Self::load_with_paths(ConfigPaths::discover(), explicit)
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths, explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            let mut config = Config::load(&path)?;
            Self::apply_env_overrides(&mut config);
            return Ok(Self {
                paths,
                config,
                sources: vec![path],
            });
        }

        let mut configs: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults
        configs.push(serde_json::to_value(Config::default())?);

        // Tiers 2 and 3: project, then user
        for tier in [ConfigTier::Project, ConfigTier::User] {
            let Some(config_file) = paths.config_file(tier) else {
                continue;
            };
            if !config_file.exists() {
                continue;
            }
            match read_yaml(&config_file) {
                Ok(value) => {
                    debug!(tier = %tier, path = %config_file.display(), "Loaded config tier");
                    configs.push(value);
                    sources.push(config_file);
                }
                Err(e) => {
                    warn!(
                        tier = %tier,
                        path = %config_file.display(),
                        "Ignoring unreadable config file: {}",
                        e
                    );
                }
            }
        }

        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config) {
        if let Ok(db_path) = std::env::var("PM_AGENT_DB_PATH") {
            config.store.db_path = PathBuf::from(db_path);
        }

        if let Ok(policy) = std::env::var("PM_AGENT_DELETE_POLICY") {
            match policy.parse() {
                Ok(policy) => config.store.delete_policy = policy,
                Err(e) => warn!("Ignoring PM_AGENT_DELETE_POLICY: {}", e),
            }
        }

        if let Ok(format) = std::env::var("PM_AGENT_FORMAT") {
            match OutputFormat::from_str(&format) {
                Some(format) => config.output.format = format,
                None => warn!("Ignoring PM_AGENT_FORMAT: unknown format '{}'", format),
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that contributed to the loaded configuration.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&content)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeletePolicy;
    use tempfile::TempDir;

    #[test]
    fn load_defaults_only() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with_paths(paths, None).unwrap();

        assert!(loader.sources().is_empty());
        assert_eq!(loader.config().output.format, OutputFormat::Json);
    }

    #[test]
    fn project_config_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("pm-agent");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(
            project_dir.join("config.yaml"),
            "store:\n  delete_policy: cascade\n",
        )
        .unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), Some(temp.path().join("user")));
        let loader = ConfigLoader::load_with_paths(paths, None).unwrap();
        let config = loader.config();

        assert_eq!(config.store.delete_policy, DeletePolicy::Cascade);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(loader.sources().len(), 1);
    }

    #[test]
    fn user_config_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("pm-agent");
        let user_dir = temp.path().join("user");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        std::fs::write(
            project_dir.join("config.yaml"),
            "store:\n  db_path: project.db\n  delete_policy: cascade\n",
        )
        .unwrap();
        std::fs::write(user_dir.join("config.yaml"), "store:\n  db_path: user.db\n").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), Some(user_dir));
        let loader = ConfigLoader::load_with_paths(paths, None).unwrap();
        let config = loader.config();

        assert_eq!(config.store.db_path, PathBuf::from("user.db"));
        assert_eq!(config.store.delete_policy, DeletePolicy::Cascade);
    }

    #[test]
    fn malformed_tier_is_skipped() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("pm-agent");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "store: [unclosed").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader = ConfigLoader::load_with_paths(paths, None).unwrap();

        assert!(loader.sources().is_empty());
        assert_eq!(loader.config().store.delete_policy, DeletePolicy::Restrict);
    }

    #[test]
    fn explicit_file_replaces_tiers() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("pm-agent");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(
            project_dir.join("config.yaml"),
            "store:\n  delete_policy: cascade\n",
        )
        .unwrap();
        let explicit = temp.path().join("explicit.yaml");
        std::fs::write(&explicit, "output:\n  format: markdown\n").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader = ConfigLoader::load_with_paths(paths, Some(explicit.clone())).unwrap();

        assert_eq!(loader.config().output.format, OutputFormat::Markdown);
        assert_eq!(loader.config().store.delete_policy, DeletePolicy::Restrict);
        assert_eq!(loader.sources(), &[explicit]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(None, None);
        let result = ConfigLoader::load_with_paths(paths, Some(temp.path().join("nope.yaml")));
        assert!(result.is_err());
    }
}
