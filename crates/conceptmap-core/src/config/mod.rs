//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::domain::merge::DedupPolicy;

/// Conceptmap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub default_model: String,
    pub fallback_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

/// Settings for merging analyzed concepts into the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Presentation weight given to every merged concept
    pub default_weight: f64,
    /// How candidates whose label already exists are handled
    pub dedup: DedupPolicy,
    /// Id used as anchor when merging into an empty graph
    pub sentinel_root_id: String,
    /// Label of the synthesized sentinel root node
    pub sentinel_label: String,
}

/// Settings for the projected folder tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Whether newly created category folders start open
    pub category_folders_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; defaults to `<config_dir>/conceptmap.db`
    pub database_path: Option<PathBuf>,
    /// Identity that owns every persisted record
    pub owner: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: "anthropic/claude-sonnet-4-20250514".to_string(),
            fallback_models: vec![
                "anthropic/claude-3-5-haiku-latest".to_string(),
                "openai/gpt-4o".to_string(),
            ],
            temperature: 0.4,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            default_weight: 25.0,
            dedup: DedupPolicy::Allow,
            sentinel_root_id: "root".to_string(),
            sentinel_label: "Knowledge Root".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            owner: "local".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            merge: MergeConfig::default(),
            tree: TreeConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("CONCEPTMAP_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    let suffix = &key[key.len() - 4..];
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CONCEPTMAP_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("conceptmap")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Resolve the database path, falling back to the config directory
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("conceptmap.db")),
        }
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;
        if !self.merge.default_weight.is_finite() || self.merge.default_weight <= 0.0 {
            return Err(anyhow!("merge.default_weight must be a positive number"));
        }
        if self.merge.sentinel_root_id.trim().is_empty() {
            return Err(anyhow!("merge.sentinel_root_id must not be empty"));
        }
        if self.storage.owner.trim().is_empty() {
            return Err(anyhow!("storage.owner must not be empty"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // LLM settings
            "llm.default_model" => Ok(self.llm.default_model.clone()),
            "llm.fallback_models" => Ok(self.llm.fallback_models.join(", ")),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            // Merge settings
            "merge.default_weight" => Ok(self.merge.default_weight.to_string()),
            "merge.dedup" => Ok(self.merge.dedup.as_str().to_string()),
            "merge.sentinel_root_id" => Ok(self.merge.sentinel_root_id.clone()),
            "merge.sentinel_label" => Ok(self.merge.sentinel_label.clone()),

            // Tree settings
            "tree.category_folders_open" => Ok(self.tree.category_folders_open.to_string()),

            // Storage settings
            "storage.database_path" => Ok(self.database_path()?.display().to_string()),
            "storage.owner" => Ok(self.storage.owner.clone()),

            // API key (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use CONCEPTMAP_API_KEY or OPENROUTER_API_KEY env var)".to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `conceptmap config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.default_model" => {
                self.llm.default_model = value.to_string();
            }
            "llm.fallback_models" => {
                self.llm.fallback_models = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "merge.default_weight" => {
                let weight: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid default_weight value: {}", value))?;
                if !weight.is_finite() || weight <= 0.0 {
                    return Err(anyhow!("Default weight must be a positive number"));
                }
                self.merge.default_weight = weight;
            }
            "merge.dedup" => {
                self.merge.dedup = DedupPolicy::parse(value).ok_or_else(|| {
                    anyhow!(
                        "Invalid dedup policy: {}. Valid options: allow, skip_existing, reject_existing",
                        value
                    )
                })?;
            }
            "merge.sentinel_root_id" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Sentinel root id must not be empty"));
                }
                self.merge.sentinel_root_id = value.trim().to_string();
            }
            "merge.sentinel_label" => {
                self.merge.sentinel_label = value.to_string();
            }

            "tree.category_folders_open" => {
                self.tree.category_folders_open = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }

            "storage.database_path" => {
                self.storage.database_path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "storage.owner" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Owner must not be empty"));
                }
                self.storage.owner = value.trim().to_string();
            }

            // API key cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the CONCEPTMAP_API_KEY or OPENROUTER_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `conceptmap config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "llm.default_model",
            "llm.fallback_models",
            "llm.temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.api_key",
            "merge.default_weight",
            "merge.dedup",
            "merge.sentinel_root_id",
            "merge.sentinel_label",
            "tree.category_folders_open",
            "storage.database_path",
            "storage.owner",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
