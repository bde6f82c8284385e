//! Configuration management for the model bridge.
//!
//! Configuration is layered from these sources, later ones overriding
//! earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. User-specified configuration file
//! 3. Environment variables (prefixed with `LLM_BRIDGE_`, `__` between
//!    section and key, e.g. `LLM_BRIDGE_MODEL__MAX_TOKENS=512`)
//! 4. Command-line arguments

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const ENV_PREFIX: &str = "LLM_BRIDGE";
const APP_DIR_NAME: &str = "llm-bridge";

/// Command-line overrides shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Name of the bundled model asset
    #[arg(long, value_name = "NAME")]
    pub asset: Option<String>,

    /// Directory holding the bundled (read-only) assets
    #[arg(long, value_name = "DIR")]
    pub bundle_dir: Option<PathBuf>,

    /// Writable directory where the model is staged
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Maximum tokens per generation, fixed when the model is loaded
    #[arg(long)]
    pub max_tokens: Option<usize>,
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub model: ModelConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Which packaged model to load and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Logical name of the bundled payload
    pub asset_name: String,
    /// Maximum-token bound passed to the engine at load time
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

/// Where assets come from and where they are staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Read-only bundled asset namespace
    pub bundle_dir: PathBuf,
    /// Writable storage root (platform default when unset)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Re-stage a staged file whose size differs from the bundled asset
    #[serde(default = "default_verify_size")]
    pub verify_size: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of most recent generations kept for display
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

/// Backend tuning passed to the inference engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Context window in tokens
    #[serde(default = "default_context_length")]
    pub context_length: u32,
    /// Prompt batch size
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Layers offloaded to the GPU (0 keeps everything on the CPU)
    #[serde(default)]
    pub gpu_layers: u32,
    /// CPU threads (backend default when unset)
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_length: default_context_length(),
            batch_size: default_batch_size(),
            gpu_layers: 0,
            threads: None,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

impl StorageConfig {
    /// Resolved writable storage root.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
        })
    }
}

impl BridgeConfig {
    /// Load configuration from all sources
    pub fn load(args: &ConfigArgs) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            DEFAULT_CONFIG,
            config::FileFormat::Toml,
        ));

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: BridgeConfig = builder.build()?.try_deserialize()?;
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &ConfigArgs) {
        if let Some(asset) = &args.asset {
            self.model.asset_name = asset.clone();
        }
        if let Some(dir) = &args.bundle_dir {
            self.storage.bundle_dir = dir.clone();
        }
        if let Some(dir) = &args.data_dir {
            self.storage.data_dir = Some(dir.clone());
        }
        if let Some(max_tokens) = args.max_tokens {
            self.model.max_tokens = max_tokens;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.asset_name.trim().is_empty() {
            return Err(ConfigError::Invalid("model.asset_name must not be empty".into()));
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::Invalid("model.max_tokens must be greater than 0".into()));
        }
        if self.engine.context_length == 0 || self.engine.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "engine.context_length and engine.batch_size must be greater than 0".into(),
            ));
        }
        if self.history.limit == 0 {
            return Err(ConfigError::Invalid("history.limit must be greater than 0".into()));
        }
        if let Some(threads) = self.engine.threads {
            if threads == 0 || i32::try_from(threads).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "engine.threads must be between 1 and {}, got {threads}",
                    i32::MAX
                )));
            }
        }
        Ok(())
    }
}

fn default_max_tokens() -> usize {
    1024
}

fn default_verify_size() -> bool {
    true
}

fn default_history_limit() -> usize {
    5
}

fn default_context_length() -> u32 {
    2048
}

fn default_batch_size() -> u32 {
    512
}
