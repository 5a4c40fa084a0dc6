//! Configuration Module
//!
//! Server settings loaded from environment variables, and the per-record-type
//! tracking policy resolved from layered overrides.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{ConsistencyError, Result};
use crate::record::{Predicate, RecordType};

/// Name of the backing cache used when no override lists one.
pub const DEFAULT_CACHE: &str = "default";

/// Default retention window in seconds.
pub const DEFAULT_CACHE_TIME: u64 = 60;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of namespaces the in-process backing store can hold
    pub max_entries: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Backing store cleanup interval in seconds
    pub cleanup_interval: u64,
    /// Path to the JSON tracking policy, if any
    pub settings_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Backing store capacity (default: 10000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Backing store cleanup frequency in seconds (default: 30)
    /// - `CONSISTENCY_CONFIG` - Path to a JSON settings file (default: none)
    pub fn from_env() -> Self {
        Self {
            max_entries: env::var("MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            settings_path: env::var("CONSISTENCY_CONFIG").ok().map(PathBuf::from),
        }
    }

    /// Loads the tracking policy, falling back to built-in defaults when no
    /// settings file is configured.
    pub fn load_settings(&self) -> Result<ConsistencySettings> {
        match &self.settings_path {
            Some(path) => ConsistencySettings::from_file(path),
            None => Ok(ConsistencySettings::default()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            server_port: 3000,
            cleanup_interval: 30,
            settings_path: None,
        }
    }
}

// == Model Config ==
/// Fully resolved tracking policy for one record type.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub cache_on_creation: bool,
    pub cache_on_modification: bool,
    /// Retention window in seconds
    pub cache_time: u64,
    /// Backing caches, in write order
    pub caches: Vec<String>,
    /// When non-empty, only records matching at least one predicate are tracked
    pub only_cache_matching: Vec<Predicate>,
}

impl ModelConfig {
    pub fn retention(&self) -> chrono::Duration {
        // chrono::Duration::seconds panics past i64::MAX milliseconds
        let secs = i64::try_from(self.cache_time).unwrap_or(i64::MAX);
        chrono::Duration::seconds(secs.min(i64::MAX / 1000))
    }

    /// False when neither creation nor modification is tracked.
    pub fn tracks_anything(&self) -> bool {
        self.cache_on_creation || self.cache_on_modification
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            cache_on_creation: true,
            cache_on_modification: false,
            cache_time: DEFAULT_CACHE_TIME,
            caches: vec![DEFAULT_CACHE.to_string()],
            only_cache_matching: Vec::new(),
        }
    }
}

// == Overrides ==
/// One layer of policy overrides; unset keys fall through to the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub cache_on_creation: Option<bool>,
    pub cache_on_modification: Option<bool>,
    pub cache_time: Option<u64>,
    pub caches: Option<Vec<String>>,
    pub only_cache_matching: Option<Vec<Predicate>>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut ModelConfig) {
        if let Some(v) = self.cache_on_creation {
            config.cache_on_creation = v;
        }
        if let Some(v) = self.cache_on_modification {
            config.cache_on_modification = v;
        }
        if let Some(v) = self.cache_time {
            config.cache_time = v;
        }
        if let Some(v) = &self.caches {
            config.caches = v.clone();
        }
        if let Some(v) = &self.only_cache_matching {
            config.only_cache_matching = v.clone();
        }
    }
}

// == Settings ==
/// Process-wide tracking policy: global defaults plus per-record-type overrides.
///
/// Deserializes from `{"defaults": {...}, "models": {"app.table": {...}}}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsistencySettings {
    pub defaults: ConfigOverrides,
    pub models: HashMap<String, ConfigOverrides>,
}

impl ConsistencySettings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ConsistencyError::Config(format!("invalid settings: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ConsistencyError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn with_defaults(mut self, overrides: ConfigOverrides) -> Self {
        self.defaults = overrides;
        self
    }

    pub fn with_model(mut self, record_type: &str, overrides: ConfigOverrides) -> Self {
        self.models.insert(record_type.to_string(), overrides);
        self
    }

    /// Appends a predicate to a record type's `only_cache_matching` list.
    ///
    /// Function predicates cannot come from JSON, so they are attached here.
    pub fn with_model_predicate(mut self, record_type: &str, predicate: Predicate) -> Self {
        self.models
            .entry(record_type.to_string())
            .or_default()
            .only_cache_matching
            .get_or_insert_with(Vec::new)
            .push(predicate);
        self
    }
}

// == Resolver ==
/// Resolves the effective policy for a record type.
///
/// Layers are merged once at construction: built-in defaults, then the global
/// overrides, then the per-type overrides.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    defaults: Arc<ModelConfig>,
    models: HashMap<RecordType, Arc<ModelConfig>>,
}

impl ConfigResolver {
    pub fn new(settings: &ConsistencySettings) -> Self {
        let mut defaults = ModelConfig::default();
        settings.defaults.apply(&mut defaults);

        let models = settings
            .models
            .iter()
            .map(|(id, overrides)| {
                let mut config = defaults.clone();
                overrides.apply(&mut config);
                (RecordType::new(id.as_str()), Arc::new(config))
            })
            .collect();

        Self {
            defaults: Arc::new(defaults),
            models,
        }
    }

    pub fn resolve(&self, record_type: &RecordType) -> Arc<ModelConfig> {
        self.models
            .get(record_type)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }

    /// Longest retention window of any record type.
    pub fn max_cache_time(&self) -> u64 {
        self.models
            .values()
            .map(|config| config.cache_time)
            .fold(self.defaults.cache_time, u64::max)
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(&ConsistencySettings::default())
    }
}
