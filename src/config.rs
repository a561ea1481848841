//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/fixtree/fixtree.toml`
//! 3. Local config: `<dir>/.fixtree.toml`
//! 4. Environment variables: `FIXTREE_*` prefix, `__` between section and key

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Knobs of tree expansion and materialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    /// Null injection probability for nullable properties
    pub null_inject: f64,
    /// Container length bounds used when a node has no size constraint
    pub default_min_size: usize,
    pub default_max_size: usize,
    /// Depth at which containers stop growing and nullable objects become null
    pub max_depth: usize,
    /// Resample budget of a single post condition
    pub post_condition_attempts: usize,
    /// Base seed; pull n uses `seed + n`
    pub seed: Option<u64>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            null_inject: 0.2,
            default_min_size: 0,
            default_max_size: 3,
            max_depth: 8,
            post_condition_attempts: 100,
            seed: None,
        }
    }
}

/// Knobs of end-result validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationSettings {
    /// Default attempt budget of predicate validators
    pub max_attempts: usize,
    /// Return only candidates accepted by the validator
    pub valid_only: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            valid_only: true,
        }
    }
}

/// Raw generation settings for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawGenerationSettings {
    pub null_inject: Option<f64>,
    pub default_min_size: Option<usize>,
    pub default_max_size: Option<usize>,
    pub max_depth: Option<usize>,
    pub post_condition_attempts: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawValidationSettings {
    pub max_attempts: Option<usize>,
    pub valid_only: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub generation: RawGenerationSettings,
    pub validation: RawValidationSettings,
}

impl GenerationSettings {
    /// Overlay wins where it specifies a value.
    pub fn merge(&self, overlay: &RawGenerationSettings) -> Self {
        Self {
            null_inject: overlay.null_inject.unwrap_or(self.null_inject),
            default_min_size: overlay.default_min_size.unwrap_or(self.default_min_size),
            default_max_size: overlay.default_max_size.unwrap_or(self.default_max_size),
            max_depth: overlay.max_depth.unwrap_or(self.max_depth),
            post_condition_attempts: overlay
                .post_condition_attempts
                .unwrap_or(self.post_condition_attempts),
            seed: overlay.seed.or(self.seed),
        }
    }
}

impl ValidationSettings {
    pub fn merge(&self, overlay: &RawValidationSettings) -> Self {
        Self {
            max_attempts: overlay.max_attempts.unwrap_or(self.max_attempts),
            valid_only: overlay.valid_only.unwrap_or(self.valid_only),
        }
    }
}

/// Unified configuration for fixtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub generation: GenerationSettings,
    pub validation: ValidationSettings,
}

/// Get the XDG config directory for fixtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "fixtree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("fixtree.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".fixtree.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            generation: self.generation.merge(&overlay.generation),
            validation: self.validation.merge(&overlay.validation),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.fixtree.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), local_dir)
    }

    /// Same as [`Settings::load`] with an explicit global config file.
    pub fn load_from(
        global_path: Option<&Path>,
        local_dir: Option<&Path>,
    ) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_path {
            if global_path.exists() {
                let raw = load_raw_settings(global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Local config
        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Environment variables (explicit override)
        current = Self::apply_env_overrides(current)?;

        current.validate()?;
        Ok(current)
    }

    /// Apply FIXTREE_* environment variables, e.g. `FIXTREE_GENERATION__MAX_DEPTH=4`.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("FIXTREE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_float("generation.null_inject") {
            settings.generation.null_inject = val;
        }
        if let Ok(val) = config.get::<usize>("generation.default_min_size") {
            settings.generation.default_min_size = val;
        }
        if let Ok(val) = config.get::<usize>("generation.default_max_size") {
            settings.generation.default_max_size = val;
        }
        if let Ok(val) = config.get::<usize>("generation.max_depth") {
            settings.generation.max_depth = val;
        }
        if let Ok(val) = config.get::<usize>("generation.post_condition_attempts") {
            settings.generation.post_condition_attempts = val;
        }
        if let Ok(val) = config.get::<u64>("generation.seed") {
            settings.generation.seed = Some(val);
        }
        if let Ok(val) = config.get::<usize>("validation.max_attempts") {
            settings.validation.max_attempts = val;
        }
        if let Ok(val) = config.get_bool("validation.valid_only") {
            settings.validation.valid_only = val;
        }

        Ok(settings)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let generation = &self.generation;
        if !(0.0..=1.0).contains(&generation.null_inject) {
            return Err(ApplicationError::Config {
                message: format!(
                    "generation.null_inject must be within [0, 1], got {}",
                    generation.null_inject
                ),
            });
        }
        if generation.default_min_size > generation.default_max_size {
            return Err(ApplicationError::Config {
                message: format!(
                    "generation.default_min_size ({}) exceeds generation.default_max_size ({})",
                    generation.default_min_size, generation.default_max_size
                ),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# fixtree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/fixtree/fixtree.toml
#   Local:  <dir>/.fixtree.toml
#   Env:    FIXTREE_<SECTION>__<KEY>, e.g. FIXTREE_GENERATION__MAX_DEPTH=4

[generation]
# Probability of null for nullable properties (0.0 - 1.0)
# null_inject = 0.2

# Container length when no size is requested
# default_min_size = 0
# default_max_size = 3

# Containers at this depth stay empty, nullable objects below it become null
# max_depth = 8

# Resamples allowed per post condition before giving up
# post_condition_attempts = 100

# Fixed seed for reproducible output
# seed = 42

[validation]
# Attempts of a predicate validator before giving up
# max_attempts = 10

# Only return candidates the validator accepts
# valid_only = true
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
