//! Layered configuration.
//!
//! Sources are merged in this order, later ones winning:
//! 1. `Config::default()`
//! 2. the TOML file given explicitly, or `pr-impact.toml` in the working directory
//! 3. environment variables prefixed with `PR_IMPACT_`, nested keys split on `__`
//!    (`PR_IMPACT_LOG__LEVEL=debug`)
//! 4. overrides set by the caller, usually from command line flags

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{
    impact::RetrievalOptions,
    index::DEFAULT_DIMENSIONS,
    language::Language,
    logging::parse_log_level,
    pipeline::{default_excluded_dirs, PipelineSettings},
    resolver::TouchPolicy,
};

pub const DEFAULT_CONFIG_FILENAME: &str = "pr-impact.toml";
pub const ENV_PREFIX: &str = "PR_IMPACT_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Branch the pull requests are merged into.
    pub base_branch: String,
    pub primary_language: Language,
    pub secondary_language: Language,
    pub top_k: usize,
    pub min_score: f32,
    pub touch_policy: TouchPolicy,
    pub excluded_dirs: Vec<String>,
    pub embedding_dimensions: usize,
    pub log: LogConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let retrieval = RetrievalOptions::default();
        Config {
            base_branch: "main".to_string(),
            primary_language: Language::Python,
            secondary_language: Language::Java,
            top_k: retrieval.top_k,
            min_score: retrieval.min_score,
            touch_policy: TouchPolicy::default(),
            excluded_dirs: default_excluded_dirs(),
            embedding_dimensions: DEFAULT_DIMENSIONS,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            primary_language: self.primary_language,
            secondary_language: self.secondary_language,
            retrieval: RetrievalOptions {
                top_k: self.top_k,
                min_score: self.min_score,
            },
            touch_policy: self.touch_policy,
            excluded_dirs: self.excluded_dirs.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            bail!("top_k must be at least 1");
        }
        if self.embedding_dimensions == 0 {
            bail!("embedding_dimensions must be at least 1");
        }
        if !self.min_score.is_finite() {
            bail!("min_score must be a finite number");
        }
        if self.primary_language == self.secondary_language {
            bail!(
                "primary_language and secondary_language are both {}",
                self.primary_language
            );
        }
        parse_log_level(&self.log.level)?;
        Ok(())
    }
}

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        ConfigLoader::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        ConfigLoader {
            config_path: None,
            env_prefix: ENV_PREFIX.to_string(),
            overrides: Figment::new(),
        }
    }

    /// Reads this file instead of looking for `pr-impact.toml`. The file must exist.
    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Sets `key` (dotted for nested keys) above every other source.
    pub fn with_override<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    pub fn load(&self) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        match &self.config_path {
            Some(path) => {
                if !path.is_file() {
                    bail!("configuration file `{}` not found", path.display());
                }
                debug!("reading configuration from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILENAME);
                if default_path.is_file() {
                    debug!("reading configuration from {}", default_path.display());
                    figment = figment.merge(Toml::file(default_path));
                }
            }
        }

        // `<prefix>LOG` is the log filter, not a configuration key.
        figment = figment
            .merge(Env::prefixed(&self.env_prefix).ignore(&["log"]).split("__"))
            .merge(self.overrides.clone());

        let config: Config = figment
            .extract()
            .context("failed to extract configuration")?;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}
