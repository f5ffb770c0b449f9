//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `SEMDEX_*` env vars (`__` separates nested keys, e.g.
//! `SEMDEX_SEARCH__DEFAULT_LIMIT=10`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkOptions;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    /// Documents per embedding-provider call.
    pub batch_size: usize,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self { batch_size: 32 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub semantic_weight: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_limit: 20, semantic_weight: 0.7 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: String,
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: "hashing".to_string(), dimensions: 384 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index_dir: PathBuf,
    pub chunking: ChunkOptions,
    pub indexing: IndexingSettings,
    pub search: SearchSettings,
    pub embedding: EmbeddingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("data/indexes"),
            chunking: ChunkOptions::default(),
            indexing: IndexingSettings::default(),
            search: SearchSettings::default(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Merge defaults, `config.toml`, `config.<env>.toml` under `dir`, then `SEMDEX_*` env vars.
    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("SEMDEX_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Typed settings with `index_dir` expanded; fails on out-of-range values.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.index_dir = expand_path(settings.index_dir.to_string_lossy());
        validate(&settings)?;
        Ok(settings)
    }
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.indexing.batch_size == 0 {
        return Err(Error::InvalidConfig("indexing.batch_size must be at least 1".into()));
    }
    if !(0.0..=1.0).contains(&settings.search.semantic_weight) {
        return Err(Error::InvalidConfig(format!(
            "search.semantic_weight must lie in [0, 1], got {}",
            settings.search.semantic_weight
        )));
    }
    if settings.embedding.dimensions == 0 {
        return Err(Error::InvalidConfig("embedding.dimensions must be at least 1".into()));
    }
    Ok(())
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
