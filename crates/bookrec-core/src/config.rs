//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_CACHE__CAPACITY=50` sets `cache.capacity`). `expand_path` expands
//! `~` and `${VAR}` in configured paths.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_in(Path::new("."), &env_name)
    }

    /// Load `config.toml` and the env overlay from `dir`. Missing files are skipped.
    pub fn load_in(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name: env_name.to_string() };
        config.settings()?;
        Ok(config)
    }

    /// Defaults overlaid with an inline TOML document; no files, no env.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        let config = Self { figment, env_name: "inline".to_string() };
        config.settings()?;
        Ok(config)
    }

    pub fn env_name(&self) -> &str { &self.env_name }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub cache: CacheSettings,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.capacity == 0 {
            anyhow::bail!("cache.capacity must be >= 1");
        }
        if self.index.nprobes == 0 {
            anyhow::bail!("index.nprobes must be >= 1");
        }
        if self.index.embed_batch_size == 0 {
            anyhow::bail!("index.embed_batch_size must be >= 1");
        }
        if self.embedding.dim == 0 {
            anyhow::bail!("embedding.dim must be >= 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// JSON file or directory of JSON files holding the corpus.
    pub corpus_path: String,
    /// LanceDB directory for built snapshots.
    pub snapshot_dir: String,
    pub table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            corpus_path: "data/books.json".to_string(),
            snapshot_dir: "data/indexes/lancedb".to_string(),
            table: "books".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic feature-hashing embedder; no model files needed.
    Hash,
    /// Local transformer model loaded from `model_dir`.
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    /// Output dimension of the hashing provider. The local model reports its own.
    pub dim: usize,
    pub model_dir: String,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            dim: 384,
            model_dir: "models/bge-m3".to_string(),
            max_len: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// IVF partitions; 0 picks about sqrt(n) at build time.
    pub num_partitions: usize,
    pub nprobes: usize,
    pub kmeans_iterations: usize,
    pub seed: u64,
    pub embed_batch_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { num_partitions: 0, nprobes: 4, kmeans_iterations: 10, seed: 42, embed_batch_size: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self { Self { capacity: 100 } }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().expect("defaults validate");
        assert_eq!(settings.cache.capacity, 100);
        assert_eq!(settings.embedding.provider, EmbeddingProvider::Hash);
    }

    #[test]
    fn inline_toml_overrides_defaults() {
        let config = Config::from_toml_str(
            r#"
            [cache]
            capacity = 8

            [index]
            nprobes = 2
            "#,
        )
        .expect("config");
        let settings = config.settings().expect("settings");
        assert_eq!(settings.cache.capacity, 8);
        assert_eq!(settings.index.nprobes, 2);
        assert_eq!(settings.index.seed, 42, "untouched keys keep defaults");
        let table: String = config.get("data.table").expect("get");
        assert_eq!(table, "books");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(Config::from_toml_str("[cache]\ncapacity = 0\n").is_err());
    }
}
