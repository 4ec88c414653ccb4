//! Layered configuration loading.
//!
//! Three sources, lowest to highest precedence: the embedded defaults
//! TOML (source of truth for the shape and defaults), an optional user
//! file under the XDG config directory, and `ARABIC_SEARCH__*`
//! environment variables. Mirrors the teacher's
//! `infrastructure/config/loader.rs` three-layer precedence.

use crate::domain::error::{Error, Result};
use config::{Config as ConfigBuilder, Environment, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Embedded default configuration, compiled into the binary so it works
/// regardless of the process's working directory.
const DEFAULT_CONFIG_TOML: &str = include_str!("../../config/default.toml");

/// The device a model-backed [`crate::domain::ports::EmbeddingModel`]
/// prefers. GPU is an optimization, never a requirement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

/// Embedding Service configuration surface (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub device: Device,
    #[validate(range(min = 1))]
    pub batch_size: usize,
    #[validate(range(min = 1))]
    pub max_seq_tokens: usize,
    #[validate(range(min = 1))]
    pub cache_max_entries: u64,
    pub no_ml_mode: bool,
    /// Dimensionality of the model-backed path. NO-ML mode always uses
    /// [`crate::domain::chunking`]-independent fixed 256 regardless of
    /// this value (§9 Open Question resolution).
    #[validate(range(min = 1))]
    pub model_dimensions: usize,
    /// Conservative available-memory floor, in bytes, below which the
    /// memory guard forces `no_ml_mode = true` (§4.3.4, default ≈1.5 GiB).
    #[validate(range(min = 1))]
    pub memory_guard_bytes: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "paraphrase-multilingual-mpnet-base-v2".to_string(),
            device: Device::Cpu,
            batch_size: 32,
            max_seq_tokens: 512,
            cache_max_entries: 10_000,
            no_ml_mode: false,
            model_dimensions: 768,
            memory_guard_bytes: 1_500 * 1024 * 1024,
        }
    }
}

/// Query cache configuration (part of C5).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueryCacheConfig {
    #[validate(range(min = 1))]
    pub max_entries: u64,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self { max_entries: 200 }
    }
}

/// Relevance-scoring tunables (§4.5 step 4).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScoringConfig {
    #[validate(range(min = 1.0))]
    pub verified_boost: f32,
    #[validate(range(min = 1.0))]
    pub recency_boost: f32,
    #[validate(range(min = 0))]
    pub recency_days: i64,
    /// Multiplier applied to `top_k` when over-fetching from the vector
    /// index in the unfiltered fast path; the spec's `K = max(top_k * 5,
    /// 50)`.
    #[validate(range(min = 1))]
    pub overfetch_multiplier: usize,
    #[validate(range(min = 1))]
    pub overfetch_floor: usize,
    /// Default `alpha` for `find_similar_hybrid`.
    #[validate(range(min = 0.0, max = 1.0))]
    pub hybrid_alpha: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            verified_boost: 1.15,
            recency_boost: 1.10,
            recency_days: 90,
            overfetch_multiplier: 5,
            overfetch_floor: 50,
            hybrid_alpha: 0.7,
        }
    }
}

/// Per-parent small-batch commit size for Index Maintenance (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MaintenanceConfig {
    #[validate(range(min = 1))]
    pub commit_batch_size: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            commit_batch_size: 48,
        }
    }
}

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    /// Whether search should route through the in-memory vector index
    /// ([`crate::domain::types::EmbeddingMode::ModelWithIndex`]) or fall
    /// back to a brute-force scan over storage
    /// ([`crate::domain::types::EmbeddingMode::ModelBruteForce`]); ignored
    /// once `no_ml_mode` forces [`crate::domain::types::EmbeddingMode::HashFallback`].
    pub use_vector_index: bool,
    #[validate(nested)]
    pub embedding: EmbeddingConfig,
    #[validate(nested)]
    pub query_cache: QueryCacheConfig,
    #[validate(nested)]
    pub scoring: ScoringConfig,
    #[validate(nested)]
    pub maintenance: MaintenanceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "arabic-legal-search-core".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            use_vector_index: true,
            embedding: EmbeddingConfig::default(),
            query_cache: QueryCacheConfig::default(),
            scoring: ScoringConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

/// Returns the embedded default config TOML, exposed for tests that
/// verify parsing of the defaults in isolation.
pub fn default_config_toml() -> &'static str {
    DEFAULT_CONFIG_TOML
}

/// Loads [`AppConfig`] from embedded defaults, an optional user file and
/// environment variables, in that precedence order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load embedded defaults only, skipping the user file and
    /// environment layers. Used by tests that assert on shipped defaults.
    pub fn load_embedded_defaults_only(&self) -> Result<AppConfig> {
        let built = ConfigBuilder::builder()
            .add_source(config::File::from_str(
                DEFAULT_CONFIG_TOML,
                FileFormat::Toml,
            ))
            .build()?;
        Self::finish(built)
    }

    /// Load defaults, then the user config file at
    /// `$XDG_CONFIG_HOME/arabic-legal-search/config.toml` if present, then
    /// `ARABIC_SEARCH__*` environment variables.
    pub fn load(&self) -> Result<AppConfig> {
        let mut builder = ConfigBuilder::builder().add_source(config::File::from_str(
            DEFAULT_CONFIG_TOML,
            FileFormat::Toml,
        ));

        if let Some(dir) = dirs::config_dir() {
            let user_config_path = dir.join("arabic-legal-search").join("config.toml");
            if user_config_path.exists() {
                builder =
                    builder.add_source(config::File::from(user_config_path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ARABIC_SEARCH")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder.build()?)
    }

    /// Load defaults, then a specific TOML file, then environment
    /// variables.
    pub fn load_with_file(&self, path: &Path) -> Result<AppConfig> {
        let builder = ConfigBuilder::builder()
            .add_source(config::File::from_str(
                DEFAULT_CONFIG_TOML,
                FileFormat::Toml,
            ))
            .add_source(config::File::from(path).required(false))
            .add_source(
                Environment::with_prefix("ARABIC_SEARCH")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::finish(builder.build()?)
    }

    fn finish(built: config::Config) -> Result<AppConfig> {
        let cfg: AppConfig = built
            .try_deserialize()
            .map_err(|e| Error::config(format!("failed to deserialize configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn embedded_defaults_load_and_validate() {
        let cfg = ConfigLoader::new().load_embedded_defaults_only().unwrap();
        assert_eq!(cfg.embedding.model_dimensions, 768);
        assert_eq!(cfg.query_cache.max_entries, 200);
        assert!((cfg.scoring.hybrid_alpha - 0.7).abs() < f32::EPSILON);
    }

    // Mutates process-wide environment state; must not interleave with
    // other tests touching the same `ARABIC_SEARCH__*` variables.
    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        std::env::set_var("ARABIC_SEARCH__EMBEDDING__NO_ML_MODE", "true");
        let cfg = ConfigLoader::new().load().unwrap();
        std::env::remove_var("ARABIC_SEARCH__EMBEDDING__NO_ML_MODE");
        assert!(cfg.embedding.no_ml_mode);
    }

    #[test]
    #[serial]
    fn user_file_overrides_defaults_and_env_overrides_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scoring]\nhybrid_alpha = 0.2").unwrap();

        let cfg = ConfigLoader::new().load_with_file(file.path()).unwrap();
        assert!((cfg.scoring.hybrid_alpha - 0.2).abs() < f32::EPSILON);
        // untouched fields still come from the embedded defaults
        assert_eq!(cfg.embedding.model_dimensions, 768);

        std::env::set_var("ARABIC_SEARCH__SCORING__HYBRID_ALPHA", "0.9");
        let cfg = ConfigLoader::new().load_with_file(file.path()).unwrap();
        std::env::remove_var("ARABIC_SEARCH__SCORING__HYBRID_ALPHA");
        assert!((cfg.scoring.hybrid_alpha - 0.9).abs() < f32::EPSILON);
    }
}
