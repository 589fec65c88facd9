use core_types::PartitionRegistry;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use logging::init_tracing;
pub use settings::{
    CacheConfig, Config, EngineConfig, LogFormat, LoggingConfig, RegistryConfig, RemoteConfig,
};

/// Prefix of environment variables that override file settings,
/// e.g. `RFSD__REMOTE__ACCESS_TOKEN`.
pub const ENV_PREFIX: &str = "RFSD";

/// Loads the application configuration.
///
/// Sources are layered: built-in defaults, then the TOML file at `path` (which
/// may be absent), then `RFSD__SECTION__KEY` environment variables. The result
/// is validated before it is returned.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cache.preload_years"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    validate(&config)?;

    Ok(config)
}

/// Checks cross-field invariants that serde cannot express.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let registry = registry_from(config)?;

    for &year in &config.cache.preload_years {
        registry
            .validate(year)
            .map_err(|e| ConfigError::ValidationError(format!("cache.preload_years: {e}")))?;
    }

    let engine = &config.engine;
    if engine.max_limit == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_limit must be at least 1".to_string(),
        ));
    }
    if engine.default_limit == 0 || engine.default_limit > engine.max_limit {
        return Err(ConfigError::ValidationError(format!(
            "engine.default_limit must be within 1-{}",
            engine.max_limit
        )));
    }
    if engine.max_sample_rows == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_sample_rows must be at least 1".to_string(),
        ));
    }
    if engine.sector_scan_cap == 0 {
        return Err(ConfigError::ValidationError(
            "engine.sector_scan_cap must be at least 1".to_string(),
        ));
    }
    if engine.key_column.is_empty() || engine.category_column.is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.key_column and engine.category_column must not be empty".to_string(),
        ));
    }
    if config.remote.dataset.split('/').count() != 2 {
        return Err(ConfigError::ValidationError(format!(
            "remote.dataset must look like 'owner/name', got '{}'",
            config.remote.dataset
        )));
    }

    Ok(())
}

/// Builds the partition registry described by the `[registry]` section.
pub fn registry_from(config: &Config) -> Result<PartitionRegistry, ConfigError> {
    PartitionRegistry::new(config.registry.first_year, config.registry.last_year)
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
}
