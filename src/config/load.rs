//! Configuration loading from files and the environment.

use std::path::Path;

use super::{Config, ConfigError};

pub const DEFAULT_CONFIG_FILE: &str = "formadoc.yaml";

/// Prefix of environment overrides: `FORMADOC__RENDER__CHARS_PER_PAGE=2500`.
const ENV_PREFIX: &str = "FORMADOC";
const ENV_SEPARATOR: &str = "__";

impl Config {
    /// Load the config from the command line argument, defaulting to `formadoc.yaml`.
    ///
    /// The file is optional: without it, defaults and environment overrides apply.
    pub fn load_from_arg(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let config_file = if config_file.is_relative() {
            std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file)
        } else {
            config_file.to_path_buf()
        };

        Self::load_from_file(&config_file, environment())
    }

    /// Load the config from a file path and an environment source.
    fn load_from_file(path: &Path, env: config::Environment) -> Result<Self, ConfigError> {
        let path_str = path
            .as_os_str()
            .to_str()
            .ok_or_else(|| ConfigError::EncodePath(path.to_path_buf()))?;

        tracing::debug!(path = path_str, exists = path.exists(), "loading config");

        let config = config::Config::builder()
            .add_source(config::File::new(path_str, config::FileFormat::Yaml).required(false))
            .add_source(env)
            .build()?
            .try_deserialize::<Config>()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.render.chars_per_page == 0 {
            return Err(ConfigError::Validation(
                "render.chars_per_page must be greater than 0".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(store) = &self.store
            && store.url.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "store.url is required when a store section is configured".to_string(),
            ));
        }
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
