//! Config loader: builds a `MigratorConfig` from defaults, file, and environment.

use super::merge_policy;
use super::sources;
use super::MigratorConfig;
use crate::error::ConfigError;
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, an optional TOML file, and the environment
    pub fn load(config_file: Option<&Path>) -> Result<MigratorConfig, ConfigError> {
        let mut builder = merge_policy::builder_with_defaults()?;

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    error: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "config file not found",
                    ),
                });
            }
            debug!(config_path = %path.display(), "Loading config file");
            builder = sources::add_file(builder, path)?;
        }

        builder = sources::add_environment(builder)?;

        let config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load configuration from a TOML file only, ignoring the environment
    pub fn load_from_file(path: &Path) -> Result<MigratorConfig, ConfigError> {
        let builder = sources::add_file(merge_policy::builder_with_defaults()?, path)?;
        Ok(builder.build()?.try_deserialize()?)
    }
}
