//! Config sources: an explicit TOML file and `BROKER_MIGRATE__*` environment variables.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use config::FileFormat;
use std::path::Path;

/// Environment variable prefix. Sections are separated by a double
/// underscore, e.g. `BROKER_MIGRATE__SECRET_STORE__STORE_ID`.
pub const ENV_PREFIX: &str = "BROKER_MIGRATE";
pub const ENV_SEPARATOR: &str = "__";

/// Add the config file to the builder. The file is required once named.
pub fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(true)))
}

/// Add environment overrides to the builder.
pub fn add_environment(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR),
    ))
}
