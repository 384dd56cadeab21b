use config::{Config, Environment, File, Map};
use fhub_domain::config::AppConfig;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::Path;
use tracing::info;

/// Prefix of environment overrides, e.g. `FHUB__FEATURES__HTTP_SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "FHUB";
pub const ENV_SEPARATOR: &str = "__";

/// Custom error type for config loading.
#[fhub_derive::fhub_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", Self::format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads the application configuration: the `lifecycle` knobs plus one
/// section per feature under `features`.
///
/// # Errors
/// See [`load_config`].
///
/// # Example
/// ```rust,no_run
/// use fhub_kernel::config::load_app_config;
///
/// let cfg = load_app_config("config/server.yaml").unwrap();
/// println!("{} feature sections", cfg.features.len());
/// ```
pub fn load_app_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    load_config(path)
}

/// [`load_app_config`] reading overrides from `env` instead of the process
/// environment.
///
/// # Errors
/// See [`load_config`].
pub fn load_app_config_with_env<I>(path: impl AsRef<Path>, env: I) -> Result<AppConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    load_config_with_env(path, Some(env.into_iter().collect()))
}

/// A reusable configuration loader that combines file-based settings with environment overrides.
///
/// This function implements a layered configuration strategy:
/// 1. **Base File**: Loads settings from a file; the format (`yaml`, `toml`, `json`, ...) follows the extension.
/// 2. **Environment Overrides**: Overlays values from environment variables prefixed with `FHUB__`.
///    Nested structures are accessed using double underscores (e.g., `FHUB__LIFECYCLE__SHUTDOWN_TIMEOUT_MS`
///    maps to `lifecycle.shutdown_timeout_ms`).
///
/// # Errors
/// This function will return an error if:
/// * The configuration file cannot be found or parsed.
/// * The content does not match the structure of type `T`.
pub fn load_config<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load_config_with_env(path, None)
}

/// [`load_config`] with the overrides taken from `env` when given, the process
/// environment otherwise.
///
/// # Errors
/// See [`load_config`].
pub fn load_config_with_env<T>(path: impl AsRef<Path>, env: Option<Map<String, String>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();

    let builder = Config::builder().add_source(File::from(path).required(true)).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .convert_case(config::Case::Snake)
            .source(env),
    );

    info!("Loading config from {}", path.display());

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
