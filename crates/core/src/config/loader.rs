//! Configuration loader for `runnode.toml`.
//!
//! Sources are layered, later ones winning:
//! - built-in defaults
//! - `runnode.toml` (or the file given with `--config`)
//! - `RUNNODE_*` environment variables

use crate::config::error::{ConfigError, ConfigResult};
use rn_protocol::WorkerConfig;
use std::path::{Path, PathBuf};

/// Config file looked up in the current directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "runnode.toml";

/// Prefix shared by all environment overrides.
pub const ENV_PREFIX: &str = "RUNNODE_";

/// Loads the worker configuration.
///
/// With an explicit `path` the file must exist. Without one,
/// `runnode.toml` in the current directory is used when present and the
/// defaults otherwise. Environment overrides are applied and the result is
/// validated.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file cannot be read
/// - The file is not valid TOML or has fields of the wrong type
/// - An environment override cannot be parsed
/// - The merged configuration fails validation
///
/// # Example
///
/// ```rust,no_run
/// use rn_core::config::load_config;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Some(Path::new("runnode.toml")))?;
/// println!("Listening on {}", config.listen);
/// # Ok(())
/// # }
/// ```
pub fn load_config(path: Option<&Path>) -> ConfigResult<WorkerConfig> {
    let config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                read_config_file(&default_path)?
            } else {
                WorkerConfig::default()
            }
        }
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> ConfigResult<WorkerConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let config: WorkerConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Apply `RUNNODE_*` overrides read through `lookup`.
///
/// `lookup` is `std::env::var` in production; tests pass a map.
pub fn apply_env_overrides<F>(mut config: WorkerConfig, lookup: F) -> ConfigResult<WorkerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(name) = var("NAME") {
        config.name = Some(name);
    }
    if let Some(listen) = var("LISTEN") {
        config.listen = listen.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}LISTEN"),
                value: listen.clone(),
                reason: e.to_string(),
            }
        })?;
    }
    if let Some(url) = var("ADVERTISE_URL") {
        config.advertise_url = Some(url);
    }
    if let Some(url) = var("REGISTRY_URL") {
        config.registry_url = url;
    }
    if let Some(url) = var("LEDGER_URL") {
        config.ledger_url = url;
    }
    if let Some(root) = var("WORK_ROOT") {
        config.work_root = PathBuf::from(root);
    }
    if let Some(log) = var("PROCESS_LOG") {
        config.process_log = log;
    }
    if let Some(log) = var("LOG_FILE") {
        config.log_file = PathBuf::from(log);
    }
    if let Some(secs) = var("NOTIFY_TIMEOUT_SECS") {
        config.notify_timeout_secs =
            secs.parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    key: format!("{ENV_PREFIX}NOTIFY_TIMEOUT_SECS"),
                    value: secs.clone(),
                    reason: e.to_string(),
                })?;
    }

    Ok(config)
}

fn validate(config: &WorkerConfig) -> ConfigResult<()> {
    if let Some(name) = &config.name {
        if name.trim().is_empty() || name.contains('/') {
            return Err(ConfigError::InvalidConfig {
                reason: format!("worker name '{name}' must be non-empty and contain no '/'"),
            });
        }
    }

    let process_log = Path::new(&config.process_log);
    if config.process_log.is_empty() || process_log.components().count() != 1 {
        return Err(ConfigError::InvalidConfig {
            reason: format!(
                "process_log '{}' must be a plain file name",
                config.process_log
            ),
        });
    }

    if config.notify_timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig {
            reason: "notify_timeout_secs must be greater than zero".to_string(),
        });
    }

    Ok(())
}

/// Host name of this machine, or `"localhost"` if it is not valid UTF-8.
pub fn host_name() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "localhost".to_string())
}

/// Name the worker registers under.
pub fn resolve_name(config: &WorkerConfig) -> String {
    config.name.clone().unwrap_or_else(host_name)
}

/// URL callers use to reach the worker.
///
/// Defaults to `http://<name>:<port>` when the config sets none.
pub fn advertise_url(config: &WorkerConfig, name: &str) -> String {
    match &config.advertise_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => format!("http://{}:{}", name, config.listen.port()),
    }
}
