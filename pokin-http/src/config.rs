use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use pokin_policy::EnrichmentPolicy;
use pokin_store::PoolSettings;

pub const DB_URL_ENV: &str = "PERENCANAAN_DB_URL";
pub const LISTEN_ADDR_ENV: &str = "POKIN_LISTEN_ADDR";
pub const CONFIG_PATH_ENV: &str = "POKIN_CONFIG";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingEnv(&'static str),
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Optional YAML file pointed to by `POKIN_CONFIG`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub pool: PoolFileConfig,
    pub enrichment: EnrichmentPolicy,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PoolFileConfig {
    pub max_connections: u32,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for PoolFileConfig {
    fn default() -> Self {
        let d = PoolSettings::default();
        Self {
            max_connections: d.max_connections,
            idle_timeout_secs: d.idle_timeout.as_secs(),
            max_lifetime_secs: d.max_lifetime.as_secs(),
        }
    }
}

impl PoolFileConfig {
    pub fn settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            max_lifetime: Duration::from_secs(self.max_lifetime_secs),
        }
    }
}

impl FileConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub pool: PoolSettings,
    pub enrichment: EnrichmentPolicy,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `get`.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get(DB_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnv(DB_URL_ENV))?;

        let raw_addr = get(LISTEN_ADDR_ENV).unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into());
        let listen_addr = raw_addr.parse().map_err(|_| ConfigError::Invalid {
            name: LISTEN_ADDR_ENV,
            value: raw_addr.clone(),
        })?;

        let file = match get(CONFIG_PATH_ENV) {
            Some(path) if !path.is_empty() => FileConfig::from_path(path)?,
            _ => FileConfig::default(),
        };

        Ok(Self {
            database_url,
            listen_addr,
            pool: file.pool.settings(),
            enrichment: file.enrichment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokin_policy::FailureMode;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn database_url_is_required() {
        let err = ServiceConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(DB_URL_ENV)));

        let err = ServiceConfig::from_lookup(lookup(&[(DB_URL_ENV, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(_)));
    }

    #[test]
    fn defaults_apply_without_config_file() {
        let cfg = ServiceConfig::from_lookup(lookup(&[(DB_URL_ENV, "mysql://u:p@db/perencanaan")])).unwrap();
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert_eq!(cfg.pool.max_connections, 70);
        assert_eq!(cfg.enrichment, EnrichmentPolicy::default());
    }

    #[test]
    fn bad_listen_addr_is_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[
            (DB_URL_ENV, "mysql://u:p@db/perencanaan"),
            (LISTEN_ADDR_ENV, "port-eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn yaml_file_overrides_pool_and_policy() {
        let path = std::env::temp_dir().join(format!("pokin-config-{}.yaml", std::process::id()));
        fs::write(
            &path,
            "pool:\n  max_connections: 8\nenrichment:\n  schedule: degrade\n",
        )
        .unwrap();

        let cfg = ServiceConfig::from_lookup(lookup(&[
            (DB_URL_ENV, "mysql://u:p@db/perencanaan"),
            (CONFIG_PATH_ENV, path.to_str().unwrap()),
        ]))
        .unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(cfg.pool.max_connections, 8);
        assert_eq!(cfg.pool.idle_timeout, Duration::from_secs(300));
        assert_eq!(cfg.enrichment.schedule, FailureMode::Degrade);
        assert_eq!(cfg.enrichment.classification, FailureMode::Degrade);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = ServiceConfig::from_lookup(lookup(&[
            (DB_URL_ENV, "mysql://u:p@db/perencanaan"),
            (CONFIG_PATH_ENV, "/nonexistent/pokin.yaml"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
