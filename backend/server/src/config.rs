use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("Invalid {key} value: {message}")]
pub struct ConfigError {
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mongo,
    Postgres,
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(Backend::Mongo),
            "postgres" | "postgresql" | "supabase" => Ok(Backend::Postgres),
            "memory" => Ok(Backend::Memory),
            other => Err(format!(
                "unknown backend '{other}', expected mongo, postgres or memory"
            )),
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Backend::Mongo => "mongo",
            Backend::Postgres => "postgres",
            Backend::Memory => "memory",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: Backend,
    pub mongo_uri: String,
    pub mongo_db: String,
    pub database_url: String,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("PORT", "3000")?,
            backend: try_load("STORE_BACKEND", "mongo")?,
            mongo_uri: secret_or_var("MONGODB_URI", "mongodb://localhost:27017"),
            mongo_db: try_load("MONGODB_DB", "plants_db")?,
            database_url: secret_or_var(
                "DATABASE_URL",
                "postgres://postgres@localhost:5432/plants",
            ),
            catalog_path: var("CATALOG_PATH").map(PathBuf::from),
        })
    }
}

/// Defaults for local development against the in-memory store.
impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            backend: Backend::Memory,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_db: "plants_db".to_string(),
            database_url: "postgres://postgres@localhost:5432/plants".to_string(),
            catalog_path: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    parse_or_default(key, var(key), default)
}

fn parse_or_default<T: FromStr>(
    key: &str,
    value: Option<String>,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");

            ConfigError {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
}

/// Connection strings carry credentials, so a mounted secret wins over the
/// environment.
fn secret_or_var(key: &str, default: &str) -> String {
    read_secret(key)
        .or_else(|| var(key))
        .unwrap_or_else(|| {
            info!("{key} not set, using default");
            default.to_string()
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("No {secret_name} secret at {path}: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!("mongo".parse::<Backend>(), Ok(Backend::Mongo));
        assert_eq!("MongoDB".parse::<Backend>(), Ok(Backend::Mongo));
        assert_eq!("supabase".parse::<Backend>(), Ok(Backend::Postgres));
        assert_eq!(" memory ".parse::<Backend>(), Ok(Backend::Memory));
        assert!("redis".parse::<Backend>().is_err());
    }

    #[test]
    fn test_backend_display_round_trips() {
        for backend in [Backend::Mongo, Backend::Postgres, Backend::Memory] {
            assert_eq!(backend.to_string().parse::<Backend>(), Ok(backend));
        }
    }

    #[test]
    fn test_default_used_when_unset() {
        let port: u16 = parse_or_default("PORT", None, "3000").unwrap();

        assert_eq!(port, 3000);
    }

    #[test]
    fn test_value_overrides_default() {
        let port: u16 = parse_or_default("PORT", Some("8080".to_string()), "3000").unwrap();

        assert_eq!(port, 8080);
    }

    #[test]
    fn test_invalid_value() {
        let err = parse_or_default::<u16>("PORT", Some("not-a-port".to_string()), "3000")
            .unwrap_err();

        assert_eq!(err.key, "PORT");
        assert!(err.to_string().starts_with("Invalid PORT value"));

        let err = parse_or_default::<Backend>("STORE_BACKEND", Some("redis".to_string()), "mongo")
            .unwrap_err();

        assert!(err.message.contains("unknown backend 'redis'"));
    }
}
