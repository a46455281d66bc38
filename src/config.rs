use std::env;

use tracing::info;

use crate::error::ConfigError;

const DEFAULT_ADMIN_SESSION_HOURS: i64 = 24;

/// Server settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub admin_password: String,
    pub admin_session_hours: i64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let admin_password = lookup("ADMIN_PASSWORD")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("ADMIN_PASSWORD"))?;
        let admin_session_hours = match lookup("ADMIN_SESSION_HOURS") {
            Some(raw) => {
                let hours: i64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: "ADMIN_SESSION_HOURS",
                    reason: format!("{}", e),
                })?;
                if hours <= 0 {
                    return Err(ConfigError::Invalid {
                        key: "ADMIN_SESSION_HOURS",
                        reason: "must be positive".to_string(),
                    });
                }
                hours
            }
            None => {
                info!(
                    "ADMIN_SESSION_HOURS not set, using default: {}",
                    DEFAULT_ADMIN_SESSION_HOURS
                );
                DEFAULT_ADMIN_SESSION_HOURS
            }
        };

        Ok(ServerConfig {
            database_url,
            admin_password,
            admin_session_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "lucky.db"),
            ("ADMIN_PASSWORD", "hunter2"),
        ]))
        .expect("config should load");
        assert_eq!(config.database_url, "lucky.db");
        assert_eq!(config.admin_password, "hunter2");
        assert_eq!(config.admin_session_hours, 24);
    }

    #[test]
    fn test_missing_required() {
        let err = ServerConfig::from_lookup(lookup_from(&[("DATABASE_URL", "lucky.db")]))
            .expect_err("password is required");
        assert!(matches!(err, ConfigError::Missing("ADMIN_PASSWORD")));

        let err = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", ""),
            ("ADMIN_PASSWORD", "x"),
        ]))
        .expect_err("empty database url is rejected");
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_session_hours() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "lucky.db"),
            ("ADMIN_PASSWORD", "x"),
            ("ADMIN_SESSION_HOURS", "6"),
        ]))
        .expect("config should load");
        assert_eq!(config.admin_session_hours, 6);

        for bad in ["0", "-1", "soon"] {
            let err = ServerConfig::from_lookup(lookup_from(&[
                ("DATABASE_URL", "lucky.db"),
                ("ADMIN_PASSWORD", "x"),
                ("ADMIN_SESSION_HOURS", bad),
            ]))
            .expect_err("invalid hours");
            assert!(matches!(err, ConfigError::Invalid { .. }));
        }
    }
}
