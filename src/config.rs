use std::net::SocketAddr;

use crate::token::TOKEN_LIFETIME_SECS;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Attributes of the `jwt` session cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age_secs: i64,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: false,
            max_age_secs: TOKEN_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub frontend_url: Option<String>,
    pub cookie: CookiePolicy,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("JWT_SECRET_KEY")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        Ok(Self {
            host: get("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 4002)?,
            database_url: get("DATABASE_URL", "sqlite:./todo.db"),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            frontend_url: lookup("FRONTEND_URL").filter(|s| !s.is_empty()),
            cookie: CookiePolicy {
                secure: parse_bool(&lookup, "COOKIE_SECURE", false)?,
                max_age_secs: parse(&lookup, "COOKIE_MAX_AGE_SECS", TOKEN_LIFETIME_SECS)?,
            },
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::Invalid {
            key: "HOST",
            value: addr,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("FALSE") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET_KEY", "s3cret")])).unwrap();
        assert_eq!(config.port, 4002);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.database_url, "sqlite:./todo.db");
        assert_eq!(config.frontend_url, None);
        assert_eq!(config.cookie, CookiePolicy::default());
        assert!(!config.cookie.secure);
        assert_eq!(config.cookie.max_age_secs, 10 * 24 * 60 * 60);
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(
            Config::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("JWT_SECRET_KEY")
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("JWT_SECRET_KEY", "")])).unwrap_err(),
            ConfigError::Missing("JWT_SECRET_KEY")
        );
    }

    #[test]
    fn cookie_attributes_are_configurable() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("COOKIE_SECURE", "true"),
            ("COOKIE_MAX_AGE_SECS", "3600"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert!(config.cookie.secure);
        assert_eq!(config.cookie.max_age_secs, 3600);
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "eighty".into()
            }
        );

        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("COOKIE_SECURE", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "COOKIE_SECURE", .. }));
    }
}
