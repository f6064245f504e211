use thiserror::Error;

use crate::mail::SmtpSettings;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} is not valid: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64, // seconds
    pub port: u16,
    pub frontend_url: String,
    pub uploads_dir: String,
    pub default_user: String,
    pub default_email: String,
    pub default_password: String,
    pub smtp: Option<SmtpSettings>,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `init` reads the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;
        let jwt_maxage = required("JWT_MAXAGE")?
            .parse::<i64>()
            .map_err(|e| ConfigError::Invalid("JWT_MAXAGE", e.to_string()))?;
        let port = match lookup("PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid("PORT", e.to_string()))?,
            None => 8000,
        };
        let frontend_url = required("FRONTEND_URL")?;
        let uploads_dir = lookup("UPLOADS_DIR").unwrap_or_else(|| "./uploads".to_string());
        let default_user = required("DEFAULT_USER")?;
        let default_email = required("DEFAULT_EMAIL")?;
        let default_password = required("DEFAULT_PASSWORD")?;

        // SMTP is optional as a whole; a half-filled block counts as absent
        let smtp = match (
            lookup("SMTP_SERVER"),
            lookup("SMTP_USERNAME"),
            lookup("SMTP_PASSWORD"),
        ) {
            (Some(server), Some(username), Some(password)) => {
                let port = match lookup("SMTP_PORT") {
                    Some(port) => port
                        .parse::<u16>()
                        .map_err(|e| ConfigError::Invalid("SMTP_PORT", e.to_string()))?,
                    None => 465,
                };
                let from = lookup("SMTP_FROM").unwrap_or_else(|| username.clone());
                Some(SmtpSettings {
                    server,
                    port,
                    username,
                    password,
                    from,
                })
            }
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            port,
            frontend_url,
            uploads_dir,
            default_user,
            default_email,
            default_password,
            smtp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "sqlite://bat.db"),
            ("JWT_SECRET_KEY", "secret"),
            ("JWT_MAXAGE", "900"),
            ("FRONTEND_URL", "http://localhost:3000"),
            ("DEFAULT_USER", "admin"),
            ("DEFAULT_EMAIL", "admin@example.com"),
            ("DEFAULT_PASSWORD", "change-me-please"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base()).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.jwt_maxage, 900);
        assert_eq!(config.uploads_dir, "./uploads");
        assert!(config.smtp.is_none());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let mut vars = base();
        vars.remove("JWT_SECRET_KEY");
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("JWT_SECRET_KEY"));
    }

    #[test]
    fn bad_maxage_is_an_error() {
        let mut vars = base();
        vars.insert("JWT_MAXAGE", "fifteen");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid("JWT_MAXAGE", _))
        ));
    }

    #[test]
    fn smtp_block_is_read() {
        let mut vars = base();
        vars.insert("SMTP_SERVER", "smtp.example.com");
        vars.insert("SMTP_USERNAME", "bat@example.com");
        vars.insert("SMTP_PASSWORD", "pw");
        let smtp = load(&vars).unwrap().smtp.unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.from, "bat@example.com");
    }
}
