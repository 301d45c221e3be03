//! SMTP settings read from the environment
//!
//! The four settings are loaded once, into an immutable [`SmtpConfig`] that
//! the transport borrows for every delivery. Nothing below this module reads
//! the environment.

use std::{
    env,
    error::Error as StdError,
    fmt::{self, Debug, Display, Formatter},
};

/// Relay host name, also used as the TLS server name
pub const SMTP_HOST: &str = "SMTP_HOST";
/// Relay port, kept as text until dial time
pub const SMTP_PORT: &str = "SMTP_PORT";
/// Sender address, also the login identity
pub const SENDER_EMAIL: &str = "SENDER_EMAIL";
/// Sender secret, usually an application password
pub const APP_PASSWORD: &str = "APP_PASSWORD";

const KEYS: [&str; 4] = [SMTP_HOST, SMTP_PORT, SENDER_EMAIL, APP_PASSWORD];

/// Connection settings and credentials for the relay
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    host: String,
    port: String,
    username: String,
    secret: String,
}

impl SmtpConfig {
    /// Builds a config from explicit values
    ///
    /// Fails like [`from_env`](Self::from_env) when a value is empty.
    pub fn new(
        host: impl Into<String>,
        port: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<SmtpConfig, ConfigError> {
        let values = [host.into(), port.into(), username.into(), secret.into()];
        let missing: Vec<&'static str> = KEYS
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let [host, port, username, secret] = values;
        Ok(SmtpConfig {
            host,
            port,
            username,
            secret,
        })
    }

    /// Loads the config from the process environment
    ///
    /// A `.env` file, searched from the working directory upward, is merged
    /// into the environment first. Its absence is not an error.
    pub fn from_env() -> Result<SmtpConfig, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("loaded {}", path.display()),
            Err(err) if err.not_found() => {
                tracing::warn!(".env not found; relying on system environment")
            }
            Err(err) => tracing::warn!("could not load .env: {err}; relying on system environment"),
        }

        SmtpConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the config through an arbitrary key lookup
    ///
    /// ```
    /// use std::collections::HashMap;
    ///
    /// use smtp_notify::config::SmtpConfig;
    ///
    /// let vars = HashMap::from([
    ///     ("SMTP_HOST", "smtp.example.com"),
    ///     ("SMTP_PORT", "587"),
    ///     ("SENDER_EMAIL", "sender@example.com"),
    ///     ("APP_PASSWORD", "secret"),
    /// ]);
    /// let config = SmtpConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
    /// assert_eq!(config.port(), "587");
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<SmtpConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let [host, port, username, secret] = KEYS.map(|key| lookup(key).unwrap_or_default());
        SmtpConfig::new(host, port, username, secret)
    }

    /// The relay host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The relay port, as configured
    pub fn port(&self) -> &str {
        &self.port
    }

    /// The sender address, used both in `From` and to log in
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The login secret
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl Debug for SmtpConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// The config could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// These settings are unset or empty
    Missing(Vec<&'static str>),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(keys) => {
                write!(f, "missing SMTP configuration: {}", keys.join(", "))
            }
        }
    }
}

impl StdError for ConfigError {}
