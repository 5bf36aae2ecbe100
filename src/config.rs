use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Result, WebDAVError};

/// Username/password pair sent as HTTP basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Construction parameters for [`crate::WebDAVClient`]
#[derive(Debug, Clone)]
pub struct WebDAVConfig {
    /// Base URL every request path is joined onto,
    /// e.g. `https://demo.owncloud.com/remote.php/dav/files/demo/`
    pub hostname: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
}

impl WebDAVConfig {
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: None,
            password: None,
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECONDS,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Loads the configuration from `WEBDAV_URL`, `WEBDAV_USERNAME`,
    /// `WEBDAV_PASSWORD` and `WEBDAV_TIMEOUT_SECONDS`.
    pub fn from_env() -> Result<Self> {
        let hostname = env::var("WEBDAV_URL")
            .map_err(|_| WebDAVError::Config("WEBDAV_URL must be set".to_string()))?;

        let timeout_seconds = match env::var("WEBDAV_TIMEOUT_SECONDS") {
            Ok(value) => value.trim().parse::<u64>().map_err(|_| {
                WebDAVError::Config(format!("WEBDAV_TIMEOUT_SECONDS is not a number: '{}'", value))
            })?,
            Err(_) => Self::DEFAULT_TIMEOUT_SECONDS,
        };

        let config = Self {
            hostname,
            username: env::var("WEBDAV_USERNAME").ok().filter(|v| !v.is_empty()),
            password: env::var("WEBDAV_PASSWORD").ok(),
            timeout_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the hostname is an absolute http(s) URL and the timeout is non-zero.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.timeout_seconds == 0 {
            return Err(WebDAVError::Config("timeout must be at least one second".to_string()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(self.hostname.trim())?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(WebDAVError::Config(format!(
                    "unsupported URL scheme '{}' in '{}'",
                    other, self.hostname
                )))
            }
        }
        if url.cannot_be_a_base() {
            return Err(WebDAVError::Config(format!("'{}' cannot be used as a base URL", self.hostname)));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Session credentials, present only when both username and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_webdav_env_vars() {
        env::remove_var("WEBDAV_URL");
        env::remove_var("WEBDAV_USERNAME");
        env::remove_var("WEBDAV_PASSWORD");
        env::remove_var("WEBDAV_TIMEOUT_SECONDS");
    }

    #[test]
    fn test_defaults() {
        let config = WebDAVConfig::new("https://dav.example.com/files/");
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.credentials().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let mut config = WebDAVConfig::new("https://dav.example.com/");
        config.username = Some("demo".to_string());
        assert!(config.credentials().is_none());

        let config = config.with_credentials("demo", "secret");
        assert_eq!(config.credentials(), Some(Credentials::new("demo", "secret")));
    }

    #[test]
    fn test_validate_rejects_bad_hostnames() {
        assert!(matches!(
            WebDAVConfig::new("dav.example.com/files").validate(),
            Err(WebDAVError::InvalidUrl(_))
        ));
        assert!(matches!(
            WebDAVConfig::new("ftp://dav.example.com/").validate(),
            Err(WebDAVError::Config(_))
        ));
        assert!(matches!(
            WebDAVConfig::new("https://dav.example.com/").with_timeout_seconds(0).validate(),
            Err(WebDAVError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("demo", "hunter2"));
        assert!(debug.contains("demo"));
        assert!(!debug.contains("hunter2"));
    }

    // Single test touching the process environment so parallel tests don't race.
    #[test]
    fn test_from_env() {
        clear_webdav_env_vars();
        assert!(matches!(WebDAVConfig::from_env(), Err(WebDAVError::Config(_))));

        env::set_var("WEBDAV_URL", "https://dav.example.com/remote.php/dav/files/demo/");
        env::set_var("WEBDAV_USERNAME", "demo");
        env::set_var("WEBDAV_PASSWORD", "demo");
        env::set_var("WEBDAV_TIMEOUT_SECONDS", "90");
        let config = WebDAVConfig::from_env().expect("Config should load successfully");
        assert_eq!(config.hostname, "https://dav.example.com/remote.php/dav/files/demo/");
        assert_eq!(config.credentials(), Some(Credentials::new("demo", "demo")));
        assert_eq!(config.timeout_seconds, 90);

        env::set_var("WEBDAV_TIMEOUT_SECONDS", "soon");
        assert!(matches!(WebDAVConfig::from_env(), Err(WebDAVError::Config(_))));

        clear_webdav_env_vars();
    }
}
