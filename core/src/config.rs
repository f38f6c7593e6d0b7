//! Client configuration.
//! Defaults target the public Netro endpoint.

use std::time::Duration;

use crate::error::{NetroError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.netrohome.com/npa/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct NetroConfig {
    pub base_url: String,
    /// Passed to the transport on every request.
    pub default_timeout: Duration,
    /// Added to every request after the standard `Accept`/`Content-Type`.
    pub extra_headers: Vec<(String, String)>,
}

impl Default for NetroConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            extra_headers: Vec::new(),
        }
    }
}

impl NetroConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Read `NETRO_BASE_URL` and `NETRO_TIMEOUT_SECS`, falling back to the
    /// defaults when unset or blank.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("NETRO_BASE_URL").filter(|s| !s.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        if let Some(secs) = lookup("NETRO_TIMEOUT_SECS").filter(|s| !s.trim().is_empty()) {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                NetroError::invalid("NETRO_TIMEOUT_SECS", "must be a whole number of seconds")
            })?;
            config.default_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Base URL without trailing slashes; rejects an empty value.
    pub(crate) fn normalized_base_url(&self) -> Result<String> {
        let base = self.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(NetroError::invalid("base_url", "must not be empty"));
        }
        Ok(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = NetroConfig::default();
        assert_eq!(config.base_url, "https://api.netrohome.com/npa/v1");
        assert_eq!(config.default_timeout, Duration::from_secs(10));
        assert!(config.extra_headers.is_empty());
    }

    #[test]
    fn env_overrides() {
        let config = NetroConfig::from_lookup(lookup(&[
            ("NETRO_BASE_URL", "http://127.0.0.1:3000/npa/v1"),
            ("NETRO_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:3000/npa/v1");
        assert_eq!(config.default_timeout, Duration::from_secs(15));
    }

    #[test]
    fn blank_env_keeps_defaults() {
        let config = NetroConfig::from_lookup(lookup(&[("NETRO_BASE_URL", "  ")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = NetroConfig::from_lookup(lookup(&[("NETRO_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            NetroError::InvalidArgument { name: "NETRO_TIMEOUT_SECS", .. }
        ));
    }

    #[test]
    fn base_url_normalization() {
        let config = NetroConfig::default().with_base_url("http://localhost:3000/npa/v1//");
        assert_eq!(config.normalized_base_url().unwrap(), "http://localhost:3000/npa/v1");

        let empty = NetroConfig::default().with_base_url("   ");
        assert!(matches!(
            empty.normalized_base_url(),
            Err(NetroError::InvalidArgument { name: "base_url", .. })
        ));
    }

    #[test]
    fn builder_headers_accumulate() {
        let config = NetroConfig::default()
            .with_header("User-Agent", "netro-test/1.0")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(
            config.extra_headers,
            vec![("User-Agent".to_string(), "netro-test/1.0".to_string())]
        );
        assert_eq!(config.default_timeout, Duration::from_secs(3));
    }
}
