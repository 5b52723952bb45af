use crate::fetcher::DEFAULT_CACHE_TTL;
use std::{env, path::PathBuf, time::Duration};
use tracing::warn;

pub const DEFAULT_API_URL: &str = "https://tb8calt97j.execute-api.sa-east-1.amazonaws.com/dev/dados";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_PATH: &str = "data/metas.json";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub data_path: PathBuf,
    pub api_url: String,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            api_url: DEFAULT_API_URL.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads `PORT`, `APP_DATA_PATH`, `ENERGY_API_URL`, `CACHE_TTL_SECS` and
    /// `REQUEST_TIMEOUT_SECS`; anything missing or malformed keeps its default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            data_path: lookup("APP_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            api_url: lookup("ENERGY_API_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.api_url),
            cache_ttl: parsed(&lookup, "CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            request_timeout: parsed(&lookup, "REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring invalid {name}={raw:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        assert_eq!(Settings::from_lookup(lookup(&[])), Settings::default());
        assert_eq!(Settings::default().cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn reads_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("APP_DATA_PATH", "/tmp/metas.json"),
            ("ENERGY_API_URL", "http://localhost:1234/dados"),
            ("CACHE_TTL_SECS", "5"),
        ]));
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.data_path, PathBuf::from("/tmp/metas.json"));
        assert_eq!(settings.api_url, "http://localhost:1234/dados");
        assert_eq!(settings.cache_ttl, Duration::from_secs(5));
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let settings = Settings::from_lookup(lookup(&[("PORT", "eighty"), ("ENERGY_API_URL", " ")]));
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
    }
}
