use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub image_dir: PathBuf,
    pub cache_ttl: Duration,
    pub scan_timeout: Duration,
    pub max_upload_bytes: usize,
    /// Base URL used for generated image links instead of the request Host
    pub public_url: Option<String>,
    /// Hide internal error detail from clients
    pub production: bool,
    pub slow_request: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            image_dir: PathBuf::from("./images"),
            cache_ttl: Duration::from_millis(5000),
            scan_timeout: Duration::from_secs(30),
            max_upload_bytes: 50 * 1024 * 1024, // 50MB
            public_url: None,
            production: false,
            slow_request: Duration::from_millis(1000),
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Parse configuration from an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = var("PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let image_dir = var("IMAGE_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.image_dir);

        let cache_ttl = var("CACHE_TTL_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.cache_ttl);

        let scan_timeout = var("SCAN_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.scan_timeout);

        let max_upload_bytes = var("MAX_UPLOAD_BYTES")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_upload_bytes);

        let public_url = var("PUBLIC_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let production = var("APP_ENV")
            .map(|s| s.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let slow_request = var("SLOW_REQUEST_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.slow_request);

        Self {
            port,
            image_dir,
            cache_ttl,
            scan_timeout,
            max_upload_bytes,
            public_url,
            production,
            slow_request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.image_dir, PathBuf::from("./images"));
        assert_eq!(config.cache_ttl, Duration::from_millis(5000));
        assert_eq!(config.scan_timeout, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.public_url.is_none());
        assert!(!config.production);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("IMAGE_DIR", "/var/lib/images"),
            ("CACHE_TTL_MS", "250"),
            ("SCAN_TIMEOUT_SECS", "5"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("PUBLIC_URL", "https://img.example.com/"),
            ("APP_ENV", "Production"),
            ("SLOW_REQUEST_MS", "200"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.image_dir, PathBuf::from("/var/lib/images"));
        assert_eq!(config.cache_ttl, Duration::from_millis(250));
        assert_eq!(config.scan_timeout, Duration::from_secs(5));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.public_url.as_deref(), Some("https://img.example.com"));
        assert!(config.production);
        assert_eq!(config.slow_request, Duration::from_millis(200));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("CACHE_TTL_MS", "-5"),
            ("SCAN_TIMEOUT_SECS", "0"),
            ("PUBLIC_URL", ""),
            ("APP_ENV", "development"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_ttl, Duration::from_millis(5000));
        assert_eq!(config.scan_timeout, Duration::from_secs(30));
        assert!(config.public_url.is_none());
        assert!(!config.production);
    }
}
