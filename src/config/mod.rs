use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::service::RetryPolicy;

const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_API_BASE_URL: &str = "https://jsonplaceholder.typicode.com/";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub api_base_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_base_ms: u64,
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            server_host: "0.0.0.0".into(),
            server_port: 3000,
            cache_capacity: 5,
            cache_ttl_secs: 300,
            fetch_timeout_ms: 2000,
            retry_attempts: 3,
            retry_backoff_base_ms: 100,
            refresh_interval_secs: 30,
        }
    }
}

impl Config {
    /// 从环境变量（以及 .env 文件）加载配置，缺失或无法解析的项使用默认值
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();

        Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            api_base_url: lookup("API_BASE_URL").unwrap_or(defaults.api_base_url),
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port),
            cache_capacity: parse_or(&lookup, "CACHE_CAPACITY", defaults.cache_capacity),
            cache_ttl_secs: parse_or(&lookup, "CACHE_TTL_SECS", defaults.cache_ttl_secs),
            fetch_timeout_ms: parse_or(&lookup, "FETCH_TIMEOUT_MS", defaults.fetch_timeout_ms),
            retry_attempts: parse_or(&lookup, "RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_backoff_base_ms: parse_or(
                &lookup,
                "RETRY_BACKOFF_BASE_MS",
                defaults.retry_backoff_base_ms,
            ),
            refresh_interval_secs: parse_or(
                &lookup,
                "REFRESH_INTERVAL_SECS",
                defaults.refresh_interval_secs,
            ),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_base_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
            ttl: self.cache_ttl(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            backoff_base: self.retry_backoff_base(),
            fetch_timeout: self.fetch_timeout(),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}
