use std::{env, net::SocketAddr, num::NonZeroUsize, time::Duration};

use thiserror::Error;

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// 関連記事の配送先。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// 下流サービスへ HTTP POST で転送する。
    Http,
    /// ドキュメントストアへ `id` をキーに upsert する。
    Store,
}

/// 同一トピックの実行が重なったときの扱い。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    Allow,
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    guardian_api_key: String,
    guardian_base_url: String,
    guardian_page_size: NonZeroUsize,
    sink: SinkKind,
    core_service_url: Option<String>,
    document_store_dsn: Option<String>,
    document_store_max_connections: u32,
    default_topic: String,
    schedule_enabled: bool,
    schedule_interval: Duration,
    http_connect_timeout: Duration,
    fetch_timeout: Duration,
    delivery_timeout: Duration,
    delivery_concurrency: NonZeroUsize,
    overlap_policy: OverlapPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から Ingest Worker の設定値を読み込み、検証する。
    ///
    /// 配送先が `http` の場合は `CORE_SERVICE_URL`、`store` の場合は `DOCUMENT_STORE_DSN` が必須になる。
    ///
    /// # Errors
    /// `GUARDIAN_API_KEY` が未設定、配送先に応じた必須値が未設定、
    /// もしくは各種値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("INGEST_WORKER_HTTP_BIND", "0.0.0.0:8080")?;
        let guardian_api_key = env_var("GUARDIAN_API_KEY")?;
        let guardian_base_url = env::var("GUARDIAN_BASE_URL")
            .unwrap_or_else(|_| "https://content.guardianapis.com/".to_string());
        let guardian_page_size = parse_non_zero_usize("GUARDIAN_PAGE_SIZE", 10)?;

        let sink = parse_sink("INGEST_SINK", "http")?;
        let core_service_url = env::var("CORE_SERVICE_URL").ok();
        let document_store_dsn = env::var("DOCUMENT_STORE_DSN").ok();
        match sink {
            SinkKind::Http if core_service_url.is_none() => {
                return Err(ConfigError::Missing("CORE_SERVICE_URL"));
            }
            SinkKind::Store if document_store_dsn.is_none() => {
                return Err(ConfigError::Missing("DOCUMENT_STORE_DSN"));
            }
            _ => {}
        }
        let document_store_max_connections = parse_u32("DOCUMENT_STORE_MAX_CONNECTIONS", 5)?;

        // Trigger settings
        let default_topic = parse_topic("INGEST_DEFAULT_TOPIC", "science")?;
        let schedule_enabled = parse_bool("INGEST_SCHEDULE_ENABLED", true)?;
        let schedule_interval = parse_non_zero_secs("INGEST_SCHEDULE_INTERVAL_SECS", 3600)?;
        let overlap_policy = parse_overlap_policy("INGEST_OVERLAP_POLICY", "allow")?;

        // Outbound call bounds
        let http_connect_timeout = parse_duration_ms("HTTP_CONNECT_TIMEOUT_MS", 3000)?;
        let fetch_timeout = parse_duration_ms("INGEST_FETCH_TIMEOUT_MS", 10_000)?;
        let delivery_timeout = parse_duration_ms("INGEST_DELIVERY_TIMEOUT_MS", 10_000)?;
        let delivery_concurrency = parse_non_zero_usize("INGEST_DELIVERY_CONCURRENCY", 1)?;

        Ok(Self {
            http_bind,
            guardian_api_key,
            guardian_base_url,
            guardian_page_size,
            sink,
            core_service_url,
            document_store_dsn,
            document_store_max_connections,
            default_topic,
            schedule_enabled,
            schedule_interval,
            http_connect_timeout,
            fetch_timeout,
            delivery_timeout,
            delivery_concurrency,
            overlap_policy,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn guardian_api_key(&self) -> &str {
        &self.guardian_api_key
    }

    #[must_use]
    pub fn guardian_base_url(&self) -> &str {
        &self.guardian_base_url
    }

    #[must_use]
    pub fn guardian_page_size(&self) -> NonZeroUsize {
        self.guardian_page_size
    }

    #[must_use]
    pub fn sink(&self) -> SinkKind {
        self.sink
    }

    #[must_use]
    pub fn core_service_url(&self) -> Option<&str> {
        self.core_service_url.as_deref()
    }

    #[must_use]
    pub fn document_store_dsn(&self) -> Option<&str> {
        self.document_store_dsn.as_deref()
    }

    #[must_use]
    pub fn document_store_max_connections(&self) -> u32 {
        self.document_store_max_connections
    }

    #[must_use]
    pub fn default_topic(&self) -> &str {
        &self.default_topic
    }

    #[must_use]
    pub fn schedule_enabled(&self) -> bool {
        self.schedule_enabled
    }

    #[must_use]
    pub fn schedule_interval(&self) -> Duration {
        self.schedule_interval
    }

    #[must_use]
    pub fn http_connect_timeout(&self) -> Duration {
        self.http_connect_timeout
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    #[must_use]
    pub fn delivery_concurrency(&self) -> NonZeroUsize {
        self.delivery_concurrency
    }

    #[must_use]
    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap_policy
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_non_zero_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be greater than zero"),
        });
    }
    Ok(Duration::from_secs(value))
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let ms = parse_u64(name, default_ms)?;
    Ok(Duration::from_millis(ms))
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

fn parse_topic(name: &'static str, default: &str) -> Result<String, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let topic = raw.trim();
    if topic.is_empty() {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("topic must not be blank"),
        });
    }
    Ok(topic.to_string())
}

fn parse_sink(name: &'static str, default: &str) -> Result<SinkKind, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.trim().to_lowercase().as_str() {
        "http" => Ok(SinkKind::Http),
        "store" => Ok(SinkKind::Store),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("expected `http` or `store`, got {raw}"),
        }),
    }
}

fn parse_overlap_policy(name: &'static str, default: &str) -> Result<OverlapPolicy, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.trim().to_lowercase().as_str() {
        "allow" => Ok(OverlapPolicy::Allow),
        "skip" => Ok(OverlapPolicy::Skip),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("expected `allow` or `skip`, got {raw}"),
        }),
    }
}

/// テスト用に環境変数を差し替えて設定を読み込む。
///
/// 関連する環境変数をすべて消してから `vars` を設定するので、呼び出し間で状態は残らない。
#[cfg(test)]
pub(crate) fn load_test_config(vars: &[(&str, &str)]) -> Config {
    let _lock = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    // SAFETY: ENV_MUTEX を保持している間だけ環境変数を書き換える。
    unsafe {
        for name in CONFIG_VARS {
            env::remove_var(name);
        }
        for (name, value) in vars {
            env::set_var(name, value);
        }
    }
    Config::from_env().expect("test config loads")
}

#[cfg(test)]
const CONFIG_VARS: [&str; 16] = [
    "INGEST_WORKER_HTTP_BIND",
    "GUARDIAN_API_KEY",
    "GUARDIAN_BASE_URL",
    "GUARDIAN_PAGE_SIZE",
    "INGEST_SINK",
    "CORE_SERVICE_URL",
    "DOCUMENT_STORE_DSN",
    "DOCUMENT_STORE_MAX_CONNECTIONS",
    "INGEST_DEFAULT_TOPIC",
    "INGEST_SCHEDULE_ENABLED",
    "INGEST_SCHEDULE_INTERVAL_SECS",
    "INGEST_OVERLAP_POLICY",
    "HTTP_CONNECT_TIMEOUT_MS",
    "INGEST_FETCH_TIMEOUT_MS",
    "INGEST_DELIVERY_TIMEOUT_MS",
    "INGEST_DELIVERY_CONCURRENCY",
];
