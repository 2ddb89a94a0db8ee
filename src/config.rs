use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Process configuration, read from `TUTORBOOK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub gateway_timeout: Duration,
    pub reminder_interval: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5480,
            data_dir: PathBuf::from("./data"),
            max_connections: 256,
            compact_threshold: 1000,
            gateway_timeout: Duration::from_secs(10),
            reminder_interval: Duration::from_secs(3600),
            metrics_port: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind: std::env::var("TUTORBOOK_BIND").unwrap_or(defaults.bind),
            port: env_parse("TUTORBOOK_PORT").unwrap_or(defaults.port),
            data_dir: std::env::var("TUTORBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_connections: env_parse("TUTORBOOK_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            compact_threshold: env_parse("TUTORBOOK_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            gateway_timeout: env_parse("TUTORBOOK_GATEWAY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.gateway_timeout),
            reminder_interval: env_parse("TUTORBOOK_REMINDER_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reminder_interval),
            metrics_port: env_parse("TUTORBOOK_METRICS_PORT"),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("tutorbook.wal")
    }
}
