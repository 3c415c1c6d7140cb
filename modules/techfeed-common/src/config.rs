use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Redis (staging queue lists)
    pub redis_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Manual-trigger shared secret (X-Collect-Secret header)
    pub collect_secret: String,

    // Collection scheduling
    pub collect_interval_hours: u64,

    // Per-source post cap; unset means source content decides
    pub source_post_limit: Option<usize>,

    // Staged items drained per persist chunk
    pub persist_chunk_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            redis_url: required_env("REDIS_URL"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            collect_secret: required_env("COLLECT_SECRET"),
            collect_interval_hours: env::var("COLLECT_INTERVAL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("COLLECT_INTERVAL_HOURS must be a number"),
            source_post_limit: env::var("SOURCE_POST_LIMIT")
                .ok()
                .map(|v| v.parse().expect("SOURCE_POST_LIMIT must be a number")),
            persist_chunk_size: env::var("PERSIST_CHUNK_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .expect("PERSIST_CHUNK_SIZE must be a number"),
        }
    }

    /// Load a minimal config for the one-shot collector CLI (no web server,
    /// no trigger secret needed).
    pub fn collector_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            redis_url: required_env("REDIS_URL"),
            web_host: String::new(),
            web_port: 0,
            collect_secret: String::new(),
            collect_interval_hours: 0,
            source_post_limit: env::var("SOURCE_POST_LIMIT")
                .ok()
                .map(|v| v.parse().expect("SOURCE_POST_LIMIT must be a number")),
            persist_chunk_size: env::var("PERSIST_CHUNK_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .expect("PERSIST_CHUNK_SIZE must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
