use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub categories_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub import_batch_size: usize,
    pub import_batch_delay_ms: u64,
    pub import_image_concurrency: usize,
    pub rehost_timeout_secs: u64,
    pub rehost_max_bytes: u64,
    pub rehost_max_retries: u32,
    pub rehost_retry_backoff_base_secs: u64,
    pub rehost_user_agent: String,
    pub media_upload_url: Option<String>,
    pub media_public_url: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("categories_path", &self.categories_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("import_batch_size", &self.import_batch_size)
            .field("import_batch_delay_ms", &self.import_batch_delay_ms)
            .field("import_image_concurrency", &self.import_image_concurrency)
            .field("rehost_timeout_secs", &self.rehost_timeout_secs)
            .field("rehost_max_bytes", &self.rehost_max_bytes)
            .field("rehost_max_retries", &self.rehost_max_retries)
            .field(
                "rehost_retry_backoff_base_secs",
                &self.rehost_retry_backoff_base_secs,
            )
            .field("rehost_user_agent", &self.rehost_user_agent)
            .field(
                "media_upload_url",
                &self.media_upload_url.as_ref().map(|_| "[redacted]"),
            )
            .field("media_public_url", &self.media_public_url)
            .finish()
    }
}
