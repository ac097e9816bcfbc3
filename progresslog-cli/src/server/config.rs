use std::env;

use serde::Deserialize;

pub const DEFAULT_DELETE_SECRET: &str = "SECRET123";
pub const DEFAULT_SESSION_SECRET: &str = "default_secret_for_development";

/// Top-level progresslog.toml configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ProgressLogConfig {
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_storage")]
    pub storage: StorageBackend,
    #[serde(default = "default_csv_file")]
    pub csv_file: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_delete_secret")]
    pub delete_secret: String,
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Csv,
    Document,
    Memory,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "csv" => Some(StorageBackend::Csv),
            "document" | "sled" => Some(StorageBackend::Document),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Csv => "csv",
            StorageBackend::Document => "document",
            StorageBackend::Memory => "memory",
        }
    }
}

// ── Default value functions ──────────────────────────

fn default_port() -> u16 {
    5000
}

fn default_hostname() -> String {
    "0.0.0.0".to_string()
}

fn default_storage() -> StorageBackend {
    StorageBackend::Csv
}

fn default_csv_file() -> String {
    "progress_log.csv".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_delete_secret() -> String {
    DEFAULT_DELETE_SECRET.to_string()
}

fn default_session_secret() -> String {
    DEFAULT_SESSION_SECRET.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: default_hostname(),
            storage: default_storage(),
            csv_file: default_csv_file(),
            data_dir: default_data_dir(),
            delete_secret: default_delete_secret(),
            session_secret: default_session_secret(),
        }
    }
}

impl ProgressLogConfig {
    /// Load configuration from a TOML file, falling back to defaults if the file
    /// doesn't exist or cannot be parsed.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).unwrap_or_else(|e| {
                tracing::warn!("failed to parse {}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = &mut self.server;

        if let Some(val) = lookup("PORT") {
            match val.trim().parse::<u16>() {
                Ok(port) => server.port = port,
                Err(_) => tracing::warn!("ignoring invalid PORT value: {}", val),
            }
        }

        if let Some(val) = lookup("HOST") {
            server.hostname = val;
        }

        if let Some(val) = lookup("PROGRESS_STORAGE") {
            match StorageBackend::parse(&val) {
                Some(backend) => server.storage = backend,
                None => tracing::warn!("unknown PROGRESS_STORAGE value: {}", val),
            }
        }

        if let Some(val) = lookup("PROGRESS_CSV_FILE") {
            server.csv_file = val;
        }

        if let Some(val) = lookup("PROGRESS_DATA_DIR") {
            server.data_dir = val;
        }

        if let Some(val) = lookup("DELETE_SECRET") {
            server.delete_secret = val;
        }

        if let Some(val) = lookup("SESSION_SECRET") {
            server.session_secret = val;
        }
    }

    /// Warn about settings that are only fit for development.
    pub fn warn_insecure_defaults(&self) {
        if self.server.delete_secret == DEFAULT_DELETE_SECRET {
            tracing::warn!("DELETE_SECRET is not set, using the development default");
        }
        if self.server.session_secret == DEFAULT_SESSION_SECRET {
            tracing::warn!("SESSION_SECRET is not set, using the development default");
        }
    }
}
