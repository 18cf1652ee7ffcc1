//! Configuration module
//!
//! Environment-driven configuration for the file service. Handlers never read
//! configuration globally mid-request; they take a snapshot at entry so a live
//! reload cannot change limits under a running upload.

use std::env;

use crate::id;

const DEFAULT_SERVER_PORT: u16 = 3000;
const DEFAULT_MAX_FILE_SIZE: i64 = 50 * 1024 * 1024;

/// File attachment settings, snapshotted per request.
#[derive(Clone, Debug)]
pub struct FileSettings {
    /// Hard cap in bytes for a single uploaded file.
    pub max_file_size: i64,
    pub enable_file_attachments: bool,
    pub enable_public_link: bool,
    /// Keyed-hash salt for public links. Rotating it invalidates all
    /// previously issued links.
    pub public_link_salt: String,
    /// Storage driver name. An empty string disables uploads entirely.
    pub storage_driver: String,
    /// Root directory for the `local` driver.
    pub local_storage_path: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        FileSettings {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            enable_file_attachments: true,
            enable_public_link: false,
            public_link_salt: id::new_random_string(32),
            storage_driver: "local".to_string(),
            local_storage_path: "./data/files".to_string(),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    /// Externally visible base URL, used when issuing public links.
    pub site_url: String,
    pub environment: String,
    pub file: FileSettings,
}

impl Config {
    /// Load configuration from the environment. Missing variables fall back
    /// to development defaults; malformed values are hard errors.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let server_port = read_parsed("SERVER_PORT", DEFAULT_SERVER_PORT)?;
        let site_url = env::var("SITE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", server_port));
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let file = FileSettings {
            max_file_size: read_parsed("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
            enable_file_attachments: read_bool("ENABLE_FILE_ATTACHMENTS", true)?,
            enable_public_link: read_bool("ENABLE_PUBLIC_LINK", false)?,
            public_link_salt: env::var("PUBLIC_LINK_SALT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| id::new_random_string(32)),
            storage_driver: env::var("STORAGE_DRIVER").unwrap_or_else(|_| "local".to_string()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/files".to_string()),
        };

        Ok(Config {
            server_port,
            site_url: site_url.trim_end_matches('/').to_string(),
            environment,
            file,
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }
}

/// Load a `.env` file if present. Call before reading configuration.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }
}

fn read_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn read_bool(key: &str, default: bool) -> Result<bool, anyhow::Error> {
    match env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(anyhow::anyhow!("invalid {}: {}", key, other)),
        },
        Err(_) => Ok(default),
    }
}
