use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;
use super::protocol::{DEFAULT_ALBUM_PAGE_SIZE, DEFAULT_TRACK_PAGE_SIZE};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Where the catalog service listens.  The service process itself is started
/// elsewhere; the browser only assumes it is reachable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_album_page_size")]
    pub album_page_size: u32,
    #[serde(default = "default_track_page_size")]
    pub track_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Working root; each album is downloaded into a sub-directory named
    /// after its title.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            album_page_size: default_album_page_size(),
            track_page_size: default_track_page_size(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_album_page_size() -> u32 {
    DEFAULT_ALBUM_PAGE_SIZE
}

fn default_track_page_size() -> u32 {
    DEFAULT_TRACK_PAGE_SIZE
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        tracing::info!("wrote default config to {}", config_path.display());
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url(), "http://localhost:8080");
        assert_eq!(config.paging.album_page_size, 10);
        assert_eq!(config.paging.track_page_size, 30);
        assert_eq!(config.paths.downloads_dir, PathBuf::from("."));
        assert!(Config::config_path().ends_with("xmly/config.toml"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            port = 9000

            [paging]
            track_page_size = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.server.base_url(), "http://localhost:9000");
        assert_eq!(config.server.timeout_secs, 15);
        assert_eq!(config.paging.album_page_size, 10);
        assert_eq!(config.paging.track_page_size, 20);
    }
}
