// Client configuration: `~/.streamchat/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root directory for streamchat state: `~/.streamchat/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".streamchat"))
}

/// Path to the config file: `~/.streamchat/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("config.toml"))
}

/// Global client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalConfig {
    /// Chat service base URL for the REST history endpoint
    /// (e.g. `https://chat.example.com`).
    pub chat_url: Option<String>,
    /// WebSocket base URL (e.g. `wss://chat.example.com`).
    pub ws_url: Option<String>,
    /// Display name shown for the local user's own messages.
    pub display_name: Option<String>,
    /// Bearer token for the chat service.
    pub token: Option<String>,
}

impl GlobalConfig {
    /// Load from `~/.streamchat/config.toml`. Returns defaults if the
    /// file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|path| Self::load_from(&path).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save to `~/.streamchat/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_all_unset() {
        let cfg = GlobalConfig::default();
        assert!(cfg.chat_url.is_none());
        assert!(cfg.ws_url.is_none());
        assert!(cfg.display_name.is_none());
        assert!(cfg.token.is_none());
    }

    #[test]
    fn config_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = GlobalConfig {
            chat_url: Some("https://chat.example.com".into()),
            ws_url: Some("wss://chat.example.com".into()),
            display_name: Some("Alice".into()),
            token: Some("tok-123".into()),
        };
        cfg.save_to(&path).unwrap();
        let loaded = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: GlobalConfig = toml::from_str(r#"ws_url = "wss://chat.example.com""#).unwrap();
        assert_eq!(cfg.ws_url.as_deref(), Some("wss://chat.example.com"));
        assert!(cfg.chat_url.is_none());
    }

    #[test]
    fn empty_toml_is_the_default_config() {
        let cfg: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, GlobalConfig::default());
    }

    #[test]
    fn load_from_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        assert!(GlobalConfig::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep").join("nested").join("config.toml");
        GlobalConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }
}
