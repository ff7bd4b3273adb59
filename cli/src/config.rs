// Configuration management for the PayLink CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/paylink/config.json
// - Linux: ~/.config/paylink/config.json
// - Windows: %APPDATA%\paylink\config.json

use anyhow::{Context, Result};
use paylink_core::{MessageStamp, Secrets};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity written into `senderId` of every outgoing message
    pub pos_id: String,

    /// Encryption key, hex
    pub enc_key: Option<String>,

    /// Signing key, hex
    pub hmac_key: Option<String>,

    /// Milliseconds added to local time when stamping messages
    pub server_time_delta: i64,

    #[serde(skip)]
    path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pos_id: "POS".to_string(),
            enc_key: None,
            hmac_key: None,
            server_time_delta: 0,
            path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("paylink");

        std::fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the default config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from `path`, or the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::config_file()?),
        }
    }

    /// Load config from file, or create default if not exists
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };

        config.path = path.to_path_buf();
        if !path.exists() {
            config.save()?;
        }
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create config directory")?;
            }
        }
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(&self.path, contents)
            .context("Failed to write config file")?;
        tracing::debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    /// Store a new key pair
    pub fn set_secrets(&mut self, secrets: &Secrets) -> Result<()> {
        let (enc_key, hmac_key) = secrets.to_hex();
        self.enc_key = Some(enc_key);
        self.hmac_key = Some(hmac_key);
        self.save()
    }

    /// Session secrets from the configured keys
    pub fn secrets(&self) -> Result<Secrets> {
        let enc_key = self
            .enc_key
            .as_deref()
            .context("enc_key is not set (run `paylink keygen --save` or `paylink config set enc_key <hex>`)")?;
        let hmac_key = self
            .hmac_key
            .as_deref()
            .context("hmac_key is not set (run `paylink keygen --save` or `paylink config set hmac_key <hex>`)")?;
        Secrets::from_hex(enc_key, hmac_key).context("Configured keys are invalid")
    }

    /// Outbound stamp for this POS
    pub fn stamp(&self) -> Result<MessageStamp> {
        Ok(MessageStamp::new(
            self.pos_id.clone(),
            self.secrets()?,
            self.server_time_delta,
        ))
    }

    /// Set a config value
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "pos_id" => {
                if value.is_empty() {
                    anyhow::bail!("pos_id cannot be empty");
                }
                self.pos_id = value.to_string();
            }
            "enc_key" | "hmac_key" => {
                hex::decode(value).context("Key must be hex")?;
                let slot = if key == "enc_key" {
                    &mut self.enc_key
                } else {
                    &mut self.hmac_key
                };
                *slot = if value.is_empty() {
                    None
                } else {
                    Some(value.to_ascii_uppercase())
                };
            }
            "server_time_delta" => {
                self.server_time_delta = value.parse()
                    .context("Invalid number of milliseconds")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.save()?;
        Ok(())
    }

    /// Get a config value. Keys are masked.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "pos_id" => Some(self.pos_id.clone()),
            "enc_key" => Some(mask(self.enc_key.as_deref())),
            "hmac_key" => Some(mask(self.hmac_key.as_deref())),
            "server_time_delta" => Some(self.server_time_delta.to_string()),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        ["pos_id", "enc_key", "hmac_key", "server_time_delta"]
            .iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }
}

fn mask(key: Option<&str>) -> String {
    match key {
        None => "(not set)".to_string(),
        Some(key) => match (key.get(..4), key.get(key.len().saturating_sub(4)..)) {
            (Some(head), Some(tail)) if key.len() > 8 => format!("{}…{}", head, tail),
            _ => "****".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pos_id, "POS");
        assert!(config.enc_key.is_none());
        assert_eq!(config.server_time_delta, 0);
    }

    #[test]
    fn test_load_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load(Some(path.as_path())).unwrap();
        assert!(path.exists());
        assert_eq!(config.path(), path.as_path());
    }

    #[test]
    fn test_set_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::load_from(&path).unwrap();
        config.set("pos_id", "TILL-4").unwrap();
        config.set("server_time_delta", "-1200").unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.pos_id, "TILL-4");
        assert_eq!(reloaded.server_time_delta, -1200);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let dir = tempdir().unwrap();
        let mut config = Config::load_from(&dir.path().join("config.json")).unwrap();

        assert!(config.set("enc_key", "not-hex").is_err());
        assert!(config.set("server_time_delta", "soon").is_err());
        assert!(config.set("listen_port", "80").is_err());
        assert!(config.set("pos_id", "").is_err());
    }

    #[test]
    fn test_stamp_requires_keys() {
        let dir = tempdir().unwrap();
        let mut config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.stamp().is_err());

        let secrets = Secrets::generate();
        config.set_secrets(&secrets).unwrap();

        let stamp = config.stamp().unwrap();
        assert_eq!(stamp.sender_id, "POS");
        assert_eq!(stamp.secrets, secrets);
    }

    #[test]
    fn test_keys_are_masked() {
        let mut config = Config::default();
        config.enc_key = Some("00112233445566778899AABBCCDDEEFF".into());

        let shown = config.get("enc_key").unwrap();
        assert_eq!(shown, "0011…EEFF");
        assert_eq!(config.get("hmac_key").unwrap(), "(not set)");
    }
}
