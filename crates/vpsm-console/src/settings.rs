//! Console settings, read from `~/.config/vpsm/config.yaml` when present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DEFAULT_API_URL;

const CONFIG_DIR: &str = "vpsm";
const CONFIG_FILE: &str = "config.yaml";
const TOKEN_FILE: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the control-plane API
    pub api_url: String,
    /// Where the session token is persisted. Defaults next to the config file.
    pub token_path: Option<PathBuf>,
    /// HTTP request timeout
    pub timeout_secs: u64,
    /// Status poll interval for `monitor`
    pub poll_interval_secs: u64,
    /// Fixed delay between live-metrics reconnect attempts
    pub reconnect_delay_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token_path: None,
            timeout_secs: 10,
            poll_interval_secs: 30,
            reconnect_delay_secs: 5,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from an explicit path, or from the default location if a file
    /// exists there. Missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, anyhow::Error> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!(
                "api_url must start with http:// or https://, got '{}'",
                self.api_url
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        Ok(())
    }

    /// Command-line and environment overrides win over the file.
    pub fn with_api_url(mut self, api_url: Option<String>) -> Result<Self, anyhow::Error> {
        if let Some(url) = api_url {
            self.api_url = url;
            self.validate()?;
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn token_path(&self) -> Option<PathBuf> {
        self.token_path
            .clone()
            .or_else(|| config_dir().map(|dir| dir.join(TOKEN_FILE)))
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = write_yaml("api_url: https://vps.example.com\npoll_interval_secs: 10\n");
        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.api_url, "https://vps.example.com");
        assert_eq!(settings.poll_interval(), Duration::from_secs(10));
        assert_eq!(settings.timeout_secs, 10);
        assert_eq!(settings.reconnect_delay_secs, 5);
    }

    #[test]
    fn test_rejects_bad_values() {
        let file = write_yaml("api_url: vps.example.com\n");
        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("http://"));

        let file = write_yaml("timeout_secs: 0\n");
        assert!(Settings::from_file(file.path()).is_err());

        let file = write_yaml("api_url: [unclosed\n");
        assert!(Settings::from_file(file.path()).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/vpsm.yaml"))).is_err());
    }

    #[test]
    fn test_api_url_override() {
        let settings = Settings::default()
            .with_api_url(Some("http://10.0.0.2:8000".into()))
            .unwrap();
        assert_eq!(settings.api_url, "http://10.0.0.2:8000");

        assert!(Settings::default()
            .with_api_url(Some("ftp://nope".into()))
            .is_err());
        assert_eq!(
            Settings::default().with_api_url(None).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_explicit_token_path_wins() {
        let settings = Settings {
            token_path: Some(PathBuf::from("/tmp/vpsm-token")),
            ..Default::default()
        };
        assert_eq!(settings.token_path(), Some(PathBuf::from("/tmp/vpsm-token")));
    }
}
