//! Uploader configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/moments/uploader.toml`
//! - Windows: `%APPDATA%/moments/uploader.toml`
//!
//! `MOMENTS_HOST_TOKEN` and `MOMENTS_BACKEND_URL` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use moments_uploader::{OrphanPolicy, RetryPolicy, UploadOptions};
use serde::{Deserialize, Serialize};

pub const ENV_HOST_TOKEN: &str = "MOMENTS_HOST_TOKEN";
pub const ENV_BACKEND_URL: &str = "MOMENTS_BACKEND_URL";

/// Uploader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Video host access.
#[derive(Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_host_url")]
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
    /// Privacy view for public videos.
    #[serde(default = "default_privacy_view")]
    pub privacy_view: String,
}

impl std::fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .field("privacy_view", &self.privacy_view)
            .finish()
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: default_host_url(),
            access_token: String::new(),
            privacy_view: default_privacy_view(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
        }
    }
}

/// Transfer tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: u64,
    /// Upload from a private copy so edits to the source mid-upload
    /// cannot corrupt the transfer.
    #[serde(default = "default_true")]
    pub stage_copy: bool,
    /// Where staged copies go (system temp dir when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
    #[serde(default)]
    pub orphan_policy: OrphanPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            chunk_timeout_secs: default_chunk_timeout_secs(),
            stage_copy: default_true(),
            staging_dir: None,
            orphan_policy: OrphanPolicy::Keep,
        }
    }
}

fn default_host_url() -> String {
    "https://api.vimeo.com".into()
}

fn default_privacy_view() -> String {
    "anybody".into()
}

fn default_backend_url() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_chunk_size() -> usize {
    5 * 1024 * 1024
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    15_000
}

fn default_chunk_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Loads configuration from `path` (or the platform default), creating
    /// a default file if none exists, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds the access token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Overrides fields from environment variables found by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_HOST_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.host.access_token = token;
        }
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = url;
        }
    }

    /// Pipeline options derived from the `[upload]` and `[host]` sections.
    pub fn upload_options(&self) -> UploadOptions {
        let up = &self.upload;
        let staging_dir = up.stage_copy.then(|| {
            up.staging_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("moments-staging"))
        });

        UploadOptions {
            chunk_size: up.chunk_size,
            retry: RetryPolicy {
                max_attempts: up.max_attempts,
                initial_delay: Duration::from_millis(up.initial_backoff_ms),
                max_delay: Duration::from_millis(up.max_backoff_ms),
                ..RetryPolicy::default()
            },
            chunk_timeout: Duration::from_secs(up.chunk_timeout_secs),
            staging_dir,
            orphan_policy: up.orphan_policy,
            public_privacy_view: self.host.privacy_view.clone(),
            ..UploadOptions::default()
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("moments")
            .join("uploader.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("moments").join("uploader.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/moments/uploader.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.host.base_url, "https://api.vimeo.com");
        assert!(config.host.access_token.is_empty());
        assert_eq!(config.backend.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.upload.chunk_size, 5 * 1024 * 1024);
        assert_eq!(config.upload.max_attempts, 5);
        assert!(config.upload.stage_copy);
        assert_eq!(config.upload.orphan_policy, OrphanPolicy::Keep);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml_str = r#"
            [host]
            access_token = "abc"

            [upload]
            chunk_size = 1048576
            orphan_policy = "delete_remote"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host.access_token, "abc");
        assert_eq!(config.host.privacy_view, "anybody");
        assert_eq!(config.upload.chunk_size, 1_048_576);
        assert_eq!(config.upload.max_attempts, 5);
        assert_eq!(config.upload.orphan_policy, OrphanPolicy::DeleteRemote);
        assert_eq!(config.backend.base_url, "http://127.0.0.1:3000");
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_HOST_TOKEN => Some("from-env".into()),
            ENV_BACKEND_URL => Some("http://backend:9000".into()),
            _ => None,
        });
        assert_eq!(config.host.access_token, "from-env");
        assert_eq!(config.backend.base_url, "http://backend:9000");
    }

    #[test]
    fn blank_env_ignored() {
        let mut config = Config::default();
        config.host.access_token = "file-token".into();
        config.apply_env(|_| Some("  ".into()));
        assert_eq!(config.host.access_token, "file-token");
    }

    #[test]
    fn upload_options_mapping() {
        let mut config = Config::default();
        config.upload.max_attempts = 3;
        config.upload.initial_backoff_ms = 250;
        config.upload.chunk_timeout_secs = 10;
        config.upload.staging_dir = Some(PathBuf::from("/var/tmp/stage"));

        let opts = config.upload_options();
        assert_eq!(opts.retry.max_attempts, 3);
        assert_eq!(opts.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(opts.chunk_timeout, Duration::from_secs(10));
        assert_eq!(opts.staging_dir, Some(PathBuf::from("/var/tmp/stage")));
        assert_eq!(opts.public_privacy_view, "anybody");

        config.upload.stage_copy = false;
        assert!(config.upload_options().staging_dir.is_none());
    }

    #[test]
    fn load_creates_default_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("uploader.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.upload.chunk_size, 5 * 1024 * 1024);
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("uploader.toml");

        let mut config = Config::default();
        config.backend.base_url = "http://saved:3000".into();
        config.save_to(&path).unwrap();

        let loaded: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.backend.base_url, "http://saved:3000");
    }

    #[test]
    fn debug_redacts_token() {
        let mut config = Config::default();
        config.host.access_token = "very-secret".into();
        assert!(!format!("{config:?}").contains("very-secret"));
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("moments"));
    }
}
