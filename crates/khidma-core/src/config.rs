use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ClientSettings, DEFAULT_REFRESH_PATH, DEFAULT_TIMEOUT};
use crate::resources::DEFAULT_PAGE_SIZE;

const CONFIG_DIR_NAME: &str = "khidma";
const CONFIG_FILE_NAME: &str = "config.toml";
const CURRENT_SCHEMA_VERSION: u32 = 1;
const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const API_URL_ENV: &str = "KHIDMA_API_URL";

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No usable configuration file; defaults were synthesized.
    Default,
    File,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML serialization error: {0}")]
    Ser(#[from] toml::ser::Error),
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub api: ApiPreferences,
    #[serde(default)]
    pub listing: ListingPreferences,
    #[serde(default)]
    pub export: ExportPreferences,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            api: ApiPreferences::default(),
            listing: ListingPreferences::default(),
            export: ExportPreferences::default(),
        }
    }
}

impl FileConfig {
    const fn schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPreferences {
    #[serde(default = "ApiPreferences::default_base_url")]
    pub base_url: String,
    #[serde(default = "ApiPreferences::default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "ApiPreferences::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiPreferences {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            refresh_path: Self::default_refresh_path(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl ApiPreferences {
    fn default_base_url() -> String {
        DEFAULT_API_URL.to_string()
    }

    fn default_refresh_path() -> String {
        DEFAULT_REFRESH_PATH.to_string()
    }

    const fn default_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT.as_secs()
    }

    /// Connection settings, with the base URL taken from the first of `cli_override`,
    /// `env_override` and the configured value that is non-blank.
    pub fn client_settings(
        &self,
        cli_override: Option<&str>,
        env_override: Option<&str>,
    ) -> ClientSettings {
        let base_url = [cli_override, env_override]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(&self.base_url);

        ClientSettings {
            base_url: base_url.to_string(),
            refresh_path: self.refresh_path.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// [`ApiPreferences::client_settings`] reading the override from `KHIDMA_API_URL`.
    pub fn resolve_client_settings(&self, cli_override: Option<&str>) -> ClientSettings {
        let env_override = env::var(API_URL_ENV).ok();
        self.client_settings(cli_override, env_override.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPreferences {
    #[serde(default = "ListingPreferences::default_page_size")]
    pub page_size: u32,
}

impl Default for ListingPreferences {
    fn default() -> Self {
        Self {
            page_size: Self::default_page_size(),
        }
    }
}

impl ListingPreferences {
    const fn default_page_size() -> u32 {
        DEFAULT_PAGE_SIZE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportPreferences {
    /// Where reports are written; the working directory when unset.
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
}

impl ExportPreferences {
    pub fn directory(&self) -> PathBuf {
        self.output_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Path to the configuration directory.
pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path to `config.toml`.
pub fn config_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

pub fn load_config() -> ConfigLoadResult {
    load_config_from(&config_path())
}

/// Load the configuration at `path`. Unreadable or invalid files fall back to defaults,
/// with the reason reported as a warning.
pub fn load_config_from(path: &Path) -> ConfigLoadResult {
    let mut warnings = Vec::new();

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<FileConfig>(&raw) {
                Ok(cfg) => {
                    let (cfg, mut sanitize_warnings) = sanitize_config(cfg);
                    warnings.append(&mut sanitize_warnings);
                    return ConfigLoadResult {
                        config: cfg,
                        warnings,
                        source: ConfigSource::File,
                    };
                }
                Err(err) => warnings.push(format!(
                    "Failed to parse {} as TOML: {}. Falling back to defaults.",
                    path.display(),
                    err
                )),
            },
            Err(err) => warnings.push(format!(
                "Failed to read {}: {}. Falling back to defaults.",
                path.display(),
                err
            )),
        }
    }

    ConfigLoadResult {
        config: FileConfig::default(),
        warnings,
        source: ConfigSource::Default,
    }
}

pub fn save_config(config: &FileConfig) -> Result<(), ConfigError> {
    save_config_to(&config_path(), config)
}

pub fn save_config_to(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(config)?)?;
    Ok(())
}

fn sanitize_config(mut config: FileConfig) -> (FileConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.schema_version != CURRENT_SCHEMA_VERSION {
        warnings.push(format!(
            "Unsupported config schema version {}; treating it as version {}.",
            config.schema_version, CURRENT_SCHEMA_VERSION
        ));
        config.schema_version = CURRENT_SCHEMA_VERSION;
    }

    let base_url = config.api.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        warnings.push(format!(
            "API base URL '{}' is not an http(s) URL; using {}.",
            config.api.base_url, DEFAULT_API_URL
        ));
        config.api.base_url = DEFAULT_API_URL.to_string();
    } else {
        config.api.base_url = base_url.trim_end_matches('/').to_string();
    }

    if !config.api.refresh_path.starts_with('/') {
        warnings.push(format!(
            "Refresh path '{}' must start with '/'; using {}.",
            config.api.refresh_path, DEFAULT_REFRESH_PATH
        ));
        config.api.refresh_path = DEFAULT_REFRESH_PATH.to_string();
    }

    if config.api.timeout_secs == 0 {
        warnings.push(format!(
            "Request timeout must be positive; using {} seconds.",
            DEFAULT_TIMEOUT.as_secs()
        ));
        config.api.timeout_secs = DEFAULT_TIMEOUT.as_secs();
    }

    if config.listing.page_size == 0 || config.listing.page_size > MAX_PAGE_SIZE {
        warnings.push(format!(
            "Page size {} is outside 1..={}; using {}.",
            config.listing.page_size, MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE
        ));
        config.listing.page_size = DEFAULT_PAGE_SIZE;
    }

    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults_without_warnings() {
        let dir = tempdir().expect("tempdir");
        let load = load_config_from(&dir.path().join("config.toml"));
        assert_eq!(load.source, ConfigSource::Default);
        assert!(load.warnings.is_empty());
        assert_eq!(load.config, FileConfig::default());
    }

    #[test]
    fn bad_toml_falls_back_with_warning() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\nbase_url = ").unwrap();

        let load = load_config_from(&path);
        assert_eq!(load.source, ConfigSource::Default);
        assert_eq!(load.warnings.len(), 1);
        assert!(load.warnings[0].contains("Failed to parse"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api]\nbase_url = \"https://api.example.org/\"\n").unwrap();

        let load = load_config_from(&path);
        assert_eq!(load.source, ConfigSource::File);
        assert!(load.warnings.is_empty());
        assert_eq!(load.config.api.base_url, "https://api.example.org");
        assert_eq!(load.config.api.refresh_path, DEFAULT_REFRESH_PATH);
        assert_eq!(load.config.listing.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn sanitize_repairs_invalid_values() {
        let mut config = FileConfig::default();
        config.schema_version = 7;
        config.api.base_url = "localhost:3000".to_string();
        config.api.refresh_path = "auth/refresh".to_string();
        config.api.timeout_secs = 0;
        config.listing.page_size = 500;

        let (config, warnings) = sanitize_config(config);
        assert_eq!(warnings.len(), 5);
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = FileConfig::default();
        config.api.timeout_secs = 5;
        config.export.output_directory = Some(PathBuf::from("/tmp/reports"));

        save_config_to(&path, &config).expect("save");
        let load = load_config_from(&path);
        assert_eq!(load.config, config);
    }

    #[test]
    fn base_url_overrides_take_precedence() {
        let api = ApiPreferences::default();
        assert_eq!(
            api.client_settings(Some("http://cli"), Some("http://env")).base_url,
            "http://cli"
        );
        assert_eq!(
            api.client_settings(Some("  "), Some("http://env")).base_url,
            "http://env"
        );
        let settings = api.client_settings(None, None);
        assert_eq!(settings.base_url, DEFAULT_API_URL);
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
    }
}
