// Configuration Storage Service
// Handles config file read/write, environment overrides and version backup

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MAPPING_ISO_COLUMN: &str = "Wiki Code";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API key not configured")]
    MissingApiKey,
    #[error("service base URL not configured")]
    MissingBaseUrl,
    #[error("failed to {action} config at {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusConfig {
    pub sentences_path: PathBuf,
    pub labels_path: PathBuf,
    pub mapping_path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub mapping_delimiter: char,
    #[serde(default = "default_iso_column")]
    pub mapping_iso_column: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            sentences_path: PathBuf::from("train_test/x_train.txt"),
            labels_path: PathBuf::from("train_test/y_train.txt"),
            mapping_path: PathBuf::from("train_test/labels.csv"),
            mapping_delimiter: default_delimiter(),
            mapping_iso_column: default_iso_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationConfig {
    #[serde(default)]
    pub count_unscored_as_failure: bool,
    #[serde(default = "default_examples_retained")]
    pub examples_retained: usize,
    #[serde(default = "default_max_sample_size")]
    pub max_sample_size: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            count_unscored_as_failure: false,
            examples_retained: default_examples_retained(),
            max_sample_size: default_max_sample_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_delimiter() -> char { ';' }
fn default_iso_column() -> String { DEFAULT_MAPPING_ISO_COLUMN.to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_attempts() -> usize { 3 }
fn default_backoff_ms() -> u64 { 400 }
fn default_examples_retained() -> usize { 1 }
fn default_max_sample_size() -> usize { 1000 }
fn default_bind() -> String { "127.0.0.1:5000".to_string() }

impl AppConfig {
    /// Overlay environment values on top of the file config.
    ///
    /// `lookup` abstracts the process environment so bootstrap code decides
    /// where values come from.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|&k| lookup(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        if let Some(key) = get(&["LANGCHECK_API_KEY", "SUBSCRIPTION_KEY"]) {
            self.service.api_key = Some(key);
        }
        if let Some(url) = get(&["LANGCHECK_BASE_URL", "URL_SERVICE"]) {
            self.service.base_url = Some(url);
        }
        if let Some(p) = get(&["LANGCHECK_SENTENCES"]) {
            self.corpus.sentences_path = PathBuf::from(p);
        }
        if let Some(p) = get(&["LANGCHECK_LABELS"]) {
            self.corpus.labels_path = PathBuf::from(p);
        }
        if let Some(p) = get(&["LANGCHECK_MAPPING"]) {
            self.corpus.mapping_path = PathBuf::from(p);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.max_attempts == 0 {
            return Err(ConfigError::Invalid("service.maxAttempts must be at least 1".into()));
        }
        if self.service.timeout_secs == 0 {
            return Err(ConfigError::Invalid("service.timeoutSecs must be at least 1".into()));
        }
        if self.evaluation.examples_retained == 0 {
            return Err(ConfigError::Invalid(
                "evaluation.examplesRetained must be at least 1".into(),
            ));
        }
        if self.evaluation.max_sample_size == 0 {
            return Err(ConfigError::Invalid(
                "evaluation.maxSampleSize must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Store backed by an explicit file path.
    pub fn at_file(config_file: PathBuf) -> Self {
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("langcheck"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
            action: "create directory for",
            path: self.config_dir.clone(),
            source,
        })
    }

    /// Load configuration from file; a missing file yields defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(|source| ConfigError::Io {
            action: "read",
            path: self.config_file.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.config_file.clone(),
            source,
        })
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
            path: self.config_file.clone(),
            source,
        })?;

        fs::write(&self.config_file, content).map_err(|source| ConfigError::Io {
            action: "write",
            path: self.config_file.clone(),
            source,
        })
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(|source| ConfigError::Io {
            action: "create backup directory for",
            path: backup_dir.clone(),
            source,
        })?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(|source| ConfigError::Io {
            action: "back up",
            path: self.config_file.clone(),
            source,
        })?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10);

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) {
        let mut entries: Vec<_> = match fs::read_dir(backup_dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
                .collect(),
            Err(_) => return,
        };

        if entries.len() <= keep {
            return;
        }

        // Oldest first
        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            let _ = fs::remove_file(entry.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.corpus.mapping_delimiter, ';');
        assert_eq!(config.corpus.mapping_iso_column, "Wiki Code");
        assert_eq!(config.evaluation.examples_retained, 1);
        assert!(!config.evaluation.count_unscored_as_failure);
        assert_eq!(config.evaluation.max_sample_size, 1000);
        assert!(config.service.api_key.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let json = r#"{"service": {"baseUrl": "https://example.test"}}"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.service.base_url.as_deref(), Some("https://example.test"));
        assert_eq!(parsed.service.max_attempts, 3);
        assert_eq!(parsed.server.bind, "127.0.0.1:5000");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SUBSCRIPTION_KEY", " secret "),
            ("URL_SERVICE", "https://legacy.test"),
            ("LANGCHECK_BASE_URL", "https://preferred.test"),
            ("LANGCHECK_LABELS", "/data/y.txt"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.service.api_key.as_deref(), Some("secret"));
        assert_eq!(config.service.base_url.as_deref(), Some("https://preferred.test"));
        assert_eq!(config.corpus.labels_path, PathBuf::from("/data/y.txt"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.service.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());

        assert_eq!(store.load().unwrap().evaluation.examples_retained, 1);

        let mut config = AppConfig::default();
        config.evaluation.examples_retained = 5;
        store.save(&config).unwrap();
        config.evaluation.examples_retained = 7;
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap().evaluation.examples_retained, 7);
        let backups = fs::read_dir(dir.path().join("backups")).unwrap().count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_load_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.json");
        fs::write(&file, "{not json").unwrap();
        let store = ConfigStore::at_file(file);
        assert!(matches!(store.load(), Err(ConfigError::Parse { .. })));
    }
}
