use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn default_app_name() -> String {
    "FullseePathway".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1:8501".to_string()
}

fn default_workspaces_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("fullsee-pathway").join("workspaces"))
        .unwrap_or_else(|| PathBuf::from("workspaces"))
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_upload_endpoint() -> String {
    "http://design-pathway-backend:8000/api/upload-csv".to_string()
}

fn default_max_preview_rows() -> usize {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_workspaces_dir")]
    pub workspaces_dir: PathBuf,
    /// Per-session workspaces when true, one shared `default` workspace otherwise.
    #[serde(default)]
    pub online_deployment: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_upload_endpoint")]
    pub upload_endpoint: String,
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    #[serde(default = "default_max_preview_rows")]
    pub max_preview_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            app_name: default_app_name(),
            bind_address: default_bind_address(),
            workspaces_dir: default_workspaces_dir(),
            online_deployment: false,
            request_timeout_secs: default_request_timeout_secs(),
            upload_endpoint: default_upload_endpoint(),
            endpoints: HashMap::new(),
            max_preview_rows: default_max_preview_rows(),
        }
    }
}

impl Settings {
    pub fn from_json(content: &str, origin: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(content).map_err(|source| SettingsError::Json {
            path: origin.to_string(),
            source,
        })
    }

    /// A missing file falls back to defaults; an unreadable or malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Settings file {} not found, using defaults", path.display());
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Settings::from_json(&content, &path.display().to_string())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Environment variable first, then the `endpoints` table, then the built-in fallback.
    pub fn resolve_endpoint<F>(&self, key: &str, env_var: &str, fallback: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(env_var).filter(|url| !url.trim().is_empty()) {
            return url;
        }
        if let Some(url) = self.endpoints.get(key) {
            return url.clone();
        }
        fallback.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_defaults() {
        let settings = Settings::from_json(
            r#"{"online_deployment": true, "endpoints": {"deg": "http://backend:9000/deg"}}"#,
            "inline",
        )
        .unwrap();

        assert!(settings.online_deployment);
        assert_eq!(settings.request_timeout_secs, 600);
        assert_eq!(settings.bind_address, "127.0.0.1:8501");
        assert_eq!(settings.endpoints["deg"], "http://backend:9000/deg");
    }

    #[test]
    fn endpoint_precedence() {
        let mut settings = Settings::default();
        settings
            .endpoints
            .insert("deg".to_string(), "http://from-settings/deg".to_string());

        let env = |var: &str| (var == "FASTAPI_DEG").then(|| "http://from-env/deg".to_string());
        let no_env = |_: &str| None;

        assert_eq!(
            settings.resolve_endpoint("deg", "FASTAPI_DEG", "http://fallback/deg", env),
            "http://from-env/deg"
        );
        assert_eq!(
            settings.resolve_endpoint("deg", "FASTAPI_DEG", "http://fallback/deg", no_env),
            "http://from-settings/deg"
        );
        assert_eq!(
            settings.resolve_endpoint("pca", "FASTAPI_PCA", "http://fallback/pca", no_env),
            "http://fallback/pca"
        );
    }

    #[test]
    fn malformed_settings_rejected() {
        assert!(matches!(
            Settings::from_json("{not json", "inline"),
            Err(SettingsError::Json { .. })
        ));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.app_name, "FullseePathway");
    }
}
