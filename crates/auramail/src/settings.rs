//! Settings that persist across runs.

use std::path::PathBuf;

use anyhow::Context;
use auramail_core::{FolderView, SyncConfig};

/// Client settings, stored as JSON in the user's config directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Service endpoint and polling cadence.
    pub sync: SyncConfig,
    /// Folder shown when the session starts.
    pub start_folder: FolderView,
    /// Only messages matching this query are listed. Empty lists everything.
    pub search: String,
}

/// Location of the settings file.
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("auramail")
        .join("settings.json")
}

/// Loads settings, falling back to defaults when no file exists.
pub async fn load_settings() -> anyhow::Result<Settings> {
    let path = settings_path();
    if !path.exists() {
        tracing::debug!(?path, "No settings file, using defaults");
        return Ok(Settings::default());
    }

    let contents = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_settings(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_settings(contents: &str) -> anyhow::Result<Settings> {
    let settings: Settings = serde_json::from_str(contents)?;
    settings.sync.validate()?;
    Ok(settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_settings() {
        let settings = parse_settings(
            r#"{"start_folder": "starred", "search": "invoice", "sync": {"poll_interval_secs": 30}}"#,
        )
        .unwrap();
        assert_eq!(settings.start_folder, FolderView::Starred);
        assert_eq!(settings.search, "invoice");
        assert_eq!(settings.sync.poll_interval_secs, 30);
        assert_eq!(settings.sync.api_url, auramail_core::config::DEFAULT_API_URL);
    }

    #[test]
    fn test_parse_empty_object() {
        assert_eq!(parse_settings("{}").unwrap(), Settings::default());
    }

    #[test]
    fn test_rejects_unknown_folder_and_bad_interval() {
        assert!(parse_settings(r#"{"start_folder": "spam"}"#).is_err());
        assert!(parse_settings(r#"{"sync": {"poll_interval_secs": 0}}"#).is_err());
    }

    #[test]
    fn test_settings_path_is_namespaced() {
        assert!(settings_path().ends_with("auramail/settings.json"));
    }
}
