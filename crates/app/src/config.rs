//! Settings file under the user config dir.

use shared::settings::AssistantSettings;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub fn config_path() -> Option<PathBuf> {
    if let Some(proj) = directories::ProjectDirs::from("com.local", "Problem Solver", "ProblemSolver")
    {
        let p = proj.config_dir().join("settings.json");
        let _ = fs::create_dir_all(proj.config_dir());
        Some(p)
    } else {
        None
    }
}

/// Settings from disk, or defaults on a fresh install. The flag is true when
/// defaults were used.
pub fn load_settings_or_default() -> (AssistantSettings, bool) {
    match config_path() {
        Some(path) => load_settings_from(&path),
        None => (AssistantSettings::default(), true),
    }
}

pub fn load_settings_from(path: &Path) -> (AssistantSettings, bool) {
    if path.exists() {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<AssistantSettings>(&bytes) {
                Ok(settings) => return (settings, false),
                Err(e) => warn!("Ignoring unreadable settings at {}: {}", path.display(), e),
            },
            Err(e) => warn!("Could not read {}: {}", path.display(), e),
        }
    }
    (AssistantSettings::default(), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, fresh) = load_settings_from(&dir.path().join("settings.json"));
        assert!(fresh);
        assert_eq!(settings.code_debounce_ms, 500);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"gemini_model":"gemini-1.5-pro","dark_mode":false}"#).unwrap();

        let (settings, fresh) = load_settings_from(&path);
        assert!(!fresh);
        assert_eq!(settings.gemini_model, "gemini-1.5-pro");
        assert!(!settings.dark_mode);
        assert_eq!(settings.watch.timeout_ms, 30_000);
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_settings_from(&path).1);
    }
}
