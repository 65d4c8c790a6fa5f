use crate::config::load::SETTINGS_FILE;
use crate::config::types::{MAX_RECENT_PATHS, Settings};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, Path::new(SETTINGS_FILE))
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

    fs::write(path, content)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;

    Ok(())
}

/// 更新最近使用的資料夾
/// 將新路徑加入最前面，去重並限制數量
pub fn add_recent_folder(settings: &mut Settings, path: &str) {
    settings.recent_folders.retain(|p| p != path);
    settings.recent_folders.insert(0, path.to_string());
    settings.recent_folders.truncate(MAX_RECENT_PATHS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[test]
    fn test_add_recent_folder_dedup_and_limit() {
        let mut settings = Settings::default();
        for i in 0..7 {
            add_recent_folder(&mut settings, &format!("/videos/{i}"));
        }
        add_recent_folder(&mut settings, "/videos/3");

        assert_eq!(settings.recent_folders.len(), MAX_RECENT_PATHS);
        assert_eq!(settings.recent_folders[0], "/videos/3");
        assert_eq!(
            settings
                .recent_folders
                .iter()
                .filter(|p| p.as_str() == "/videos/3")
                .count(),
            1
        );
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.similarity_threshold = 0.92;
        settings.max_workers = Some(4);
        save_settings_to(&settings, &path).unwrap();

        let loaded = Config::load_settings(&path).unwrap();
        assert_eq!(loaded, settings);
    }
}
