use crate::config::types::{Config, Settings};
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

/// 使用者設定檔（程式執行目錄下）
pub const SETTINGS_FILE: &str = "settings.json";

impl Config {
    pub fn new() -> Result<Self> {
        let settings = Self::load_settings(Path::new(SETTINGS_FILE))?;
        Ok(Self { settings })
    }

    pub fn load_settings(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;

        validate_settings(&settings)?;
        Ok(settings)
    }
}

/// 鄰域總和以 `u32` 累加，限制大小避免溢位
pub const MAX_BINARIZE_BLOCK_SIZE: u32 = 255;

pub fn validate_settings(settings: &Settings) -> Result<()> {
    let threshold = settings.similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        bail!("相似度閾值必須介於 0 與 1 之間: {threshold}");
    }

    let scan = &settings.scan;
    if scan.super_frame_multiplier == 0 || scan.jump_threshold_multiplier == 0 {
        bail!("跳躍倍數必須大於 0");
    }
    if scan.binarize_block_size < 3
        || scan.binarize_block_size % 2 == 0
        || scan.binarize_block_size > MAX_BINARIZE_BLOCK_SIZE
    {
        bail!(
            "二值化鄰域大小必須是 3 到 {MAX_BINARIZE_BLOCK_SIZE} 之間的奇數: {}",
            scan.binarize_block_size
        );
    }
    if settings.video_extensions.is_empty() {
        bail!("至少需要一個影片副檔名");
    }

    Ok(())
}
