use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 最近使用資料夾的保留數量
pub const MAX_RECENT_PATHS: usize = 5;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.88;
pub const DEFAULT_MANIFEST_FILE: &str = "video.json";

/// 批次工作的執行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// 一次處理一部影片
    #[default]
    Sequential,
    /// 以固定大小的工作池同時處理多部影片
    Concurrent,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "依序處理"),
            Self::Concurrent => write!(f, "平行處理"),
        }
    }
}

/// 跳躍取樣掃描的可調參數
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 一個「超級幀」等於幾秒的幀數（幀率的倍數）
    pub super_frame_multiplier: u32,
    /// 跳躍距離超過 `jump_init` 的幾倍時視為跳過頭，需要回溯
    pub jump_threshold_multiplier: u32,
    /// 自適應二值化的鄰域大小（奇數）
    pub binarize_block_size: u32,
    /// 自適應二值化從鄰域平均值扣除的常數
    pub binarize_offset: i32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            super_frame_multiplier: 5,
            jump_threshold_multiplier: 2,
            binarize_block_size: 11,
            binarize_offset: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub similarity_threshold: f64,
    pub execution_mode: ExecutionMode,
    /// 平行處理時的工作數上限，`None` 表示依 CPU 數決定
    pub max_workers: Option<usize>,
    /// 不含點的副檔名，比對時不分大小寫
    pub video_extensions: Vec<String>,
    pub manifest_path: String,
    pub recent_folders: Vec<String>,
    pub scan: ScanConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            execution_mode: ExecutionMode::default(),
            max_workers: None,
            video_extensions: vec!["mp4".to_string()],
            manifest_path: DEFAULT_MANIFEST_FILE.to_string(),
            recent_folders: Vec::new(),
            scan: ScanConfig::default(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn is_video_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.video_extensions
                    .iter()
                    .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.max_workers.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file_case_insensitive() {
        let settings = Settings::default();
        assert!(settings.is_video_file(Path::new("/videos/lecture01.mp4")));
        assert!(settings.is_video_file(Path::new("/videos/lecture01.MP4")));
        assert!(!settings.is_video_file(Path::new("/videos/lecture01.mp4.pdf")));
        assert!(!settings.is_video_file(Path::new("/videos/lecture01")));
    }

    #[test]
    fn test_is_video_file_accepts_dotted_extensions() {
        let settings = Settings {
            video_extensions: vec![".mkv".to_string(), "mov".to_string()],
            ..Default::default()
        };
        assert!(settings.is_video_file(Path::new("a.mkv")));
        assert!(settings.is_video_file(Path::new("a.mov")));
        assert!(!settings.is_video_file(Path::new("a.mp4")));
    }

    #[test]
    fn test_worker_count() {
        let settings = Settings {
            max_workers: Some(3),
            ..Default::default()
        };
        assert_eq!(settings.worker_count(), 3);

        let auto = Settings {
            max_workers: Some(0),
            ..Default::default()
        };
        assert!(auto.worker_count() >= 1);
    }

    #[test]
    fn test_settings_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"execution_mode": "concurrent", "max_workers": 2}"#).unwrap();
        assert_eq!(settings.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(settings.max_workers, Some(2));
        assert!((settings.similarity_threshold - 0.88).abs() < f64::EPSILON);
        assert_eq!(settings.scan, ScanConfig::default());
    }
}
