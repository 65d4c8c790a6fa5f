use crate::config::Settings;
use crate::tools::validate_directory_exists;
use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct VideoFileInfo {
    pub path: PathBuf,
    pub size: u64,
}

impl VideoFileInfo {
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 檔名是否以指定前綴開頭
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.file_name().starts_with(prefix)
    }
}

/// 列出資料夾（不含子資料夾）內的影片檔，依檔名排序
pub fn scan_video_files(directory: &Path, settings: &Settings) -> Result<Vec<VideoFileInfo>> {
    validate_directory_exists(directory)?;

    let mut video_files: Vec<VideoFileInfo> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| settings.is_video_file(entry.path()))
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            Some(VideoFileInfo {
                path: entry.into_path(),
                size: metadata.len(),
            })
        })
        .collect();

    video_files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(video_files)
}
