//! 測試共用的合成影片來源

#![allow(dead_code)]

use anyhow::{Result, bail};
use image::Rgb;
use slide_extractor::component::slide_extractor::{
    JobReport, ProgressReporter, ScanProgress, VideoJob,
};
use slide_extractor::tools::{Frame, FrameSource, SourceFactory};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const FRAME_RATE: u32 = 30;

/// 影片腳本：總幀數、各段開始的幀索引、解碼失敗的位置
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub frame_count: u64,
    pub cuts: Vec<u64>,
    pub fail_at: Option<u64>,
}

impl Script {
    pub fn new(frame_count: u64, cuts: &[u64]) -> Self {
        Self {
            frame_count,
            cuts: cuts.to_vec(),
            fail_at: None,
        }
    }

    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }
}

/// 純色畫面的合成影片，相鄰兩段分別為暗、亮
pub struct ScriptedVideo {
    script: Script,
    position: u64,
}

impl ScriptedVideo {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            position: 0,
        }
    }

    fn render(&self, index: u64) -> Result<Option<Frame>> {
        if self.script.fail_at == Some(index) {
            bail!("解碼失敗 (第 {index} 幀)");
        }
        if index >= self.script.frame_count {
            return Ok(None);
        }
        let segment = self.script.cuts.iter().filter(|&&c| c <= index).count();
        let value = if segment % 2 == 0 { 40 } else { 200 };
        Ok(Some(Frame::from_pixel(32, 18, Rgb([value; 3]))))
    }
}

impl FrameSource for ScriptedVideo {
    fn frame_count(&self) -> u64 {
        self.script.frame_count
    }

    fn frame_rate(&self) -> u32 {
        FRAME_RATE
    }

    fn seek_and_read(&mut self, index: u64) -> Result<Option<Frame>> {
        let frame = self.render(index)?;
        self.position = index;
        Ok(frame)
    }

    fn peek(&mut self, index: u64) -> Result<Option<Frame>> {
        self.render(index)
    }

    fn presentation_time_ms(&self) -> u64 {
        self.position * 1000 / u64::from(FRAME_RATE)
    }
}

/// 依檔名提供腳本，沒有腳本的檔案視為無法開啟
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: HashMap<String, Script>,
}

impl ScriptedFactory {
    pub fn with(mut self, file_name: &str, script: Script) -> Self {
        self.scripts.insert(file_name.to_string(), script);
        self
    }
}

impl SourceFactory for ScriptedFactory {
    type Source = ScriptedVideo;

    fn open(&self, path: &Path) -> Result<Self::Source> {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        match self.scripts.get(&name) {
            Some(script) => Ok(ScriptedVideo::new(script.clone())),
            None => bail!("無法開啟影片: {}", path.display()),
        }
    }
}

/// 記錄所有回報的進度
#[derive(Default)]
pub struct RecordingProgress {
    pub scan: Mutex<Vec<(PathBuf, u64)>>,
    pub export: Mutex<Vec<(PathBuf, usize, usize)>>,
    pub finished: Mutex<Vec<PathBuf>>,
}

impl ProgressReporter for RecordingProgress {
    fn scan_progress(&self, job: &VideoJob, progress: &ScanProgress) {
        self.scan
            .lock()
            .unwrap()
            .push((job.video_path.clone(), progress.current));
    }

    fn export_progress(&self, job: &VideoJob, done: usize, total: usize) {
        self.export
            .lock()
            .unwrap()
            .push((job.video_path.clone(), done, total));
    }

    fn job_finished(&self, report: &JobReport) {
        self.finished
            .lock()
            .unwrap()
            .push(report.job.video_path.clone());
    }
}

/// 在資料夾中建立空的影片檔，讓資料夾掃描找得到
pub fn touch_videos(dir: &Path, names: &[&str]) {
    for name in names {
        fs::write(dir.join(name), b"").unwrap();
    }
}
