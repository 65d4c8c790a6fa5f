use crate::tools::{VideoInfo, get_video_info};
use anyhow::{Context, Result, bail};
use image::RgbImage;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// 解碼後的單一影格
pub type Frame = RgbImage;

/// 兩段式 seek 的前置緩衝時間（秒）
const SEEK_MARGIN: f64 = 2.0;

/// 可依索引讀取、已知總幀數與幀率的影格序列
///
/// 讀取皆為阻塞式呼叫。`Ok(None)` 代表已超出串流結尾，`Err` 代表解碼失敗。
pub trait FrameSource {
    fn frame_count(&self) -> u64;

    /// 整數幀率（無條件捨去，至少為 1）
    fn frame_rate(&self) -> u32;

    /// 讀取指定索引的影格，並將目前位置移到該影格
    fn seek_and_read(&mut self, index: u64) -> Result<Option<Frame>>;

    /// 讀取指定索引的影格但不改變目前位置
    ///
    /// 需要 `&mut self`，同一個來源不能同時被兩處 peek。
    fn peek(&mut self, index: u64) -> Result<Option<Frame>>;

    /// 最近一次 `seek_and_read` 讀到的影格顯示時間（毫秒）
    fn presentation_time_ms(&self) -> u64;
}

/// 為每個工作開啟獨立的影格來源
pub trait SourceFactory: Sync {
    type Source: FrameSource;

    fn open(&self, path: &Path) -> Result<Self::Source>;
}

/// 以 ffprobe / ffmpeg 子程序實作的影格來源
pub struct FfmpegFrameSource {
    path: PathBuf,
    info: VideoInfo,
    position: u64,
}

impl FfmpegFrameSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("影片檔案不存在: {}", path.display());
        }

        let info = get_video_info(path)
            .with_context(|| format!("無法開啟影片: {}", path.display()))?;

        if info.frame_count == 0 || info.width == 0 || info.height == 0 {
            bail!("影片沒有可用的影格: {}", path.display());
        }

        debug!(
            "開啟影片 {}: {}x{}, {:.2} fps, {} 幀",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            position: 0,
        })
    }

    fn timestamp_of(&self, index: u64) -> f64 {
        index as f64 / self.info.frame_rate
    }

    fn decode_at(&self, index: u64) -> Result<Option<Frame>> {
        if index >= self.info.frame_count {
            return Ok(None);
        }

        let timestamp = self.timestamp_of(index);
        let output = Command::new("ffmpeg")
            .args(decode_args(&self.path, timestamp))
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("無法執行 ffmpeg 解碼: {}", self.path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffmpeg 解碼第 {index} 幀失敗: {}", stderr.trim());
        }

        // 超出串流結尾時 ffmpeg 正常結束但沒有輸出任何資料
        if output.stdout.is_empty() {
            return Ok(None);
        }

        let expected = self.info.width as usize * self.info.height as usize * 3;
        if output.stdout.len() < expected {
            bail!(
                "第 {index} 幀資料不完整: 預期 {expected} bytes，只有 {} bytes",
                output.stdout.len()
            );
        }

        let mut raw = output.stdout;
        raw.truncate(expected);
        RgbImage::from_raw(self.info.width, self.info.height, raw)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("無法建立第 {index} 幀影像"))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn frame_rate(&self) -> u32 {
        (self.info.frame_rate as u32).max(1)
    }

    fn seek_and_read(&mut self, index: u64) -> Result<Option<Frame>> {
        let frame = self.decode_at(index)?;
        if frame.is_some() {
            self.position = index;
        }
        Ok(frame)
    }

    fn peek(&mut self, index: u64) -> Result<Option<Frame>> {
        self.decode_at(index)
    }

    fn presentation_time_ms(&self) -> u64 {
        (self.timestamp_of(self.position) * 1000.0).round() as u64
    }
}

/// 開啟真實影片檔的來源工廠
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegSourceFactory;

impl SourceFactory for FfmpegSourceFactory {
    type Source = FfmpegFrameSource;

    fn open(&self, path: &Path) -> Result<Self::Source> {
        FfmpegFrameSource::open(path)
    }
}

/// 建立擷取單一影格的 ffmpeg 參數
///
/// 兩段式 seek：
/// 1. `-ss` 在 `-i` 前：快速跳轉到最近的關鍵幀
/// 2. `-ss` 在 `-i` 後：精準解碼到目標時間點
fn decode_args(path: &Path, timestamp: f64) -> Vec<String> {
    let t0 = (timestamp - SEEK_MARGIN).max(0.0);
    let delta = timestamp - t0;

    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];

    if t0 > 0.0 {
        args.push("-ss".to_string());
        args.push(format!("{t0:.3}"));
    }

    args.push("-i".to_string());
    args.push(path.to_string_lossy().to_string());

    if delta > 0.0 {
        args.push("-ss".to_string());
        args.push(format!("{delta:.3}"));
    }

    args.extend([
        "-frames:v".to_string(),
        "1".to_string(),
        "-an".to_string(),
        "-sn".to_string(),
        "-dn".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-".to_string(),
    ]);

    args
}
