//! 影片清單（manifest）
//!
//! 格式與範例：
//!
//! ```json
//! [
//!   { "prefix": "lecture", "skip_time_ranges": [["00:01:00", "00:02:30"]] },
//!   { "prefix": "seminar" }
//! ]
//! ```

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// 略過的時間區間（毫秒，包含兩端）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SkipRange {
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start_ms = parse_timecode(start)?;
        let end_ms = parse_timecode(end)?;

        if start_ms > end_ms {
            bail!("略過區間的開始時間晚於結束時間: {start} > {end}");
        }

        Ok(Self { start_ms, end_ms })
    }

    #[must_use]
    pub const fn contains(&self, time_ms: u64) -> bool {
        self.start_ms <= time_ms && time_ms <= self.end_ms
    }
}

/// 清單中的一筆設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub prefix: String,
    pub skip_ranges: Vec<SkipRange>,
}

#[derive(Deserialize)]
struct RawEntry {
    prefix: String,
    #[serde(default)]
    skip_time_ranges: Option<Vec<(String, String)>>,
}

/// 將 `HH:MM:SS` 轉為毫秒
pub fn parse_timecode(text: &str) -> Result<u64> {
    let timecode_regex = Regex::new(r"^(\d+):([0-5]?\d):([0-5]?\d)$")?;
    let caps = timecode_regex
        .captures(text.trim())
        .ok_or_else(|| anyhow::anyhow!("時間格式錯誤（需要 HH:MM:SS）: {text}"))?;

    let field = |i: usize| -> Result<u64> {
        caps[i]
            .parse::<u64>()
            .with_context(|| format!("時間欄位超出範圍: {text}"))
    };

    // 分、秒已由格式限制在 0..=59，只有時數可能溢位
    let minutes_and_seconds = field(2)? * 60_000 + field(3)? * 1000;
    let Some(total) = field(1)?
        .checked_mul(3_600_000)
        .and_then(|hours| hours.checked_add(minutes_and_seconds))
    else {
        bail!("時間欄位超出範圍: {text}");
    };
    Ok(total)
}

pub fn parse_manifest(json: &str) -> Result<Vec<ManifestEntry>> {
    let raw: Vec<RawEntry> = serde_json::from_str(json).context("無法解析影片清單")?;

    raw.into_iter()
        .map(|entry| {
            if entry.prefix.is_empty() {
                bail!("影片清單中的 prefix 不可為空");
            }

            let skip_ranges = entry
                .skip_time_ranges
                .unwrap_or_default()
                .iter()
                .map(|(start, end)| SkipRange::parse(start, end))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("prefix「{}」的略過區間無效", entry.prefix))?;

            Ok(ManifestEntry {
                prefix: entry.prefix,
                skip_ranges,
            })
        })
        .collect()
}

pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("無法讀取影片清單: {}", path.display()))?;
    parse_manifest(&content).with_context(|| format!("影片清單格式錯誤: {}", path.display()))
}
