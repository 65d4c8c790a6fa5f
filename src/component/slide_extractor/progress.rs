use super::batch::{JobReport, JobStatus, VideoJob};
use super::scanner::ScanProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::warn;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// 工作進度回報，只用於顯示，不影響處理流程
pub trait ProgressReporter: Sync {
    fn scan_progress(&self, job: &VideoJob, progress: &ScanProgress);

    fn export_progress(&self, job: &VideoJob, done: usize, total: usize);

    fn job_finished(&self, report: &JobReport);
}

/// 不輸出任何進度
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn scan_progress(&self, _job: &VideoJob, _progress: &ScanProgress) {}

    fn export_progress(&self, _job: &VideoJob, _done: usize, _total: usize) {}

    fn job_finished(&self, _report: &JobReport) {}
}

/// 每個工作一條進度條，平行處理時同時顯示多條
pub struct ConsoleProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<PathBuf, ProgressBar>>,
    style: ProgressStyle,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgress {
    #[must_use]
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            style: ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        }
    }

    fn with_bar(&self, job: &VideoJob, length: u64, update: impl FnOnce(&ProgressBar)) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        let bar = bars.entry(job.video_path.clone()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(length));
            bar.set_style(self.style.clone());
            bar
        });
        update(bar);
    }
}

impl ProgressReporter for ConsoleProgress {
    fn scan_progress(&self, job: &VideoJob, progress: &ScanProgress) {
        self.with_bar(job, progress.total, |bar| {
            bar.set_length(progress.total);
            bar.set_position(progress.current);
            bar.set_message(format!("{} 掃描中，已收錄 {} 張", job.name(), progress.emitted));
        });
    }

    fn export_progress(&self, job: &VideoJob, done: usize, total: usize) {
        self.with_bar(job, total as u64, |bar| {
            if done <= 1 {
                bar.reset();
            }
            bar.set_length(total as u64);
            bar.set_position(done as u64);
            bar.set_message(format!("{} 轉換 PDF 頁面", job.name()));
        });
    }

    fn job_finished(&self, report: &JobReport) {
        let name = report.job.name();
        let message = match (&report.status, &report.output) {
            (JobStatus::Completed | JobStatus::Partial, Some(path)) => {
                format!("{name} PDF 已建立: {} ({} 頁)", path.display(), report.pages)
            }
            (status, _) => format!("{name} {status}"),
        };

        let bar = self
            .bars
            .lock()
            .ok()
            .and_then(|mut bars| bars.remove(&report.job.video_path));
        match bar {
            Some(bar) => bar.finish_with_message(message),
            None => {
                if let Err(e) = self.multi.println(message) {
                    warn!("無法輸出進度訊息: {e}");
                }
            }
        }
    }
}
