use super::collector::FrameCollector;
use super::pdf_exporter::DocumentExporter;
use super::progress::ProgressReporter;
use super::scanner::{JumpScanner, ScanProgress, ScanReport, ScanTermination};
use crate::config::{ExecutionMode, ManifestEntry, ScanConfig, SkipRange};
use crate::tools::{SimilarityOracle, SourceFactory, VideoFileInfo};
use anyhow::{Context, Result};
use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 一部影片的處理工作
#[derive(Debug, Clone, PartialEq)]
pub struct VideoJob {
    pub video_path: PathBuf,
    pub output_path: PathBuf,
    pub similarity_threshold: f64,
    pub skip_ranges: Vec<SkipRange>,
}

impl VideoJob {
    /// 輸出檔名為原檔名加上 `.pdf`
    #[must_use]
    pub fn new(
        video_path: PathBuf,
        output_dir: &Path,
        similarity_threshold: f64,
        skip_ranges: Vec<SkipRange>,
    ) -> Self {
        let file_name = video_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Self {
            output_path: output_dir.join(format!("{file_name}.pdf")),
            video_path,
            similarity_threshold,
            skip_ranges,
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.video_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// 依清單前綴比對影片，建立工作列表
///
/// 同一個檔案被多個項目比對到時只排一次（以先出現的項目為準），避免兩個工作寫入同一個輸出檔。
#[must_use]
pub fn build_jobs(
    videos: &[VideoFileInfo],
    manifest: &[ManifestEntry],
    similarity_threshold: f64,
    output_dir: &Path,
) -> Vec<VideoJob> {
    let mut scheduled: HashSet<&Path> = HashSet::new();
    let mut jobs = Vec::new();

    for entry in manifest {
        let matched: Vec<&VideoFileInfo> = videos
            .iter()
            .filter(|v| v.matches_prefix(&entry.prefix))
            .collect();

        if matched.is_empty() {
            warn!("前綴 \"{}\" 沒有對應的影片", entry.prefix);
        }

        for video in matched {
            if !scheduled.insert(video.path.as_path()) {
                warn!(
                    "{} 已由其他前綴排入工作，忽略前綴 \"{}\"",
                    video.file_name(),
                    entry.prefix
                );
                continue;
            }
            jobs.push(VideoJob::new(
                video.path.clone(),
                output_dir,
                similarity_threshold,
                entry.skip_ranges.clone(),
            ));
        }
    }

    jobs
}

/// 單一工作的結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// 無法開啟影片
    OpenFailed,
    /// 掃描中途失敗或被中斷，已收錄的影格仍已輸出
    Partial,
    /// 沒有收錄任何影格，不輸出文件
    Empty,
    ExportFailed,
    Completed,
    /// 收到中斷信號，工作未開始
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::OpenFailed | Self::ExportFailed)
    }

    #[must_use]
    pub const fn wrote_document(self) -> bool {
        matches!(self, Self::Completed | Self::Partial)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::OpenFailed => "無法開啟",
            Self::Partial => "部分完成",
            Self::Empty => "無影格",
            Self::ExportFailed => "輸出失敗",
            Self::Completed => "完成",
            Self::Cancelled => "已取消",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: VideoJob,
    pub status: JobStatus,
    pub pages: usize,
    /// 有輸出文件時為輸出路徑
    pub output: Option<PathBuf>,
    pub error_message: Option<String>,
    pub scan: Option<ScanReport>,
}

impl JobReport {
    fn without_scan(job: &VideoJob, status: JobStatus, error_message: Option<String>) -> Self {
        Self {
            job: job.clone(),
            status,
            pages: 0,
            output: None,
            error_message,
            scan: None,
        }
    }
}

/// 批次處理摘要
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_jobs: usize,
    pub completed: usize,
    pub partial: usize,
    pub empty: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_pages: usize,
}

impl BatchSummary {
    #[must_use]
    pub fn from_reports(reports: &[JobReport]) -> Self {
        let mut summary = Self {
            total_jobs: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match report.status {
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Partial => summary.partial += 1,
                JobStatus::Empty => summary.empty += 1,
                JobStatus::OpenFailed | JobStatus::ExportFailed => summary.failed += 1,
                JobStatus::Cancelled => summary.cancelled += 1,
            }
            if report.status.wrote_document() {
                summary.total_pages += report.pages;
            }
        }
        summary
    }
}

/// 批次協調器：為每個工作開啟來源、掃描、輸出文件
///
/// 工作之間只共用唯讀的設定，單一工作失敗不影響其他工作。
pub struct BatchOrchestrator<F, O, E> {
    factory: F,
    oracle: O,
    exporter: E,
    scan_config: ScanConfig,
    shutdown_signal: Arc<AtomicBool>,
}

impl<F, O, E> BatchOrchestrator<F, O, E>
where
    F: SourceFactory,
    O: SimilarityOracle,
    E: DocumentExporter,
{
    pub const fn new(
        factory: F,
        oracle: O,
        exporter: E,
        scan_config: ScanConfig,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            factory,
            oracle,
            exporter,
            scan_config,
            shutdown_signal,
        }
    }

    /// 依執行模式處理所有工作，回傳的報告順序與 `jobs` 相同
    pub fn run(
        &self,
        jobs: &[VideoJob],
        mode: ExecutionMode,
        max_workers: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<JobReport>> {
        info!("開始批次處理 {} 個工作 ({mode})", jobs.len());
        match mode {
            ExecutionMode::Sequential => Ok(self.run_sequential(jobs, progress)),
            ExecutionMode::Concurrent => self.run_concurrent(jobs, max_workers, progress),
        }
    }

    pub fn run_sequential(
        &self,
        jobs: &[VideoJob],
        progress: &dyn ProgressReporter,
    ) -> Vec<JobReport> {
        jobs.iter().map(|job| self.run_job(job, progress)).collect()
    }

    pub fn run_concurrent(
        &self,
        jobs: &[VideoJob],
        max_workers: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<JobReport>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers.max(1))
            .build()
            .context("無法建立工作執行緒池")?;

        Ok(pool.install(|| {
            jobs.par_iter()
                .map(|job| self.run_job(job, progress))
                .collect()
        }))
    }

    /// 處理單一工作，任何錯誤都轉成對應的 `JobStatus`
    pub fn run_job(&self, job: &VideoJob, progress: &dyn ProgressReporter) -> JobReport {
        let report = self.process_job(job, progress);
        progress.job_finished(&report);
        report
    }

    fn process_job(&self, job: &VideoJob, progress: &dyn ProgressReporter) -> JobReport {
        let name = job.name();
        if self.shutdown_signal.load(Ordering::SeqCst) {
            warn!("收到中斷信號，略過 {name}");
            return JobReport::without_scan(job, JobStatus::Cancelled, None);
        }

        info!("開始處理: {name}");
        let mut source = match self.factory.open(&job.video_path) {
            Ok(source) => source,
            Err(e) => {
                error!("無法開啟影片 {name}: {e:#}");
                return JobReport::without_scan(job, JobStatus::OpenFailed, Some(format!("{e:#}")));
            }
        };

        let mut collector = FrameCollector::new();
        let scan = JumpScanner::new(
            &mut source,
            &self.oracle,
            job.similarity_threshold,
            &job.skip_ranges,
            &self.scan_config,
        )
        .run(
            &mut collector,
            &|p: &ScanProgress| progress.scan_progress(job, p),
            Some(self.shutdown_signal.as_ref()),
        );
        drop(source);

        info!(
            "{name} 掃描結束: {:?}，收錄 {} 張，回溯 {} 次",
            scan.termination,
            collector.len(),
            scan.backtracks
        );

        if collector.is_empty() {
            warn!("{name} 沒有收錄任何影格，不輸出 PDF");
            return JobReport {
                job: job.clone(),
                status: JobStatus::Empty,
                pages: 0,
                output: None,
                error_message: None,
                scan: Some(scan),
            };
        }

        let pages = collector.len();
        let frames = collector.into_images();
        let exported = self.exporter.export(&frames, &job.output_path, &|done, total| {
            progress.export_progress(job, done, total);
        });

        match exported {
            Ok(()) => {
                let status = if scan.termination.is_partial() {
                    JobStatus::Partial
                } else {
                    JobStatus::Completed
                };
                JobReport {
                    job: job.clone(),
                    status,
                    pages,
                    output: Some(job.output_path.clone()),
                    error_message: match &scan.termination {
                        ScanTermination::Failed(msg) => Some(msg.clone()),
                        _ => None,
                    },
                    scan: Some(scan),
                }
            }
            Err(e) => {
                error!("{name} 輸出 PDF 失敗: {e:#}");
                JobReport {
                    job: job.clone(),
                    status: JobStatus::ExportFailed,
                    pages: 0,
                    output: None,
                    error_message: Some(format!("{e:#}")),
                    scan: Some(scan),
                }
            }
        }
    }
}
