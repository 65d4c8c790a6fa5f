use super::batch::{BatchOrchestrator, BatchSummary, JobReport, JobStatus, build_jobs};
use super::pdf_exporter::PdfExporter;
use super::progress::ConsoleProgress;
use crate::config::save::{add_recent_folder, save_settings};
use crate::config::{Config, load_manifest};
use crate::tools::{FfmpegSourceFactory, Ssim, scan_video_files, validate_directory_exists};
use anyhow::Result;
use console::style;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

const DEFAULT_VIDEO_FOLDER: &str = "video";

/// 投影片擷取器
///
/// 依清單比對資料夾內的影片，擷取每部影片中停留夠久的畫面，
/// 每部影片輸出一份 PDF 到同一個資料夾。
pub struct SlideExtractor {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl SlideExtractor {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    #[must_use]
    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn run(&mut self) -> Result<()> {
        println!("{}", style("=== 投影片擷取 ===").cyan().bold());

        let folder = self.prompt_folder()?;
        let input_dir = PathBuf::from(&folder);
        validate_directory_exists(&input_dir)?;

        let manifest_path = self.prompt_manifest_path()?;
        let manifest = load_manifest(Path::new(&manifest_path))?;
        println!(
            "{}",
            style(format!("清單共有 {} 個前綴", manifest.len())).dim()
        );

        add_recent_folder(&mut self.config.settings, &folder);
        if let Err(e) = save_settings(&self.config.settings) {
            warn!("無法儲存最近使用的資料夾: {e}");
        }

        println!("{}", style("掃描影片檔案中...").dim());
        let videos = scan_video_files(&input_dir, &self.config.settings)?;
        let settings = &self.config.settings;
        let jobs = build_jobs(&videos, &manifest, settings.similarity_threshold, &input_dir);

        if jobs.is_empty() {
            println!("{}", style("沒有任何影片符合清單中的前綴").yellow());
            return Ok(());
        }

        println!(
            "{}",
            style(format!(
                "找到 {} 個影片，相似度閾值 {}，{}",
                jobs.len(),
                settings.similarity_threshold,
                settings.execution_mode
            ))
            .green()
        );
        for (index, job) in jobs.iter().enumerate() {
            println!("  {}. {}", index + 1, job.name());
        }

        println!();
        println!("{}", style("開始擷取投影片...").cyan());

        let orchestrator = BatchOrchestrator::new(
            FfmpegSourceFactory,
            Ssim::default(),
            PdfExporter::default(),
            settings.scan.clone(),
            Arc::clone(&self.shutdown_signal),
        );
        let progress = ConsoleProgress::new();
        let reports = orchestrator.run(
            &jobs,
            settings.execution_mode,
            settings.worker_count(),
            &progress,
        )?;

        self.print_summary(&reports);
        Ok(())
    }

    fn prompt_folder(&self) -> Result<String> {
        let default = self
            .config
            .settings
            .recent_folders
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_VIDEO_FOLDER.to_string());

        let path: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("請輸入影片資料夾路徑")
            .default(default)
            .interact_text()?;
        Ok(path.trim().to_string())
    }

    fn prompt_manifest_path(&self) -> Result<String> {
        let path: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("請輸入清單檔路徑")
            .default(self.config.settings.manifest_path.clone())
            .interact_text()?;
        Ok(path.trim().to_string())
    }

    fn print_summary(&self, reports: &[JobReport]) {
        let summary = BatchSummary::from_reports(reports);

        println!();
        println!("{}", style("=== 投影片擷取摘要 ===").cyan().bold());
        for report in reports {
            let mark = match report.status {
                status if status.is_failure() => style("✗").red(),
                JobStatus::Completed => style("✓").green(),
                JobStatus::Cancelled => style("⤳").dim(),
                _ => style("!").yellow(),
            };
            match &report.output {
                Some(path) => println!(
                    "  {mark} {} → {} ({} 頁)",
                    report.job.name(),
                    path.display(),
                    report.pages
                ),
                None => println!("  {mark} {} ({})", report.job.name(), report.status),
            }
            if let Some(message) = &report.error_message {
                println!("      {}", style(message).dim());
            }
        }

        println!();
        println!("  總計: {} 個影片", summary.total_jobs);
        println!("  完成: {} 個", style(summary.completed).green());
        if summary.partial > 0 {
            println!("  部分完成: {} 個", style(summary.partial).yellow());
        }
        if summary.empty > 0 {
            println!("  無影格: {} 個", style(summary.empty).yellow());
        }
        if summary.failed > 0 {
            println!("  失敗: {} 個", style(summary.failed).red());
        }
        if summary.cancelled > 0 {
            println!("  已取消: {} 個", style(summary.cancelled).dim());
        }
        println!("  共輸出 {} 頁", summary.total_pages);

        info!(
            "投影片擷取完成 - 完成: {}, 部分: {}, 無影格: {}, 失敗: {}, 取消: {}",
            summary.completed, summary.partial, summary.empty, summary.failed, summary.cancelled
        );
    }
}
