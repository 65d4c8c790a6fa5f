//! 投影片擷取元件
//!
//! 每部影片的流程：
//! A. 開啟影格來源（ffprobe 取得幀數與幀率）
//! B. 跳躍取樣掃描，收錄穩定且與前一張不同的畫面
//! C. 一張影格一頁輸出 PDF

mod batch;
mod collector;
mod main;
mod pdf_exporter;
mod progress;
mod scanner;
mod stability;

pub use batch::{
    BatchOrchestrator, BatchSummary, JobReport, JobStatus, VideoJob, build_jobs,
};
pub use collector::{CollectedFrame, FrameCollector};
pub use main::SlideExtractor;
pub use pdf_exporter::{
    DEFAULT_PAGE_HEIGHT_MM, DEFAULT_PAGE_WIDTH_MM, DocumentExporter, PageSize,
    PdfDocumentBuilder, PdfExporter,
};
pub use progress::{ConsoleProgress, NoProgress, ProgressReporter};
pub use scanner::{
    JumpScanner, ScanCursor, ScanParams, ScanProgress, ScanReport, ScanTermination,
    SearchOutcome, Step,
};
pub use stability::{StabilityClassifier, adaptive_threshold};
