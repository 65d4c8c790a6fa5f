mod ffprobe_info;
mod frame_source;
mod path_validator;
mod similarity;
mod video_scanner;

pub use ffprobe_info::{VideoInfo, get_video_info};
pub use frame_source::{
    FfmpegFrameSource, FfmpegSourceFactory, Frame, FrameSource, SourceFactory,
};
pub use path_validator::validate_directory_exists;
pub use similarity::{SimilarityOracle, Ssim};
pub use video_scanner::{VideoFileInfo, scan_video_files};
