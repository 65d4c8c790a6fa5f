pub mod load;
pub mod manifest;
pub mod save;
pub mod types;

pub use manifest::{ManifestEntry, SkipRange, load_manifest, parse_manifest, parse_timecode};
pub use types::{
    Config, DEFAULT_MANIFEST_FILE, DEFAULT_SIMILARITY_THRESHOLD, ExecutionMode, MAX_RECENT_PATHS,
    ScanConfig, Settings,
};
