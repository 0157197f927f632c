// Sentry Cam Constants
// Runtime defaults for the reference deployment; override via config file or CLI flags.

// Frame source
pub const DEFAULT_FPS: f64 = 20.0; // fallback when the source reports no usable rate

// Event detection defaults
pub const DEFAULT_MIN_REGION_AREA: u32 = 1500; // px^2 below which a motion region is ignored
pub const DEFAULT_SUSTAINED_THRESHOLD: u32 = 3; // consecutive motion frames to trigger
pub const DEFAULT_ALERT_DISPLAY_SECONDS: f64 = 2.0;
pub const DEFAULT_FLASH_INTERVAL_SECONDS: f64 = 0.25;

// Clip window defaults
pub const DEFAULT_PRE_SECONDS: f64 = 3.0;
pub const DEFAULT_POST_SECONDS: f64 = 3.0;

// Artifact naming
pub const DEFAULT_OUTPUT_DIR: &str = "output_alerts";
pub const SNAPSHOT_PREFIX: &str = "snapshot_";
pub const CLIP_PREFIX: &str = "clip_";
pub const EVENT_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// Writer thread
pub const WRITE_QUEUE_CAPACITY: usize = 256; // frame jobs buffered before drops start

// Clip encoding
pub const CLIP_CODEC: &str = "libx264";
pub const CLIP_CRF: u32 = 23;

// Snapshot encoding
pub const SNAPSHOT_QUALITY: u32 = 85; // 0-100, converted to ffmpeg's 1-31 q scale
