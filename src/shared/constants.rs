pub const APP_NAME: &str = "framepipe";

pub const ERROR_LOG_FILE: &str = "framepipe-error.log";
pub const DEBUG_LOG_FILE: &str = "framepipe-debug.log";

/// Natural frame cadence assumed when the container reports no usable fps (~30 fps).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

pub const SPEED_MIN: f64 = 0.02;
pub const SPEED_MAX: f64 = 2.0;

/// How long the playback loop parks on the command channel while paused.
pub const PAUSE_POLL_MS: u64 = 50;

/// Default Sobel double-threshold bounds (0-255 scale).
pub const EDGE_THRESHOLD_LOW: f64 = 100.0;
pub const EDGE_THRESHOLD_HIGH: f64 = 200.0;

/// Added inside ln(1 + v + EPS) so a zero sample never hits ln(0).
pub const LOG_EPSILON: f64 = 1e-6;

pub const HISTOGRAM_BINS: usize = 256;
pub const PLOT_WIDTH: u32 = 400;
pub const PLOT_HEIGHT: u32 = 300;

/// Highest camera index trial-opened during device discovery.
pub const DEVICE_PROBE_LIMIT: u32 = 5;

/// Seek step used by the interactive play controls.
pub const SEEK_STEP_MS: f64 = 5000.0;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff"];
