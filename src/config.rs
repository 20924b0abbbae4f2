use clap::Parser;
use std::path::PathBuf;

pub const DISPLAY_WIDTH: i32 = 640;
pub const DISPLAY_HEIGHT: i32 = 480;

#[derive(Parser, Debug, Clone)]
#[command(name = "pattern-detection", about = "Haar cascade detection on a live camera")]
pub struct Args {
    /// Camera device index.
    #[arg(long, default_value_t = 0)]
    pub camera: i32,

    /// Directory holding haar cascade xml files.
    /// Defaults to the cascades bundled with OpenCV.
    #[arg(long, value_name = "PATH")]
    pub cascade_dir: Option<PathBuf>,

    /// Cascade file name selected on startup.
    #[arg(long, value_name = "FILE")]
    pub model: Option<String>,

    /// Recording output file.
    #[arg(short, long, default_value = "Testweb.avi")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 1.1)]
    pub scale_factor: f64,

    #[arg(long, default_value_t = 5)]
    pub min_neighbors: i32,

    /// Smallest region edge in pixels.
    #[arg(long, default_value_t = 30)]
    pub min_size: i32,
}

/// Parameters handed to `detect_multi_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_size: i32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSettings {
    pub path: PathBuf,
    pub fourcc: [char; 4],
    pub fps: f64,
    pub width: i32,
    pub height: i32,
}

impl RecordingSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fourcc: ['X', 'V', 'I', 'D'],
            fps: 20.0,
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub camera_index: i32,
    pub cascade_dir: Option<PathBuf>,
    pub initial_model: Option<String>,
    pub output: PathBuf,
    pub detection: DetectionParams,
    pub display_width: i32,
    pub display_height: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_index: 0,
            cascade_dir: None,
            initial_model: None,
            output: PathBuf::from("Testweb.avi"),
            detection: DetectionParams::default(),
            display_width: DISPLAY_WIDTH,
            display_height: DISPLAY_HEIGHT,
        }
    }
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        Self {
            camera_index: args.camera,
            cascade_dir: args.cascade_dir,
            initial_model: args.model,
            output: args.output,
            detection: DetectionParams {
                scale_factor: args.scale_factor,
                min_neighbors: args.min_neighbors,
                min_size: args.min_size,
            },
            ..Default::default()
        }
    }
}

impl Settings {
    pub fn recording(&self) -> RecordingSettings {
        RecordingSettings::new(&self.output)
    }
}

/// Installs the fmt subscriber, honoring `RUST_LOG` and defaulting to `info`.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_capture_pipeline() {
        let args = Args::parse_from(["pattern-detection"]);
        let settings = Settings::from(args);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.detection.min_neighbors, 5);
        assert_eq!(settings.output, PathBuf::from("Testweb.avi"));
    }

    #[test]
    fn cli_overrides_detection_params() {
        let args = Args::parse_from([
            "pattern-detection",
            "--camera",
            "2",
            "--min-neighbors",
            "3",
            "--scale-factor",
            "1.3",
            "-o",
            "/tmp/out.avi",
        ]);
        let settings = Settings::from(args);
        assert_eq!(settings.camera_index, 2);
        assert_eq!(settings.detection.min_neighbors, 3);
        assert_eq!(settings.detection.scale_factor, 1.3);
        assert_eq!(settings.recording().path, PathBuf::from("/tmp/out.avi"));
    }

    #[test]
    fn recording_uses_xvid_at_20_fps() {
        let recording = RecordingSettings::new("a.avi");
        assert_eq!(recording.fourcc, ['X', 'V', 'I', 'D']);
        assert_eq!(recording.fps, 20.0);
        assert_eq!((recording.width, recording.height), (640, 480));
    }
}
