use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Unable to open camera {0}")]
    CameraUnavailable(i32),
    #[error("Unable to open recording output {0:?}")]
    RecordingUnavailable(PathBuf),
    #[error("Failed to load cascade {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("No haar cascade directory found, pass --cascade-dir")]
    NoCascadeDirectory,
    #[error("Capture is not running")]
    NotRunning,
    #[error("Capture worker exited unexpectedly")]
    WorkerGone,
}
