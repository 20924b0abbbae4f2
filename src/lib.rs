pub mod app;
pub mod backend;
pub mod config;
pub mod controller;
pub mod detector;
pub mod display;
pub mod error;
pub mod models;
pub mod recording;
#[doc(hidden)]
pub mod testing;
pub mod worker;

pub use backend::{
    read_or_skip, CameraSource, CaptureBackend, Detector, FrameSource, OpenCvBackend,
    RecordingSink,
};
pub use config::{Args, DetectionParams, RecordingSettings, Settings};
pub use controller::{ButtonState, Controller};
pub use detector::{convert_to_grayscale, draw_regions, CascadeDetector, Region};
pub use display::{fit_within, DisplayFrame};
pub use error::CaptureError;
pub use models::ModelRef;
pub use recording::VideoRecorder;
pub use worker::{CaptureWorker, Command, Notify, WorkerConfig, WorkerEvent};
