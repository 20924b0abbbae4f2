//! Seams between the capture loop and OpenCV.
//!
//! The worker only talks to these traits, so the loop can run against the
//! real camera, cascade and video writer or against in-memory stand-ins.

use crate::config::{DetectionParams, RecordingSettings};
use crate::detector::{CascadeDetector, Region};
use crate::error::CaptureError;
use crate::models::ModelRef;
use crate::recording::VideoRecorder;
use opencv::prelude::*;
use opencv::videoio;
use tracing::{info, trace};

pub trait FrameSource {
    /// Reads the next frame. `Ok(None)` means the read failed or came back
    /// empty and the cycle should be skipped.
    fn read_frame(&mut self) -> anyhow::Result<Option<Mat>>;
}

pub trait Detector {
    /// Runs the classifier on a single channel image.
    fn detect(&mut self, image: &Mat) -> anyhow::Result<Vec<Region>>;
}

pub trait RecordingSink {
    fn append(&mut self, frame: &Mat) -> anyhow::Result<()>;
    /// Frames appended since the session opened.
    fn frames(&self) -> u64;
    fn close(self) -> anyhow::Result<()>;
}

/// Reads the next frame, treating a failed read like an empty one.
pub fn read_or_skip<S: FrameSource>(source: &mut S) -> Option<Mat> {
    match source.read_frame() {
        Ok(frame) => frame,
        Err(err) => {
            trace!(%err, "Frame read failed");
            None
        }
    }
}

/// Builds the resources the worker thread owns.
pub trait CaptureBackend: Send + 'static {
    type Source: FrameSource;
    type Detector: Detector;
    type Sink: RecordingSink;

    fn open_source(&mut self, camera_index: i32) -> anyhow::Result<Self::Source>;
    fn load_detector(
        &mut self,
        model: &ModelRef,
        params: DetectionParams,
    ) -> anyhow::Result<Self::Detector>;
    fn open_sink(&mut self, settings: &RecordingSettings) -> anyhow::Result<Self::Sink>;
}

pub struct CameraSource {
    capture: videoio::VideoCapture,
}

impl CameraSource {
    pub fn new(index: i32) -> anyhow::Result<Self> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(CaptureError::CameraUnavailable(index).into());
        }
        info!(index, "Opened camera");
        Ok(Self { capture })
    }

    pub fn next_frame(&mut self) -> anyhow::Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> anyhow::Result<Option<Mat>> {
        self.next_frame()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(err) = self.capture.release() {
            tracing::warn!(%err, "Failed to release camera");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvBackend;

impl CaptureBackend for OpenCvBackend {
    type Source = CameraSource;
    type Detector = CascadeDetector;
    type Sink = VideoRecorder;

    fn open_source(&mut self, camera_index: i32) -> anyhow::Result<CameraSource> {
        CameraSource::new(camera_index)
    }

    fn load_detector(
        &mut self,
        model: &ModelRef,
        params: DetectionParams,
    ) -> anyhow::Result<CascadeDetector> {
        CascadeDetector::new(model, params)
    }

    fn open_sink(&mut self, settings: &RecordingSettings) -> anyhow::Result<VideoRecorder> {
        VideoRecorder::open(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[test]
    fn failed_reads_are_skipped_not_propagated() {
        let backend = FakeBackend::default();
        let mut source = backend.scripted_source(vec![None, Some((320, 240))]);

        assert!(read_or_skip(&mut source).is_none());
        let frame = read_or_skip(&mut source).unwrap();
        assert_eq!((frame.cols(), frame.rows()), (320, 240));
        // past the end of the script every read fails
        assert!(read_or_skip(&mut source).is_none());
    }
}
