//! In-memory stand-ins for the camera, the cascade and the video writer.
//!
//! Shared by the unit tests and the integration tests under `tests/`, which
//! drive the capture loop without a camera or OpenCV data files.

use crate::backend::{CaptureBackend, Detector, FrameSource, RecordingSink};
use crate::config::{DetectionParams, RecordingSettings};
use crate::detector::Region;
use crate::error::CaptureError;
use crate::models::ModelRef;
use crate::worker::Notify;
use opencv::core::{self, Mat, Scalar};
use opencv::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Log {
    pub camera_opens: usize,
    pub camera_releases: usize,
    pub loads: Vec<String>,
    pub detections: Vec<String>,
    pub sinks: Vec<SinkLog>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SinkLog {
    pub path: PathBuf,
    pub frames: u64,
    pub closed: bool,
}

type SharedLog = Arc<Mutex<Log>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, Log> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opened cameras produce blank 640x480 frames at roughly 1 kHz.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    pub log: SharedLog,
    pub camera_missing: bool,
    pub broken_models: Vec<String>,
    pub regions: Vec<Region>,
}

impl FakeBackend {
    pub fn log(&self) -> MutexGuard<'_, Log> {
        lock(&self.log)
    }

    /// A source that yields the given frame sizes in order, `None` standing
    /// for a failed read. Reads past the end fail too.
    pub fn scripted_source(&self, frames: Vec<Option<(i32, i32)>>) -> FakeSource {
        FakeSource {
            script: Some(frames.into_iter()),
            log: self.log.clone(),
        }
    }
}

pub struct FakeSource {
    script: Option<std::vec::IntoIter<Option<(i32, i32)>>>,
    log: SharedLog,
}

fn blank_frame(width: i32, height: i32) -> opencv::Result<Mat> {
    Mat::new_rows_cols_with_default(height, width, core::CV_8UC3, Scalar::all(0.0))
}

impl FrameSource for FakeSource {
    fn read_frame(&mut self) -> anyhow::Result<Option<Mat>> {
        let Some(script) = self.script.as_mut() else {
            thread::sleep(Duration::from_millis(1));
            return Ok(Some(blank_frame(640, 480)?));
        };
        match script.next().flatten() {
            Some((width, height)) => Ok(Some(blank_frame(width, height)?)),
            None => anyhow::bail!("no frame"),
        }
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        lock(&self.log).camera_releases += 1;
    }
}

pub struct FakeDetector {
    name: String,
    regions: Vec<Region>,
    log: SharedLog,
}

impl Detector for FakeDetector {
    fn detect(&mut self, image: &Mat) -> anyhow::Result<Vec<Region>> {
        anyhow::ensure!(image.channels() == 1, "expected a grayscale image");
        lock(&self.log).detections.push(self.name.clone());
        Ok(self.regions.clone())
    }
}

pub struct FakeSink {
    index: usize,
    log: SharedLog,
}

impl RecordingSink for FakeSink {
    fn append(&mut self, _frame: &Mat) -> anyhow::Result<()> {
        let mut log = lock(&self.log);
        let sink = &mut log.sinks[self.index];
        anyhow::ensure!(!sink.closed, "append after close");
        sink.frames += 1;
        Ok(())
    }

    fn frames(&self) -> u64 {
        lock(&self.log).sinks[self.index].frames
    }

    fn close(self) -> anyhow::Result<()> {
        lock(&self.log).sinks[self.index].closed = true;
        Ok(())
    }
}

impl CaptureBackend for FakeBackend {
    type Source = FakeSource;
    type Detector = FakeDetector;
    type Sink = FakeSink;

    fn open_source(&mut self, camera_index: i32) -> anyhow::Result<FakeSource> {
        if self.camera_missing {
            return Err(CaptureError::CameraUnavailable(camera_index).into());
        }
        lock(&self.log).camera_opens += 1;
        Ok(FakeSource {
            script: None,
            log: self.log.clone(),
        })
    }

    fn load_detector(
        &mut self,
        model: &ModelRef,
        _params: DetectionParams,
    ) -> anyhow::Result<FakeDetector> {
        lock(&self.log).loads.push(model.name.clone());
        if self.broken_models.contains(&model.name) {
            anyhow::bail!("broken cascade");
        }
        Ok(FakeDetector {
            name: model.name.clone(),
            regions: self.regions.clone(),
            log: self.log.clone(),
        })
    }

    fn open_sink(&mut self, settings: &RecordingSettings) -> anyhow::Result<FakeSink> {
        let mut log = lock(&self.log);
        log.sinks.push(SinkLog {
            path: settings.path.clone(),
            ..Default::default()
        });
        Ok(FakeSink {
            index: log.sinks.len() - 1,
            log: self.log.clone(),
        })
    }
}

/// A repaint callback that counts how often it fired.
pub fn counting_notify() -> (Notify, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let notify: Notify = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (notify, count)
}
