use crate::backend::RecordingSink;
use crate::config::RecordingSettings;
use crate::error::CaptureError;
use anyhow::Context;
use opencv::core::Size;
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use std::path::PathBuf;
use tracing::{debug, info};

/// An open video file. Frames are appended until `close` is called.
pub struct VideoRecorder {
    writer: videoio::VideoWriter,
    path: PathBuf,
    frame_size: Size,
    frames: u64,
}

impl VideoRecorder {
    pub fn open(settings: &RecordingSettings) -> anyhow::Result<Self> {
        let [a, b, c, d] = settings.fourcc;
        let fourcc = videoio::VideoWriter::fourcc(a, b, c, d)?;
        let frame_size = Size::new(settings.width, settings.height);
        let path = settings
            .path
            .to_str()
            .context("Recording path is not valid utf-8")?;

        let writer = videoio::VideoWriter::new(path, fourcc, settings.fps, frame_size, true)
            .map_err(|_| CaptureError::RecordingUnavailable(settings.path.clone()))?;
        if !writer.is_opened()? {
            return Err(CaptureError::RecordingUnavailable(settings.path.clone()).into());
        }
        info!(path = %settings.path.display(), fps = settings.fps, "Recording started");

        Ok(Self {
            writer,
            path: settings.path.clone(),
            frame_size,
            frames: 0,
        })
    }
}

impl RecordingSink for VideoRecorder {
    fn append(&mut self, frame: &Mat) -> anyhow::Result<()> {
        // the writer silently drops frames whose size differs from the session
        if frame.size()? == self.frame_size {
            self.writer.write(frame)?;
        } else {
            let mut resized = Mat::default();
            imgproc::resize(
                frame,
                &mut resized,
                self.frame_size,
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
            self.writer.write(&resized)?;
        }
        self.frames += 1;
        Ok(())
    }

    fn frames(&self) -> u64 {
        self.frames
    }

    fn close(mut self) -> anyhow::Result<()> {
        self.writer.release()?;
        debug!(path = %self.path.display(), frames = self.frames, "Recording closed");
        Ok(())
    }
}
