//! Window state that does not depend on the GUI toolkit.

use crate::backend::CaptureBackend;
use crate::config::Settings;
use crate::display::DisplayFrame;
use crate::error::CaptureError;
use crate::models::{select_model, ModelRef};
use crate::worker::{CaptureWorker, Notify, WorkerConfig, WorkerEvent};
use std::sync::Arc;
use tracing::{info, warn};

/// Which controls are enabled.
///
/// Running and recording are orthogonal, but recording only happens while running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    running: bool,
    recording: bool,
}

impl ButtonState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn start_enabled(&self) -> bool {
        !self.running
    }

    pub fn stop_enabled(&self) -> bool {
        self.running
    }

    pub fn record_enabled(&self) -> bool {
        self.running && !self.recording
    }

    pub fn stop_record_enabled(&self) -> bool {
        self.running && self.recording
    }

    fn started(&mut self) {
        self.running = true;
    }

    fn stopped(&mut self) {
        self.running = false;
        self.recording = false;
    }

    fn recording_started(&mut self) {
        self.recording = true;
    }

    fn recording_stopped(&mut self) {
        self.recording = false;
    }
}

pub struct Controller<B> {
    backend: B,
    settings: Settings,
    models: Vec<ModelRef>,
    selected: Option<ModelRef>,
    worker: Option<CaptureWorker>,
    buttons: ButtonState,
    notify: Notify,
    status: Option<String>,
}

impl<B: CaptureBackend + Clone> Controller<B> {
    pub fn new(backend: B, settings: Settings, models: Vec<ModelRef>, notify: Notify) -> Self {
        let selected = select_model(&models, settings.initial_model.as_deref()).cloned();
        Self {
            backend,
            settings,
            models,
            selected,
            worker: None,
            buttons: ButtonState::default(),
            notify,
            status: None,
        }
    }

    pub fn models(&self) -> &[ModelRef] {
        &self.models
    }

    pub fn selected(&self) -> Option<&ModelRef> {
        self.selected.as_ref()
    }

    pub fn buttons(&self) -> ButtonState {
        self.buttons
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// Starts capturing with the selected model.
    ///
    /// Blocks the calling (UI) thread until the camera has opened or failed
    /// to, so the buttons never show Running for a camera that is missing.
    pub fn on_start(&mut self) -> anyhow::Result<()> {
        if self.buttons.is_running() {
            return Ok(());
        }
        info!("Starting...");
        self.buttons.started();

        let config = WorkerConfig {
            camera_index: self.settings.camera_index,
            model: self.selected.clone(),
            detection: self.settings.detection,
            display_bounds: (self.settings.display_width, self.settings.display_height),
        };
        match CaptureWorker::start(self.backend.clone(), config, self.notify.clone()) {
            Ok(worker) => {
                self.worker = Some(worker);
                self.set_status("Running");
                Ok(())
            }
            Err(err) => {
                warn!(%err, "Failed to start capture");
                self.buttons.stopped();
                self.set_status(err.to_string());
                Err(err)
            }
        }
    }

    pub fn on_stop(&mut self) {
        info!("Finishing...");
        self.buttons.stopped();
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        worker.stop_recording();
        worker.request_stop();
        self.drain_events(&mut worker);
    }

    pub fn on_model_changed(&mut self, name: &str) {
        let Some(model) = self.models.iter().find(|model| model.name == name).cloned() else {
            warn!(name, "Unknown model selected");
            return;
        };
        if let Some(worker) = &self.worker {
            worker.configure(model.clone());
        }
        self.selected = Some(model);
    }

    pub fn on_record(&mut self) -> anyhow::Result<()> {
        let Some(worker) = &self.worker else {
            return Err(CaptureError::NotRunning.into());
        };
        if self.buttons.is_recording() {
            return Ok(());
        }
        worker.start_recording(self.settings.recording());
        self.buttons.recording_started();
        info!("Recording started...");
        Ok(())
    }

    pub fn on_stop_record(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop_recording();
        }
        self.buttons.recording_stopped();
        info!("Recording stopped.");
    }

    /// Applies pending worker events and returns the newest unseen frame.
    pub fn poll(&mut self) -> Option<Arc<DisplayFrame>> {
        let mut worker = self.worker.take()?;
        self.drain_events(&mut worker);
        let frame = worker.latest_frame();

        if worker.is_running() {
            self.worker = Some(worker);
        } else {
            warn!("Capture thread exited on its own");
            self.buttons.stopped();
            self.set_status(CaptureError::WorkerGone.to_string());
        }
        frame
    }

    fn drain_events(&mut self, worker: &mut CaptureWorker) {
        while let Some(event) = worker.try_event() {
            if let WorkerEvent::RecordingFailed { .. } = event {
                self.buttons.recording_stopped();
            }
            self.status = Some(event.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_enables_only_start() {
        let buttons = ButtonState::default();
        assert!(buttons.start_enabled());
        assert!(!buttons.stop_enabled());
        assert!(!buttons.record_enabled());
        assert!(!buttons.stop_record_enabled());
    }

    #[test]
    fn recording_toggles_within_running() {
        let mut buttons = ButtonState::default();
        buttons.started();
        assert!(!buttons.start_enabled());
        assert!(buttons.stop_enabled());
        assert!(buttons.record_enabled());

        buttons.recording_started();
        assert!(!buttons.record_enabled());
        assert!(buttons.stop_record_enabled());

        buttons.recording_stopped();
        assert!(buttons.record_enabled());
        assert!(!buttons.stop_record_enabled());
    }

    #[test]
    fn stop_resets_recording() {
        let mut buttons = ButtonState::default();
        buttons.started();
        buttons.recording_started();
        buttons.stopped();
        assert_eq!(buttons, ButtonState::default());
    }
}
