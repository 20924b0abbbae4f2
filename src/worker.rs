//! The capture thread.
//!
//! One thread owns the camera, the classifier and the recording sink. The UI
//! drives it through [`Command`]s, receives frames through a single slot
//! `watch` channel and hears about lifecycle changes through [`WorkerEvent`]s.

use crate::backend::{read_or_skip, CaptureBackend, Detector, RecordingSink};
use crate::config::{DetectionParams, RecordingSettings};
use crate::detector::{convert_to_grayscale, draw_regions};
use crate::display::{to_display_frame, DisplayFrame};
use crate::error::CaptureError;
use crate::models::ModelRef;
use std::fmt;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

pub type Notify = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Configure(ModelRef),
    StartRecording(RecordingSettings),
    StopRecording,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    ModelLoaded(String),
    ModelFailed { model: String, reason: String },
    RecordingStarted(PathBuf),
    RecordingStopped { path: PathBuf, frames: u64 },
    RecordingFailed { path: PathBuf, reason: String },
    Stopped,
}

impl fmt::Display for WorkerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerEvent::ModelLoaded(model) => write!(f, "Loaded {model}"),
            WorkerEvent::ModelFailed { model, reason } => {
                write!(f, "Failed to load {model}: {reason}")
            }
            WorkerEvent::RecordingStarted(path) => write!(f, "Recording to {}", path.display()),
            WorkerEvent::RecordingStopped { path, frames } => {
                write!(f, "Saved {frames} frames to {}", path.display())
            }
            WorkerEvent::RecordingFailed { path, reason } => {
                write!(f, "Recording to {} failed: {reason}", path.display())
            }
            WorkerEvent::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub camera_index: i32,
    pub model: Option<ModelRef>,
    pub detection: DetectionParams,
    pub display_bounds: (i32, i32),
}

struct LoadedModel<D> {
    model: ModelRef,
    // None when loading failed, retried on the next configure
    detector: Option<D>,
}

struct ActiveRecording<S> {
    sink: S,
    path: PathBuf,
}

pub(crate) struct CaptureLoop<B: CaptureBackend> {
    backend: B,
    source: B::Source,
    detection: DetectionParams,
    display_bounds: (i32, i32),
    model: Option<ModelRef>,
    loaded: Option<LoadedModel<B::Detector>>,
    recording: Option<ActiveRecording<B::Sink>>,
    commands: mpsc::UnboundedReceiver<Command>,
    frames: watch::Sender<Option<Arc<DisplayFrame>>>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    notify: Notify,
}

impl<B: CaptureBackend> CaptureLoop<B> {
    pub(crate) fn new(
        backend: B,
        source: B::Source,
        config: WorkerConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        frames: watch::Sender<Option<Arc<DisplayFrame>>>,
        events: mpsc::UnboundedSender<WorkerEvent>,
        notify: Notify,
    ) -> Self {
        Self {
            backend,
            source,
            detection: config.detection,
            display_bounds: config.display_bounds,
            model: config.model,
            loaded: None,
            recording: None,
            commands,
            frames,
            events,
            notify,
        }
    }

    pub(crate) fn run(mut self) {
        info!("Capture loop started");
        while self.apply_commands().is_continue() {
            if let Err(err) = self.cycle() {
                warn!(%err, "Capture cycle failed");
            }
        }
        self.shutdown();
    }

    /// Drains pending commands. Breaks once the loop should exit.
    pub(crate) fn apply_commands(&mut self) -> ControlFlow<()> {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    if self.apply(command).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                Err(TryRecvError::Empty) => return ControlFlow::Continue(()),
                Err(TryRecvError::Disconnected) => {
                    debug!("Command channel closed");
                    return ControlFlow::Break(());
                }
            }
        }
    }

    fn apply(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Configure(model) => {
                debug!(model = %model.name, "Model configured");
                self.model = Some(model);
                self.loaded = None;
            }
            Command::StartRecording(settings) => self.start_recording(&settings),
            Command::StopRecording => self.stop_recording(),
            Command::Stop => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Runs one read-detect-annotate-record-publish pass.
    /// Returns whether a frame was published.
    pub(crate) fn cycle(&mut self) -> anyhow::Result<bool> {
        let Some(mut frame) = read_or_skip(&mut self.source) else {
            thread::sleep(READ_RETRY_DELAY);
            return Ok(false);
        };

        if let Some(detector) = self.detector() {
            let gray = convert_to_grayscale(&frame)?;
            let regions = detector.detect(&gray)?;
            let drawn = draw_regions(&mut frame, &regions)?;
            trace!(detected = regions.len(), drawn, "Detection pass");
        }

        self.record(&frame);

        let display = to_display_frame(&frame, self.display_bounds)?;
        self.frames.send_replace(Some(Arc::new(display)));
        (self.notify)();
        Ok(true)
    }

    fn detector(&mut self) -> Option<&mut B::Detector> {
        let model = self.model.as_ref()?;
        let stale = self
            .loaded
            .as_ref()
            .map_or(true, |loaded| loaded.model != *model);
        if stale {
            let detector = match self.backend.load_detector(model, self.detection) {
                Ok(detector) => {
                    info!(model = %model.name, "Cascade loaded");
                    self.emit(WorkerEvent::ModelLoaded(model.name.clone()));
                    Some(detector)
                }
                Err(err) => {
                    warn!(model = %model.name, %err, "Failed to load cascade");
                    self.emit(WorkerEvent::ModelFailed {
                        model: model.name.clone(),
                        reason: err.to_string(),
                    });
                    None
                }
            };
            self.loaded = Some(LoadedModel {
                model: model.clone(),
                detector,
            });
        }
        self.loaded.as_mut()?.detector.as_mut()
    }

    fn start_recording(&mut self, settings: &RecordingSettings) {
        // never append a new session into an old handle
        self.stop_recording();
        match self.backend.open_sink(settings) {
            Ok(sink) => {
                self.recording = Some(ActiveRecording {
                    sink,
                    path: settings.path.clone(),
                });
                self.emit(WorkerEvent::RecordingStarted(settings.path.clone()));
            }
            Err(err) => {
                warn!(path = %settings.path.display(), %err, "Failed to start recording");
                self.emit(WorkerEvent::RecordingFailed {
                    path: settings.path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    fn record(&mut self, frame: &opencv::core::Mat) {
        let Some(recording) = self.recording.as_mut() else {
            return;
        };
        let Err(err) = recording.sink.append(frame) else {
            return;
        };
        warn!(%err, "Recording write failed, closing session");
        if let Some(ActiveRecording { sink, path }) = self.recording.take() {
            if let Err(err) = sink.close() {
                debug!(%err, "Failed to close broken recording");
            }
            self.emit(WorkerEvent::RecordingFailed {
                path,
                reason: err.to_string(),
            });
        }
    }

    fn stop_recording(&mut self) {
        let Some(recording) = self.recording.take() else {
            return;
        };
        let ActiveRecording { sink, path } = recording;
        let frames = sink.frames();
        match sink.close() {
            Ok(()) => {
                info!(path = %path.display(), frames, "Recording stopped");
                self.emit(WorkerEvent::RecordingStopped { path, frames });
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "Failed to finalize recording");
                self.emit(WorkerEvent::RecordingFailed {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }

    fn shutdown(mut self) {
        self.stop_recording();
        self.emit(WorkerEvent::Stopped);
        info!("Capture loop stopped");
        // dropping self releases the camera
    }

    fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}

/// Handle to a running capture thread.
pub struct CaptureWorker {
    commands: mpsc::UnboundedSender<Command>,
    frames: watch::Receiver<Option<Arc<DisplayFrame>>>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Opens the camera on a new thread and starts the loop.
    ///
    /// Waits for the camera to open before returning, which can take around
    /// a second on V4L devices. Fails without leaving a thread behind when the
    /// camera cannot be opened.
    pub fn start<B: CaptureBackend>(
        mut backend: B,
        config: WorkerConfig,
        notify: Notify,
    ) -> anyhow::Result<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = watch::channel(None);
        let (ready_tx, ready_rx) = oneshot::channel::<anyhow::Result<()>>();

        let handle = thread::Builder::new()
            .name("capture".to_owned())
            .spawn(move || {
                let source = match backend.open_source(config.camera_index) {
                    Ok(source) => source,
                    Err(err) => {
                        _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                _ = ready_tx.send(Ok(()));
                CaptureLoop::new(
                    backend, source, config, command_rx, frame_tx, event_tx, notify,
                )
                .run();
            })?;

        let ready = ready_rx.blocking_recv();
        match ready {
            Ok(Ok(())) => Ok(Self {
                commands: command_tx,
                frames: frame_rx,
                events: event_rx,
                handle: Some(handle),
            }),
            Ok(Err(err)) => {
                _ = handle.join();
                Err(err)
            }
            Err(_) => {
                _ = handle.join();
                Err(CaptureError::WorkerGone.into())
            }
        }
    }

    pub fn configure(&self, model: ModelRef) {
        self.send(Command::Configure(model));
    }

    pub fn start_recording(&self, settings: RecordingSettings) {
        self.send(Command::StartRecording(settings));
    }

    pub fn stop_recording(&self) {
        self.send(Command::StopRecording);
    }

    /// Stops the loop after its current cycle and waits for the thread.
    /// Any open recording is closed and the camera released.
    pub fn request_stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.send(Command::Stop);
        if handle.join().is_err() {
            warn!("Capture thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Newest frame not yet taken, if any. Nothing is returned once stopped.
    pub fn latest_frame(&mut self) -> Option<Arc<DisplayFrame>> {
        match self.frames.has_changed() {
            Ok(true) => self.frames.borrow_and_update().clone(),
            _ => None,
        }
    }

    pub fn try_event(&mut self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Capture thread is gone, command dropped");
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.request_stop();
    }
}
