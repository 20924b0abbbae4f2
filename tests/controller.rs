mod common;

use common::{counting_notify, wait_for, FakeBackend};
use pattern_detection::{CaptureError, Controller, ModelRef, Settings};
use std::path::Path;

fn models() -> Vec<ModelRef> {
    let dir = Path::new("/cascades");
    vec![
        ModelRef::new(dir, "haarcascade_eye.xml"),
        ModelRef::new(dir, "haarcascade_frontalface_default.xml"),
    ]
}

fn controller(backend: FakeBackend) -> Controller<FakeBackend> {
    let (notify, _) = counting_notify();
    Controller::new(backend, Settings::default(), models(), notify)
}

#[test]
fn first_model_is_selected_by_default() {
    let controller = controller(FakeBackend::default());
    assert_eq!(controller.selected().unwrap().name, "haarcascade_eye.xml");
    assert_eq!(controller.models().len(), 2);
}

#[test]
fn initial_model_comes_from_settings() {
    let (notify, _) = counting_notify();
    let settings = Settings {
        initial_model: Some("haarcascade_frontalface_default.xml".to_owned()),
        ..Default::default()
    };
    let controller = Controller::new(FakeBackend::default(), settings, models(), notify);
    assert_eq!(
        controller.selected().unwrap().name,
        "haarcascade_frontalface_default.xml"
    );
}

#[test]
fn record_is_rejected_while_idle() {
    let mut controller = controller(FakeBackend::default());
    let err = controller.on_record().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CaptureError>(),
        Some(CaptureError::NotRunning)
    ));
    assert!(!controller.buttons().is_recording());
    assert!(controller.buttons().start_enabled());
}

#[test]
fn camera_failure_returns_to_idle_with_status() {
    let backend = FakeBackend {
        camera_missing: true,
        ..Default::default()
    };
    let mut controller = controller(backend);

    assert!(controller.on_start().is_err());
    assert!(controller.buttons().start_enabled());
    assert!(!controller.buttons().stop_enabled());
    assert_eq!(controller.status(), Some("Unable to open camera 0"));
}

#[test]
fn start_returns_once_camera_is_open() {
    let backend = FakeBackend::default();
    let mut controller = controller(backend.clone());

    controller.on_start().unwrap();
    // no waiting: the camera was opened before on_start returned
    assert_eq!(backend.log().camera_opens, 1);
    assert_eq!(controller.status(), Some("Running"));
    controller.on_stop();
}

#[test]
fn full_session_drives_buttons_and_worker() {
    let backend = FakeBackend::default();
    let mut controller = controller(backend.clone());

    controller.on_start().unwrap();
    assert!(controller.buttons().stop_enabled());
    assert!(!controller.buttons().start_enabled());
    assert!(wait_for(|| controller.poll().is_some()));

    controller.on_record().unwrap();
    assert!(controller.buttons().stop_record_enabled());
    assert!(!controller.buttons().record_enabled());
    assert!(wait_for(|| backend
        .log()
        .sinks
        .first()
        .is_some_and(|sink| sink.frames > 0)));

    controller.on_stop_record();
    assert!(controller.buttons().record_enabled());

    controller.on_stop();
    assert!(controller.buttons().start_enabled());
    assert!(!controller.buttons().record_enabled());
    assert!(controller.poll().is_none());
    assert_eq!(controller.status(), Some("Stopped"));

    let log = backend.log();
    assert_eq!(log.sinks.len(), 1);
    assert!(log.sinks[0].closed);
    assert_eq!(log.camera_releases, 1);
    assert!(log
        .detections
        .iter()
        .all(|name| name == "haarcascade_eye.xml"));
}

#[test]
fn stop_while_recording_closes_session() {
    let backend = FakeBackend::default();
    let mut controller = controller(backend.clone());

    controller.on_start().unwrap();
    controller.on_record().unwrap();
    assert!(wait_for(|| !backend.log().sinks.is_empty()));
    controller.on_stop();

    assert!(!controller.buttons().is_recording());
    assert!(backend.log().sinks[0].closed);
}

#[test]
fn model_change_reaches_running_worker() {
    let backend = FakeBackend::default();
    let mut controller = controller(backend.clone());

    controller.on_start().unwrap();
    controller.on_model_changed("haarcascade_frontalface_default.xml");
    assert!(wait_for(|| backend
        .log()
        .detections
        .iter()
        .any(|name| name == "haarcascade_frontalface_default.xml")));
    controller.on_stop();

    assert_eq!(
        controller.selected().unwrap().name,
        "haarcascade_frontalface_default.xml"
    );
}

#[test]
fn model_change_while_idle_applies_on_start() {
    let backend = FakeBackend::default();
    let mut controller = controller(backend.clone());

    controller.on_model_changed("haarcascade_frontalface_default.xml");
    controller.on_model_changed("not_a_cascade.xml");
    controller.on_start().unwrap();
    assert!(wait_for(|| !backend.log().detections.is_empty()));
    controller.on_stop();

    assert!(backend
        .log()
        .detections
        .iter()
        .all(|name| name == "haarcascade_frontalface_default.xml"));
}
