#![allow(dead_code)]

pub use pattern_detection::testing::{counting_notify, FakeBackend, Log, SinkLog};
use std::thread;
use std::time::{Duration, Instant};

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}
