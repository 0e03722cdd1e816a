//! Requests the engine ignores must still be visible at warn level.
//!
//! Kept in its own test binary: the logger is process-wide and can only be
//! installed once.

mod support;

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;
use support::{Harness, sources};

struct Capture(Mutex<Vec<(Level, String)>>);

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.0
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

fn warnings() -> Vec<String> {
    CAPTURE
        .0
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, message)| message.clone())
        .collect()
}

#[tokio::test]
async fn test_ignored_requests_are_logged_as_warnings() {
    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let harness = Harness::new();
    let config = common::PlayerConfig::default();
    harness.engine.set_configuration(&config);
    harness.engine.set_configuration(&config);

    harness.engine.create_view(1);
    let controller = harness.engine.get_controller(harness.engine.create_controller()).unwrap();
    controller.set_sources(sources(10));
    controller.bind(1, 0);
    controller.pre_bind(1, 5);
    harness.flush().await;

    let warnings = warnings();
    assert!(warnings.iter().any(|m| m.contains("already configured")), "{:?}", warnings);
    assert!(warnings.iter().any(|m| m.contains("skips pre-bind of 5")), "{:?}", warnings);
}
