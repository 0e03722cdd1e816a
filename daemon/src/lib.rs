//! Short-video feed orchestration.
//!
//! Maps an ordered feed of video sources onto a small pool of on-screen
//! views, drives a playback engine through the `player` contract and reports
//! playback events back to the host.

pub mod adapter;
pub mod capability;
pub mod commands;
pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod ipc_server;
pub mod layout;
pub mod macros;
pub mod player;
pub mod ui;
pub mod view;

pub use controller::FeedController;
pub use engine::{Engine, FeedSettings};
pub use view::{PlayerView, ViewRegistry};

/// Shared daemon state
pub struct DaemonState {
    pub should_exit: bool,
    pub start_time: std::time::Instant,
}

impl DaemonState {
    pub fn new() -> Self {
        Self {
            should_exit: false,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for DaemonState {
    fn default() -> Self {
        Self::new()
    }
}
