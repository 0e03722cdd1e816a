//! Contract with the native playback engine.
//!
//! The engine owns decoding, buffering and the player pool. The
//! orchestration core only sees the traits below: a `PlaybackEngine` that
//! hands out one `FeedManager` per controller, per-view `PlayerController`
//! handles with an optional VOD capability, and `EngineEvent`s delivered
//! through a `ViewPort`.

pub mod headless;

use common::{BitrateItem, ControllerId, EventParams, PlayerConfig, RenderMode, Source, SubtitleTrack, VodStrategy};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub use crate::view::{ViewKey, ViewPort};

/// Token returned by the engine for source-list changes
pub type Revision = u64;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already initialized")]
    AlreadyInitialized,

    #[error("license rejected: {0}")]
    License(String),

    #[error("{0}")]
    Other(String),
}

/// Entry point into the native engine
pub trait PlaybackEngine: Send + Sync {
    /// One-time global configuration
    fn init(&self, config: &PlayerConfig) -> Result<(), EngineError>;

    /// Allocate the feed manager backing a controller
    fn create_feed(&self, controller: ControllerId) -> Box<dyn FeedManager>;
}

/// Engine-side feed: owns the source list and the player pool of one
/// controller.
pub trait FeedManager: Send {
    fn set_sources(&mut self, sources: Vec<Source>) -> Revision;

    fn append_sources(&mut self, sources: Vec<Source>) -> Revision;

    /// Start playback of the current item
    fn start_current(&mut self) -> Revision;

    fn update_strategy(&mut self, strategy: &VodStrategy);

    /// Make `source` the playing item of the view behind `port`
    fn bind_view(&mut self, port: ViewPort, source: &Source);

    /// Prepare `source` on the view behind `port` without playing it
    fn pre_render(&mut self, port: ViewPort, source: &Source);

    /// Stop and free every player of this feed
    fn release_players(&mut self);
}

/// Per-view player handle handed out by the engine
pub trait PlayerController: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
    fn seek_to(&self, seconds: f64);
    fn set_mute(&self, muted: bool);
    fn set_loop(&self, looping: bool);
    fn is_playing(&self) -> bool;

    /// VOD capability, when the handle exposes one
    fn vod(&self) -> Option<&dyn VodPlayer>;
}

/// Video-on-demand capability of a player handle
pub trait VodPlayer: Send + Sync {
    fn start_play(&self, source: &Source);
    fn set_rate(&self, rate: f64);
    fn set_mirror(&self, mirrored: bool);
    fn switch_resolution(&self, resolution: i64);
    /// Make `resolution` the preferred one for every later session
    fn on_global_resolution_changed(&self, resolution: i64);
    fn supported_resolutions(&self) -> Vec<BitrateItem>;
    fn set_render_mode(&self, mode: RenderMode);
    fn set_string_option(&self, key: &str, value: &Value);
    fn duration(&self) -> f64;
    fn current_play_time(&self) -> f64;
    /// Current video width; 0 while unknown
    fn width(&self) -> u32;
    /// Current video height; 0 while unknown
    fn height(&self) -> u32;
    /// Attach or detach the view's subtitle rendering surface
    fn set_subtitle_surface(&self, attached: bool);
    fn select_track(&self, index: i32);
}

/// Callbacks from the engine, one view at a time
pub enum EngineEvent {
    ControllerBound(Arc<dyn PlayerController>),
    /// The given handle no longer drives the view
    ControllerUnbound(Arc<dyn PlayerController>),
    SourceBound(Source),
    PlayEvent { code: i32, params: EventParams },
    PlayPrepare,
    PlayBegin,
    PlayLoading,
    PlayLoadingEnd,
    PlayProgress { current: f64, duration: f64, playable: f64 },
    PlayPause,
    PlayStop,
    PlayEnd,
    Error { code: i32, message: String, params: EventParams },
    FirstFrameRendered,
    ResolutionChanged { width: u32, height: u32 },
    SubtitleTracks(Vec<SubtitleTrack>),
    ShortVideoDestroyed,
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ControllerBound(_) => "controller-bound",
            Self::ControllerUnbound(_) => "controller-unbound",
            Self::SourceBound(_) => "source-bound",
            Self::PlayEvent { .. } => "play-event",
            Self::PlayPrepare => "play-prepare",
            Self::PlayBegin => "play-begin",
            Self::PlayLoading => "play-loading",
            Self::PlayLoadingEnd => "play-loading-end",
            Self::PlayProgress { .. } => "play-progress",
            Self::PlayPause => "play-pause",
            Self::PlayStop => "play-stop",
            Self::PlayEnd => "play-end",
            Self::Error { .. } => "error",
            Self::FirstFrameRendered => "first-frame-rendered",
            Self::ResolutionChanged { .. } => "resolution-changed",
            Self::SubtitleTracks(_) => "subtitle-tracks",
            Self::ShortVideoDestroyed => "short-video-destroyed",
        }
    }
}
