//! Common types and utilities for Shortfeed.
//!
//! This crate defines the shared data model and IPC protocol used for
//! communication between the feed daemon (`shortfeedd`) and a host
//! (the `sfctl` client, or any application speaking the protocol).
//!
//! # IPC Protocol
//!
//! Communication happens over a Unix domain socket using JSON-serialized
//! messages, one per line. The host sends [`Command`] variants and receives
//! [`Response`] variants. After [`Command::Subscribe`] the connection only
//! carries [`Response::Event`] lines, one per outward [`PlayerEvent`].
//!
//! # Examples
//!
//! ```no_run
//! use common::{Command, Source};
//!
//! // Replace the feed of controller 1 with two videos
//! let cmd = Command::SetSources {
//!     controller: 1,
//!     sources: vec![
//!         Source::from_url("https://example.com/a.mp4"),
//!         Source::from_url("https://example.com/b.mp4"),
//!     ],
//! };
//!
//! // Serialize for sending over IPC
//! let json = serde_json::to_string(&cmd).unwrap();
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Host-assigned identity of a display surface.
pub type ViewId = i32;

/// Identity of a feed controller, allocated by the daemon.
pub type ControllerId = i32;

/// Free-form diagnostic key/value payload attached to engine events.
pub type EventParams = serde_json::Map<String, serde_json::Value>;

/// View identity meaning "not assigned yet". Never registered.
pub const NO_VIEW_ID: ViewId = -1;

/// Play-event code reported when the first video frame has been rendered.
pub const PLAY_EVT_FIRST_FRAME_RENDERED: i32 = 50001;

/// Common error types shared between client and daemon.
///
/// All errors are serializable for transmission over IPC.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

impl From<std::io::Error> for FeedError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Ipc(e.to_string())
    }
}

/// External subtitle file attached to a [`Source`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSource {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "mimeType")]
    pub mime_type: String,
}

/// One item of the feed.
///
/// A source is either a direct URL or a VOD file id (with app id and
/// optional signature). Controllers keep their own copies, so a host may
/// drop or mutate the list it sent without affecting playback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Direct media URL
    #[serde(default, alias = "videoURL", alias = "url")]
    pub video_url: Option<String>,
    /// VOD application id (required with `file_id`)
    #[serde(default, alias = "appId")]
    pub app_id: Option<i64>,
    /// VOD file id
    #[serde(default, alias = "fileId")]
    pub file_id: Option<String>,
    /// Signature for protected file ids
    #[serde(default, alias = "pSign")]
    pub p_sign: Option<String>,
    /// Cover image shown before the first frame
    #[serde(default, alias = "coverPictureUrl")]
    pub cover_picture_url: Option<String>,
    /// Whether the engine should start playback as soon as the item is current
    #[serde(default = "default_true", alias = "isAutoPlay")]
    pub auto_play: bool,
    /// Free-form extension metadata
    #[serde(default, alias = "extInfo")]
    pub ext_info: Option<EventParams>,
    /// External subtitle tracks
    #[serde(default, alias = "subtitleSources")]
    pub subtitle_sources: Vec<SubtitleSource>,
}

fn default_true() -> bool {
    true
}

impl Source {
    /// Create a URL source with default settings
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            video_url: Some(url.into()),
            auto_play: true,
            ..Default::default()
        }
    }

    /// Create a VOD file-id source
    pub fn from_file_id(app_id: i64, file_id: impl Into<String>, p_sign: Option<String>) -> Self {
        Self {
            app_id: Some(app_id),
            file_id: Some(file_id.into()),
            p_sign,
            auto_play: true,
            ..Default::default()
        }
    }

    /// Drop external subtitle entries that have no usable URL.
    pub fn normalized(mut self) -> Self {
        self.subtitle_sources.retain(|s| !s.url.trim().is_empty());
        self
    }

    /// Human-readable locator used in log lines
    pub fn locator(&self) -> String {
        match (&self.video_url, &self.file_id) {
            (Some(url), _) => url.clone(),
            (None, Some(file_id)) => format!("fileId:{}", file_id),
            (None, None) => "<empty source>".to_string(),
        }
    }
}

/// Subtitle track reported by the playback engine.
///
/// `index` is only stable for one engine session of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub index: i32,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub track_type: i32,
}

/// Playback engine tuning, forwarded unchanged to the engine.
///
/// Every field is optional: a missing or unparseable value keeps the
/// engine's own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VodStrategy {
    /// Maximum number of concurrently preloaded items
    #[serde(default, alias = "preloadCount", deserialize_with = "lenient")]
    pub preload_count: Option<u32>,
    /// Pre-download cache size (MB)
    #[serde(default, alias = "preDownloadSize", deserialize_with = "lenient")]
    pub pre_download_size: Option<f32>,
    /// Buffer required before playback starts (MB)
    #[serde(
        default,
        alias = "preloadBufferSizeInMB",
        alias = "preloadBufferSizeMB",
        deserialize_with = "lenient"
    )]
    pub preload_buffer_size_mb: Option<f32>,
    /// Maximum buffer while playing (MB)
    #[serde(default, alias = "maxBufferSize", deserialize_with = "lenient")]
    pub max_buffer_size: Option<f32>,
    /// Preferred start resolution (pixel count, e.g. 720 * 1280)
    #[serde(
        default,
        alias = "preferredResolution",
        deserialize_with = "lenient_rounded"
    )]
    pub preferred_resolution: Option<i64>,
    /// Progress callback interval (ms)
    #[serde(default, alias = "progressInterval", deserialize_with = "lenient")]
    pub progress_interval: Option<u32>,
    /// Engine render mode constant
    #[serde(default, alias = "renderMode", deserialize_with = "lenient")]
    pub render_mode: Option<i32>,
    /// Super-resolution on/off
    #[serde(
        default,
        alias = "enableSuperResolution",
        deserialize_with = "lenient"
    )]
    pub enable_super_resolution: Option<bool>,
}

/// Deserialize a field, turning anything that does not fit into `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_rounded<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)))
}

/// Process-wide engine configuration (license and logging).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_true", alias = "enableLog")]
    pub enable_log: bool,
    #[serde(default, alias = "licenseUrl")]
    pub license_url: String,
    #[serde(default, alias = "licenseKey")]
    pub license_key: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            enable_log: true,
            license_url: String::new(),
            license_key: String::new(),
        }
    }
}

/// Parameters for the optional enhancement (super-resolution) plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementInfo {
    pub app_id: i64,
    pub auth_id: i32,
    pub sr_algorithm: i32,
}

/// How the video child is fitted into its container when letterboxing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeMode {
    /// Fit inside the container (letterbox)
    #[default]
    Contain,
    /// Fill the container (center-crop)
    Cover,
}

/// Whether the view honours the video aspect ratio at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Follow the video aspect ratio
    #[default]
    Fit,
    /// Stretch to the container, ignoring the aspect ratio
    Fill,
}

/// Lifetime of a resolution switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolutionScope {
    /// Only the current playback session
    #[default]
    Session,
    /// Also stored as the engine's global preference
    Global,
}

/// Playback state of a view relative to its bound engine controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Unbound,
    Bound,
    Playing,
    Paused,
    Error,
}

/// A selectable stream quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitrateItem {
    pub index: i32,
    pub width: u32,
    pub height: u32,
    pub bitrate: u64,
}

/// Snapshot of a view's geometry after aspect-ratio correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewLayout {
    pub container_width: u32,
    pub container_height: u32,
    pub video_width: u32,
    pub video_height: u32,
    pub aspect_ratio: f32,
    pub resize_mode: ResizeMode,
    pub render_mode: RenderMode,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub subtitle_visible: bool,
}

/// Commands sent from the host to the daemon via IPC.
///
/// Controller commands address a controller allocated with
/// [`Command::CreateController`]; view commands address a view by the
/// identity the host assigned to it.
#[derive(Debug, Serialize, Deserialize)]
pub enum Command {
    /// Initialize the playback engine (license, logging). Only the first
    /// call has an effect.
    SetConfiguration { config: PlayerConfig },
    /// Best-effort call into the optional enhancement plugin
    ProbeEnhancement { info: EnhancementInfo },

    /// Allocate a new feed controller
    CreateController,
    /// Replace the feed of a controller
    SetSources {
        controller: ControllerId,
        sources: Vec<Source>,
    },
    /// Extend the feed of a controller
    AppendSources {
        controller: ControllerId,
        sources: Vec<Source>,
    },
    /// Start playing the current item
    Start { controller: ControllerId },
    /// Authoritatively bind feed item `index` to a view
    Bind {
        controller: ControllerId,
        view: ViewId,
        index: i64,
    },
    /// Speculatively prepare feed item `index` on a view
    PreBind {
        controller: ControllerId,
        view: ViewId,
        index: i64,
    },
    /// Loop mode applied at the next bind
    SetLoop {
        controller: ControllerId,
        enabled: bool,
    },
    /// Forward engine tuning
    SetVodStrategy {
        controller: ControllerId,
        strategy: VodStrategy,
    },
    /// Stop all playback of a controller and forget it
    ReleaseController { controller: ControllerId },

    /// Create and register a view
    CreateView { view: ViewId },
    /// Re-key a view
    SetViewId { old: ViewId, new: ViewId },
    /// Container size of a view, in pixels
    SetViewSize {
        view: ViewId,
        width: u32,
        height: u32,
    },
    /// Letterbox policy of a view
    SetResizeMode { view: ViewId, mode: ResizeMode },
    /// Dispose a view
    DisposeView { view: ViewId },
    /// Query the current geometry of a view
    GetViewLayout { view: ViewId },
    /// Ids of every registered view
    ListViews,

    /// Start playing `source` on the view's bound controller
    Play { view: ViewId, source: Source },
    Pause { view: ViewId },
    Resume { view: ViewId },
    /// Seek to an absolute position in seconds
    Seek { view: ViewId, seconds: f64 },
    SetRate { view: ViewId, rate: f64 },
    SetMute { view: ViewId, muted: bool },
    SetMirror { view: ViewId, mirrored: bool },
    SwitchResolution {
        view: ViewId,
        resolution: i64,
        scope: ResolutionScope,
    },
    SetRenderMode { view: ViewId, mode: RenderMode },
    /// Select a subtitle track, or `-1` for none
    SelectSubtitleTrack { view: ViewId, index: i32 },
    SetStringOption {
        view: ViewId,
        key: String,
        value: serde_json::Value,
    },
    GetDuration { view: ViewId },
    GetCurrentPlayTime { view: ViewId },
    IsPlaying { view: ViewId },
    GetSupportedResolutions { view: ViewId },
    GetPlaybackState { view: ViewId },

    /// Switch this connection to event streaming
    Subscribe,
    /// Ping the daemon
    Ping,
    /// Kill the daemon
    Kill,
}

/// Response from daemon to host
#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Error(FeedError),
    Pong,
    ControllerCreated(ControllerId),
    /// Revision token returned by the engine for source-list changes
    Revision(u64),
    Seconds(f64),
    Playing(bool),
    State(PlaybackState),
    Layout(ViewLayout),
    Resolutions(Vec<BitrateItem>),
    Views(Vec<ViewId>),
    Subscribed,
    Event(PlayerEvent),
}

/// Outward events. Each one carries the identity of the view it
/// originated from so the host can route it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    ControllerBound {
        view_id: ViewId,
    },
    ControllerUnbound {
        view_id: ViewId,
    },
    PlayEvent {
        view_id: ViewId,
        code: i32,
        params: EventParams,
    },
    Error {
        view_id: ViewId,
        code: i32,
        message: String,
        params: EventParams,
    },
    FirstFrameRendered {
        view_id: ViewId,
        code: i32,
    },
    Loading {
        view_id: ViewId,
    },
    LoadingEnd {
        view_id: ViewId,
    },
    ResolutionChanged {
        view_id: ViewId,
        width: u32,
        height: u32,
    },
    SubtitleTracks {
        view_id: ViewId,
        tracks: Vec<SubtitleTrack>,
    },
    ViewDisposed {
        view_id: ViewId,
    },
}

impl PlayerEvent {
    /// View the event originated from
    pub fn view_id(&self) -> ViewId {
        match self {
            Self::ControllerBound { view_id }
            | Self::ControllerUnbound { view_id }
            | Self::PlayEvent { view_id, .. }
            | Self::Error { view_id, .. }
            | Self::FirstFrameRendered { view_id, .. }
            | Self::Loading { view_id }
            | Self::LoadingEnd { view_id }
            | Self::ResolutionChanged { view_id, .. }
            | Self::SubtitleTracks { view_id, .. }
            | Self::ViewDisposed { view_id } => *view_id,
        }
    }

    /// Stable event name, as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::ControllerBound { .. } => "controller-bound",
            Self::ControllerUnbound { .. } => "controller-unbound",
            Self::PlayEvent { .. } => "play-event",
            Self::Error { .. } => "error-event",
            Self::FirstFrameRendered { .. } => "first-frame-rendered",
            Self::Loading { .. } => "loading",
            Self::LoadingEnd { .. } => "loading-end",
            Self::ResolutionChanged { .. } => "resolution-changed",
            Self::SubtitleTracks { .. } => "subtitle-tracks",
            Self::ViewDisposed { .. } => "view-disposed",
        }
    }
}

/// IPC socket path helper
pub fn get_socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));

    std::path::PathBuf::from(runtime_dir).join("shortfeed.sock")
}
