//! In-process engine without a decoder.
//!
//! Used by the daemon when no native engine is linked. It walks through the
//! same callback sequence a real engine produces (bind, prepare, begin,
//! first frame) so hosts can be developed and tested against the daemon.
//! Video dimensions come from a source's `ext_info` (`width`/`height`) or
//! the configured defaults, duration from `ext_info.duration`.

use super::{EngineError, EngineEvent, FeedManager, PlaybackEngine, PlayerController, Revision, ViewKey, ViewPort, VodPlayer};
use common::{BitrateItem, ControllerId, EventParams, PlayerConfig, RenderMode, Source, SubtitleTrack, VodStrategy};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Code of the "play begin" play event
const PLAY_EVT_PLAY_BEGIN: i32 = 2004;

/// Player currently driving each view, across every feed of an engine
type ActivePlayers = Arc<Mutex<HashMap<ViewKey, Arc<HeadlessPlayer>>>>;

pub struct HeadlessEngine {
    initialized: AtomicBool,
    default_size: (u32, u32),
    active: ActivePlayers,
}

impl HeadlessEngine {
    pub fn new(default_width: u32, default_height: u32) -> Self {
        Self {
            initialized: AtomicBool::new(false),
            default_size: (default_width, default_height),
            active: ActivePlayers::default(),
        }
    }
}

impl PlaybackEngine for HeadlessEngine {
    fn init(&self, config: &PlayerConfig) -> Result<(), EngineError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyInitialized);
        }
        if !config.license_url.is_empty() && config.license_key.is_empty() {
            return Err(EngineError::License("license url given without a key".to_string()));
        }
        log::info!("Headless engine initialized");
        Ok(())
    }

    fn create_feed(&self, controller: ControllerId) -> Box<dyn FeedManager> {
        Box::new(HeadlessFeed {
            controller,
            sources: Vec::new(),
            revision: AtomicU64::new(0),
            strategy: VodStrategy::default(),
            players: HashMap::new(),
            current: None,
            default_size: self.default_size,
            active: Arc::clone(&self.active),
        })
    }
}

struct HeadlessFeed {
    controller: ControllerId,
    sources: Vec<Source>,
    revision: AtomicU64,
    strategy: VodStrategy,
    players: HashMap<ViewKey, (ViewPort, Arc<HeadlessPlayer>)>,
    current: Option<ViewKey>,
    default_size: (u32, u32),
    active: ActivePlayers,
}

impl HeadlessFeed {
    fn next_revision(&self) -> Revision {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn active(&self) -> MutexGuard<'_, HashMap<ViewKey, Arc<HeadlessPlayer>>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether `player` still drives the view with `key`
    fn is_active(&self, key: ViewKey, player: &Arc<HeadlessPlayer>) -> bool {
        self.active().get(&key).is_some_and(|p| Arc::ptr_eq(p, player))
    }

    /// Player for `port`, attaching `source` to it.
    ///
    /// Whichever player drove the view before, from this feed or another
    /// one, is halted and unbound first.
    fn attach(&mut self, port: &ViewPort, source: &Source) -> Arc<HeadlessPlayer> {
        let player = Arc::new(HeadlessPlayer::new(port.clone(), source, self.default_size));
        self.players.insert(port.key(), (port.clone(), Arc::clone(&player)));
        let displaced = self.active().insert(port.key(), Arc::clone(&player));
        if let Some(old) = displaced {
            old.halt();
            port.deliver(EngineEvent::ControllerUnbound(old));
        }

        port.deliver(EngineEvent::SourceBound(source.clone()));
        port.deliver(EngineEvent::ControllerBound(player.clone()));
        if !source.subtitle_sources.is_empty() {
            let tracks = source
                .subtitle_sources
                .iter()
                .zip(0..)
                .map(|(sub, index)| SubtitleTrack {
                    index,
                    language: None,
                    name: Some(sub.name.clone()),
                    track_type: 3,
                })
                .collect();
            port.deliver(EngineEvent::SubtitleTracks(tracks));
        }
        player
    }
}

impl FeedManager for HeadlessFeed {
    fn set_sources(&mut self, sources: Vec<Source>) -> Revision {
        self.sources = sources;
        self.next_revision()
    }

    fn append_sources(&mut self, sources: Vec<Source>) -> Revision {
        self.sources.extend(sources);
        self.next_revision()
    }

    fn start_current(&mut self) -> Revision {
        if let Some(key) = self.current
            && let Some((_, player)) = self.players.get(&key)
            && self.is_active(key, player)
        {
            player.begin();
        }
        self.next_revision()
    }

    fn update_strategy(&mut self, strategy: &VodStrategy) {
        log::debug!("Feed {} strategy {:?}", self.controller, strategy);
        self.strategy = strategy.clone();
    }

    fn bind_view(&mut self, port: ViewPort, source: &Source) {
        for (key, (_, player)) in &self.players {
            if *key != port.key() && self.is_active(*key, player) {
                player.pause();
            }
        }

        let player = self.attach(&port, source);
        self.current = Some(port.key());
        if source.auto_play {
            player.begin();
        }
    }

    fn pre_render(&mut self, port: ViewPort, source: &Source) {
        // A preload count of zero disables preparing ahead
        if self.current == Some(port.key()) || self.strategy.preload_count == Some(0) {
            return;
        }
        self.attach(&port, source);
    }

    fn release_players(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        for (key, (port, player)) in self.players.drain() {
            player.halt();
            // Views another feed has taken over keep their player
            if active.get(&key).is_some_and(|p| Arc::ptr_eq(p, &player)) {
                active.remove(&key);
                port.deliver(EngineEvent::ControllerUnbound(player));
            }
        }
        self.current = None;
        log::debug!("Feed {} released its players", self.controller);
    }
}

#[derive(Debug, Default)]
struct PlayerState {
    source: Source,
    size: (u32, u32),
    rendered: bool,
    position: f64,
}

struct HeadlessPlayer {
    port: ViewPort,
    playing: AtomicBool,
    state: Mutex<PlayerState>,
}

impl HeadlessPlayer {
    fn new(port: ViewPort, source: &Source, default_size: (u32, u32)) -> Self {
        let ext = source.ext_info.as_ref();
        let dim = |key: &str, fallback: u32| {
            ext.and_then(|e| e.get(key))
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(fallback)
        };
        let size = (dim("width", default_size.0), dim("height", default_size.1));

        Self {
            port,
            playing: AtomicBool::new(false),
            state: Mutex::new(PlayerState {
                source: source.clone(),
                size,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Walk through the start-of-playback callbacks
    fn begin(&self) {
        if self.playing.swap(true, Ordering::SeqCst) {
            return;
        }
        let (width, height) = {
            let mut state = self.lock();
            state.rendered = true;
            state.size
        };

        let mut params = EventParams::new();
        params.insert("EVT_WIDTH".to_string(), width.into());
        params.insert("EVT_HEIGHT".to_string(), height.into());

        self.port.deliver(EngineEvent::PlayPrepare);
        self.port.deliver(EngineEvent::PlayBegin);
        self.port.deliver(EngineEvent::PlayEvent {
            code: PLAY_EVT_PLAY_BEGIN,
            params,
        });
        self.port.deliver(EngineEvent::FirstFrameRendered);
    }

    fn halt(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            self.lock().position = 0.0;
        }
    }
}

impl PlayerController for HeadlessPlayer {
    fn pause(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            self.port.deliver(EngineEvent::PlayPause);
        }
    }

    fn resume(&self) {
        if !self.playing.swap(true, Ordering::SeqCst) {
            self.port.deliver(EngineEvent::PlayBegin);
        }
    }

    fn stop(&self) {
        self.halt();
        self.port.deliver(EngineEvent::PlayStop);
    }

    fn seek_to(&self, seconds: f64) {
        let mut state = self.lock();
        let duration = source_duration(&state.source);
        state.position = if duration > 0.0 { seconds.clamp(0.0, duration) } else { seconds.max(0.0) };
    }

    fn set_mute(&self, muted: bool) {
        log::trace!("[{}] mute {}", self.port.key(), muted);
    }

    fn set_loop(&self, looping: bool) {
        log::trace!("[{}] loop {}", self.port.key(), looping);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn vod(&self) -> Option<&dyn VodPlayer> {
        Some(self)
    }
}

impl VodPlayer for HeadlessPlayer {
    fn start_play(&self, source: &Source) {
        self.halt();
        {
            let mut state = self.lock();
            state.source = source.clone();
            state.rendered = false;
        }
        self.port.deliver(EngineEvent::SourceBound(source.clone()));
        self.begin();
    }

    fn set_rate(&self, rate: f64) {
        log::trace!("[{}] rate {}", self.port.key(), rate);
    }

    fn set_mirror(&self, mirrored: bool) {
        log::trace!("[{}] mirror {}", self.port.key(), mirrored);
    }

    fn switch_resolution(&self, resolution: i64) {
        let mut state = self.lock();
        if let Some(item) = ladder(state.size).into_iter().find(|item| i64::from(item.index) == resolution) {
            state.size = (item.width, item.height);
            drop(state);
            self.port.deliver(EngineEvent::ResolutionChanged {
                width: item.width,
                height: item.height,
            });
        }
    }

    fn on_global_resolution_changed(&self, resolution: i64) {
        log::debug!("Global preferred resolution is now {}", resolution);
    }

    fn supported_resolutions(&self) -> Vec<BitrateItem> {
        ladder(self.lock().size)
    }

    fn set_render_mode(&self, mode: RenderMode) {
        log::trace!("[{}] render mode {:?}", self.port.key(), mode);
    }

    fn set_string_option(&self, key: &str, value: &Value) {
        log::trace!("[{}] option {} = {}", self.port.key(), key, value);
    }

    fn duration(&self) -> f64 {
        source_duration(&self.lock().source)
    }

    fn current_play_time(&self) -> f64 {
        self.lock().position
    }

    fn width(&self) -> u32 {
        let state = self.lock();
        if state.rendered { state.size.0 } else { 0 }
    }

    fn height(&self) -> u32 {
        let state = self.lock();
        if state.rendered { state.size.1 } else { 0 }
    }

    fn set_subtitle_surface(&self, attached: bool) {
        log::trace!("[{}] subtitle surface attached: {}", self.port.key(), attached);
    }

    fn select_track(&self, index: i32) {
        log::trace!("[{}] subtitle track {}", self.port.key(), index);
    }
}

fn source_duration(source: &Source) -> f64 {
    source
        .ext_info
        .as_ref()
        .and_then(|e| e.get("duration"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

/// Resolution ladder derived from the native size: full, half, quarter
fn ladder((width, height): (u32, u32)) -> Vec<BitrateItem> {
    (0..3)
        .map(|index: i32| {
            let divisor = 1u32 << index;
            BitrateItem {
                index,
                width: width / divisor,
                height: height / divisor,
                bitrate: u64::from(width / divisor) * u64::from(height / divisor) * 2,
            }
        })
        .filter(|item| item.width > 0 && item.height > 0)
        .collect()
}
