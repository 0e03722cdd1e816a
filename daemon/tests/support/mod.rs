//! Recording fake playback engine shared by the integration tests.
#![allow(dead_code)]

use common::{BitrateItem, ControllerId, PlayerConfig, PlayerEvent, RenderMode, Source, SubtitleTrack, VodStrategy};
use serde_json::Value;
use shortfeed::capability::Unavailable;
use shortfeed::events::EventSink;
use shortfeed::player::headless::HeadlessEngine;
use shortfeed::player::{
    EngineError, EngineEvent, FeedManager, PlaybackEngine, PlayerController, Revision, ViewKey, ViewPort, VodPlayer,
};
use shortfeed::ui::UiContext;
use shortfeed::{Engine, FeedSettings};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedCall {
    SetSources(usize),
    AppendSources(usize),
    Start,
    Strategy(VodStrategy),
    Bind { view: ViewKey, locator: String },
    PreRender { view: ViewKey, locator: String },
    Release,
}

/// Everything one fake feed was asked to do
pub struct FeedLog {
    pub controller: ControllerId,
    calls: Mutex<Vec<FeedCall>>,
    ports: Mutex<HashMap<ViewKey, ViewPort>>,
}

impl FeedLog {
    pub fn calls(&self) -> Vec<FeedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn binds(&self) -> Vec<FeedCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, FeedCall::Bind { .. }))
            .collect()
    }

    pub fn pre_renders(&self) -> Vec<FeedCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, FeedCall::PreRender { .. }))
            .collect()
    }

    /// Port of a view this feed has seen
    pub fn port(&self, view: ViewKey) -> ViewPort {
        self.ports.lock().unwrap().get(&view).cloned().expect("view was never bound")
    }

    fn record(&self, call: FeedCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[derive(Default)]
pub struct FakeEngine {
    pub init_calls: AtomicUsize,
    feeds: Mutex<Vec<Arc<FeedLog>>>,
}

impl FakeEngine {
    pub fn feed(&self, controller: ControllerId) -> Arc<FeedLog> {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.controller == controller)
            .cloned()
            .expect("no feed for controller")
    }
}

impl PlaybackEngine for FakeEngine {
    fn init(&self, _config: &PlayerConfig) -> Result<(), EngineError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_feed(&self, controller: ControllerId) -> Box<dyn FeedManager> {
        let log = Arc::new(FeedLog {
            controller,
            calls: Mutex::new(Vec::new()),
            ports: Mutex::new(HashMap::new()),
        });
        self.feeds.lock().unwrap().push(Arc::clone(&log));
        Box::new(FakeFeed { log, revision: 0 })
    }
}

struct FakeFeed {
    log: Arc<FeedLog>,
    revision: Revision,
}

impl FakeFeed {
    fn bump(&mut self) -> Revision {
        self.revision += 1;
        self.revision
    }

    fn remember(&self, port: ViewPort) {
        self.log.ports.lock().unwrap().insert(port.key(), port);
    }
}

impl FeedManager for FakeFeed {
    fn set_sources(&mut self, sources: Vec<Source>) -> Revision {
        self.log.record(FeedCall::SetSources(sources.len()));
        self.bump()
    }

    fn append_sources(&mut self, sources: Vec<Source>) -> Revision {
        self.log.record(FeedCall::AppendSources(sources.len()));
        self.bump()
    }

    fn start_current(&mut self) -> Revision {
        self.log.record(FeedCall::Start);
        self.bump()
    }

    fn update_strategy(&mut self, strategy: &VodStrategy) {
        self.log.record(FeedCall::Strategy(strategy.clone()));
    }

    fn bind_view(&mut self, port: ViewPort, source: &Source) {
        self.log.record(FeedCall::Bind {
            view: port.key(),
            locator: source.locator(),
        });
        self.remember(port);
    }

    fn pre_render(&mut self, port: ViewPort, source: &Source) {
        self.log.record(FeedCall::PreRender {
            view: port.key(),
            locator: source.locator(),
        });
        self.remember(port);
    }

    fn release_players(&mut self) {
        self.log.record(FeedCall::Release);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Pause,
    Resume,
    Stop,
    Seek(f64),
    Mute(bool),
    Loop(bool),
    StartPlay(String),
    Rate(f64),
    Mirror(bool),
    SwitchResolution(i64),
    GlobalResolution(i64),
    RenderMode(RenderMode),
    StringOption(String, Value),
    SubtitleSurface(bool),
    SelectTrack(i32),
}

/// Scripted player: each width query pops the next size, then keeps
/// answering with the last one (0x0 when the script is empty)
pub struct FakePlayer {
    sizes: Mutex<VecDeque<(u32, u32)>>,
    last: Mutex<(u32, u32)>,
    pub queries: AtomicUsize,
    calls: Mutex<Vec<PlayerCall>>,
    playing: AtomicBool,
    has_vod: bool,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Self::with_sizes(Vec::new())
    }

    pub fn with_sizes(sizes: Vec<(u32, u32)>) -> Arc<Self> {
        Arc::new(Self {
            sizes: Mutex::new(sizes.into()),
            last: Mutex::new((0, 0)),
            queries: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            has_vod: true,
        })
    }

    /// Controller handle without the VOD capability
    pub fn without_vod() -> Arc<Self> {
        Arc::new(Self {
            sizes: Mutex::new(VecDeque::new()),
            last: Mutex::new((0, 0)),
            queries: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            has_vod: false,
        })
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &PlayerCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: PlayerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PlayerController for FakePlayer {
    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.record(PlayerCall::Pause);
    }

    fn resume(&self) {
        self.playing.store(true, Ordering::SeqCst);
        self.record(PlayerCall::Resume);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.record(PlayerCall::Stop);
    }

    fn seek_to(&self, seconds: f64) {
        self.record(PlayerCall::Seek(seconds));
    }

    fn set_mute(&self, muted: bool) {
        self.record(PlayerCall::Mute(muted));
    }

    fn set_loop(&self, looping: bool) {
        self.record(PlayerCall::Loop(looping));
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn vod(&self) -> Option<&dyn VodPlayer> {
        if self.has_vod { Some(self) } else { None }
    }
}

impl VodPlayer for FakePlayer {
    fn start_play(&self, source: &Source) {
        self.playing.store(true, Ordering::SeqCst);
        self.record(PlayerCall::StartPlay(source.locator()));
    }

    fn set_rate(&self, rate: f64) {
        self.record(PlayerCall::Rate(rate));
    }

    fn set_mirror(&self, mirrored: bool) {
        self.record(PlayerCall::Mirror(mirrored));
    }

    fn switch_resolution(&self, resolution: i64) {
        self.record(PlayerCall::SwitchResolution(resolution));
    }

    fn on_global_resolution_changed(&self, resolution: i64) {
        self.record(PlayerCall::GlobalResolution(resolution));
    }

    fn supported_resolutions(&self) -> Vec<BitrateItem> {
        vec![BitrateItem {
            index: 0,
            width: 1920,
            height: 1080,
            bitrate: 4_000_000,
        }]
    }

    fn set_render_mode(&self, mode: RenderMode) {
        self.record(PlayerCall::RenderMode(mode));
    }

    fn set_string_option(&self, key: &str, value: &Value) {
        self.record(PlayerCall::StringOption(key.to_string(), value.clone()));
    }

    fn duration(&self) -> f64 {
        42.5
    }

    fn current_play_time(&self) -> f64 {
        7.0
    }

    fn width(&self) -> u32 {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.sizes.lock().unwrap().pop_front() {
            *last = next;
        }
        last.0
    }

    fn height(&self) -> u32 {
        self.last.lock().unwrap().1
    }

    fn set_subtitle_surface(&self, attached: bool) {
        self.record(PlayerCall::SubtitleSurface(attached));
    }

    fn select_track(&self, index: i32) {
        self.record(PlayerCall::SelectTrack(index));
    }
}

/// Engine wired to a fake backend, plus the outward event stream
pub struct Harness {
    pub engine: Arc<Engine>,
    pub fake: Arc<FakeEngine>,
    pub events: mpsc::UnboundedReceiver<PlayerEvent>,
}

impl Harness {
    /// Must be called from within a tokio runtime
    pub fn new() -> Self {
        Self::with_settings(FeedSettings::default())
    }

    pub fn with_settings(settings: FeedSettings) -> Self {
        let (ui, _handle) = UiContext::spawn();
        let (sink, events) = EventSink::channel();
        let fake = Arc::new(FakeEngine::default());
        let engine = Arc::new(Engine::new(
            fake.clone(),
            ui,
            sink,
            Box::new(Unavailable),
            settings,
        ));
        Self { engine, fake, events }
    }

    pub async fn flush(&self) {
        self.engine.ui().flush().await;
    }

    /// Let delayed jobs fire, one step at a time
    pub async fn advance(&self, total: Duration) {
        let step = Duration::from_millis(10);
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            tokio::time::sleep(step).await;
            self.flush().await;
            elapsed += step;
        }
    }

    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Deliver an engine callback to a view and wait until it is handled
    pub async fn deliver(&self, port: &ViewPort, event: EngineEvent) {
        port.deliver(event);
        self.flush().await;
    }
}

/// Engine driving the in-process headless player instead of a fake
pub fn headless_engine() -> (Arc<Engine>, mpsc::UnboundedReceiver<PlayerEvent>) {
    let (ui, _handle) = UiContext::spawn();
    let (sink, events) = EventSink::channel();
    let engine = Engine::new(
        Arc::new(HeadlessEngine::new(720, 1280)),
        ui,
        sink,
        Box::new(Unavailable),
        FeedSettings::default(),
    );
    (Arc::new(engine), events)
}

/// Flush until callbacks posted by earlier jobs have run too
pub async fn settle(engine: &Engine) {
    for _ in 0..3 {
        engine.ui().flush().await;
    }
}

pub fn sources(count: usize) -> Vec<Source> {
    (0..count)
        .map(|i| Source::from_url(format!("https://cdn.example/v/{}.mp4", i)))
        .collect()
}

pub fn tracks(indices: &[i32]) -> Vec<SubtitleTrack> {
    indices
        .iter()
        .map(|&index| SubtitleTrack {
            index,
            language: Some("en".to_string()),
            name: None,
            track_type: 3,
        })
        .collect()
}
