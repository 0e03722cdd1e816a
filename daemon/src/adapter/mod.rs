//! Per-view playback adapter.
//!
//! Translates engine callbacks into outward events, tracks the playback
//! state of the view, keeps its geometry in sync with the video and forwards
//! playback commands to whichever controller handle is currently bound.
//! Everything here runs on the UI context.

pub mod dimensions;
pub mod subtitles;

use crate::events::EventSink;
use crate::player::{EngineEvent, PlayerController};
use crate::ui::TimerHandle;
use crate::view::{SharedViewId, ViewPort, ViewSurface};
use common::{
    BitrateItem, EventParams, PLAY_EVT_FIRST_FRAME_RENDERED, PlaybackState, PlayerEvent, RenderMode, ResizeMode,
    ResolutionScope, Source, SubtitleTrack, ViewLayout,
};
use dimensions::{DimensionResolver, DimensionSettings, SizeUpdate};
use serde_json::Value;
use std::sync::Arc;
use subtitles::{SubtitleAction, SubtitleCoordinator};

/// Payload key carrying the play-event code
pub const PLAY_EVENT_CODE_KEY: &str = "event";

/// Knobs shared by every adapter of an engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterSettings {
    pub dimensions: DimensionSettings,
    pub auto_select_first_subtitle: bool,
}

pub struct PlaybackAdapter {
    port: ViewPort,
    id: SharedViewId,
    events: EventSink,
    state: PlaybackState,
    controller: Option<Arc<dyn PlayerController>>,
    source: Option<Source>,
    render_mode: RenderMode,
    pending_loop: Option<bool>,
    dimensions: DimensionResolver,
    subtitles: SubtitleCoordinator,
    surface: ViewSurface,
    retry_timer: Option<TimerHandle>,
    // Bumped on every bind/unbind so stale retries are ignored
    generation: u64,
}

impl PlaybackAdapter {
    pub(crate) fn new(port: ViewPort, id: SharedViewId, events: EventSink, settings: AdapterSettings) -> Self {
        Self {
            port,
            id,
            events,
            state: PlaybackState::Unbound,
            controller: None,
            source: None,
            render_mode: RenderMode::Fit,
            pending_loop: None,
            dimensions: DimensionResolver::new(settings.dimensions),
            subtitles: SubtitleCoordinator::new(settings.auto_select_first_subtitle),
            surface: ViewSurface::new(),
            retry_timer: None,
            generation: 0,
        }
    }

    pub fn port(&self) -> &ViewPort {
        &self.port
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.controller.is_some()
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn selected_subtitle(&self) -> i32 {
        self.subtitles.selected()
    }

    pub fn subtitle_tracks(&self) -> &[SubtitleTrack] {
        self.subtitles.tracks()
    }

    pub fn layout(&self) -> ViewLayout {
        self.surface.snapshot()
    }

    fn view_id(&self) -> i32 {
        self.id.get()
    }

    /// Single entry point for engine callbacks
    pub fn dispatch(&mut self, event: EngineEvent) {
        log::trace!("View {} <- {}", self.view_id(), event.name());

        match event {
            EngineEvent::ControllerBound(controller) => self.on_controller_bound(controller),
            EngineEvent::ControllerUnbound(controller) => self.on_controller_unbound(&controller),
            EngineEvent::SourceBound(source) => self.source = Some(source),
            EngineEvent::PlayEvent { code, mut params } => {
                self.resolve_dimensions(Some(&params));
                params.insert(PLAY_EVENT_CODE_KEY.to_string(), code.into());
                self.emit(PlayerEvent::PlayEvent {
                    view_id: self.view_id(),
                    code,
                    params,
                });
            }
            EngineEvent::PlayPrepare | EngineEvent::PlayProgress { .. } | EngineEvent::PlayEnd => {}
            EngineEvent::PlayBegin => {
                self.set_state(PlaybackState::Playing);
                self.resync();
            }
            EngineEvent::PlayLoading => self.emit(PlayerEvent::Loading {
                view_id: self.view_id(),
            }),
            EngineEvent::PlayLoadingEnd => {
                self.resync();
                self.emit(PlayerEvent::LoadingEnd {
                    view_id: self.view_id(),
                });
            }
            EngineEvent::PlayPause => self.set_state(PlaybackState::Paused),
            EngineEvent::PlayStop => self.set_state(PlaybackState::Bound),
            EngineEvent::Error { code, message, params } => {
                log::warn!("View {} playback error {}: {}", self.view_id(), code, message);
                self.set_state(PlaybackState::Error);
                self.emit(PlayerEvent::Error {
                    view_id: self.view_id(),
                    code,
                    message,
                    params,
                });
            }
            EngineEvent::FirstFrameRendered => {
                self.resync();
                self.emit(PlayerEvent::FirstFrameRendered {
                    view_id: self.view_id(),
                    code: PLAY_EVT_FIRST_FRAME_RENDERED,
                });
            }
            EngineEvent::ResolutionChanged { width, height } => {
                if self.dimensions.accept(width, height) {
                    self.cancel_retry();
                    self.surface.update_video_size(width, height);
                }
                self.emit(PlayerEvent::ResolutionChanged {
                    view_id: self.view_id(),
                    width,
                    height,
                });
            }
            EngineEvent::SubtitleTracks(tracks) => {
                if let Some(action) = self.subtitles.on_tracks(tracks.clone()) {
                    self.apply_subtitle(action);
                }
                self.emit(PlayerEvent::SubtitleTracks {
                    view_id: self.view_id(),
                    tracks,
                });
            }
            EngineEvent::ShortVideoDestroyed => self.release(),
        }
    }

    fn emit(&self, event: PlayerEvent) {
        self.events.emit(event);
    }

    fn set_state(&mut self, state: PlaybackState) {
        // Only a bound view can play, pause or fail
        if self.controller.is_none() && state != PlaybackState::Unbound {
            return;
        }
        if self.state != state {
            log::debug!("View {} {:?} -> {:?}", self.view_id(), self.state, state);
            self.state = state;
        }
    }

    fn on_controller_bound(&mut self, controller: Arc<dyn PlayerController>) {
        self.cancel_retry();
        self.generation += 1;
        self.dimensions.reset();
        self.subtitles.reset();

        if let Some(looping) = self.pending_loop.take() {
            controller.set_loop(looping);
        }
        self.controller = Some(controller);
        self.state = PlaybackState::Bound;
        self.apply_render_mode();

        self.emit(PlayerEvent::ControllerBound {
            view_id: self.view_id(),
        });
    }

    fn on_controller_unbound(&mut self, controller: &Arc<dyn PlayerController>) {
        // Another controller may have taken the view over since
        if !self.controller.as_ref().is_some_and(|bound| same_controller(bound, controller)) {
            log::trace!("View {} ignoring unbind of a handle it does not hold", self.view_id());
            return;
        }
        self.cancel_retry();
        self.generation += 1;
        self.controller = None;
        self.state = PlaybackState::Unbound;
        self.dimensions.reset();
        self.surface.hide_subtitles();
        self.surface.reset_video_size();

        self.emit(PlayerEvent::ControllerUnbound {
            view_id: self.view_id(),
        });
    }

    /// Stop playback and clear the view, keeping the controller binding
    pub fn release(&mut self) {
        self.cancel_retry();
        self.generation += 1;
        if let Some(controller) = &self.controller {
            controller.stop();
        }
        if self.controller.is_some() {
            self.state = PlaybackState::Bound;
        }
        self.dimensions.reset();
        self.surface.hide_subtitles();
        self.surface.reset_video_size();
    }

    /// Re-sync geometry, subtitles and render mode after the engine may have
    /// reset them
    fn resync(&mut self) {
        self.resolve_dimensions(None);
        if let Some(action) = self.subtitles.resync() {
            self.apply_subtitle(action);
        }
        self.apply_render_mode();
    }

    fn resolve_dimensions(&mut self, payload: Option<&EventParams>) {
        if let Some((width, height)) = payload.and_then(dimensions::read_payload) {
            if self.dimensions.accept(width, height) {
                self.cancel_retry();
                self.surface.update_video_size(width, height);
            }
            return;
        }
        self.query_dimensions();
    }

    fn query_dimensions(&mut self) {
        let Some(controller) = self.controller.clone() else {
            return;
        };
        let Some(vod) = controller.vod() else {
            return;
        };

        match self.dimensions.on_query(vod.width(), vod.height()) {
            SizeUpdate::Changed { width, height } => {
                log::debug!("View {} video size {}x{}", self.view_id(), width, height);
                self.cancel_retry();
                self.surface.update_video_size(width, height);
            }
            SizeUpdate::Retry(delay) => {
                let port = self.port.clone();
                let generation = self.generation;
                // Replacing the handle cancels any retry still pending
                self.retry_timer = Some(self.port.ui().post_delayed(delay, move || {
                    port.with_adapter(|adapter| adapter.retry_dimensions(generation));
                }));
            }
            SizeUpdate::Exhausted => {
                log::debug!(
                    "View {} gave up on video size after {} retries",
                    self.view_id(),
                    self.dimensions.retries()
                );
            }
        }
    }

    fn retry_dimensions(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        self.query_dimensions();
    }

    fn cancel_retry(&mut self) {
        self.retry_timer = None;
    }

    fn apply_subtitle(&mut self, action: SubtitleAction) {
        if action == SubtitleAction::Hide {
            self.surface.hide_subtitles();
            return;
        }
        let Some(controller) = self.controller.clone() else {
            return;
        };
        let Some(vod) = controller.vod() else {
            return;
        };

        match action {
            SubtitleAction::Hide => self.surface.hide_subtitles(),
            SubtitleAction::Detach => {
                vod.set_subtitle_surface(false);
                self.surface.hide_subtitles();
            }
            SubtitleAction::Attach(index) => {
                vod.set_subtitle_surface(true);
                vod.select_track(index);
                self.surface.show_subtitles();
            }
        }
    }

    fn apply_render_mode(&mut self) {
        self.surface.set_render_mode(self.render_mode);
        if let Some(vod) = self.controller.as_ref().and_then(|c| c.vod()) {
            vod.set_render_mode(self.render_mode);
        }
    }

    /// Loop flag for the controller bound by the next bind
    pub fn apply_loop(&mut self, looping: bool) {
        if let Some(controller) = &self.controller {
            controller.set_loop(looping);
        }
        self.pending_loop = Some(looping);
    }

    pub fn set_container_size(&mut self, width: u32, height: u32) {
        self.surface.set_container_size(width, height);
    }

    pub fn set_resize_mode(&mut self, mode: ResizeMode) {
        self.surface.set_resize_mode(mode);
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
        self.apply_render_mode();
    }

    pub fn play(&mut self, source: Source) {
        let Some(vod) = self.controller.as_ref().and_then(|c| c.vod()) else {
            log::warn!("View {} has no VOD player, ignoring play", self.view_id());
            return;
        };
        vod.start_play(&source);
        self.source = Some(source);
    }

    pub fn pause(&mut self) {
        if let Some(controller) = &self.controller {
            controller.pause();
        }
        if self.state == PlaybackState::Playing {
            self.set_state(PlaybackState::Paused);
        }
    }

    pub fn resume(&mut self) {
        if let Some(controller) = &self.controller {
            controller.resume();
        }
        if self.state == PlaybackState::Paused {
            self.set_state(PlaybackState::Playing);
        }
    }

    pub fn seek(&self, seconds: f64) {
        if let Some(controller) = &self.controller {
            controller.seek_to(seconds);
        }
    }

    pub fn set_mute(&self, muted: bool) {
        if let Some(controller) = &self.controller {
            controller.set_mute(muted);
        }
    }

    pub fn set_rate(&self, rate: f64) {
        if let Some(vod) = self.controller.as_ref().and_then(|c| c.vod()) {
            vod.set_rate(rate);
        }
    }

    pub fn set_mirror(&self, mirrored: bool) {
        if let Some(vod) = self.controller.as_ref().and_then(|c| c.vod()) {
            vod.set_mirror(mirrored);
        }
    }

    pub fn switch_resolution(&self, resolution: i64, scope: ResolutionScope) {
        if let Some(vod) = self.controller.as_ref().and_then(|c| c.vod()) {
            if scope == ResolutionScope::Global {
                vod.on_global_resolution_changed(resolution);
            }
            vod.switch_resolution(resolution);
        }
    }

    pub fn select_subtitle_track(&mut self, index: i32) {
        if self.controller.as_ref().and_then(|c| c.vod()).is_none() {
            return;
        }
        let action = self.subtitles.select(index);
        self.apply_subtitle(action);
    }

    pub fn set_string_option(&self, key: &str, value: &Value) {
        if let Some(vod) = self.controller.as_ref().and_then(|c| c.vod()) {
            vod.set_string_option(key, value);
        }
    }

    pub fn duration(&self) -> f64 {
        self.controller.as_ref().and_then(|c| c.vod()).map_or(0.0, |vod| vod.duration())
    }

    pub fn current_play_time(&self) -> f64 {
        self.controller
            .as_ref()
            .and_then(|c| c.vod())
            .map_or(0.0, |vod| vod.current_play_time())
    }

    pub fn is_playing(&self) -> bool {
        self.controller.as_ref().is_some_and(|c| c.is_playing())
    }

    pub fn supported_resolutions(&self) -> Vec<BitrateItem> {
        self.controller
            .as_ref()
            .and_then(|c| c.vod())
            .map(|vod| vod.supported_resolutions())
            .unwrap_or_default()
    }
}

fn same_controller(a: &Arc<dyn PlayerController>, b: &Arc<dyn PlayerController>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
