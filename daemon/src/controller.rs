//! Feed controllers.
//!
//! A controller owns an ordered source list, tracks which item is current
//! and decides which view renders which item. Binding always happens on the
//! UI context.

use crate::engine::ControllerRegistry;
use crate::player::{FeedManager, Revision};
use crate::ui::UiContext;
use crate::view::ViewRegistry;
use common::{ControllerId, Source, ViewId, VodStrategy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindKind {
    /// The host committed to showing this item
    Authoritative,
    /// Prepare ahead of time, only close to the current item
    Speculative,
}

#[derive(Debug)]
struct FeedState {
    sources: Vec<Source>,
    current_index: usize,
    looping: bool,
}

pub struct FeedController {
    id: ControllerId,
    feed: Mutex<Box<dyn FeedManager>>,
    state: Mutex<FeedState>,
    views: Arc<ViewRegistry>,
    ui: UiContext,
    registry: Weak<ControllerRegistry>,
    pre_bind_distance: usize,
    released: AtomicBool,
}

impl FeedController {
    pub(crate) fn new(
        id: ControllerId,
        feed: Box<dyn FeedManager>,
        views: Arc<ViewRegistry>,
        ui: UiContext,
        registry: Weak<ControllerRegistry>,
        pre_bind_distance: usize,
        looping: bool,
    ) -> Self {
        Self {
            id,
            feed: Mutex::new(feed),
            state: Mutex::new(FeedState {
                sources: Vec::new(),
                current_index: 0,
                looping,
            }),
            views,
            ui,
            registry,
            pre_bind_distance,
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn current_index(&self) -> usize {
        self.lock_state().current_index
    }

    pub fn looping(&self) -> bool {
        self.lock_state().looping
    }

    pub fn source_count(&self) -> usize {
        self.lock_state().sources.len()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_feed(&self) -> std::sync::MutexGuard<'_, Box<dyn FeedManager>> {
        self.feed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the feed
    pub fn set_sources(&self, sources: Vec<Source>) -> Revision {
        let sources: Vec<Source> = sources.into_iter().map(Source::normalized).collect();
        self.lock_state().sources = sources.clone();
        let revision = self.lock_feed().set_sources(sources);
        log::debug!("Controller {} set {} sources (revision {})", self.id, self.source_count(), revision);
        revision
    }

    /// Extend the feed
    pub fn append_sources(&self, sources: Vec<Source>) -> Revision {
        let sources: Vec<Source> = sources.into_iter().map(Source::normalized).collect();
        self.lock_state().sources.extend(sources.iter().cloned());
        let revision = self.lock_feed().append_sources(sources);
        log::debug!("Controller {} now has {} sources (revision {})", self.id, self.source_count(), revision);
        revision
    }

    pub fn start(&self) -> Revision {
        self.lock_feed().start_current()
    }

    /// Loop mode applied at the next bind
    pub fn set_loop(&self, looping: bool) {
        self.lock_state().looping = looping;
    }

    pub fn set_vod_strategy(&self, strategy: &VodStrategy) {
        self.lock_feed().update_strategy(strategy);
    }

    /// Bind item `index` to `view`, making it the current item
    pub fn bind(self: &Arc<Self>, view: ViewId, index: i64) {
        let this = Arc::clone(self);
        self.ui.post(move || this.bind_on_ui(view, index, BindKind::Authoritative));
    }

    /// Prepare item `index` on `view` if it is close to the current item
    pub fn pre_bind(self: &Arc<Self>, view: ViewId, index: i64) {
        let this = Arc::clone(self);
        self.ui.post(move || this.bind_on_ui(view, index, BindKind::Speculative));
    }

    fn bind_on_ui(&self, view_id: ViewId, index: i64, kind: BindKind) {
        if self.is_released() {
            log::warn!("Controller {} is released, ignoring {:?} bind", self.id, kind);
            return;
        }
        let Some(view) = self.views.get(view_id) else {
            log::error!("Controller {} cannot bind: no view with id {}", self.id, view_id);
            return;
        };

        let (source, looping) = {
            let mut state = self.lock_state();
            let Some(index) = usize::try_from(index).ok().filter(|i| *i < state.sources.len()) else {
                log::error!(
                    "Controller {} cannot bind index {} of {} sources",
                    self.id,
                    index,
                    state.sources.len()
                );
                return;
            };

            if kind == BindKind::Speculative {
                let distance = index.abs_diff(state.current_index);
                if distance > self.pre_bind_distance {
                    log::warn!(
                        "Controller {} skips pre-bind of {} (current {})",
                        self.id,
                        index,
                        state.current_index
                    );
                    return;
                }
            } else {
                state.current_index = index;
            }
            (state.sources[index].clone(), state.looping)
        };

        match kind {
            BindKind::Authoritative => {
                self.lock_feed().bind_view(view.port(), &source);
                view.with_adapter(|adapter| adapter.apply_loop(looping));
                log::debug!("Controller {} bound {} to view {}", self.id, source.locator(), view_id);
            }
            BindKind::Speculative => {
                self.lock_feed().pre_render(view.port(), &source);
                log::trace!("Controller {} pre-rendered {} on view {}", self.id, source.locator(), view_id);
            }
        }
    }

    /// Stop every player of this feed and leave the registry.
    ///
    /// Only the first call has an effect.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            log::debug!("Controller {} already released", self.id);
            return;
        }
        self.lock_feed().release_players();
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self.id);
        }
        log::info!("Released controller {}", self.id);
    }
}
