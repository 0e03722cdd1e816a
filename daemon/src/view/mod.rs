//! Host-visible views.
//!
//! A `PlayerView` is the render target the host places on screen. It owns
//! exactly one `PlaybackAdapter` for its whole life and is addressed by a
//! host-assigned id that may change over time.

pub mod registry;
pub mod surface;

pub use registry::ViewRegistry;
pub use surface::ViewSurface;

use crate::adapter::{AdapterSettings, PlaybackAdapter};
use crate::events::EventSink;
use crate::player::EngineEvent;
use crate::ui::UiContext;
use common::{PlayerEvent, ViewId, ViewLayout};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Stable internal identity of a view; never reused, unlike host ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewKey(pub(crate) u64);

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host id of a view, shared with its adapter so events carry the
/// current id even after a re-key
#[derive(Debug, Clone)]
pub(crate) struct SharedViewId(Arc<AtomicI32>);

impl SharedViewId {
    fn new(id: ViewId) -> Self {
        Self(Arc::new(AtomicI32::new(id)))
    }

    pub(crate) fn get(&self) -> ViewId {
        self.0.load(Ordering::SeqCst)
    }

    fn swap(&self, id: ViewId) -> ViewId {
        self.0.swap(id, Ordering::SeqCst)
    }
}

/// Handle the engine uses to reach a view.
///
/// Holds the view weakly: events for a view that is gone are dropped.
#[derive(Clone)]
pub struct ViewPort {
    key: ViewKey,
    view: Weak<PlayerView>,
    ui: UiContext,
}

impl ViewPort {
    pub fn key(&self) -> ViewKey {
        self.key
    }

    /// Queue an engine callback onto the UI context.
    ///
    /// Callable from any thread.
    pub fn deliver(&self, event: EngineEvent) {
        let view = self.view.clone();
        let key = self.key;
        self.ui.post(move || match view.upgrade() {
            Some(view) => view.on_engine_event(event),
            None => log::trace!("Dropping {} for released view {}", event.name(), key),
        });
    }

    pub(crate) fn ui(&self) -> &UiContext {
        &self.ui
    }

    /// Run `f` on the view's adapter if the view is still alive
    pub(crate) fn with_adapter<F>(&self, f: F)
    where
        F: FnOnce(&mut PlaybackAdapter),
    {
        if let Some(view) = self.view.upgrade()
            && !view.is_disposed()
        {
            view.with_adapter(f);
        }
    }
}

pub struct PlayerView {
    key: ViewKey,
    id: SharedViewId,
    adapter: Mutex<PlaybackAdapter>,
    registry: Weak<ViewRegistry>,
    events: EventSink,
    disposed: AtomicBool,
}

impl PlayerView {
    /// Create a view and register it under `id`
    pub fn create(
        registry: &Arc<ViewRegistry>,
        ui: UiContext,
        events: EventSink,
        settings: AdapterSettings,
        id: ViewId,
    ) -> Arc<Self> {
        let key = registry.allocate_key();
        let shared_id = SharedViewId::new(id);

        let view = Arc::new_cyclic(|weak| {
            let port = ViewPort {
                key,
                view: weak.clone(),
                ui,
            };
            Self {
                key,
                id: shared_id.clone(),
                adapter: Mutex::new(PlaybackAdapter::new(port, shared_id, events.clone(), settings)),
                registry: Arc::downgrade(registry),
                events,
                disposed: AtomicBool::new(false),
            }
        });

        registry.register(id, Arc::clone(&view));
        log::debug!("Created view {} with id {}", key, id);
        view
    }

    pub fn key(&self) -> ViewKey {
        self.key
    }

    pub fn id(&self) -> ViewId {
        self.id.get()
    }

    pub fn port(&self) -> ViewPort {
        self.with_adapter(|adapter| adapter.port().clone())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Change the host id, re-keying the registry entry in one step
    pub fn set_id(self: &Arc<Self>, id: ViewId) {
        let old = self.id.swap(id);
        if old == id || self.is_disposed() {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.rekey(old, id, Arc::clone(self));
        }
        log::debug!("View {} re-keyed {} -> {}", self.key, old, id);
    }

    pub fn with_adapter<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut PlaybackAdapter) -> R,
    {
        let mut adapter = self.adapter.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut adapter)
    }

    pub fn layout(&self) -> ViewLayout {
        self.with_adapter(|adapter| adapter.layout())
    }

    pub(crate) fn on_engine_event(&self, event: EngineEvent) {
        if self.is_disposed() {
            log::trace!("View {} is disposed, ignoring {}", self.key, event.name());
            return;
        }
        self.with_adapter(|adapter| adapter.dispatch(event));
    }

    /// Stop playback, hide subtitles, unregister and notify the host.
    ///
    /// Only the first call has an effect.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.with_adapter(|adapter| adapter.release());

        let id = self.id();
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(id, self.key);
        }
        self.events.emit(PlayerEvent::ViewDisposed { view_id: id });
        log::debug!("Disposed view {} (id {})", self.key, id);
    }
}

impl Drop for PlayerView {
    fn drop(&mut self) {
        self.dispose();
    }
}
