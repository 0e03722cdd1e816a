//! Process-wide playback engine facade.
//!
//! Owns the controller and view registries, performs one-time engine
//! configuration and the optional enhancement probe.

use crate::adapter::AdapterSettings;
use crate::capability::{self, EnhancementPlugin};
use crate::controller::FeedController;
use crate::events::EventSink;
use crate::player::PlaybackEngine;
use crate::ui::UiContext;
use crate::view::{PlayerView, ViewRegistry};
use common::{ControllerId, EnhancementInfo, PlayerConfig, ViewId, VodStrategy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

/// Orchestration knobs, normally derived from the config file
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    /// Maximum distance from the current item a pre-bind may reach
    pub pre_bind_distance: usize,
    /// Loop flag of newly created controllers
    pub default_loop: bool,
    pub adapter: AdapterSettings,
    /// Strategy handed to every new controller's feed
    pub default_strategy: Option<VodStrategy>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            pre_bind_distance: 2,
            default_loop: true,
            adapter: AdapterSettings::default(),
            default_strategy: None,
        }
    }
}

/// Live controllers by id. Ids are never reused.
pub struct ControllerRegistry {
    next_id: AtomicI32,
    controllers: RwLock<HashMap<ControllerId, Arc<FeedController>>>,
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            controllers: RwLock::new(HashMap::new()),
        }
    }
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> ControllerId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn insert(&self, controller: Arc<FeedController>) {
        let mut controllers = self.controllers.write().unwrap_or_else(|e| e.into_inner());
        controllers.insert(controller.id(), controller);
    }

    pub fn get(&self, id: ControllerId) -> Option<Arc<FeedController>> {
        let controllers = self.controllers.read().unwrap_or_else(|e| e.into_inner());
        controllers.get(&id).cloned()
    }

    /// Forget a controller. Unknown ids are ignored.
    pub fn release(&self, id: ControllerId) -> bool {
        let mut controllers = self.controllers.write().unwrap_or_else(|e| e.into_inner());
        let removed = controllers.remove(&id).is_some();
        if !removed {
            log::debug!("Controller {} is not registered", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.controllers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Engine {
    player: Arc<dyn PlaybackEngine>,
    controllers: Arc<ControllerRegistry>,
    views: Arc<ViewRegistry>,
    ui: UiContext,
    events: EventSink,
    enhancement: Box<dyn EnhancementPlugin>,
    configured: AtomicBool,
    settings: FeedSettings,
}

impl Engine {
    pub fn new(
        player: Arc<dyn PlaybackEngine>,
        ui: UiContext,
        events: EventSink,
        enhancement: Box<dyn EnhancementPlugin>,
        settings: FeedSettings,
    ) -> Self {
        Self {
            player,
            controllers: Arc::new(ControllerRegistry::new()),
            views: Arc::new(ViewRegistry::new()),
            ui,
            events,
            enhancement,
            configured: AtomicBool::new(false),
            settings,
        }
    }

    pub fn ui(&self) -> &UiContext {
        &self.ui
    }

    pub fn views(&self) -> &Arc<ViewRegistry> {
        &self.views
    }

    pub fn controllers(&self) -> &Arc<ControllerRegistry> {
        &self.controllers
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    /// Allocate a controller with a fresh id and register it
    pub fn create_controller(&self) -> ControllerId {
        let id = self.controllers.allocate_id();
        let controller = Arc::new(FeedController::new(
            id,
            self.player.create_feed(id),
            Arc::clone(&self.views),
            self.ui.clone(),
            Arc::downgrade(&self.controllers),
            self.settings.pre_bind_distance,
            self.settings.default_loop,
        ));
        if let Some(strategy) = &self.settings.default_strategy {
            controller.set_vod_strategy(strategy);
        }
        self.controllers.insert(controller);
        log::info!("Created controller {}", id);
        id
    }

    pub fn get_controller(&self, id: ControllerId) -> Option<Arc<FeedController>> {
        self.controllers.get(id)
    }

    /// Drop `id` from the registry; called by the controller on release
    pub fn release(&self, id: ControllerId) {
        self.controllers.release(id);
    }

    /// Initialize the native engine. Only the first call does anything.
    pub fn set_configuration(&self, config: &PlayerConfig) {
        if self.configured.swap(true, Ordering::SeqCst) {
            log::warn!("Engine already configured, ignoring");
            return;
        }
        match self.player.init(config) {
            Ok(()) => log::info!("Engine configured (log: {})", config.enable_log),
            Err(e) => log::error!("Engine configuration failed: {}", e),
        }
    }

    /// Configure the optional enhancement plugin; failures are logged only
    pub fn probe_optional_capability(&self, info: &EnhancementInfo) -> bool {
        capability::probe(self.enhancement.as_ref(), info)
    }

    /// Create a view and register it under `id`
    pub fn create_view(&self, id: ViewId) -> Arc<PlayerView> {
        PlayerView::create(
            &self.views,
            self.ui.clone(),
            self.events.clone(),
            self.settings.adapter,
            id,
        )
    }

    pub fn view(&self, id: ViewId) -> Option<Arc<PlayerView>> {
        self.views.get(id)
    }
}
