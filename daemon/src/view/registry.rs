//! Host view id to view lookup.

use super::{PlayerView, ViewKey};
use common::{NO_VIEW_ID, ViewId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

/// Maps host-assigned view ids to live views.
///
/// Readers may run on any thread; a re-key swaps the old entry for the new
/// one under a single write lock so no reader ever sees both or neither.
#[derive(Default)]
pub struct ViewRegistry {
    views: RwLock<HashMap<ViewId, Arc<PlayerView>>>,
    next_key: AtomicU64,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a stable internal key for a new view
    pub(crate) fn allocate_key(&self) -> ViewKey {
        ViewKey(self.next_key.fetch_add(1, Ordering::SeqCst))
    }

    pub fn register(&self, id: ViewId, view: Arc<PlayerView>) {
        if id == NO_VIEW_ID {
            return;
        }
        let displaced = self.write().insert(id, view);
        if let Some(displaced) = displaced {
            log::warn!("View id {} was already registered, replacing it", id);
            retire(displaced);
        }
    }

    /// Remove `id` if it still maps to the view with `key`
    pub fn unregister(&self, id: ViewId, key: ViewKey) -> bool {
        if id == NO_VIEW_ID {
            return false;
        }
        let removed = {
            let mut views = self.write();
            match views.get(&id) {
                Some(view) if view.key() == key => views.remove(&id),
                _ => None,
            }
        };
        removed.is_some()
    }

    /// Move `view` from `old` to `new` atomically
    pub fn rekey(&self, old: ViewId, new: ViewId, view: Arc<PlayerView>) {
        let key = view.key();
        let (_previous, displaced) = {
            let mut views = self.write();
            let previous = if old != NO_VIEW_ID && views.get(&old).is_some_and(|v| v.key() == key) {
                views.remove(&old)
            } else {
                None
            };
            let displaced = if new != NO_VIEW_ID { views.insert(new, view) } else { None };
            (previous, displaced)
        };

        if let Some(displaced) = displaced.filter(|d| d.key() != key) {
            log::warn!("View id {} was taken over by view {}", new, key);
            retire(displaced);
        }
    }

    // Entries must leave the map before they are dropped: dropping the last
    // reference to a view runs its dispose, which unregisters it again.
    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ViewId, Arc<PlayerView>>> {
        self.views.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, id: ViewId) -> Option<Arc<PlayerView>> {
        if id == NO_VIEW_ID {
            return None;
        }
        let views = self.views.read().unwrap_or_else(|e| e.into_inner());
        views.get(&id).cloned()
    }

    /// Every entry, ordered by id, read under a single lock
    pub fn snapshot(&self) -> Vec<(ViewId, Arc<PlayerView>)> {
        let views = self.views.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = views.iter().map(|(id, view)| (*id, Arc::clone(view))).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    pub fn len(&self) -> usize {
        self.views.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dispose a view whose id was handed to another view
fn retire(view: Arc<PlayerView>) {
    view.dispose();
}
