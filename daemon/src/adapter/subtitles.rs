//! Subtitle track bookkeeping.
//!
//! The selection survives track-list replacements: an empty list only hides
//! the surface, and the selection is re-applied on the next resync.

use common::SubtitleTrack;

/// No track selected
pub const NO_TRACK: i32 = -1;

/// Surface operation the adapter must perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleAction {
    /// Hide the surface, leaving the player untouched
    Hide,
    /// Detach the rendering surface and hide it
    Detach,
    /// Attach the surface, select the track and show it
    Attach(i32),
}

#[derive(Debug)]
pub struct SubtitleCoordinator {
    tracks: Vec<SubtitleTrack>,
    selected: i32,
    auto_select_first: bool,
}

impl SubtitleCoordinator {
    pub fn new(auto_select_first: bool) -> Self {
        Self {
            tracks: Vec::new(),
            selected: NO_TRACK,
            auto_select_first,
        }
    }

    /// Back to no tracks and no selection, as after a fresh bind
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.selected = NO_TRACK;
    }

    pub fn selected(&self) -> i32 {
        self.selected
    }

    pub fn tracks(&self) -> &[SubtitleTrack] {
        &self.tracks
    }

    /// Replace the available tracks.
    ///
    /// An empty list hides the surface. A non-empty one may pick the first
    /// track when auto selection is on and nothing is selected yet.
    pub fn on_tracks(&mut self, tracks: Vec<SubtitleTrack>) -> Option<SubtitleAction> {
        self.tracks = tracks;

        let Some(first) = self.tracks.first() else {
            return Some(SubtitleAction::Hide);
        };
        if self.auto_select_first && self.selected < 0 {
            self.selected = first.index;
            return Some(SubtitleAction::Attach(self.selected));
        }
        None
    }

    /// Store a selection; negative means none
    pub fn select(&mut self, index: i32) -> SubtitleAction {
        if index < 0 {
            self.selected = NO_TRACK;
            SubtitleAction::Detach
        } else {
            self.selected = index;
            SubtitleAction::Attach(index)
        }
    }

    /// Re-apply the selection after the player may have lost it
    pub fn resync(&self) -> Option<SubtitleAction> {
        (self.selected >= 0 && !self.tracks.is_empty()).then_some(SubtitleAction::Attach(self.selected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(index: i32) -> SubtitleTrack {
        SubtitleTrack {
            index,
            language: Some("en".to_string()),
            name: None,
            track_type: 3,
        }
    }

    #[test]
    fn test_empty_list_hides_but_keeps_selection() {
        let mut subs = SubtitleCoordinator::new(false);
        subs.on_tracks(vec![track(0), track(1), track(2)]);
        assert_eq!(subs.select(2), SubtitleAction::Attach(2));

        assert_eq!(subs.on_tracks(Vec::new()), Some(SubtitleAction::Hide));
        assert_eq!(subs.selected(), 2);
        assert_eq!(subs.resync(), None);

        assert_eq!(subs.on_tracks(vec![track(0), track(1), track(2)]), None);
        assert_eq!(subs.resync(), Some(SubtitleAction::Attach(2)));
    }

    #[test]
    fn test_negative_selection_detaches() {
        let mut subs = SubtitleCoordinator::new(false);
        subs.on_tracks(vec![track(0)]);
        subs.select(0);
        assert_eq!(subs.select(-5), SubtitleAction::Detach);
        assert_eq!(subs.selected(), NO_TRACK);
        assert_eq!(subs.resync(), None);
    }

    #[test]
    fn test_auto_select_first() {
        let mut subs = SubtitleCoordinator::new(true);
        assert_eq!(subs.on_tracks(vec![track(4), track(5)]), Some(SubtitleAction::Attach(4)));
        assert_eq!(subs.selected(), 4);

        // An explicit selection is never overridden
        subs.select(5);
        assert_eq!(subs.on_tracks(vec![track(4), track(5)]), None);
        assert_eq!(subs.selected(), 5);
    }

    #[test]
    fn test_reset() {
        let mut subs = SubtitleCoordinator::new(false);
        subs.on_tracks(vec![track(0)]);
        subs.select(0);
        subs.reset();
        assert_eq!(subs.selected(), NO_TRACK);
        assert!(subs.tracks().is_empty());
    }
}
