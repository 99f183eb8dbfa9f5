//! Per-frame touch move coalescing
//!
//! Browsers emit touch moves at input rate, which can outpace the host
//! frame tick. The cache keeps the latest move per player and touch index.
//! Players that produced no fresh move in the current frame get their
//! cached touches replayed on flush so held touches keep registering.

use std::collections::{HashMap, HashSet};

use crate::events::Vec2;

/// Latest known state of one held touch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedTouch {
    pub location: Vec2,
    pub force: f32,
}

/// Move cache for all players of one session. Callers serialize access;
/// the session keeps this behind a mutex.
#[derive(Debug, Default)]
pub struct TouchFrameCache {
    cached: HashMap<String, HashMap<u8, CachedTouch>>,
    processed_this_frame: HashSet<String>,
}

impl TouchFrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh move and mark the player processed for this frame
    pub fn record_move(&mut self, player_id: &str, index: u8, location: Vec2, force: f32) {
        self.cached
            .entry(player_id.to_string())
            .or_default()
            .insert(index, CachedTouch { location, force });
        self.processed_this_frame.insert(player_id.to_string());
    }

    /// Forget a touch once it has ended. The player entry goes away with
    /// its last touch.
    pub fn end_touch(&mut self, player_id: &str, index: u8) {
        if let Some(touches) = self.cached.get_mut(player_id) {
            touches.remove(&index);
            if touches.is_empty() {
                self.cached.remove(player_id);
            }
        }
    }

    /// Reset the processed markers at the start of a frame. Cached
    /// positions survive so held touches can be replayed.
    pub fn begin_frame(&mut self) {
        self.processed_this_frame.clear();
    }

    /// Collect cached touches of players that saw no fresh move this
    /// frame. Returned players are marked processed so a double flush
    /// within one frame replays nothing.
    pub fn stale_touches(&mut self) -> Vec<(String, u8, CachedTouch)> {
        let mut stale = Vec::new();
        for (player_id, touches) in &self.cached {
            if self.processed_this_frame.contains(player_id) {
                continue;
            }
            for (&index, &touch) in touches {
                stale.push((player_id.clone(), index, touch));
            }
        }
        for (player_id, _, _) in &stale {
            self.processed_this_frame.insert(player_id.clone());
        }
        stale
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.cached.remove(player_id);
        self.processed_this_frame.remove(player_id);
    }

    pub fn clear(&mut self) {
        self.cached.clear();
        self.processed_this_frame.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_move_not_replayed() {
        let mut cache = TouchFrameCache::new();
        cache.begin_frame();
        cache.record_move("p1", 0, Vec2::new(0.5, 0.5), 1.0);
        assert!(cache.stale_touches().is_empty());
    }

    #[test]
    fn test_held_touch_replayed_next_frame() {
        let mut cache = TouchFrameCache::new();
        cache.record_move("p1", 0, Vec2::new(0.5, 0.5), 1.0);

        cache.begin_frame();
        let stale = cache.stale_touches();
        assert_eq!(stale.len(), 1);
        let (player, index, touch) = &stale[0];
        assert_eq!(player, "p1");
        assert_eq!(*index, 0);
        assert_eq!(touch.location, Vec2::new(0.5, 0.5));

        // same frame, second flush is a no-op
        assert!(cache.stale_touches().is_empty());
    }

    #[test]
    fn test_ended_touch_not_replayed() {
        let mut cache = TouchFrameCache::new();
        cache.record_move("p1", 0, Vec2::new(0.1, 0.2), 0.5);
        cache.end_touch("p1", 0);
        cache.begin_frame();
        assert!(cache.stale_touches().is_empty());
    }

    #[test]
    fn test_fresh_move_suppresses_whole_player() {
        let mut cache = TouchFrameCache::new();
        cache.record_move("p1", 0, Vec2::new(0.1, 0.1), 1.0);
        cache.record_move("p1", 1, Vec2::new(0.9, 0.9), 1.0);

        // p1 moved index 0 this frame, so none of its touches are replayed
        cache.begin_frame();
        cache.record_move("p1", 0, Vec2::new(0.2, 0.2), 1.0);
        assert!(cache.stale_touches().is_empty());
    }

    #[test]
    fn test_players_replayed_independently() {
        let mut cache = TouchFrameCache::new();
        cache.record_move("p1", 0, Vec2::new(0.1, 0.1), 1.0);
        cache.record_move("p2", 3, Vec2::new(0.9, 0.9), 1.0);

        cache.begin_frame();
        cache.record_move("p1", 0, Vec2::new(0.2, 0.2), 1.0);
        let stale = cache.stale_touches();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0, "p2");
        assert_eq!(stale[0].1, 3);
    }

    #[test]
    fn test_remove_player_drops_cached_state() {
        let mut cache = TouchFrameCache::new();
        cache.record_move("p1", 0, Vec2::new(0.5, 0.5), 1.0);
        cache.record_move("p2", 0, Vec2::new(0.5, 0.5), 1.0);
        cache.remove_player("p1");

        cache.begin_frame();
        let stale = cache.stale_touches();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0, "p2");
    }
}
