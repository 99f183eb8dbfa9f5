//! Player identity registry
//!
//! Maps a transient signalling player id to the externally supplied
//! identity ("MetaCommId") used for business-level routing. The registry is
//! shared across sessions and accessed from network and worker threads, so
//! the whole map sits behind one lock. Contention is player churn, not
//! per-frame traffic.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Sentinel returned when a player has no registered external identity
pub const META_COMM_ID_NONE: &str = "NULL";

/// Sentinel returned when no player matches an external identity
pub const PLAYER_ID_NONE: &str = "-1";

#[derive(Debug, Clone)]
struct PlayerRecord {
    meta_comm_id: String,
}

/// Thread-safe bidirectional player id / external id map
#[derive(Default)]
pub struct PlayerRegistry {
    players: Mutex<HashMap<String, PlayerRecord>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `player_id`. Last write wins.
    pub fn add(&self, player_id: &str, meta_comm_id: &str) {
        let mut players = self.players.lock();
        players.insert(
            player_id.to_string(),
            PlayerRecord {
                meta_comm_id: meta_comm_id.to_string(),
            },
        );
    }

    /// Remove the record if present. Absence is not an error.
    pub fn remove(&self, player_id: &str) {
        self.players.lock().remove(player_id);
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.lock().contains_key(player_id)
    }

    /// External identity for `player_id`, or [`META_COMM_ID_NONE`]
    pub fn meta_comm_id(&self, player_id: &str) -> String {
        let players = self.players.lock();
        players
            .get(player_id)
            .map(|record| record.meta_comm_id.clone())
            .unwrap_or_else(|| META_COMM_ID_NONE.to_string())
    }

    /// Reverse lookup by external identity, or [`PLAYER_ID_NONE`]
    ///
    /// Linear scan; MetaCommId uniqueness is not enforced, so the first
    /// match wins when duplicates exist.
    pub fn player_id_by_meta_comm_id(&self, meta_comm_id: &str) -> String {
        let players = self.players.lock();
        for (player_id, record) in players.iter() {
            if record.meta_comm_id == meta_comm_id {
                return player_id.clone();
            }
        }
        PLAYER_ID_NONE.to_string()
    }

    pub fn count(&self) -> usize {
        self.players.lock().len()
    }

    /// Remove all records
    pub fn clear(&self) {
        self.players.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_overwrites_last_write_wins() {
        let registry = PlayerRegistry::new();
        registry.add("p1", "m1");
        registry.add("p1", "m2");
        assert_eq!(registry.meta_comm_id("p1"), "m2");
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_remove_clears_lookup() {
        let registry = PlayerRegistry::new();
        registry.add("p1", "m1");
        registry.remove("p1");
        assert_eq!(registry.meta_comm_id("p1"), META_COMM_ID_NONE);
        assert!(!registry.contains("p1"));
        // Removing again is a no-op
        registry.remove("p1");
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_reverse_lookup() {
        let registry = PlayerRegistry::new();
        registry.add("p1", "m1");
        registry.add("p2", "m2");
        assert_eq!(registry.player_id_by_meta_comm_id("m2"), "p2");
        assert_eq!(registry.player_id_by_meta_comm_id("m9"), PLAYER_ID_NONE);
    }

    #[test]
    fn test_add_overwrite_remove_scenario() {
        let registry = PlayerRegistry::new();
        registry.add("p1", "m1");
        assert_eq!(registry.count(), 1);
        registry.add("p1", "m2");
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.meta_comm_id("p1"), "m2");
        registry.remove("p1");
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_clear() {
        let registry = PlayerRegistry::new();
        registry.add("p1", "m1");
        registry.add("p2", "m2");
        registry.clear();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.meta_comm_id("p1"), META_COMM_ID_NONE);
    }

    #[test]
    fn test_concurrent_churn() {
        use std::sync::Arc;
        let registry = Arc::new(PlayerRegistry::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let id = format!("p{}-{}", t, i);
                    registry.add(&id, "m");
                    assert!(registry.contains(&id));
                    registry.remove(&id);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.count(), 0);
    }
}
