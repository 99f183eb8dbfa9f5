//! Keyed registry of live sessions
//!
//! One [`StreamerSession`] per scene id, owned strongly by the manager.
//! Creation is atomic under the table lock so two racing `create_or_get`
//! calls for the same id observe the same session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::AppConfig;
use crate::events::EventBus;
use crate::peer::PeerLinkFactory;
use crate::players::PlayerRegistry;
use crate::session::{StreamerSession, StreamerSessionInfo};

/// Owns every live session, keyed by session id
pub struct SessionManager {
    config: AppConfig,
    events: Arc<EventBus>,
    registry: Arc<PlayerRegistry>,
    peer_factory: Arc<dyn PeerLinkFactory>,
    sessions: Mutex<HashMap<String, Arc<StreamerSession>>>,
}

impl SessionManager {
    pub fn new(
        config: AppConfig,
        events: Arc<EventBus>,
        registry: Arc<PlayerRegistry>,
        peer_factory: Arc<dyn PeerLinkFactory>,
    ) -> Self {
        Self {
            config,
            events,
            registry,
            peer_factory,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn player_registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Get the session for `session_id`, creating it if absent. The first
    /// creation wins; parameters of an existing session are not updated.
    pub fn create_or_get(
        &self,
        session_id: &str,
        owner_player_id: &str,
        camera_mode: &str,
    ) -> Arc<StreamerSession> {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(session_id) {
            return session.clone();
        }
        let session = StreamerSession::create(
            StreamerSessionInfo {
                session_id: session_id.to_string(),
                owner_player_id: owner_player_id.to_string(),
                camera_mode: camera_mode.to_string(),
            },
            &self.config,
            self.events.clone(),
            self.registry.clone(),
            self.peer_factory.clone(),
        );
        sessions.insert(session_id.to_string(), session.clone());
        session
    }

    pub fn find(&self, session_id: &str) -> Option<Arc<StreamerSession>> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// Remove and tear down the session for `session_id`
    pub async fn delete(&self, session_id: &str) -> bool {
        let session = self.sessions.lock().remove(session_id);
        match session {
            Some(session) => {
                session.destroy().await;
                info!(%session_id, "Session deleted");
                true
            }
            None => false,
        }
    }

    /// Tear down every session
    pub async fn delete_all(&self) {
        let sessions: Vec<Arc<StreamerSession>> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.destroy().await;
        }
    }

    /// Visit every live session. Keys are snapshotted under the lock and
    /// the callback runs outside it; sessions deleted mid-walk are skipped.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<StreamerSession>),
    {
        let keys: Vec<String> = self.sessions.lock().keys().cloned().collect();
        for key in keys {
            if let Some(session) = self.find(&key) {
                f(&session);
            }
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::peer::{PeerLink, PlayerConfig};

    struct NullFactory;

    impl PeerLinkFactory for NullFactory {
        fn create_peer(
            &self,
            _player_id: &str,
            _config: &PlayerConfig,
        ) -> Result<Arc<dyn PeerLink>> {
            unreachable!("no peers in manager tests")
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(
            AppConfig::default(),
            Arc::new(EventBus::new()),
            Arc::new(PlayerRegistry::new()),
            Arc::new(NullFactory),
        )
    }

    #[tokio::test]
    async fn test_create_or_get_first_create_wins() {
        let manager = manager();
        let a = manager.create_or_get("scene0", "owner-a", "default");
        let b = manager.create_or_get("scene0", "owner-b", "fixed");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.info().owner_player_id, "owner-a");
        assert_eq!(manager.count(), 1);
    }

    #[tokio::test]
    async fn test_find_and_delete() {
        let manager = manager();
        manager.create_or_get("scene0", "owner", "default");
        assert!(manager.find("scene0").is_some());
        assert!(manager.find("scene1").is_none());

        assert!(manager.delete("scene0").await);
        assert!(!manager.delete("scene0").await);
        assert!(manager.find("scene0").is_none());
        assert_eq!(manager.count(), 0);
    }

    #[tokio::test]
    async fn test_for_each_visits_live_sessions() {
        let manager = manager();
        manager.create_or_get("scene0", "owner", "default");
        manager.create_or_get("scene1", "owner", "default");

        let mut seen = Vec::new();
        manager.for_each(|session| seen.push(session.session_id().to_string()));
        seen.sort();
        assert_eq!(seen, vec!["scene0", "scene1"]);
    }

    #[tokio::test]
    async fn test_concurrent_create_or_get_yields_one_session() {
        let manager = Arc::new(manager());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.create_or_get("scene0", "owner", "default")
            }));
        }
        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        assert_eq!(manager.count(), 1);
        for session in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], session));
        }
    }

    #[tokio::test]
    async fn test_delete_all() {
        let manager = manager();
        manager.create_or_get("scene0", "owner", "default");
        manager.create_or_get("scene1", "owner", "default");
        manager.delete_all().await;
        assert_eq!(manager.count(), 0);
    }
}
