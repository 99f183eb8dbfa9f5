//! Inbound signalling event routing
//!
//! [`SignallingObserver`] mirrors the inbound protocol surface.
//! [`SessionObserver`] is the concrete dispatcher: it holds a weak handle to
//! the owning session so a `destroy()` racing a callback simply drops the
//! event instead of dangling.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::{debug, error};

use crate::peer::PlayerConfig;
use crate::session::StreamerSession;
use crate::signalling::protocol::SdpKind;

/// Receiver of inbound signalling events
#[async_trait]
pub trait SignallingObserver: Send + Sync {
    async fn on_connected(&self);
    async fn on_disconnected(&self, code: Option<u16>, reason: String);
    async fn on_error(&self, message: String);
    async fn on_session_description(&self, player_id: String, kind: SdpKind, sdp: String);
    async fn on_remote_ice_candidate(
        &self,
        player_id: String,
        sdp_mid: String,
        sdp_m_line_index: i32,
        sdp: String,
    );
    async fn on_player_connected(&self, player_id: String, config: PlayerConfig, send_offer: bool);
    async fn on_player_disconnected(&self, player_id: String);
    async fn on_player_going_away(&self, player_id: String);
    async fn on_sfu_peer_data_channels(
        &self,
        sfu_id: String,
        player_id: String,
        send_stream_id: i32,
        recv_stream_id: i32,
    );
    async fn on_sfu_connected(&self);
    async fn on_sfu_disconnected(&self);
}

/// Routes signalling events to the owning [`StreamerSession`]
pub struct SessionObserver {
    session: Weak<StreamerSession>,
}

impl SessionObserver {
    pub fn new(session: Weak<StreamerSession>) -> Arc<Self> {
        Arc::new(Self { session })
    }

    fn session(&self) -> Option<Arc<StreamerSession>> {
        let session = self.session.upgrade();
        if session.is_none() {
            debug!("Dropping signalling event for destroyed session");
        }
        session
    }
}

#[async_trait]
impl SignallingObserver for SessionObserver {
    async fn on_connected(&self) {
        if let Some(session) = self.session() {
            session.handle_signalling_connected().await;
        }
    }

    /// Transport loss invalidates SFU-mediated peers but not direct ones,
    /// so only the SFU sub-session is torn down here.
    async fn on_disconnected(&self, _code: Option<u16>, _reason: String) {
        if let Some(session) = self.session() {
            session.destroy_sfu_session().await;
        }
    }

    async fn on_error(&self, _message: String) {
        if let Some(session) = self.session() {
            session.destroy_sfu_session().await;
        }
    }

    async fn on_session_description(&self, player_id: String, kind: SdpKind, sdp: String) {
        let Some(session) = self.session() else {
            return;
        };
        match kind {
            SdpKind::Offer => session.handle_offer(&player_id, &sdp).await,
            SdpKind::Answer | SdpKind::PrAnswer => session.handle_answer(&player_id, &sdp).await,
            SdpKind::Rollback => {
                error!(%player_id, "Rollback SDP is unsupported, sdp: {}", sdp);
            }
        }
    }

    async fn on_remote_ice_candidate(
        &self,
        player_id: String,
        sdp_mid: String,
        sdp_m_line_index: i32,
        sdp: String,
    ) {
        if let Some(session) = self.session() {
            session
                .handle_remote_ice_candidate(&player_id, &sdp_mid, sdp_m_line_index, &sdp)
                .await;
        }
    }

    async fn on_player_connected(&self, player_id: String, config: PlayerConfig, send_offer: bool) {
        if let Some(session) = self.session() {
            session
                .handle_player_connected(&player_id, config, send_offer)
                .await;
        }
    }

    async fn on_player_disconnected(&self, player_id: String) {
        if let Some(session) = self.session() {
            session.handle_player_disconnected(&player_id).await;
        }
    }

    async fn on_player_going_away(&self, player_id: String) {
        if let Some(session) = self.session() {
            session.handle_player_going_away(&player_id).await;
        }
    }

    async fn on_sfu_peer_data_channels(
        &self,
        sfu_id: String,
        player_id: String,
        send_stream_id: i32,
        recv_stream_id: i32,
    ) {
        if let Some(session) = self.session() {
            session
                .handle_sfu_peer_data_channels(&sfu_id, &player_id, send_stream_id, recv_stream_id)
                .await;
        }
    }

    async fn on_sfu_connected(&self) {
        if let Some(session) = self.session() {
            session.handle_sfu_connected();
        }
    }

    async fn on_sfu_disconnected(&self) {
        if let Some(session) = self.session() {
            session.handle_sfu_disconnected();
        }
    }
}
