//! Peer connection collaborator contracts
//!
//! The WebRTC pipeline lives outside this crate. Sessions talk to it
//! through [`PeerLink`], one per connected player, created by the host via
//! [`PeerLinkFactory`]. Implementations must be cheap to call; sends are
//! fire-and-forget into the media pipeline.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::signalling::protocol::SdpKind;

/// Per-player capabilities negotiated at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Whether a data channel should be created for this peer
    pub supports_data_channel: bool,
    /// Whether this peer is an SFU rather than a direct viewer
    pub is_sfu: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            supports_data_channel: true,
            is_sfu: false,
        }
    }
}

/// Stream id pair for an SFU-mediated data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChannelPair {
    pub send_stream_id: i32,
    pub recv_stream_id: i32,
}

/// One peer connection as seen by a session
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Produce a local offer SDP for this peer
    async fn create_offer(&self) -> Result<String>;

    /// Produce a local answer SDP after a remote offer was applied
    async fn create_answer(&self) -> Result<String>;

    /// Apply a remote session description
    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<()>;

    /// Feed a remote ICE candidate into the transport
    async fn add_remote_ice_candidate(
        &self,
        sdp_mid: &str,
        sdp_m_line_index: i32,
        sdp: &str,
    ) -> Result<()>;

    /// Open an SFU-negotiated data channel pair on this peer
    async fn create_data_channels(
        &self,
        send_stream_id: i32,
        recv_stream_id: i32,
    ) -> Result<DataChannelPair>;

    /// Send a typed message to the player over its data channel
    async fn send_message(&self, message_type: u8, descriptor: &str) -> Result<()>;

    /// Tear down the transport
    async fn close(&self);
}

/// Creates [`PeerLink`]s when players connect
pub trait PeerLinkFactory: Send + Sync {
    fn create_peer(&self, player_id: &str, config: &PlayerConfig) -> Result<Arc<dyn PeerLink>>;
}
