//! Streaming session lifecycle and input routing
//!
//! A [`StreamerSession`] is one scene's streaming endpoint: it owns the
//! signalling connection for that scene, the peer links of its connected
//! players, and the per-frame touch cache. Sessions are handed out as
//! `Arc`s by the [`manager::SessionManager`] and publish everything they
//! learn onto the injected [`EventBus`].

pub mod camera_switch;
pub mod input;
pub mod manager;
pub mod touch;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::events::{EventBus, StreamEvent, Vec2};
use crate::peer::{DataChannelPair, PeerLink, PeerLinkFactory, PlayerConfig};
use crate::players::{PlayerRegistry, PLAYER_ID_NONE};
use crate::signalling::observer::SessionObserver;
use crate::signalling::protocol::SdpKind;
use crate::signalling::SignallingConnection;

use camera_switch::CameraMessage;
use input::{InputMessageKind, ScreenRect};
use touch::TouchFrameCache;

/// Identity of a session endpoint, fixed at creation
#[derive(Debug, Clone)]
pub struct StreamerSessionInfo {
    /// Scene id, doubles as the signalling endpoint id
    pub session_id: String,
    /// Player this scene belongs to
    pub owner_player_id: String,
    /// Camera mode advertised during the identify handshake
    pub camera_mode: String,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    ConnectingSignalling,
    SignallingConnected,
    Streaming,
    Disconnected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::ConnectingSignalling => write!(f, "connecting-signalling"),
            Self::SignallingConnected => write!(f, "signalling-connected"),
            Self::Streaming => write!(f, "streaming"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

struct PeerEntry {
    link: Arc<dyn PeerLink>,
    config: PlayerConfig,
}

/// One scene's streaming session
pub struct StreamerSession {
    info: Arc<StreamerSessionInfo>,
    state: RwLock<SessionState>,
    connection: Arc<SignallingConnection>,
    peers: Mutex<HashMap<String, PeerEntry>>,
    sfu_channels: Mutex<HashMap<String, DataChannelPair>>,
    touch_cache: Mutex<TouchFrameCache>,
    target_rect: RwLock<Option<ScreenRect>>,
    use_mouse_for_touch: bool,
    events: Arc<EventBus>,
    registry: Arc<PlayerRegistry>,
    peer_factory: Arc<dyn PeerLinkFactory>,
}

impl StreamerSession {
    /// Create a session endpoint for one scene. No I/O happens until
    /// [`connect_to_signalling`](Self::connect_to_signalling).
    pub fn create(
        info: StreamerSessionInfo,
        config: &AppConfig,
        events: Arc<EventBus>,
        registry: Arc<PlayerRegistry>,
        peer_factory: Arc<dyn PeerLinkFactory>,
    ) -> Arc<Self> {
        let info = Arc::new(info);
        let connection = SignallingConnection::new(
            config.signalling_server_url(),
            info.clone(),
            config.auto_reconnect,
            Duration::from_millis(config.reconnect_delay_ms),
        );
        info!(session_id = %info.session_id, owner = %info.owner_player_id, "Session created");
        Arc::new(Self {
            info,
            state: RwLock::new(SessionState::Created),
            connection,
            peers: Mutex::new(HashMap::new()),
            sfu_channels: Mutex::new(HashMap::new()),
            touch_cache: Mutex::new(TouchFrameCache::new()),
            target_rect: RwLock::new(None),
            use_mouse_for_touch: config.use_mouse_for_touch,
            events,
            registry,
            peer_factory,
        })
    }

    pub fn info(&self) -> &StreamerSessionInfo {
        &self.info
    }

    pub fn session_id(&self) -> &str {
        &self.info.session_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Pixel rect input coordinates are scaled into. `None` passes the
    /// normalized values through unscaled.
    pub fn set_target_screen_rect(&self, rect: Option<ScreenRect>) {
        *self.target_rect.write() = rect;
    }

    pub fn target_screen_rect(&self) -> Option<ScreenRect> {
        *self.target_rect.read()
    }

    pub fn player_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Negotiated SFU data channel pair for a player, if any
    pub fn sfu_data_channels(&self, player_id: &str) -> Option<DataChannelPair> {
        self.sfu_channels.lock().get(player_id).copied()
    }

    // ------------------------------------------------------------------
    // Lifecycle

    /// Open the signalling connection. Repeat calls are logged no-ops.
    pub fn connect_to_signalling(self: &Arc<Self>) {
        {
            let mut state = self.state.write();
            match *state {
                SessionState::Created => {
                    *state = SessionState::ConnectingSignalling;
                }
                SessionState::Disconnected => {
                    info!(session_id = %self.info.session_id,
                        "Session is destroyed, ignoring connect");
                    return;
                }
                other => {
                    info!(session_id = %self.info.session_id, state = %other,
                        "Session already connecting, ignoring");
                    return;
                }
            }
        }
        let observer = SessionObserver::new(Arc::downgrade(self));
        self.connection.connect(observer);
    }

    /// Mark the session streaming. Requires a live signalling connection.
    pub fn start_streaming(&self) {
        let mut state = self.state.write();
        match *state {
            SessionState::SignallingConnected => {
                *state = SessionState::Streaming;
                info!(session_id = %self.info.session_id, "Streaming started");
            }
            SessionState::Streaming => {
                info!(session_id = %self.info.session_id, "Already streaming, ignoring");
            }
            other => {
                warn!(session_id = %self.info.session_id, state = %other,
                    "Cannot start streaming before signalling is connected");
            }
        }
    }

    /// Pause streaming while keeping signalling up
    pub fn stop_streaming(&self) {
        let mut state = self.state.write();
        if *state == SessionState::Streaming {
            *state = SessionState::SignallingConnected;
            info!(session_id = %self.info.session_id, "Streaming stopped");
        } else {
            info!(session_id = %self.info.session_id, state = %*state,
                "Not streaming, ignoring stop");
        }
    }

    /// Tear the session down: close every peer, drop the connection, clear
    /// per-player state. Safe to call repeatedly and while signalling
    /// callbacks are in flight.
    pub async fn destroy(&self) {
        {
            let mut state = self.state.write();
            if *state == SessionState::Disconnected {
                info!(session_id = %self.info.session_id, "Session already destroyed, ignoring");
                return;
            }
            *state = SessionState::Disconnected;
        }
        self.connection.disconnect();

        let entries: Vec<(String, PeerEntry)> = self.peers.lock().drain().collect();
        for (player_id, entry) in entries {
            entry.link.close().await;
            self.registry.remove(&player_id);
            self.events.remove_player(&player_id);
        }
        self.sfu_channels.lock().clear();
        self.touch_cache.lock().clear();
        info!(session_id = %self.info.session_id, "Session destroyed");
    }

    /// Drop the SFU leg only. Direct viewer peers stay connected; they do
    /// not depend on the lost signalling transport.
    pub async fn destroy_sfu_session(&self) {
        let sfu_entries: Vec<(String, PeerEntry)> = {
            let mut peers = self.peers.lock();
            let ids: Vec<String> = peers
                .iter()
                .filter(|(_, entry)| entry.config.is_sfu)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| peers.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        if sfu_entries.is_empty() {
            return;
        }
        for (sfu_id, entry) in sfu_entries {
            info!(session_id = %self.info.session_id, %sfu_id, "Destroying SFU sub-session");
            entry.link.close().await;
        }
        self.sfu_channels.lock().clear();
    }

    // ------------------------------------------------------------------
    // Signalling callbacks

    pub(crate) async fn handle_signalling_connected(&self) {
        {
            let mut state = self.state.write();
            *state = SessionState::SignallingConnected;
        }
        self.events.publish(StreamEvent::StreamingStarted {
            session_id: self.info.session_id.clone(),
        });
    }

    pub(crate) async fn handle_offer(&self, player_id: &str, sdp: &str) {
        let link = match self.peer(player_id) {
            Some(link) => link,
            // An offer can beat the playerConnected notification
            None => match self.create_peer(player_id, PlayerConfig::default()) {
                Ok(link) => link,
                Err(err) => {
                    error!(%player_id, error = %err, "Failed to create peer for offer");
                    return;
                }
            },
        };
        if let Err(err) = link.set_remote_description(SdpKind::Offer, sdp).await {
            error!(%player_id, error = %err, "Failed to apply remote offer");
            return;
        }
        match link.create_answer().await {
            Ok(answer) => self.connection.send_answer(player_id, &answer),
            Err(err) => error!(%player_id, error = %err, "Failed to create answer"),
        }
    }

    pub(crate) async fn handle_answer(&self, player_id: &str, sdp: &str) {
        let Some(link) = self.peer(player_id) else {
            error!(%player_id, "Answer for unknown player");
            return;
        };
        if let Err(err) = link.set_remote_description(SdpKind::Answer, sdp).await {
            error!(%player_id, error = %err, "Failed to apply remote answer");
        }
    }

    /// Candidates racing a player teardown are expected; an unknown player
    /// is not an error here.
    pub(crate) async fn handle_remote_ice_candidate(
        &self,
        player_id: &str,
        sdp_mid: &str,
        sdp_m_line_index: i32,
        sdp: &str,
    ) {
        let Some(link) = self.peer(player_id) else {
            debug!(%player_id, "ICE candidate for unknown player, ignoring");
            return;
        };
        if let Err(err) = link
            .add_remote_ice_candidate(sdp_mid, sdp_m_line_index, sdp)
            .await
        {
            error!(%player_id, error = %err, "Failed to add remote ICE candidate");
        }
    }

    pub(crate) async fn handle_player_connected(
        &self,
        player_id: &str,
        config: PlayerConfig,
        send_offer: bool,
    ) {
        let link = match self.create_peer(player_id, config) {
            Ok(link) => link,
            Err(err) => {
                error!(%player_id, error = %err, "Failed to create peer for player");
                return;
            }
        };
        if !self.registry.contains(player_id) {
            self.registry.add(player_id, "");
        }
        self.events.publish(StreamEvent::PlayerConnected {
            player_id: player_id.to_string(),
        });

        if send_offer {
            match link.create_offer().await {
                Ok(offer) => self.connection.send_offer(player_id, &offer),
                Err(err) => error!(%player_id, error = %err, "Failed to create offer"),
            }
        }
    }

    pub(crate) async fn handle_player_disconnected(&self, player_id: &str) {
        let meta_comm_id = self.registry.meta_comm_id(player_id);
        self.registry.remove(player_id);
        self.events.publish(StreamEvent::PlayerDisconnected {
            player_id: player_id.to_string(),
            meta_comm_id,
        });

        let entry = self.peers.lock().remove(player_id);
        if let Some(entry) = entry {
            entry.link.close().await;
        }
        self.sfu_channels.lock().remove(player_id);
        self.touch_cache.lock().remove_player(player_id);
        self.events.remove_player(player_id);
        info!(session_id = %self.info.session_id, %player_id, "Player disconnected");
    }

    /// The player is switching scenes; its peer link and event channels
    /// survive for the next session, only the identity mapping is dropped.
    pub(crate) async fn handle_player_going_away(&self, player_id: &str) {
        let meta_comm_id = self.registry.meta_comm_id(player_id);
        self.registry.remove(player_id);
        self.events.publish(StreamEvent::PlayerGoingAway {
            player_id: player_id.to_string(),
            meta_comm_id,
        });
        info!(session_id = %self.info.session_id, %player_id, "Player going away");
    }

    pub(crate) async fn handle_sfu_peer_data_channels(
        &self,
        sfu_id: &str,
        player_id: &str,
        send_stream_id: i32,
        recv_stream_id: i32,
    ) {
        let Some(link) = self.peer(sfu_id) else {
            error!(%sfu_id, %player_id, "Data channel request for unknown SFU peer");
            self.connection
                .send_data_channels_failed(player_id, send_stream_id, recv_stream_id);
            return;
        };
        match link.create_data_channels(send_stream_id, recv_stream_id).await {
            Ok(pair) => {
                debug!(%sfu_id, %player_id, send_stream_id, recv_stream_id,
                    "SFU data channels established");
                self.sfu_channels.lock().insert(player_id.to_string(), pair);
            }
            Err(err) => {
                error!(%sfu_id, %player_id, error = %err, "Failed to create SFU data channels");
                self.connection
                    .send_data_channels_failed(player_id, send_stream_id, recv_stream_id);
            }
        }
    }

    pub(crate) fn handle_sfu_connected(&self) {
        self.events.publish(StreamEvent::SfuConnected {
            session_id: self.info.session_id.clone(),
        });
    }

    pub(crate) fn handle_sfu_disconnected(&self) {
        self.events.publish(StreamEvent::SfuDisconnected {
            session_id: self.info.session_id.clone(),
        });
    }

    // ------------------------------------------------------------------
    // Input routing

    /// Route one binary input message from a player's data channel.
    /// Malformed payloads and unknown codes are logged and dropped.
    pub async fn handle_input_message(&self, player_id: &str, code: u8, payload: &[u8]) {
        let Some(kind) = InputMessageKind::from_code(code) else {
            debug!(%player_id, code, "Ignoring unknown input message code");
            return;
        };
        let result = match kind {
            InputMessageKind::UiInteraction => self.on_ui_interaction(player_id, payload),
            InputMessageKind::MouseDown => self.on_mouse_button(player_id, payload, true),
            InputMessageKind::MouseUp => self.on_mouse_button(player_id, payload, false),
            InputMessageKind::MouseMove => self.on_mouse_move(player_id, payload),
            InputMessageKind::TouchStart => self.on_touch_start(player_id, payload),
            InputMessageKind::TouchEnd => self.on_touch_end(player_id, payload),
            InputMessageKind::TouchMove => self.on_touch_move(player_id, payload),
            InputMessageKind::CameraSwitchResponse => self.on_camera_descriptor(player_id, payload),
            InputMessageKind::CameraSetRes => self.on_camera_descriptor(player_id, payload),
        };
        if let Err(err) = result {
            error!(%player_id, ?kind, error = %err, "Dropping input message");
        }
    }

    fn on_ui_interaction(&self, player_id: &str, payload: &[u8]) -> Result<()> {
        let descriptor = input::read_string_payload(payload)?;
        self.events.publish(StreamEvent::CustomInput {
            player_id: player_id.to_string(),
            descriptor,
        });
        Ok(())
    }

    fn on_mouse_button(&self, player_id: &str, payload: &[u8], down: bool) -> Result<()> {
        let msg = input::read_mouse_button(payload)?;
        let location = self.to_screen(Vec2::new(input::norm_u16(msg.x), input::norm_u16(msg.y)), true);
        let event = if self.use_mouse_for_touch {
            // Mouse acts as a single synthetic touch
            if down {
                StreamEvent::TouchStart {
                    player_id: player_id.to_string(),
                    location,
                    force: 0.0,
                    touch_index: 0,
                }
            } else {
                StreamEvent::TouchEnd {
                    player_id: player_id.to_string(),
                    location,
                    force: 0.0,
                    touch_index: 0,
                }
            }
        } else if down {
            StreamEvent::MouseDown {
                player_id: player_id.to_string(),
                button: msg.button,
                location,
            }
        } else {
            StreamEvent::MouseUp {
                player_id: player_id.to_string(),
                button: msg.button,
                location,
            }
        };
        self.events.publish(event);
        Ok(())
    }

    fn on_mouse_move(&self, player_id: &str, payload: &[u8]) -> Result<()> {
        let msg = input::read_mouse_move(payload)?;
        let location = self.to_screen(Vec2::new(input::norm_u16(msg.x), input::norm_u16(msg.y)), true);
        let event = if self.use_mouse_for_touch {
            StreamEvent::TouchMove {
                player_id: player_id.to_string(),
                location,
                force: 0.0,
                touch_index: 0,
            }
        } else {
            let delta = self.to_screen(
                Vec2::new(input::norm_i16(msg.delta_x), input::norm_i16(msg.delta_y)),
                false,
            );
            StreamEvent::MouseMove {
                player_id: player_id.to_string(),
                location,
                delta,
            }
        };
        self.events.publish(event);
        Ok(())
    }

    fn on_touch_start(&self, player_id: &str, payload: &[u8]) -> Result<()> {
        for touch in input::read_touch_batch(payload)? {
            if touch.valid == 0 {
                continue;
            }
            self.events.publish(StreamEvent::TouchStart {
                player_id: player_id.to_string(),
                location: self.to_screen(touch.location(), true),
                force: touch.normalized_force(),
                touch_index: touch.index,
            });
        }
        Ok(())
    }

    fn on_touch_move(&self, player_id: &str, payload: &[u8]) -> Result<()> {
        for touch in input::read_touch_batch(payload)? {
            if touch.valid == 0 {
                continue;
            }
            let location = self.to_screen(touch.location(), true);
            let force = touch.normalized_force();
            self.touch_cache
                .lock()
                .record_move(player_id, touch.index, location, force);
            self.events.publish(StreamEvent::TouchMove {
                player_id: player_id.to_string(),
                location,
                force,
                touch_index: touch.index,
            });
        }
        Ok(())
    }

    /// Touch ends fire regardless of the valid flag so no touch is ever
    /// left stuck down, and always with zero force.
    fn on_touch_end(&self, player_id: &str, payload: &[u8]) -> Result<()> {
        for touch in input::read_touch_batch(payload)? {
            self.events.publish(StreamEvent::TouchEnd {
                player_id: player_id.to_string(),
                location: self.to_screen(touch.location(), true),
                force: 0.0,
                touch_index: touch.index,
            });
            self.touch_cache.lock().end_touch(player_id, touch.index);
        }
        Ok(())
    }

    fn on_camera_descriptor(&self, player_id: &str, payload: &[u8]) -> Result<()> {
        let descriptor = input::read_string_payload(payload)?;
        let msg = match camera_switch::parse_camera_message(&descriptor) {
            Ok(msg) => msg,
            Err(AppError::Unsupported(what)) => {
                warn!(%player_id, %what, "Dropping camera descriptor");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        match msg {
            CameraMessage::CameraSwitchPrepareResponse(v) => {
                self.events.publish(StreamEvent::CameraSwitchPrepareResponse {
                    player_id: v.player_id,
                    scene_id: v.scene_id,
                    result: v.result,
                });
            }
            CameraMessage::CameraSwitchResponse(v) => {
                self.events.publish(StreamEvent::CameraSwitchResponse {
                    player_id: v.player_id,
                    scene_id: v.scene_id,
                    result: v.result,
                });
            }
            CameraMessage::CameraSwitchCancelResponse(v) => {
                self.events.publish(StreamEvent::CameraSwitchCancelResponse {
                    player_id: v.player_id,
                    scene_id: v.scene_id,
                    result: v.result,
                });
            }
            CameraMessage::CameraSelectRequest(req) => {
                // The only inbound path that learns a player's external id
                self.registry.add(&req.player_id, &req.meta_comm_id);
                self.events.publish(StreamEvent::CameraSelectRequest {
                    player_id: req.player_id,
                    meta_comm_id: req.meta_comm_id,
                    scene_id: req.scene_id,
                });
            }
            CameraMessage::CameraSetRes(res) => {
                self.events.publish(StreamEvent::CameraSetResolution {
                    player_id: player_id.to_string(),
                    width: res.width,
                    height: res.height,
                });
            }
            other => {
                warn!(%player_id, ?other, "Unexpected inbound camera descriptor");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Frame tick

    /// Reset the touch replay markers at the start of a host frame
    pub fn begin_input_frame(&self) {
        self.touch_cache.lock().begin_frame();
    }

    /// Replay cached touch moves for players that sent nothing this frame
    pub fn flush_touch_moves(&self) {
        let stale = self.touch_cache.lock().stale_touches();
        for (player_id, touch_index, touch) in stale {
            self.events.publish(StreamEvent::TouchMove {
                player_id,
                location: touch.location,
                force: touch.force,
                touch_index,
            });
        }
    }

    // ------------------------------------------------------------------
    // Outbound player messaging

    /// Send a typed message over a player's data channel. The "-1"
    /// sentinel broadcasts to every connected peer.
    pub async fn send_player_message(
        &self,
        player_id: &str,
        message_type: u8,
        descriptor: &str,
    ) -> Result<()> {
        if player_id == PLAYER_ID_NONE {
            let links: Vec<(String, Arc<dyn PeerLink>)> = self
                .peers
                .lock()
                .iter()
                .map(|(id, entry)| (id.clone(), entry.link.clone()))
                .collect();
            for (id, link) in links {
                if let Err(err) = link.send_message(message_type, descriptor).await {
                    warn!(player_id = %id, error = %err, "Failed to send player message");
                }
            }
            return Ok(());
        }
        let link = self
            .peer(player_id)
            .ok_or_else(|| AppError::NotFound(format!("player `{}`", player_id)))?;
        link.send_message(message_type, descriptor).await
    }

    /// Free-form message to a player over the custom channel
    pub async fn send_custom_message(&self, player_id: &str, descriptor: &str) -> Result<()> {
        self.send_player_message(player_id, input::TO_PLAYER_CUSTOM, descriptor)
            .await
    }

    pub async fn send_camera_switch_prepare(&self, player_id: &str, scene_id: &str) -> Result<()> {
        self.send_camera_message(player_id, &camera_switch::prepare_request(scene_id))
            .await
    }

    pub async fn send_camera_switch(&self, player_id: &str, scene_id: &str) -> Result<()> {
        self.send_camera_message(player_id, &camera_switch::switch_request(scene_id))
            .await
    }

    pub async fn send_camera_switch_cancel(&self, player_id: &str, scene_id: &str) -> Result<()> {
        self.send_camera_message(player_id, &camera_switch::cancel_request(scene_id))
            .await
    }

    async fn send_camera_message(&self, player_id: &str, msg: &CameraMessage) -> Result<()> {
        let descriptor = msg.to_json()?;
        debug!(%player_id, %descriptor, "Sending camera switch message");
        self.send_player_message(player_id, input::TO_PLAYER_CAMERA_SWITCH_REQUEST, &descriptor)
            .await
    }

    /// Ask the signalling server to drop a scene
    pub fn disconnect_scene(&self, scene_id: &str, reason: &str) {
        self.connection.send_disconnect_scene(scene_id, reason);
    }

    /// Forward a locally gathered ICE candidate for a player
    pub fn send_local_ice_candidate(
        &self,
        player_id: &str,
        candidate: &str,
        sdp_mid: &str,
        sdp_m_line_index: i32,
    ) {
        self.connection
            .send_ice_candidate(player_id, candidate, sdp_mid, sdp_m_line_index);
    }

    // ------------------------------------------------------------------

    fn peer(&self, player_id: &str) -> Option<Arc<dyn PeerLink>> {
        self.peers.lock().get(player_id).map(|entry| entry.link.clone())
    }

    fn create_peer(&self, player_id: &str, config: PlayerConfig) -> Result<Arc<dyn PeerLink>> {
        let link = self.peer_factory.create_peer(player_id, &config)?;
        let mut peers = self.peers.lock();
        if peers.contains_key(player_id) {
            info!(%player_id, "Replacing existing peer link");
        }
        peers.insert(
            player_id.to_string(),
            PeerEntry {
                link: link.clone(),
                config,
            },
        );
        Ok(link)
    }

    fn to_screen(&self, normalized: Vec2, include_offset: bool) -> Vec2 {
        input::convert_from_normalized(self.target_rect.read().as_ref(), normalized, include_offset)
    }
}
