//! Event types broadcast by streaming sessions

/// 2D location in screen space.
///
/// When a session has a target screen rect the coordinates are pixels;
/// without one they are the raw normalized values from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Events published by streaming sessions for downstream input consumers.
///
/// Touch force is normalized to [0,1]; mouse buttons keep their wire code.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A touch began
    TouchStart {
        player_id: String,
        location: Vec2,
        force: f32,
        touch_index: u8,
    },
    /// A touch moved
    TouchMove {
        player_id: String,
        location: Vec2,
        force: f32,
        touch_index: u8,
    },
    /// A touch ended
    TouchEnd {
        player_id: String,
        location: Vec2,
        force: f32,
        touch_index: u8,
    },
    /// Mouse button pressed
    MouseDown {
        player_id: String,
        button: u8,
        location: Vec2,
    },
    /// Mouse button released
    MouseUp {
        player_id: String,
        button: u8,
        location: Vec2,
    },
    /// Mouse moved
    MouseMove {
        player_id: String,
        location: Vec2,
        delta: Vec2,
    },
    /// Free-form UI interaction descriptor from a player
    CustomInput {
        player_id: String,
        descriptor: String,
    },
    /// Camera switch prepare handshake completed
    CameraSwitchPrepareResponse {
        player_id: String,
        scene_id: String,
        result: bool,
    },
    /// Camera switch commit handshake completed
    CameraSwitchResponse {
        player_id: String,
        scene_id: String,
        result: bool,
    },
    /// Camera switch cancel handshake completed
    CameraSwitchCancelResponse {
        player_id: String,
        scene_id: String,
        result: bool,
    },
    /// A player asked to be routed to a scene, carrying its external identity
    CameraSelectRequest {
        player_id: String,
        meta_comm_id: String,
        scene_id: String,
    },
    /// A player requested a capture resolution change
    CameraSetResolution {
        player_id: String,
        width: u32,
        height: u32,
    },
    /// A player connected to a session
    PlayerConnected { player_id: String },
    /// A player disconnected; carries the external identity it had, if any
    PlayerDisconnected {
        player_id: String,
        meta_comm_id: String,
    },
    /// A player is going away (e.g. scene switch); per-player state survives
    PlayerGoingAway {
        player_id: String,
        meta_comm_id: String,
    },
    /// The session connected to signalling and streaming may begin
    StreamingStarted { session_id: String },
    /// SFU link established for the session
    SfuConnected { session_id: String },
    /// SFU link lost for the session
    SfuDisconnected { session_id: String },
}

impl StreamEvent {
    /// The player this event belongs to, when it is player-scoped.
    pub fn player_id(&self) -> Option<&str> {
        match self {
            Self::TouchStart { player_id, .. }
            | Self::TouchMove { player_id, .. }
            | Self::TouchEnd { player_id, .. }
            | Self::MouseDown { player_id, .. }
            | Self::MouseUp { player_id, .. }
            | Self::MouseMove { player_id, .. }
            | Self::CustomInput { player_id, .. }
            | Self::CameraSwitchPrepareResponse { player_id, .. }
            | Self::CameraSwitchResponse { player_id, .. }
            | Self::CameraSwitchCancelResponse { player_id, .. }
            | Self::CameraSelectRequest { player_id, .. }
            | Self::CameraSetResolution { player_id, .. }
            | Self::PlayerConnected { player_id }
            | Self::PlayerDisconnected { player_id, .. }
            | Self::PlayerGoingAway { player_id, .. } => Some(player_id),
            Self::StreamingStarted { .. }
            | Self::SfuConnected { .. }
            | Self::SfuDisconnected { .. } => None,
        }
    }
}
