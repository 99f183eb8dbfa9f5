//! Signalling wire protocol
//!
//! JSON messages exchanged with the signalling server over WebSocket text
//! frames. Every message carries a `type` field; the remaining field names
//! are normative for compatibility with the existing browser client, so the
//! serde renames here must not change.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// SDP payload kind, dispatched from the wire `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
    PrAnswer,
    Rollback,
}

impl std::fmt::Display for SdpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offer => write!(f, "offer"),
            Self::Answer => write!(f, "answer"),
            Self::PrAnswer => write!(f, "pranswer"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// ICE candidate payload as carried inside `iceCandidate` messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    pub candidate: String,
    pub sdp_mid: String,
    pub sdp_m_line_index: i32,
}

/// Signalling messages, inbound and outbound
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SignallingMessage {
    /// Server asks this endpoint to identify itself
    #[serde(rename = "identify")]
    Identify,

    /// Identification response carrying the session identity
    #[serde(rename = "endpointId", rename_all = "camelCase")]
    EndpointId {
        id: String,
        player_id: String,
        camera_mode: String,
    },

    /// A player joined this session's scene
    #[serde(rename = "playerConnected", rename_all = "camelCase")]
    PlayerConnected {
        player_id: String,
        #[serde(default = "default_true")]
        data_channel: bool,
        #[serde(default)]
        sfu: bool,
        #[serde(default)]
        send_offer: bool,
    },

    /// A player left for good
    #[serde(rename = "playerDisconnected", rename_all = "camelCase")]
    PlayerDisconnected { player_id: String },

    /// A player is leaving transiently (e.g. scene handoff)
    #[serde(rename = "playerGoingAway", rename_all = "camelCase")]
    PlayerGoingAway { player_id: String },

    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer { player_id: String, sdp: String },

    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer { player_id: String, sdp: String },

    #[serde(rename = "pranswer", rename_all = "camelCase")]
    PrAnswer { player_id: String, sdp: String },

    /// Unsupported; accepted so it can be rejected gracefully
    #[serde(rename = "rollback", rename_all = "camelCase")]
    Rollback {
        player_id: String,
        #[serde(default)]
        sdp: String,
    },

    #[serde(rename = "iceCandidate", rename_all = "camelCase")]
    IceCandidate {
        player_id: String,
        candidate: IceCandidateInit,
    },

    #[serde(rename = "sfuConnected")]
    SfuConnected,

    #[serde(rename = "sfuDisconnected")]
    SfuDisconnected,

    /// SFU negotiated per-viewer data channel stream ids
    #[serde(rename = "streamerDataChannels", rename_all = "camelCase")]
    StreamerDataChannels {
        sfu_id: String,
        player_id: String,
        send_stream_id: i32,
        recv_stream_id: i32,
    },

    /// Ask the server to disconnect every player on a scene
    #[serde(rename = "disconnectScene", rename_all = "camelCase")]
    DisconnectScene { scene_id: String, reason: String },

    /// Report a failed data channel construction so the remote can retry
    #[serde(rename = "streamerDataChannelsFailed", rename_all = "camelCase")]
    StreamerDataChannelsFailed {
        player_id: String,
        send_stream_id: i32,
        recv_stream_id: i32,
    },
}

fn default_true() -> bool {
    true
}

impl SignallingMessage {
    /// Serialize for the wire
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse an inbound text frame.
///
/// Distinguishes an unknown message type (forward-compatible, dropped by the
/// caller at debug level) from a malformed payload on a known type.
pub fn parse_message(text: &str) -> Result<SignallingMessage> {
    match serde_json::from_str::<SignallingMessage>(text) {
        Ok(msg) => Ok(msg),
        Err(err) => {
            let value: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| AppError::Protocol(format!("invalid JSON: {}", e)))?;
            match value.get("type").and_then(|t| t.as_str()) {
                Some(kind) if !known_type(kind) => {
                    Err(AppError::Unsupported(format!("unknown message type `{}`", kind)))
                }
                Some(kind) => Err(AppError::Protocol(format!(
                    "malformed `{}` message: {}",
                    kind, err
                ))),
                None => Err(AppError::Protocol("message has no `type` field".to_string())),
            }
        }
    }
}

fn known_type(kind: &str) -> bool {
    matches!(
        kind,
        "identify"
            | "endpointId"
            | "playerConnected"
            | "playerDisconnected"
            | "playerGoingAway"
            | "offer"
            | "answer"
            | "pranswer"
            | "rollback"
            | "iceCandidate"
            | "sfuConnected"
            | "sfuDisconnected"
            | "streamerDataChannels"
            | "disconnectScene"
            | "streamerDataChannelsFailed"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_connected_defaults() {
        let msg = parse_message(r#"{"type":"playerConnected","playerId":"p1"}"#).unwrap();
        assert_eq!(
            msg,
            SignallingMessage::PlayerConnected {
                player_id: "p1".to_string(),
                data_channel: true,
                sfu: false,
                send_offer: false,
            }
        );
    }

    #[test]
    fn test_player_connected_explicit_fields() {
        let msg = parse_message(
            r#"{"type":"playerConnected","playerId":"p2","dataChannel":false,"sfu":true,"sendOffer":true}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            SignallingMessage::PlayerConnected {
                player_id: "p2".to_string(),
                data_channel: false,
                sfu: true,
                send_offer: true,
            }
        );
    }

    #[test]
    fn test_missing_player_id_is_protocol_error() {
        let err = parse_message(r#"{"type":"playerGoingAway"}"#).unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let err = parse_message(r#"{"type":"ping","payload":1}"#).unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_)));
    }

    #[test]
    fn test_invalid_json_is_protocol_error() {
        let err = parse_message("{nope").unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
    }

    #[test]
    fn test_offer_wire_field_names() {
        let json = SignallingMessage::Offer {
            player_id: "p1".to_string(),
            sdp: "v=0".to_string(),
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "offer");
        assert_eq!(value["playerId"], "p1");
        assert_eq!(value["sdp"], "v=0");
    }

    #[test]
    fn test_endpoint_id_wire_field_names() {
        let json = SignallingMessage::EndpointId {
            id: "scene0".to_string(),
            player_id: "owner".to_string(),
            camera_mode: "free".to_string(),
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "endpointId");
        assert_eq!(value["id"], "scene0");
        assert_eq!(value["playerId"], "owner");
        assert_eq!(value["cameraMode"], "free");
    }

    #[test]
    fn test_data_channels_failed_wire_field_names() {
        let json = SignallingMessage::StreamerDataChannelsFailed {
            player_id: "p1".to_string(),
            send_stream_id: 10,
            recv_stream_id: 11,
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "streamerDataChannelsFailed");
        assert_eq!(value["playerId"], "p1");
        assert_eq!(value["sendStreamId"], 10);
        assert_eq!(value["recvStreamId"], 11);
    }

    #[test]
    fn test_ice_candidate_field_names() {
        let msg = parse_message(
            r#"{"type":"iceCandidate","playerId":"p1","candidate":{"candidate":"candidate:1","sdpMid":"0","sdpMLineIndex":0}}"#,
        )
        .unwrap();
        match msg {
            SignallingMessage::IceCandidate { player_id, candidate } => {
                assert_eq!(player_id, "p1");
                assert_eq!(candidate.sdp_mid, "0");
                assert_eq!(candidate.sdp_m_line_index, 0);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_disconnect_scene_round_trip() {
        let msg = SignallingMessage::DisconnectScene {
            scene_id: "scene3".to_string(),
            reason: "handoff".to_string(),
        };
        let parsed = parse_message(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }
}
