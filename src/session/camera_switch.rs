//! Camera switch handshake descriptors
//!
//! Camera changes ride the per-player data channel as JSON descriptors,
//! not signalling messages. The host asks a player to prepare, commit or
//! cancel a switch to a scene; the player answers with a result for each
//! step. A player can also push a select request naming the scene it wants
//! together with its external communication id.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Scene addressed by an outbound switch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRef {
    pub scene_id: String,
}

/// Player's verdict for one handshake step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchVerdict {
    pub player_id: String,
    pub scene_id: String,
    pub result: bool,
}

/// Player-initiated scene selection, carrying its external comm id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub player_id: String,
    pub meta_comm_id: String,
    pub scene_id: String,
}

/// Requested capture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub width: u32,
    pub height: u32,
}

/// Camera control descriptor envelope, `{"type": ..., "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum CameraMessage {
    CameraSwitchPrepareRequest(SceneRef),
    CameraSwitchRequest(SceneRef),
    CameraSwitchCancelRequest(SceneRef),
    CameraSwitchPrepareResponse(SwitchVerdict),
    CameraSwitchResponse(SwitchVerdict),
    CameraSwitchCancelResponse(SwitchVerdict),
    CameraSelectRequest(SelectRequest),
    CameraSetRes(ResolutionRequest),
}

impl CameraMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn prepare_request(scene_id: &str) -> CameraMessage {
    CameraMessage::CameraSwitchPrepareRequest(SceneRef {
        scene_id: scene_id.to_string(),
    })
}

pub fn switch_request(scene_id: &str) -> CameraMessage {
    CameraMessage::CameraSwitchRequest(SceneRef {
        scene_id: scene_id.to_string(),
    })
}

pub fn cancel_request(scene_id: &str) -> CameraMessage {
    CameraMessage::CameraSwitchCancelRequest(SceneRef {
        scene_id: scene_id.to_string(),
    })
}

/// Parse a camera control descriptor. A known type with a malformed body
/// is a protocol error; an unknown type is reported as unsupported so the
/// caller can drop it quietly.
pub fn parse_camera_message(descriptor: &str) -> Result<CameraMessage> {
    match serde_json::from_str::<CameraMessage>(descriptor) {
        Ok(msg) => Ok(msg),
        Err(err) => {
            let value: serde_json::Value = serde_json::from_str(descriptor)
                .map_err(|_| AppError::Protocol(format!("invalid descriptor json: {}", err)))?;
            match value.get("type").and_then(|t| t.as_str()) {
                Some(kind) if !known_type(kind) => {
                    Err(AppError::Unsupported(format!("descriptor type `{}`", kind)))
                }
                Some(kind) => Err(AppError::Protocol(format!(
                    "malformed `{}` descriptor: {}",
                    kind, err
                ))),
                None => Err(AppError::Protocol(
                    "descriptor without a type field".to_string(),
                )),
            }
        }
    }
}

fn known_type(kind: &str) -> bool {
    matches!(
        kind,
        "cameraSwitchPrepareRequest"
            | "cameraSwitchRequest"
            | "cameraSwitchCancelRequest"
            | "cameraSwitchPrepareResponse"
            | "cameraSwitchResponse"
            | "cameraSwitchCancelResponse"
            | "cameraSelectRequest"
            | "cameraSetRes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_request_wire_shape() {
        let json = prepare_request("scene-2").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "cameraSwitchPrepareRequest");
        assert_eq!(value["data"]["sceneId"], "scene-2");

        let json = switch_request("scene-2").to_json().unwrap();
        assert!(json.contains("\"cameraSwitchRequest\""));
        let json = cancel_request("scene-2").to_json().unwrap();
        assert!(json.contains("\"cameraSwitchCancelRequest\""));
    }

    #[test]
    fn test_parse_switch_verdicts() {
        let msg = parse_camera_message(
            r#"{"type":"cameraSwitchResponse","data":{"playerId":"p1","sceneId":"s1","result":true}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            CameraMessage::CameraSwitchResponse(SwitchVerdict {
                player_id: "p1".to_string(),
                scene_id: "s1".to_string(),
                result: true,
            })
        );

        let msg = parse_camera_message(
            r#"{"type":"cameraSwitchCancelResponse","data":{"playerId":"p1","sceneId":"s1","result":false}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            CameraMessage::CameraSwitchCancelResponse(v) if !v.result
        ));
    }

    #[test]
    fn test_parse_select_request() {
        let msg = parse_camera_message(
            r#"{"type":"cameraSelectRequest","data":{"playerId":"p1","metaCommId":"mc-7","sceneId":"s3"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            CameraMessage::CameraSelectRequest(SelectRequest {
                player_id: "p1".to_string(),
                meta_comm_id: "mc-7".to_string(),
                scene_id: "s3".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_set_res() {
        let msg =
            parse_camera_message(r#"{"type":"cameraSetRes","data":{"width":1920,"height":1080}}"#)
                .unwrap();
        assert_eq!(
            msg,
            CameraMessage::CameraSetRes(ResolutionRequest {
                width: 1920,
                height: 1080,
            })
        );
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let err = parse_camera_message(r#"{"type":"cameraZoomRequest","data":{}}"#).unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_)));
    }

    #[test]
    fn test_malformed_known_type_is_protocol_error() {
        let err =
            parse_camera_message(r#"{"type":"cameraSwitchResponse","data":{"playerId":"p1"}}"#)
                .unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
        let err = parse_camera_message("not json").unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
        let err = parse_camera_message(r#"{"data":{}}"#).unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
    }
}
