//! Binary input message decoding
//!
//! Input payloads arrive over per-player data channels as fixed-layout
//! little-endian structures, preceded by a one-byte message code. The codes
//! and layouts are shared with the browser-side encoder and must not
//! change. Every read is length-checked; a short payload is rejected with
//! a protocol error instead of reading out of bounds.

use bytes::Buf;

use crate::error::{AppError, Result};
use crate::events::Vec2;

/// Wire codes for inbound player messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InputMessageKind {
    /// Free-form UI interaction descriptor (JSON string)
    UiInteraction = 50,
    MouseDown = 72,
    MouseUp = 73,
    MouseMove = 74,
    TouchStart = 80,
    TouchEnd = 81,
    TouchMove = 82,
    /// Camera switch sub-protocol body (JSON string)
    CameraSwitchResponse = 101,
    /// Capture resolution change request (JSON string)
    CameraSetRes = 105,
}

/// Wire code for outbound free-form messages to a player
pub const TO_PLAYER_CUSTOM: u8 = 128;

/// Wire code for outbound camera switch requests to a player
pub const TO_PLAYER_CAMERA_SWITCH_REQUEST: u8 = 129;

impl InputMessageKind {
    /// Map a wire code to a message kind. Unknown codes return `None` and
    /// are dropped by the dispatcher.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            50 => Some(Self::UiInteraction),
            72 => Some(Self::MouseDown),
            73 => Some(Self::MouseUp),
            74 => Some(Self::MouseMove),
            80 => Some(Self::TouchStart),
            81 => Some(Self::TouchEnd),
            82 => Some(Self::TouchMove),
            101 => Some(Self::CameraSwitchResponse),
            105 => Some(Self::CameraSetRes),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One record of a touch batch: x, y normalized to u16 range, `valid=0`
/// marks a touch outside the capture region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchRecord {
    pub x: u16,
    pub y: u16,
    pub index: u8,
    pub force: u8,
    pub valid: u8,
}

impl TouchRecord {
    /// Normalized location in [0,1]
    pub fn location(&self) -> Vec2 {
        Vec2::new(norm_u16(self.x), norm_u16(self.y))
    }

    /// Force normalized to [0,1]
    pub fn normalized_force(&self) -> f32 {
        f32::from(self.force) / 255.0
    }
}

/// Mouse button payload: button code plus normalized position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseButtonPayload {
    pub button: u8,
    pub x: u16,
    pub y: u16,
}

/// Mouse move payload: normalized position plus signed normalized delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseMovePayload {
    pub x: u16,
    pub y: u16,
    pub delta_x: i16,
    pub delta_y: i16,
}

const TOUCH_RECORD_LEN: usize = 7;

fn short_payload(kind: &str, expected: usize, got: usize) -> AppError {
    AppError::Protocol(format!(
        "short `{}` payload: expected {} bytes, got {}",
        kind, expected, got
    ))
}

/// Decode a mouse up/down payload (u8 button, u16 x, u16 y)
pub fn read_mouse_button(mut payload: &[u8]) -> Result<MouseButtonPayload> {
    if payload.len() < 5 {
        return Err(short_payload("mouse button", 5, payload.len()));
    }
    Ok(MouseButtonPayload {
        button: payload.get_u8(),
        x: payload.get_u16_le(),
        y: payload.get_u16_le(),
    })
}

/// Decode a mouse move payload (u16 x, u16 y, i16 dx, i16 dy)
pub fn read_mouse_move(mut payload: &[u8]) -> Result<MouseMovePayload> {
    if payload.len() < 8 {
        return Err(short_payload("mouse move", 8, payload.len()));
    }
    Ok(MouseMovePayload {
        x: payload.get_u16_le(),
        y: payload.get_u16_le(),
        delta_x: payload.get_i16_le(),
        delta_y: payload.get_i16_le(),
    })
}

/// Decode a touch batch (u8 count, then count records of u16 x, u16 y,
/// u8 index, u8 force, u8 valid). The declared count is validated against
/// the actual payload length.
pub fn read_touch_batch(mut payload: &[u8]) -> Result<Vec<TouchRecord>> {
    if payload.is_empty() {
        return Err(short_payload("touch batch", 1, 0));
    }
    let count = payload.get_u8() as usize;
    let expected = count * TOUCH_RECORD_LEN;
    if payload.remaining() < expected {
        return Err(short_payload("touch batch", 1 + expected, 1 + payload.remaining()));
    }

    let mut touches = Vec::with_capacity(count);
    for _ in 0..count {
        touches.push(TouchRecord {
            x: payload.get_u16_le(),
            y: payload.get_u16_le(),
            index: payload.get_u8(),
            force: payload.get_u8(),
            valid: payload.get_u8(),
        });
    }
    Ok(touches)
}

/// Decode a string payload (UTF-16LE code units; the leading unit is the
/// descriptor length marker from the client encoder and is skipped).
pub fn read_string_payload(payload: &[u8]) -> Result<String> {
    if payload.len() < 2 || payload.len() % 2 != 0 {
        return Err(AppError::Protocol(format!(
            "string payload has invalid length {}",
            payload.len()
        )));
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .skip(1)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

/// Normalize a u16 position component to [0,1]
pub fn norm_u16(value: u16) -> f32 {
    f32::from(value) / f32::from(u16::MAX)
}

/// Normalize an i16 delta component to [-1,1]
pub fn norm_i16(value: i16) -> f32 {
    f32::from(value) / f32::from(i16::MAX)
}

/// Target screen rectangle in pixels, min inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub min: (i32, i32),
    pub max: (i32, i32),
}

impl ScreenRect {
    pub fn new(min: (i32, i32), max: (i32, i32)) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> (i32, i32) {
        (self.max.0 - self.min.0, self.max.1 - self.min.1)
    }
}

/// Map a normalized location into the target rect, truncating to whole
/// pixels. Without a rect the normalized value passes through unscaled.
pub fn convert_from_normalized(
    rect: Option<&ScreenRect>,
    location: Vec2,
    include_offset: bool,
) -> Vec2 {
    match rect {
        Some(rect) => {
            let (width, height) = rect.size();
            let (off_x, off_y) = if include_offset {
                (rect.min.0 as f32, rect.min.1 as f32)
            } else {
                (0.0, 0.0)
            };
            Vec2::new(
                (width as f32 * location.x + off_x).trunc(),
                (height as f32 * location.y + off_y).trunc(),
            )
        }
        None => location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_bytes(records: &[(u16, u16, u8, u8, u8)]) -> Vec<u8> {
        let mut bytes = vec![records.len() as u8];
        for &(x, y, index, force, valid) in records {
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
            bytes.push(index);
            bytes.push(force);
            bytes.push(valid);
        }
        bytes
    }

    #[test]
    fn test_kind_round_trip() {
        for code in 0..=u8::MAX {
            if let Some(kind) = InputMessageKind::from_code(code) {
                assert_eq!(kind.code(), code);
            }
        }
        assert_eq!(InputMessageKind::from_code(82), Some(InputMessageKind::TouchMove));
        assert_eq!(InputMessageKind::from_code(99), None);
    }

    #[test]
    fn test_read_touch_batch() {
        let bytes = touch_bytes(&[(100, 200, 0, 50, 1), (300, 400, 1, 0, 0)]);
        let touches = read_touch_batch(&bytes).unwrap();
        assert_eq!(touches.len(), 2);
        assert_eq!(
            touches[0],
            TouchRecord {
                x: 100,
                y: 200,
                index: 0,
                force: 50,
                valid: 1
            }
        );
        assert_eq!(touches[1].valid, 0);
    }

    #[test]
    fn test_touch_batch_length_validated_against_count() {
        let mut bytes = touch_bytes(&[(100, 200, 0, 50, 1)]);
        bytes[0] = 3; // claims three records, carries one
        assert!(matches!(
            read_touch_batch(&bytes),
            Err(AppError::Protocol(_))
        ));
        assert!(matches!(read_touch_batch(&[]), Err(AppError::Protocol(_))));
    }

    #[test]
    fn test_read_mouse_payloads() {
        let mut bytes = vec![2u8];
        bytes.extend_from_slice(&1000u16.to_le_bytes());
        bytes.extend_from_slice(&2000u16.to_le_bytes());
        let payload = read_mouse_button(&bytes).unwrap();
        assert_eq!(payload.button, 2);
        assert_eq!(payload.x, 1000);
        assert_eq!(payload.y, 2000);
        assert!(read_mouse_button(&bytes[..3]).is_err());

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&500u16.to_le_bytes());
        bytes.extend_from_slice(&600u16.to_le_bytes());
        bytes.extend_from_slice(&(-100i16).to_le_bytes());
        bytes.extend_from_slice(&100i16.to_le_bytes());
        let payload = read_mouse_move(&bytes).unwrap();
        assert_eq!(payload.delta_x, -100);
        assert_eq!(payload.delta_y, 100);
        assert!(read_mouse_move(&bytes[..7]).is_err());
    }

    #[test]
    fn test_read_string_payload_skips_length_marker() {
        let text = "{\"type\":\"x\"}";
        let mut bytes = vec![0u8, 0u8];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(read_string_payload(&bytes).unwrap(), text);
        assert!(read_string_payload(&bytes[..3]).is_err());
        assert!(read_string_payload(&[]).is_err());
    }

    #[test]
    fn test_convert_midpoint_maps_to_screen_center() {
        let rect = ScreenRect::new((0, 0), (1920, 1080));
        let loc = Vec2::new(norm_u16(32768), norm_u16(32768));
        let converted = convert_from_normalized(Some(&rect), loc, false);
        assert!((converted.x - 960.0).abs() <= 1.0);
        assert!((converted.y - 540.0).abs() <= 1.0);
    }

    #[test]
    fn test_convert_applies_offset_when_requested() {
        let rect = ScreenRect::new((100, 50), (1380, 770));
        let loc = Vec2::new(0.0, 0.0);
        assert_eq!(
            convert_from_normalized(Some(&rect), loc, true),
            Vec2::new(100.0, 50.0)
        );
        assert_eq!(
            convert_from_normalized(Some(&rect), loc, false),
            Vec2::new(0.0, 0.0)
        );
    }

    #[test]
    fn test_convert_without_rect_passes_through() {
        let loc = Vec2::new(0.25, 0.75);
        assert_eq!(convert_from_normalized(None, loc, true), loc);
    }

    #[test]
    fn test_norm_ranges() {
        assert_eq!(norm_u16(0), 0.0);
        assert_eq!(norm_u16(u16::MAX), 1.0);
        assert_eq!(norm_i16(i16::MAX), 1.0);
        assert!((norm_i16(i16::MIN) + 1.0).abs() < 0.001);
    }
}
