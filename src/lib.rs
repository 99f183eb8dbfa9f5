//! scenecast - multi-scene streaming session router
//!
//! This crate provides the signalling-session and player-routing core for
//! a multi-scene pixel streaming host: per-scene streaming sessions, a
//! player identity registry, binary input decoding, and the camera switch
//! handshake.

pub mod config;
pub mod error;
pub mod events;
pub mod peer;
pub mod players;
pub mod session;
pub mod signalling;

pub use error::{AppError, Result};
