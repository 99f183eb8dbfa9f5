//! Signalling layer
//!
//! - `protocol`: JSON wire messages and parsing
//! - `connection`: WebSocket client with auto-reconnect and serialized sends
//! - `observer`: inbound event routing to the owning session

pub mod connection;
pub mod observer;
pub mod protocol;

pub use connection::{ConnectionStatus, SignallingConnection};
pub use observer::{SessionObserver, SignallingObserver};
pub use protocol::{IceCandidateInit, SdpKind, SignallingMessage};
