use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Data channel failed [player {player_id}]: send={send_stream_id} recv={recv_stream_id}")]
    DataChannel {
        player_id: String,
        send_stream_id: i32,
        recv_stream_id: i32,
    },
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, AppError>;
