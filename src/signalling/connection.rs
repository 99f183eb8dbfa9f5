//! Signalling server connection
//!
//! Owns one WebSocket connection to the signalling endpoint. Inbound text
//! frames are parsed and routed to the [`SignallingObserver`]; outbound
//! sends are serialized through a single writer so callers never block on
//! I/O. A transport-level drop is reported to the observer and, when
//! auto-reconnect is enabled, followed by a fresh connection attempt after
//! a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::peer::PlayerConfig;
use crate::session::StreamerSessionInfo;
use crate::signalling::observer::SignallingObserver;
use crate::signalling::protocol::{parse_message, SdpKind, SignallingMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Why the driver loop gave the socket up
enum DropReason {
    Closed(Option<u16>, String),
    Error(String),
    Shutdown,
}

/// Client connection to the signalling server
pub struct SignallingConnection {
    url: String,
    info: Arc<StreamerSessionInfo>,
    auto_reconnect: bool,
    reconnect_delay: Duration,
    status: RwLock<ConnectionStatus>,
    out_tx: mpsc::UnboundedSender<String>,
    out_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SignallingConnection {
    /// Create a connection for one session endpoint. No I/O happens until
    /// [`connect`](Self::connect).
    pub fn new(
        url: String,
        info: Arc<StreamerSessionInfo>,
        auto_reconnect: bool,
        reconnect_delay: Duration,
    ) -> Arc<Self> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            url,
            info,
            auto_reconnect,
            reconnect_delay,
            status: RwLock::new(ConnectionStatus::Disconnected),
            out_tx,
            out_rx: Mutex::new(Some(out_rx)),
            shutdown_tx,
            task: Mutex::new(None),
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Start the connection driver. Repeat calls while a driver is live are
    /// logged no-ops.
    pub fn connect(self: &Arc<Self>, observer: Arc<dyn SignallingObserver>) {
        let Some(out_rx) = self.out_rx.lock().take() else {
            info!(url = %self.url, "Already connected to signalling server");
            return;
        };
        *self.status.write() = ConnectionStatus::Connecting;

        let this = self.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            this.run(observer, out_rx, shutdown_rx).await;
        });
        *self.task.lock() = Some(handle);
    }

    /// Stop the driver and mark the connection disconnected. Safe to call
    /// repeatedly and while callbacks are in flight.
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        *self.status.write() = ConnectionStatus::Disconnected;
    }

    async fn run(
        self: Arc<Self>,
        observer: Arc<dyn SignallingObserver>,
        mut out_rx: mpsc::UnboundedReceiver<String>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((ws, _response)) => {
                    info!(url = %self.url, "Connected to signalling server");
                    *self.status.write() = ConnectionStatus::Connected;
                    observer.on_connected().await;

                    let reason = self
                        .drive(ws, &observer, &mut out_rx, &mut shutdown_rx)
                        .await;
                    *self.status.write() = ConnectionStatus::Disconnected;

                    match reason {
                        DropReason::Closed(code, why) => {
                            warn!(?code, reason = %why, "Signalling connection closed");
                            observer.on_disconnected(code, why).await;
                        }
                        DropReason::Error(msg) => {
                            error!(error = %msg, "Signalling connection error");
                            observer.on_error(msg).await;
                        }
                        DropReason::Shutdown => break,
                    }
                }
                Err(err) => {
                    error!(url = %self.url, error = %err, "Failed to connect to signalling server");
                    observer.on_error(err.to_string()).await;
                }
            }

            if !self.auto_reconnect {
                break;
            }
            *self.status.write() = ConnectionStatus::Connecting;
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown_rx.recv() => break,
            }
        }

        // Hand the receiver back so a later connect() can restart the driver.
        *self.out_rx.lock() = Some(out_rx);
        *self.status.write() = ConnectionStatus::Disconnected;
    }

    async fn drive(
        &self,
        mut ws: WsStream,
        observer: &Arc<dyn SignallingObserver>,
        out_rx: &mut mpsc::UnboundedReceiver<String>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> DropReason {
        loop {
            tokio::select! {
                outbound = out_rx.recv() => {
                    match outbound {
                        Some(text) => {
                            if let Err(err) = ws.send(Message::Text(text)).await {
                                return DropReason::Error(err.to_string());
                            }
                        }
                        None => return DropReason::Shutdown,
                    }
                }
                inbound = ws.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            self.dispatch(&text, observer).await;
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                                .unwrap_or((None, String::new()));
                            return DropReason::Closed(code, reason);
                        }
                        Some(Ok(_)) => {
                            debug!("Ignoring non-text signalling frame");
                        }
                        Some(Err(err)) => return DropReason::Error(err.to_string()),
                        None => return DropReason::Closed(None, "stream ended".to_string()),
                    }
                }
                _ = shutdown_rx.recv() => {
                    let _ = ws.send(Message::Close(None)).await;
                    return DropReason::Shutdown;
                }
            }
        }
    }

    /// Route one inbound message. A single malformed message never tears
    /// the connection down.
    async fn dispatch(&self, text: &str, observer: &Arc<dyn SignallingObserver>) {
        let msg = match parse_message(text) {
            Ok(msg) => msg,
            Err(AppError::Unsupported(what)) => {
                debug!(%what, "Dropping signalling message");
                return;
            }
            Err(err) => {
                error!(error = %err, raw = text, "Dropping malformed signalling message");
                return;
            }
        };

        match msg {
            SignallingMessage::Identify => self.send_endpoint_id(),
            SignallingMessage::PlayerConnected {
                player_id,
                data_channel,
                sfu,
                send_offer,
            } => {
                info!(%player_id, sfu, "Player connected");
                let config = PlayerConfig {
                    supports_data_channel: data_channel,
                    is_sfu: sfu,
                };
                observer.on_player_connected(player_id, config, send_offer).await;
            }
            SignallingMessage::PlayerDisconnected { player_id } => {
                observer.on_player_disconnected(player_id).await;
            }
            SignallingMessage::PlayerGoingAway { player_id } => {
                observer.on_player_going_away(player_id).await;
            }
            SignallingMessage::Offer { player_id, sdp } => {
                observer
                    .on_session_description(player_id, SdpKind::Offer, sdp)
                    .await;
            }
            SignallingMessage::Answer { player_id, sdp } => {
                observer
                    .on_session_description(player_id, SdpKind::Answer, sdp)
                    .await;
            }
            SignallingMessage::PrAnswer { player_id, sdp } => {
                observer
                    .on_session_description(player_id, SdpKind::PrAnswer, sdp)
                    .await;
            }
            SignallingMessage::Rollback { player_id, sdp } => {
                observer
                    .on_session_description(player_id, SdpKind::Rollback, sdp)
                    .await;
            }
            SignallingMessage::IceCandidate {
                player_id,
                candidate,
            } => {
                observer
                    .on_remote_ice_candidate(
                        player_id,
                        candidate.sdp_mid,
                        candidate.sdp_m_line_index,
                        candidate.candidate,
                    )
                    .await;
            }
            SignallingMessage::SfuConnected => observer.on_sfu_connected().await,
            SignallingMessage::SfuDisconnected => observer.on_sfu_disconnected().await,
            SignallingMessage::StreamerDataChannels {
                sfu_id,
                player_id,
                send_stream_id,
                recv_stream_id,
            } => {
                observer
                    .on_sfu_peer_data_channels(sfu_id, player_id, send_stream_id, recv_stream_id)
                    .await;
            }
            other => {
                warn!(?other, "Unexpected inbound signalling message");
            }
        }
    }

    /// Queue a message for the writer. Sends are fire-and-forget.
    fn send(&self, msg: &SignallingMessage) {
        match msg.to_json() {
            Ok(text) => {
                if self.out_tx.send(text).is_err() {
                    warn!("Signalling writer gone, message dropped");
                }
            }
            Err(err) => error!(error = %err, "Failed to serialize signalling message"),
        }
    }

    pub fn send_offer(&self, player_id: &str, sdp: &str) {
        debug!(%player_id, url = %self.url, "Sending offer to signalling server");
        self.send(&SignallingMessage::Offer {
            player_id: player_id.to_string(),
            sdp: sdp.to_string(),
        });
    }

    pub fn send_answer(&self, player_id: &str, sdp: &str) {
        debug!(%player_id, "Sending answer to signalling server");
        self.send(&SignallingMessage::Answer {
            player_id: player_id.to_string(),
            sdp: sdp.to_string(),
        });
    }

    pub fn send_ice_candidate(
        &self,
        player_id: &str,
        candidate: &str,
        sdp_mid: &str,
        sdp_m_line_index: i32,
    ) {
        self.send(&SignallingMessage::IceCandidate {
            player_id: player_id.to_string(),
            candidate: crate::signalling::protocol::IceCandidateInit {
                candidate: candidate.to_string(),
                sdp_mid: sdp_mid.to_string(),
                sdp_m_line_index,
            },
        });
    }

    pub fn send_disconnect_scene(&self, scene_id: &str, reason: &str) {
        debug!(%scene_id, %reason, "Requesting scene disconnect");
        self.send(&SignallingMessage::DisconnectScene {
            scene_id: scene_id.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn send_data_channels_failed(
        &self,
        player_id: &str,
        send_stream_id: i32,
        recv_stream_id: i32,
    ) {
        self.send(&SignallingMessage::StreamerDataChannelsFailed {
            player_id: player_id.to_string(),
            send_stream_id,
            recv_stream_id,
        });
    }

    /// Detach the pending outbound queue. Used by tests to inspect what a
    /// session would have sent without a live socket.
    #[cfg(test)]
    pub(crate) fn take_outbox(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.out_rx.lock().take()
    }

    /// Answer an `identify` request with this endpoint's identity
    fn send_endpoint_id(&self) {
        debug!(id = %self.info.session_id, "Identifying endpoint to signalling server");
        self.send(&SignallingMessage::EndpointId {
            id: self.info.session_id.clone(),
            player_id: self.info.owner_player_id.clone(),
            camera_mode: self.info.camera_mode.clone(),
        });
    }
}

impl Drop for SignallingConnection {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}
