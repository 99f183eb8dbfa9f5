use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scenecast::config::AppConfig;
use scenecast::error::{AppError, Result};
use scenecast::events::EventBus;
use scenecast::peer::{PeerLink, PeerLinkFactory, PlayerConfig};
use scenecast::players::PlayerRegistry;
use scenecast::session::manager::SessionManager;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// scenecast command line arguments
#[derive(Parser, Debug)]
#[command(name = "scenecast")]
#[command(version, about = "Multi-scene streaming session router", long_about = None)]
struct CliArgs {
    /// Full signalling server URL (overrides host/port)
    #[arg(short = 'u', long, value_name = "URL")]
    url: Option<String>,

    /// Signalling server host
    #[arg(long, value_name = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Signalling server port
    #[arg(short = 'p', long, value_name = "PORT", default_value_t = 8888)]
    port: u16,

    /// Scene id to register with the signalling server
    #[arg(short = 's', long, value_name = "ID", default_value = "scene0")]
    scene_id: String,

    /// Owning player id announced during identification
    #[arg(long, value_name = "ID", default_value = "")]
    owner_player_id: String,

    /// Camera mode announced during identification
    #[arg(long, value_name = "MODE", default_value = "default")]
    camera_mode: String,

    /// Route mouse input to synthesized touch events
    #[arg(long)]
    use_mouse_for_touch: bool,

    /// Disable automatic reconnect to the signalling server
    #[arg(long)]
    no_reconnect: bool,

    /// Delay between reconnect attempts in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 2_000)]
    reconnect_delay_ms: u64,

    /// Input frame tick interval in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 16)]
    frame_interval_ms: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Stand-in peer factory for running against a signalling server without a
/// media pipeline. Peer operations are logged; SDP generation is refused so
/// the far side sees a clean failure instead of a bogus session.
struct DiagnosticPeerFactory;

struct DiagnosticPeer {
    player_id: String,
}

#[async_trait::async_trait]
impl PeerLink for DiagnosticPeer {
    async fn create_offer(&self) -> Result<String> {
        Err(AppError::Unsupported(
            "no media pipeline attached".to_string(),
        ))
    }

    async fn create_answer(&self) -> Result<String> {
        Err(AppError::Unsupported(
            "no media pipeline attached".to_string(),
        ))
    }

    async fn set_remote_description(
        &self,
        kind: scenecast::signalling::SdpKind,
        _sdp: &str,
    ) -> Result<()> {
        tracing::info!(player_id = %self.player_id, %kind, "Remote description received");
        Ok(())
    }

    async fn add_remote_ice_candidate(
        &self,
        sdp_mid: &str,
        sdp_m_line_index: i32,
        _sdp: &str,
    ) -> Result<()> {
        tracing::debug!(player_id = %self.player_id, sdp_mid, sdp_m_line_index,
            "Remote ICE candidate received");
        Ok(())
    }

    async fn create_data_channels(
        &self,
        send_stream_id: i32,
        recv_stream_id: i32,
    ) -> Result<scenecast::peer::DataChannelPair> {
        Err(AppError::DataChannel {
            player_id: self.player_id.clone(),
            send_stream_id,
            recv_stream_id,
        })
    }

    async fn send_message(&self, message_type: u8, descriptor: &str) -> Result<()> {
        tracing::info!(player_id = %self.player_id, message_type, descriptor,
            "Dropping outbound player message");
        Ok(())
    }

    async fn close(&self) {
        tracing::info!(player_id = %self.player_id, "Peer closed");
    }
}

impl PeerLinkFactory for DiagnosticPeerFactory {
    fn create_peer(&self, player_id: &str, config: &PlayerConfig) -> Result<Arc<dyn PeerLink>> {
        tracing::info!(%player_id, is_sfu = config.is_sfu,
            data_channel = config.supports_data_channel, "Creating diagnostic peer");
        Ok(Arc::new(DiagnosticPeer {
            player_id: player_id.to_string(),
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting scenecast v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig {
        signalling_url: args.url.clone(),
        signalling_host: args.host.clone(),
        signalling_port: args.port,
        auto_reconnect: !args.no_reconnect,
        reconnect_delay_ms: args.reconnect_delay_ms,
        use_mouse_for_touch: args.use_mouse_for_touch,
    };
    tracing::info!(url = %config.signalling_server_url(), "Signalling endpoint");

    let events = Arc::new(EventBus::new());
    let registry = Arc::new(PlayerRegistry::new());
    let manager = Arc::new(SessionManager::new(
        config,
        events.clone(),
        registry,
        Arc::new(DiagnosticPeerFactory),
    ));

    // Log everything the session publishes
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => tracing::info!(?event, "Session event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let session = manager.create_or_get(&args.scene_id, &args.owner_player_id, &args.camera_mode);
    session.connect_to_signalling();

    let mut frame_tick = tokio::time::interval(Duration::from_millis(args.frame_interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = frame_tick.tick() => {
                session.flush_touch_moves();
                session.begin_input_frame();
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    manager.delete_all().await;
    Ok(())
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "scenecast=error",
        LogLevel::Warn => "scenecast=warn",
        LogLevel::Info => "scenecast=info",
        LogLevel::Debug => "scenecast=debug",
        LogLevel::Trace => "scenecast=trace,tokio_tungstenite=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
