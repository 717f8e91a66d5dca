mod config;

use std::path::Path;

use config::CliConfig;
use mcproxy_capture::{WorldsConfig, WorldsHandler};
use mcproxy_session::conn::{Conn, Connector, Listener};
use mcproxy_session::{EventSink, Proxy, ProxyConfig, SessionError, SessionEvent};
use tracing::{error, info, warn};

/// The wire transport is an external collaborator; this embedding ships
/// without one, so live `HOST:PORT` sessions need a transport crate wired
/// in here. Replay sessions (`PCAP!<file>`) bypass the connector entirely.
struct NoTransport;

impl Connector for NoTransport {
    async fn dial(&self, address: &str) -> Result<Conn, SessionError> {
        Err(SessionError::Dial {
            address: address.to_string(),
            message: "no network transport linked into this build; replay with PCAP!<file>".into(),
        })
    }

    async fn listen(&self, address: &str) -> Result<Listener, SessionError> {
        Err(SessionError::Listen {
            address: address.to_string(),
            message: "no network transport linked into this build; replay with PCAP!<file>".into(),
        })
    }
}

#[tokio::main]
async fn main() {
    let config = match CliConfig::load(Path::new("proxy.toml")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load proxy.toml: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let Some(connect_string) = std::env::args().nth(1) else {
        eprintln!("usage: mcproxy <HOST:PORT | PCAP!file.mcpr>");
        std::process::exit(2);
    };

    info!(
        "mcproxy v{} — connect {}",
        env!("CARGO_PKG_VERSION"),
        connect_string
    );

    let proxy_config = ProxyConfig {
        listen_address: config.proxy.listen_address.clone(),
        with_client: config.proxy.with_client,
        debug: config.proxy.debug,
        extra_debug: config.proxy.extra_debug,
        capture: config.proxy.capture,
        forced_packs_dir: config.proxy.forced_packs_dir.clone(),
    };

    let (events, mut event_rx) = EventSink::new();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::ConnectStateBegin {
                    listen_ip,
                    listen_port,
                } => info!("listening on {listen_ip}:{listen_port}"),
                SessionEvent::ConnectStateDone => info!("proxying"),
                SessionEvent::RequestLogin => {
                    warn!("no auth token available; log in and restart")
                }
                SessionEvent::FinishedPack { pack_id, size } => {
                    info!("pack {pack_id} done ({size} bytes)")
                }
                SessionEvent::FinishedDownloadingPacks { errors } if !errors.is_empty() => {
                    for (pack_id, error) in errors {
                        warn!("pack {pack_id} failed: {error}");
                    }
                }
                _ => {}
            }
        }
    });

    let world_name = match connect_string.strip_prefix("PCAP!") {
        Some(path) => Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "world".into()),
        None => connect_string
            .split(':')
            .next()
            .unwrap_or("world")
            .to_string(),
    };

    let mut proxy = Proxy::new(NoTransport, proxy_config).with_events(events);
    WorldsHandler::attach(
        &proxy,
        WorldsConfig {
            world_name,
            base_dir: config.worlds.base_dir.clone(),
            exclude_mobs: config.worlds.exclude_mobs.clone(),
            void_gen: config.worlds.void_gen,
            render_maps: config.worlds.render_maps,
            resume_radius: config.worlds.resume_radius,
        },
    );

    match proxy.run(&connect_string).await {
        Ok(()) => info!("session finished"),
        Err(e) => {
            error!("session ended: {e}");
            std::process::exit(1);
        }
    }
}
