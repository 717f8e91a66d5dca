//! The session controller: dial, pack negotiation, spawn handover, the two
//! proxy loops, transfer handling, and teardown.

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use mcproxy_proto::packets::{self, decode_packet, id, Packet, Transfer};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::commands::{self, command_handler, CommandFn, CommandRegistry};
use crate::conn::{Conn, ConnWriter, Connector, PacketTap};
use crate::error::SessionError;
use crate::events::{EventSink, SessionEvent};
use crate::handler::{
    filter_resource_pack, lock, new_handlers, run_packet_callbacks, run_packet_raw, Handler,
    Handlers,
};
use crate::packs::{load_forced_packs, ClientPackServer, ForcedPack, PackNegotiator};
use crate::player::Player;
use crate::replay;

/// Replay sentinel prefix on the connect string.
pub const REPLAY_PREFIX: &str = "PCAP!";

/// Session-level configuration supplied by the embedding program.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub listen_address: String,
    pub with_client: bool,
    pub debug: bool,
    pub extra_debug: bool,
    pub capture: bool,
    pub forced_packs_dir: PathBuf,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:19132".into(),
            with_client: true,
            debug: false,
            extra_debug: false,
            capture: false,
            forced_packs_dir: "forcedpacks".into(),
        }
    }
}

/// Cancel-with-cause shared by every session task. The first cause wins.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    cause: Arc<StdMutex<Option<SessionError>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            cause: Arc::new(StdMutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn cancel(&self, cause: SessionError) {
        lock(&self.cause).get_or_insert(cause);
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn cause(&self) -> Option<SessionError> {
        lock(&self.cause).clone()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the controller, the raw tap, and handlers.
#[derive(Default)]
struct SessionShared {
    spawned: AtomicBool,
    client_addr: StdMutex<Option<SocketAddr>>,
    /// The address the client dialed: the proxy from the client's view.
    client_dialed: StdMutex<Option<String>>,
    disconnect_reason: StdMutex<Option<String>>,
    dimension_data: StdMutex<Option<packets::DimensionData>>,
    server_writer: StdMutex<Option<ConnWriter>>,
    client_writer: StdMutex<Option<ConnWriter>>,
    capture: StdMutex<Option<replay::CaptureWriter>>,
}

impl SessionShared {
    fn reset(&self) {
        self.spawned.store(false, Ordering::SeqCst);
        *lock(&self.client_addr) = None;
        *lock(&self.client_dialed) = None;
        *lock(&self.dimension_data) = None;
        *lock(&self.server_writer) = None;
        *lock(&self.client_writer) = None;
    }

    fn set_disconnect_reason(&self, reason: String) {
        *lock(&self.disconnect_reason) = Some(reason);
    }
}

/// Handle given to handlers (notably world capture) for writing packets and
/// reading the player pose mid-session.
#[derive(Clone)]
pub struct SessionIo {
    shared: Arc<SessionShared>,
    player: Arc<StdMutex<Player>>,
}

impl SessionIo {
    /// Queue a packet toward the server. Best effort; dropped when the
    /// server peer is gone.
    pub fn server_write(&self, pk: Packet) {
        if let Some(writer) = lock(&self.shared.server_writer).as_ref() {
            writer.try_write_packet(pk);
        }
    }

    /// Queue a packet toward the client; nop when no client is attached.
    pub fn client_write(&self, pk: Packet) {
        if let Some(writer) = lock(&self.shared.client_writer).as_ref() {
            writer.try_write_packet(pk);
        }
    }

    /// Send a branded chat message to the client.
    pub fn send_message(&self, text: &str) {
        self.client_write(Packet::Text(packets::Text::system(format!(
            "\u{a7}8[\u{a7}bmcproxy\u{a7}8]\u{a7}r {text}"
        ))));
    }

    /// Send a toolbar popup to the client.
    pub fn send_popup(&self, text: &str) {
        self.client_write(Packet::Text(packets::Text::popup(text)));
    }

    pub fn player(&self) -> Player {
        *lock(&self.player)
    }
}

/// One proxy instance. Lives across transfers; handlers keep their state
/// from one session to the next.
pub struct Proxy<C: Connector> {
    connector: C,
    config: ProxyConfig,
    events: EventSink,
    login_state: watch::Receiver<bool>,
    handlers: Handlers,
    commands: CommandRegistry,
    player: Arc<StdMutex<Player>>,
    player_move_cbs: Arc<StdMutex<Vec<Box<dyn FnMut() + Send>>>>,
    forced_packs: Arc<Vec<ForcedPack>>,
    shared: Arc<SessionShared>,
    server_address: String,
    server_name: String,
}

impl<C: Connector> Proxy<C> {
    pub fn new(connector: C, config: ProxyConfig) -> Self {
        let (_, login_state) = {
            let (tx, rx) = watch::channel(true);
            (tx, rx)
        };
        Self {
            connector,
            config,
            events: EventSink::default(),
            login_state,
            handlers: new_handlers(),
            commands: commands::new_registry(),
            player: Arc::new(StdMutex::new(Player::default())),
            player_move_cbs: Arc::new(StdMutex::new(Vec::new())),
            forced_packs: Arc::new(Vec::new()),
            shared: Arc::new(SessionShared::default()),
            server_address: String::new(),
            server_name: String::new(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Gate sessions on an auth token. The embedder flips the watch to true
    /// once login completes; until then non-replay sessions emit
    /// [`SessionEvent::RequestLogin`] and wait.
    pub fn with_login_gate(mut self, login_state: watch::Receiver<bool>) -> Self {
        self.login_state = login_state;
        self
    }

    /// Not thread-safe once the proxy loops are running.
    pub fn add_handler(&self, handler: Handler) {
        lock(&self.handlers).push(handler);
    }

    pub fn add_command(&self, entry: packets::CommandEntry, exec: CommandFn) {
        commands::register(&self.commands, entry, exec);
    }

    pub fn add_player_move_callback(&self, cb: Box<dyn FnMut() + Send>) {
        lock(&self.player_move_cbs).push(cb);
    }

    pub fn io(&self) -> SessionIo {
        SessionIo {
            shared: self.shared.clone(),
            player: self.player.clone(),
        }
    }

    /// Run the proxy against a connect string (`HOST:PORT` or
    /// `PCAP!<path>`), looping across transfers until the session ends.
    pub async fn run(&mut self, connect_string: &str) -> Result<(), SessionError> {
        let (address, name) = parse_connect_string(connect_string)?;
        self.server_address = address;
        self.server_name = name;

        if self.config.debug || self.config.extra_debug {
            self.add_handler(debug_logger(self.config.extra_debug));
        }
        if self.config.capture {
            self.install_capturer()?;
        }
        self.add_handler(command_handler(self.commands.clone()));
        self.add_handler(self.player_handler());

        if self.config.forced_packs_dir.is_dir() {
            self.forced_packs = Arc::new(load_forced_packs(&self.config.forced_packs_dir));
        }

        let result = self.connect_loop().await;

        for handler in lock(&self.handlers).iter_mut() {
            if let Some(cb) = handler.on_proxy_end.as_mut() {
                cb();
            }
        }
        self.events.emit(SessionEvent::Finished);
        result
    }

    /// Tail-recursive transfer behavior, expressed as a loop: a
    /// `TransferRequested` signal rewires the upstream address and starts a
    /// fresh session with the same handlers.
    async fn connect_loop(&mut self) -> Result<(), SessionError> {
        loop {
            match self.do_session().await {
                Err(SessionError::TransferRequested { address, port }) => {
                    self.server_address = format!("{address}:{port}");
                    info!(address = %self.server_address, "transferring");
                }
                other => return other,
            }
        }
    }

    async fn do_session(&mut self) -> Result<(), SessionError> {
        self.shared.reset();
        let result = self.session_inner().await;
        for handler in lock(&self.handlers).iter_mut() {
            if let Some(cb) = handler.on_session_end.as_mut() {
                cb();
            }
        }
        result
    }

    async fn session_inner(&mut self) -> Result<(), SessionError> {
        let is_replay = self.server_address.starts_with(REPLAY_PREFIX);

        for handler in lock(&self.handlers).iter_mut() {
            if let Some(cb) = handler.on_address_and_name.as_mut() {
                cb(&self.server_address, &self.server_name)?;
            }
        }

        if !is_replay && !*self.login_state.borrow() {
            self.events.emit(SessionEvent::RequestLogin);
            let mut login_state = self.login_state.clone();
            login_state
                .wait_for(|logged_in| *logged_in)
                .await
                .map_err(|_| SessionError::CancelConnect)?;
        }

        let cancel = CancelToken::new();
        let tap = self.make_tap();

        // Peer setup: replay file, or concurrent client accept + server dial.
        let (server, client, listener) = if is_replay {
            let path = self.server_address.trim_start_matches(REPLAY_PREFIX);
            let server = replay::open_replay(Path::new(path), Some(tap))?;
            (server, None, None)
        } else {
            let mut listener = self.connector.listen(&self.config.listen_address).await?;
            let (listen_ip, listen_port) = split_host_port(&self.config.listen_address)
                .unwrap_or(("0.0.0.0".into(), 19132));
            self.events.emit(SessionEvent::ConnectStateBegin {
                listen_ip,
                listen_port,
            });

            let server_fut = self.connect_server(tap.clone(), &cancel);
            let client_fut = self.connect_client(&mut listener, tap.clone(), &cancel);
            let (server_res, client_res) = tokio::join!(server_fut, client_fut);

            let server = match server_res {
                Ok(server) => Some(server),
                Err(e) => {
                    cancel.cancel(e);
                    None
                }
            };
            let client = match client_res {
                Ok(client) => client,
                Err(e) => {
                    cancel.cancel(e);
                    None
                }
            };
            let Some(server) = server else {
                let cause = cancel.cause().unwrap_or(SessionError::PeerClosed);
                self.shared.set_disconnect_reason(cause.to_string());
                return Err(cause);
            };
            (server, client, Some(listener))
        };

        let server_writer = server.writer();
        let client_writer = client.as_ref().map(Conn::writer);
        *lock(&self.shared.server_writer) = Some(server_writer.clone());
        *lock(&self.shared.client_writer) = client_writer.clone();

        // From here on the peers must be released on every path.
        let result = self
            .run_connected(server, client, &cancel)
            .await;

        server_writer.close();
        if let (Some(listener), Some(client_writer)) = (&listener, &client_writer) {
            let reason = lock(&self.shared.disconnect_reason)
                .clone()
                .unwrap_or_else(|| "Disconnect".into());
            listener.disconnect(client_writer, &reason);
            listener.close();
        } else if let Some(client_writer) = &client_writer {
            client_writer.close();
        }

        result
    }

    async fn run_connected(
        &mut self,
        server: Conn,
        client: Option<Conn>,
        cancel: &CancelToken,
    ) -> Result<(), SessionError> {
        // Server-connect hook: any handler may veto before spawn.
        if !cancel.is_cancelled() {
            if let Err(e) = self.on_server_connect() {
                cancel.cancel(e);
            }
        }
        if cancel.is_cancelled() {
            let cause = cancel.cause().unwrap_or(SessionError::PeerClosed);
            if cause == SessionError::CancelConnect {
                self.shared.set_disconnect_reason("Disconnect".into());
                return Ok(());
            }
            self.shared.set_disconnect_reason(cause.to_string());
            return Err(cause);
        }

        // Spawn handshake.
        let mut gd = server.game_data();
        for handler in lock(&self.handlers).iter_mut() {
            if let Some(cb) = handler.game_data_modifier.as_mut() {
                cb(&mut gd);
            }
        }
        if let Some(writer) = lock(&self.shared.capture).as_mut() {
            writer.write_game_data(&gd).ok();
        }

        let spawn_client = async {
            if let Some(client) = &client {
                let buffered = lock(&self.shared.dimension_data).take();
                if let Some(dd) = buffered {
                    client.write_packet(Packet::DimensionData(dd)).await?;
                }
                client.start_game(gd.clone()).await?;
            }
            Ok::<(), SessionError>(())
        };
        let (client_spawn, server_spawn) = tokio::join!(spawn_client, server.do_spawn());
        if let Err(e) = client_spawn.and(server_spawn) {
            cancel.cancel(e.clone());
            self.shared.set_disconnect_reason(e.to_string());
            return Err(e);
        }

        // Connect hook: any handler may finish the session here.
        for handler in lock(&self.handlers).iter_mut() {
            if let Some(cb) = handler.on_connect.as_mut() {
                if cb() {
                    info!("disconnecting after on_connect");
                    return Ok(());
                }
            }
        }

        self.events.emit(SessionEvent::ConnectStateDone);

        // Steady state: two independent proxy loops.
        let server_writer = server.writer();
        let client_writer = client.as_ref().map(Conn::writer);

        let s2c = tokio::spawn(proxy_loop(
            server,
            client_writer.clone(),
            false,
            self.handlers.clone(),
            self.shared.clone(),
            cancel.clone(),
        ));
        let c2s = client.map(|client| {
            tokio::spawn(proxy_loop(
                client,
                Some(server_writer.clone()),
                true,
                self.handlers.clone(),
                self.shared.clone(),
                cancel.clone(),
            ))
        });

        let _ = s2c.await;
        if let Some(c2s) = c2s {
            let _ = c2s.await;
        }

        match cancel.cause() {
            Some(cause) => {
                self.shared.set_disconnect_reason(cause.to_string());
                Err(cause)
            }
            None => Ok(()),
        }
    }

    /// Dial the upstream server and run pack negotiation to completion.
    async fn connect_server(
        &self,
        tap: PacketTap,
        cancel: &CancelToken,
    ) -> Result<Conn, SessionError> {
        let mut server = self.connector.dial(&self.server_address).await?;
        server.set_tap(tap);
        info!(address = %self.server_address, "connected to server");

        let mut negotiator = PackNegotiator::new(self.events.clone());
        negotiator.begin();
        let mut cancelled = cancel.subscribe();
        while !negotiator.is_ready() {
            let pk = tokio::select! {
                read = server.read_packet() => read?.0,
                _ = cancelled.wait_for(|c| *c) => return Err(SessionError::CancelConnect),
            };
            let handlers = self.handlers.clone();
            let responses = negotiator.handle(&pk, &mut |pack_id| {
                filter_resource_pack(&handlers, pack_id)
            });
            for response in responses {
                server.write_packet(response).await?;
            }
        }

        let finished = negotiator.finished().to_vec();
        for handler in lock(&self.handlers).iter_mut() {
            if let Some(cb) = handler.on_finished_packs.as_mut() {
                cb(&finished)?;
            }
        }
        Ok(server)
    }

    /// Accept one client and run its side of the pack negotiation.
    async fn connect_client(
        &self,
        listener: &mut crate::conn::Listener,
        tap: PacketTap,
        cancel: &CancelToken,
    ) -> Result<Option<Conn>, SessionError> {
        if !self.config.with_client {
            return Ok(None);
        }
        let mut cancelled = cancel.subscribe();
        let mut client = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = cancelled.wait_for(|c| *c) => return Err(SessionError::CancelConnect),
        };
        client.set_tap(tap);
        *lock(&self.shared.client_dialed) = Some(client.client_data().server_address);
        info!(address = %client.remote_addr(), "client connected");

        for handler in lock(&self.handlers).iter_mut() {
            if let Some(cb) = handler.on_client_connect.as_mut() {
                cb();
            }
        }

        let mut pack_server = ClientPackServer::new(self.forced_packs.clone(), Vec::new());
        client.write_packet(pack_server.advertisement()).await?;
        while !pack_server.is_done() {
            let pk = tokio::select! {
                read = client.read_packet() => read?.0,
                _ = cancelled.wait_for(|c| *c) => return Err(SessionError::CancelConnect),
            };
            for response in pack_server.handle(&pk) {
                client.write_packet(response).await?;
            }
        }
        Ok(Some(client))
    }

    fn on_server_connect(&self) -> Result<(), SessionError> {
        for handler in lock(&self.handlers).iter_mut() {
            if let Some(cb) = handler.on_server_connect.as_mut() {
                if cb()? {
                    return Err(SessionError::CancelConnect);
                }
            }
        }
        Ok(())
    }

    /// The raw-frame observer installed on every peer. This is one of the
    /// two sanctioned recovery sites: a panicking observer is reported and
    /// the frame skipped, the session survives.
    fn make_tap(&self) -> PacketTap {
        let handlers = self.handlers.clone();
        let shared = self.shared.clone();
        Arc::new(move |header, payload, src, dst| {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                if header.packet_id == id::REQUEST_NETWORK_SETTINGS {
                    *lock(&shared.client_addr) = Some(src);
                }
                if header.packet_id == id::SET_LOCAL_PLAYER_AS_INITIALISED {
                    shared.spawned.store(true, Ordering::SeqCst);
                }

                run_packet_raw(&handlers, header, payload, src, dst);

                // Pre-spawn dual path: raw frames are re-decoded and pushed
                // through the typed chain with pre_login set, so handlers
                // see login-phase packets the codec consumes itself.
                if !shared.spawned.load(Ordering::SeqCst) {
                    let Ok(pk) = decode_packet(*header, Bytes::copy_from_slice(payload)) else {
                        return; // undecodable: skip silently
                    };
                    if let Packet::DimensionData(dd) = &pk {
                        *lock(&shared.dimension_data) = Some(dd.clone());
                    }
                    let to_server = lock(&shared.client_addr).is_some_and(|a| a == src);
                    if let Err(e) =
                        run_packet_callbacks(&handlers, pk, to_server, Instant::now(), true)
                    {
                        error!(error = %e, "pre-login packet callback failed");
                    }
                }
            }));
            if outcome.is_err() {
                error!("panic recovered in raw packet path");
            }
        })
    }

    fn player_handler(&self) -> Handler {
        let player = self.player.clone();
        let move_cbs = self.player_move_cbs.clone();
        Handler {
            name: "Player",
            packet_callback: Some(Box::new(move |pk, _to_server, _received, _pre_login| {
                if lock(&player).handle_packet(&pk) {
                    for cb in lock(&move_cbs).iter_mut() {
                        cb();
                    }
                }
                Ok(Some(pk))
            })),
            ..Default::default()
        }
    }

    fn install_capturer(&self) -> Result<(), SessionError> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let path = PathBuf::from("captures").join(format!("{}-{}.mcpr", self.server_name, stamp));
        let writer = replay::CaptureWriter::create(&path)?;
        info!(path = %path.display(), "capturing packets");
        *lock(&self.shared.capture) = Some(writer);

        let shared = self.shared.clone();
        self.add_handler(Handler {
            name: "Capture",
            packet_raw: Some(Box::new(move |header, payload, src, _dst| {
                let to_server = lock(&shared.client_addr).is_some_and(|a| a == src);
                let kind = if to_server {
                    replay::KIND_SERVERBOUND
                } else {
                    replay::KIND_CLIENTBOUND
                };
                let t_micros = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_micros() as u64;
                if let Some(writer) = lock(&shared.capture).as_mut() {
                    if let Err(e) = writer.write_frame(kind, t_micros, header, payload) {
                        warn!(error = %e, "capture write failed");
                    }
                }
            })),
            on_proxy_end: Some(Box::new({
                let shared = self.shared.clone();
                move || {
                    if let Some(writer) = lock(&shared.capture).as_mut() {
                        writer.flush().ok();
                    }
                }
            })),
            ..Default::default()
        });
        Ok(())
    }
}

/// One direction of the steady-state pipeline: read, handler chain,
/// transfer intercept, forward.
async fn proxy_loop(
    mut src: Conn,
    dst: Option<ConnWriter>,
    to_server: bool,
    handlers: Handlers,
    shared: Arc<SessionShared>,
    cancel: CancelToken,
) -> Result<(), SessionError> {
    let mut cancelled = cancel.subscribe();
    let result = loop {
        let (pk, received) = tokio::select! {
            read = src.read_packet() => match read {
                Ok(v) => v,
                Err(SessionError::PeerClosed) => break Ok(()),
                Err(SessionError::Disconnect(reason)) => {
                    shared.set_disconnect_reason(reason.clone());
                    break Err(SessionError::Disconnect(reason));
                }
                Err(e) => break Err(e),
            },
            _ = cancelled.wait_for(|c| *c) => break Ok(()),
        };

        let pk = match run_packet_callbacks(&handlers, pk, to_server, received, false) {
            Ok(Some(pk)) => Some(pk),
            Ok(None) => None,
            Err(e) => break Err(e),
        };

        // Transfer interception: the client is pointed back at the proxy,
        // and the upstream address is reported to the controller.
        let mut transfer: Option<Transfer> = None;
        let pk = match pk {
            Some(Packet::Transfer(t)) => {
                transfer = Some(t.clone());
                let rewritten = lock(&shared.client_dialed)
                    .as_deref()
                    .and_then(split_host_port);
                match rewritten {
                    Some((host, port)) => Some(Packet::Transfer(Transfer::new(host, port))),
                    None => Some(Packet::Transfer(t)),
                }
            }
            other => other,
        };

        if let (Some(pk), Some(dst)) = (pk, dst.as_ref()) {
            match dst.write_packet(pk).await {
                Ok(()) => {}
                Err(SessionError::Disconnect(reason)) => {
                    shared.set_disconnect_reason(reason.clone());
                    break Err(SessionError::Disconnect(reason));
                }
                Err(SessionError::PeerClosed) => break Ok(()),
                Err(e) => break Err(e),
            }
        }

        if let Some(t) = transfer {
            break Err(SessionError::TransferRequested {
                address: t.address,
                port: t.port,
            });
        }
    };

    match result {
        Ok(()) => {
            // Clean EOF: bring the other side down too.
            if let Some(dst) = &dst {
                dst.close();
            }
            src.close();
            Ok(())
        }
        Err(e) => {
            cancel.cancel(e.clone());
            Err(e)
        }
    }
}

fn debug_logger(extra: bool) -> Handler {
    Handler {
        name: "Debug",
        packet_callback: Some(Box::new(move |pk, to_server, _received, pre_login| {
            let direction = if to_server { "C->S" } else { "S->C" };
            if extra {
                debug!(%direction, packet = pk.name(), pre_login, id = pk.packet_id(), "packet");
            } else {
                trace!(%direction, packet = pk.name(), "packet");
            }
            Ok(Some(pk))
        })),
        ..Default::default()
    }
}

fn parse_connect_string(s: &str) -> Result<(String, String), SessionError> {
    if let Some(path) = s.strip_prefix(REPLAY_PREFIX) {
        let name = Path::new(path)
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "replay".into());
        return Ok((s.to_string(), name));
    }
    match s.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok((s.to_string(), host.to_string()))
        }
        _ => Err(SessionError::BadConnectString(s.to_string())),
    }
}

fn split_host_port(s: &str) -> Option<(String, u16)> {
    let (host, port) = s.rsplit_once(':')?;
    Some((host.to_string(), port.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::{
        listener_pair, loopback_addr, pair, ClientData, ConnDriver, GameData, Listener,
    };
    use crate::packs::FinishedPack;
    use mcproxy_proto::packets::{
        CommandEntry, CommandOrigin, CommandRequest, PackResponseStatus, Packet,
        ResourcePackClientResponse, ResourcePackStack, ResourcePacksInfo, SetTime,
    };
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::timeout;

    type Script = Box<dyn FnOnce(ConnDriver) + Send>;

    /// In-process network: scripted server and client drivers.
    #[derive(Default)]
    struct TestNet {
        server_scripts: StdMutex<VecDeque<Script>>,
        client_scripts: StdMutex<VecDeque<Script>>,
        dialed: StdMutex<Vec<String>>,
    }

    impl Connector for Arc<TestNet> {
        async fn dial(&self, address: &str) -> Result<Conn, SessionError> {
            lock(&self.dialed).push(address.to_string());
            let (conn, driver) = pair(loopback_addr(0), loopback_addr(40000));
            let script = lock(&self.server_scripts)
                .pop_front()
                .expect("no server script queued");
            script(driver);
            Ok(conn)
        }

        async fn listen(&self, _address: &str) -> Result<Listener, SessionError> {
            let (listener, listener_driver) = listener_pair(loopback_addr(19132));
            if let Some(script) = lock(&self.client_scripts).pop_front() {
                let driver = listener_driver
                    .push_client(loopback_addr(50001))
                    .expect("accept queue full");
                driver.set_client_data(ClientData {
                    username: "tester".into(),
                    server_address: "127.0.0.1:19132".into(),
                    ..Default::default()
                });
                script(driver);
            }
            Ok(listener)
        }
    }

    /// Server driver: negotiate empty packs, complete spawn, then run `f`.
    fn server_script(f: impl FnOnce(ConnDriver) + Send + 'static) -> Script {
        Box::new(move |mut driver: ConnDriver| {
            tokio::spawn(async move {
                driver.set_game_data(GameData {
                    time: 5000,
                    world_name: "testworld".into(),
                    ..Default::default()
                });
                driver.deliver(Packet::ResourcePacksInfo(ResourcePacksInfo::default()));
                // HaveAllPacks response.
                let _ = driver.next_outgoing().await;
                driver.deliver(Packet::ResourcePackStack(ResourcePackStack::default()));
                // Completed response.
                let _ = driver.next_outgoing().await;
                driver.complete_spawn();
                f(driver);
            });
        })
    }

    /// Client driver: finish pack negotiation, then run `f`.
    fn client_script(f: impl FnOnce(ConnDriver) + Send + 'static) -> Script {
        Box::new(move |mut driver: ConnDriver| {
            tokio::spawn(async move {
                // The proxy's pack advertisement.
                let _ = driver.next_outgoing().await;
                driver.deliver(Packet::ResourcePackClientResponse(
                    ResourcePackClientResponse {
                        response: PackResponseStatus::Completed,
                        packs_to_download: Vec::new(),
                    },
                ));
                f(driver);
            });
        })
    }

    fn command_request(line: &str) -> Packet {
        Packet::CommandRequest(CommandRequest {
            command_line: line.into(),
            origin: CommandOrigin::player(),
            internal: false,
            version: 36,
        })
    }

    fn test_proxy(net: Arc<TestNet>) -> Proxy<Arc<TestNet>> {
        Proxy::new(net, ProxyConfig::default())
    }

    #[tokio::test]
    async fn basic_proxy_forwards_unmatched_command() {
        let net = Arc::new(TestNet::default());
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();

        lock(&net.server_scripts).push_back(server_script(move |mut driver| {
            tokio::spawn(async move {
                // The client's command must arrive unchanged.
                while let Some(pk) = driver.next_outgoing().await {
                    if matches!(pk, Packet::CommandRequest(_)) {
                        let _ = seen_tx.send(pk);
                        break;
                    }
                }
                driver.close();
            });
        }));
        lock(&net.client_scripts).push_back(client_script(|driver| {
            tokio::spawn(async move {
                driver.deliver(Packet::SetLocalPlayerAsInitialised(
                    mcproxy_proto::packets::SetLocalPlayerAsInitialised { runtime_id: 1 },
                ));
                driver.deliver(command_request("/hello"));
                // Stay open until the session tears down.
                let mut closed = false;
                while !closed {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    closed = driver.is_closed();
                }
            });
        }));

        let mut proxy = test_proxy(net);
        timeout(Duration::from_secs(5), proxy.run("example.net:19132"))
            .await
            .expect("session hung")
            .unwrap();

        let pk = seen_rx.await.unwrap();
        match pk {
            Packet::CommandRequest(req) => assert_eq!(req.command_line, "/hello"),
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[tokio::test]
    async fn registered_command_is_intercepted() {
        let net = Arc::new(TestNet::default());
        let got_args: Arc<StdMutex<Vec<Vec<String>>>> = Arc::new(StdMutex::new(Vec::new()));
        let got_args2 = got_args.clone();
        let forwarded: Arc<StdMutex<Vec<&'static str>>> = Arc::new(StdMutex::new(Vec::new()));
        let forwarded2 = forwarded.clone();

        lock(&net.server_scripts).push_back(server_script(move |mut driver| {
            tokio::spawn(async move {
                while let Some(pk) = driver.next_outgoing().await {
                    lock(&forwarded2).push(pk.name());
                }
            });
        }));
        lock(&net.client_scripts).push_back(client_script(|driver| {
            tokio::spawn(async move {
                driver.deliver(Packet::SetLocalPlayerAsInitialised(
                    mcproxy_proto::packets::SetLocalPlayerAsInitialised { runtime_id: 1 },
                ));
                driver.deliver(command_request("/zoom 3"));
                tokio::time::sleep(Duration::from_millis(50)).await;
                driver.close();
            });
        }));

        let mut proxy = test_proxy(net);
        proxy.add_command(
            CommandEntry::new("zoom", "Map zoom"),
            Box::new(move |args| {
                lock(&got_args2).push(args.to_vec());
                true
            }),
        );
        timeout(Duration::from_secs(5), proxy.run("example.net:19132"))
            .await
            .expect("session hung")
            .unwrap();

        assert_eq!(*lock(&got_args), vec![vec!["3".to_string()]]);
        assert!(
            !lock(&forwarded).contains(&"CommandRequest"),
            "intercepted command must not reach the server"
        );
    }

    #[tokio::test]
    async fn transfer_reconnects_and_rewrites() {
        let net = Arc::new(TestNet::default());
        let (client_saw_tx, client_saw_rx) = tokio::sync::oneshot::channel();

        // First session: server emits a transfer.
        lock(&net.server_scripts).push_back(server_script(|driver| {
            driver.deliver(Packet::Transfer(Transfer::new("h2", 42)));
        }));
        // Second session (after reconnect): close immediately.
        lock(&net.server_scripts).push_back(server_script(|driver| {
            driver.close();
        }));

        lock(&net.client_scripts).push_back(client_script(move |mut driver| {
            tokio::spawn(async move {
                while let Some(pk) = driver.next_outgoing().await {
                    if let Packet::Transfer(t) = pk {
                        let _ = client_saw_tx.send(t);
                        break;
                    }
                }
            });
        }));
        lock(&net.client_scripts).push_back(client_script(|driver| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                driver.close();
            });
        }));

        let session_ends = Arc::new(StdMutex::new(0));
        let session_ends2 = session_ends.clone();

        let mut proxy = test_proxy(net.clone());
        proxy.add_handler(Handler {
            name: "counter",
            on_session_end: Some(Box::new(move || {
                *lock(&session_ends2) += 1;
            })),
            ..Default::default()
        });
        timeout(Duration::from_secs(5), proxy.run("h1:19132"))
            .await
            .expect("session hung")
            .unwrap();

        // Client got the transfer rewritten to the proxy's own address.
        let rewritten = client_saw_rx.await.unwrap();
        assert_eq!(rewritten.address, "127.0.0.1");
        assert_eq!(rewritten.port, 19132);

        // The controller redialed the upstream from the original packet.
        assert_eq!(*lock(&net.dialed), vec!["h1:19132", "h2:42"]);
        assert_eq!(*lock(&session_ends), 2, "one session end per session");
    }

    #[tokio::test]
    async fn handler_error_cancels_session() {
        let net = Arc::new(TestNet::default());
        lock(&net.server_scripts).push_back(server_script(|driver| {
            driver.deliver(Packet::SetTime(SetTime { time: 1 }));
        }));
        lock(&net.client_scripts).push_back(client_script(|driver| {
            // Stay connected so the handler error, not a client EOF, ends
            // the session.
            tokio::spawn(async move {
                while !driver.is_closed() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            });
        }));

        let mut proxy = test_proxy(net);
        proxy.add_handler(Handler {
            name: "bad",
            packet_callback: Some(Box::new(|pk, _, _, pre_login| {
                if !pre_login && matches!(pk, Packet::SetTime(_)) {
                    return Err(SessionError::handler("bad", "boom"));
                }
                Ok(Some(pk))
            })),
            ..Default::default()
        });
        let err = timeout(Duration::from_secs(5), proxy.run("example.net:19132"))
            .await
            .expect("session hung")
            .unwrap_err();
        assert!(matches!(err, SessionError::Handler { .. }));
    }

    #[tokio::test]
    async fn server_connect_veto_is_clean() {
        let net = Arc::new(TestNet::default());
        lock(&net.server_scripts).push_back(server_script(|_driver| {}));
        lock(&net.client_scripts).push_back(client_script(|_driver| {}));

        let mut proxy = test_proxy(net);
        proxy.add_handler(Handler {
            name: "veto",
            on_server_connect: Some(Box::new(|| Ok(true))),
            ..Default::default()
        });
        timeout(Duration::from_secs(5), proxy.run("example.net:19132"))
            .await
            .expect("session hung")
            .unwrap();
    }

    #[tokio::test]
    async fn finished_packs_reach_handlers() {
        let net = Arc::new(TestNet::default());
        lock(&net.server_scripts).push_back(server_script(|driver| {
            driver.close();
        }));
        lock(&net.client_scripts).push_back(client_script(|_driver| {}));

        let seen: Arc<StdMutex<Option<Vec<FinishedPack>>>> = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        let mut proxy = test_proxy(net);
        proxy.add_handler(Handler {
            name: "packs",
            on_finished_packs: Some(Box::new(move |packs| {
                *lock(&seen2) = Some(packs.to_vec());
                Ok(())
            })),
            ..Default::default()
        });
        timeout(Duration::from_secs(5), proxy.run("example.net:19132"))
            .await
            .expect("session hung")
            .unwrap();
        assert_eq!(lock(&seen).as_ref().map(Vec::len), Some(0));
    }

    #[test]
    fn connect_string_parsing() {
        assert_eq!(
            parse_connect_string("play.example.net:19132").unwrap(),
            ("play.example.net:19132".into(), "play.example.net".into())
        );
        let (addr, name) = parse_connect_string("PCAP!caps/session1.mcpr").unwrap();
        assert_eq!(addr, "PCAP!caps/session1.mcpr");
        assert_eq!(name, "session1");
        assert!(parse_connect_string("nonsense").is_err());
        assert!(parse_connect_string(":19132").is_err());
    }

    #[test]
    fn cancel_token_first_cause_wins() {
        let token = CancelToken::new();
        token.cancel(SessionError::PeerClosed);
        token.cancel(SessionError::Disconnect("later".into()));
        assert_eq!(token.cause(), Some(SessionError::PeerClosed));
        assert!(token.is_cancelled());
    }
}
