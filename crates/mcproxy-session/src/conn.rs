//! The peer-connection half of the codec boundary.
//!
//! A [`Conn`] is the proxy-facing end of one peer; a [`ConnDriver`] is the
//! transport-facing end. Whatever parses the wire (a RakNet stack, the
//! replay reader, a test harness) owns the driver and pumps decoded packets
//! in and outgoing packets out. The two halves are linked by channels plus
//! shared state for game data and the close reason.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use mcproxy_proto::packets::{encode_packet, Packet, PacketHeader};
use mcproxy_proto::types::{GameRule, Vec3};
use tokio::sync::{mpsc, watch};

use crate::error::SessionError;
use crate::handler::lock;

/// Observer of every frame a peer delivers, in encoded form.
pub type PacketTap = Arc<dyn Fn(&PacketHeader, &[u8], SocketAddr, SocketAddr) + Send + Sync>;

/// Game state the server codec learns during login, exposed once spawned.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GameData {
    pub dimension: i32,
    pub player_position: Vec3,
    pub player_runtime_id: u64,
    pub player_unique_id: i64,
    pub world_seed: i64,
    pub time: i64,
    pub game_rules: Vec<GameRule>,
    pub world_name: String,
    pub game_version: String,
}

/// Identity the client codec learns during login.
#[derive(Debug, Clone, Default)]
pub struct ClientData {
    pub username: String,
    /// The address the client dialed, i.e. the proxy as the client sees it.
    pub server_address: String,
    pub device_model: String,
    pub device_os: i32,
}

struct Shared {
    game_data: Mutex<Option<GameData>>,
    client_data: Mutex<Option<ClientData>>,
    disconnect_reason: Mutex<Option<String>>,
    closed_tx: watch::Sender<bool>,
    spawned_tx: watch::Sender<bool>,
    started_game: Mutex<Option<GameData>>,
    tap: Mutex<Option<PacketTap>>,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
}

impl Shared {
    fn close_error(&self) -> SessionError {
        match lock(&self.disconnect_reason).clone() {
            Some(reason) => SessionError::Disconnect(reason),
            None => SessionError::PeerClosed,
        }
    }
}

/// Proxy-facing half of a peer connection.
pub struct Conn {
    incoming: mpsc::Receiver<(Packet, Instant)>,
    outgoing: mpsc::Sender<Packet>,
    closed_rx: watch::Receiver<bool>,
    shared: Arc<Shared>,
}

/// Cloneable write/control handle onto a [`Conn`]. Used by the opposite
/// proxy loop and by handlers that push packets mid-session.
#[derive(Clone)]
pub struct ConnWriter {
    outgoing: mpsc::Sender<Packet>,
    shared: Arc<Shared>,
}

/// Transport-facing half of a peer connection.
pub struct ConnDriver {
    deliver_tx: mpsc::Sender<(Packet, Instant)>,
    outgoing_rx: mpsc::Receiver<Packet>,
    closed_rx: watch::Receiver<bool>,
    shared: Arc<Shared>,
}

/// Create a linked `Conn`/`ConnDriver` pair.
pub fn pair(local_addr: SocketAddr, remote_addr: SocketAddr) -> (Conn, ConnDriver) {
    let (deliver_tx, incoming) = mpsc::channel(256);
    let (outgoing, outgoing_rx) = mpsc::channel(256);
    let (closed_tx, closed_rx) = watch::channel(false);
    let (spawned_tx, _) = watch::channel(false);
    let shared = Arc::new(Shared {
        game_data: Mutex::new(None),
        client_data: Mutex::new(None),
        disconnect_reason: Mutex::new(None),
        closed_tx,
        spawned_tx,
        started_game: Mutex::new(None),
        tap: Mutex::new(None),
        local_addr,
        remote_addr,
    });
    (
        Conn {
            incoming,
            outgoing: outgoing.clone(),
            closed_rx: closed_rx.clone(),
            shared: shared.clone(),
        },
        ConnDriver {
            deliver_tx,
            outgoing_rx,
            closed_rx,
            shared,
        },
    )
}

/// Synthetic addresses for in-process peers.
pub fn loopback_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

impl Conn {
    /// Read the next packet with its receive time. A closed peer yields
    /// `PeerClosed` (clean EOF) or `Disconnect` when the transport recorded
    /// a server-supplied reason.
    pub async fn read_packet(&mut self) -> Result<(Packet, Instant), SessionError> {
        let mut closed_rx = self.closed_rx.clone();
        tokio::select! {
            maybe = self.incoming.recv() => match maybe {
                Some(v) => Ok(v),
                None => Err(self.shared.close_error()),
            },
            _ = closed_rx.wait_for(|closed| *closed) => Err(self.shared.close_error()),
        }
    }

    pub async fn write_packet(&self, pk: Packet) -> Result<(), SessionError> {
        self.writer().write_packet(pk).await
    }

    /// Cloneable write/control handle.
    pub fn writer(&self) -> ConnWriter {
        ConnWriter {
            outgoing: self.outgoing.clone(),
            shared: self.shared.clone(),
        }
    }

    pub fn close(&self) {
        let _ = self.shared.closed_tx.send(true);
    }

    /// Server-side only; populated by the codec after login.
    pub fn game_data(&self) -> GameData {
        lock(&self.shared.game_data).clone().unwrap_or_default()
    }

    /// Client-side only.
    pub fn client_data(&self) -> ClientData {
        lock(&self.shared.client_data).clone().unwrap_or_default()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.shared.remote_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// Install the raw-frame observer invoked for every delivered packet.
    pub fn set_tap(&self, tap: PacketTap) {
        *lock(&self.shared.tap) = Some(tap);
    }

    /// Wait for the codec to finish the spawn sequence (server side).
    pub async fn do_spawn(&self) -> Result<(), SessionError> {
        let mut rx = self.shared.spawned_tx.subscribe();
        let mut closed_rx = self.closed_rx.clone();
        tokio::select! {
            res = rx.wait_for(|spawned| *spawned) => {
                res.map(|_| ()).map_err(|_| self.shared.close_error())
            }
            _ = closed_rx.wait_for(|closed| *closed) => Err(self.shared.close_error()),
        }
    }

    /// Hand the (possibly modified) game data to the client codec, which
    /// replays the StartGame sequence to the real client.
    pub async fn start_game(&self, gd: GameData) -> Result<(), SessionError> {
        if *self.closed_rx.borrow() {
            return Err(self.shared.close_error());
        }
        *lock(&self.shared.started_game) = Some(gd);
        Ok(())
    }
}

impl ConnWriter {
    pub async fn write_packet(&self, pk: Packet) -> Result<(), SessionError> {
        if *self.shared.closed_tx.borrow() {
            return Err(self.shared.close_error());
        }
        self.outgoing
            .send(pk)
            .await
            .map_err(|_| self.shared.close_error())
    }

    /// Best-effort write from synchronous contexts (handlers, commands).
    pub fn try_write_packet(&self, pk: Packet) {
        let _ = self.outgoing.try_send(pk);
    }

    pub fn close(&self) {
        let _ = self.shared.closed_tx.send(true);
    }

    /// Record a server-supplied disconnect reason and close.
    pub fn close_with_reason(&self, reason: impl Into<String>) {
        *lock(&self.shared.disconnect_reason) = Some(reason.into());
        let _ = self.shared.closed_tx.send(true);
    }
}

impl ConnDriver {
    fn run_tap(&self, pk: &Packet) {
        if let Some(tap) = lock(&self.shared.tap).clone() {
            let (header, payload) = encode_packet(pk);
            tap(
                &header,
                &payload,
                self.shared.remote_addr,
                self.shared.local_addr,
            );
        }
    }

    /// Deliver a decoded packet to the proxy, timestamped now. The raw tap
    /// sees the encoded form first. Non-blocking; a full queue drops the
    /// packet, so bulk feeders should use [`ConnDriver::deliver_async`].
    pub fn deliver(&self, pk: Packet) {
        self.deliver_at(pk, Instant::now());
    }

    pub fn deliver_at(&self, pk: Packet, at: Instant) {
        self.run_tap(&pk);
        let _ = self.deliver_tx.try_send((pk, at));
    }

    /// Deliver with backpressure: waits for queue space instead of
    /// dropping.
    pub async fn deliver_async(&self, pk: Packet) {
        self.run_tap(&pk);
        let _ = self.deliver_tx.send((pk, Instant::now())).await;
    }

    /// Next packet the proxy wrote toward this peer. `None` once the conn
    /// is closed and drained.
    pub async fn next_outgoing(&mut self) -> Option<Packet> {
        let mut closed_rx = self.closed_rx.clone();
        tokio::select! {
            maybe = self.outgoing_rx.recv() => maybe,
            _ = closed_rx.wait_for(|closed| *closed) => None,
        }
    }

    pub fn set_game_data(&self, gd: GameData) {
        *lock(&self.shared.game_data) = Some(gd);
    }

    pub fn set_client_data(&self, cd: ClientData) {
        *lock(&self.shared.client_data) = Some(cd);
    }

    /// Mark the spawn sequence complete, releasing `Conn::do_spawn`.
    pub fn complete_spawn(&self) {
        let _ = self.shared.spawned_tx.send(true);
    }

    /// Game data the proxy handed to `start_game`, if it ran yet.
    pub fn started_game(&self) -> Option<GameData> {
        lock(&self.shared.started_game).clone()
    }

    pub fn close(&self) {
        let _ = self.shared.closed_tx.send(true);
    }

    pub fn close_with_reason(&self, reason: impl Into<String>) {
        *lock(&self.shared.disconnect_reason) = Some(reason.into());
        let _ = self.shared.closed_tx.send(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }
}

// -----------------------------------------------------------------------
// Listener
// -----------------------------------------------------------------------

struct ListenerShared {
    closed_tx: watch::Sender<bool>,
}

/// Accepts one or more client connections pushed by a transport driver.
pub struct Listener {
    incoming: mpsc::Receiver<Conn>,
    closed_rx: watch::Receiver<bool>,
    local_addr: SocketAddr,
    shared: Arc<ListenerShared>,
}

/// Transport-facing half of a [`Listener`].
#[derive(Clone)]
pub struct ListenerDriver {
    accept_tx: mpsc::Sender<Conn>,
    local_addr: SocketAddr,
}

pub fn listener_pair(local_addr: SocketAddr) -> (Listener, ListenerDriver) {
    let (accept_tx, incoming) = mpsc::channel(4);
    let (closed_tx, closed_rx) = watch::channel(false);
    (
        Listener {
            incoming,
            closed_rx,
            local_addr,
            shared: Arc::new(ListenerShared { closed_tx }),
        },
        ListenerDriver {
            accept_tx,
            local_addr,
        },
    )
}

impl Listener {
    pub async fn accept(&mut self) -> Result<Conn, SessionError> {
        let mut closed_rx = self.closed_rx.clone();
        tokio::select! {
            maybe = self.incoming.recv() => maybe.ok_or(SessionError::PeerClosed),
            _ = closed_rx.wait_for(|closed| *closed) => Err(SessionError::PeerClosed),
        }
    }

    /// Kick a client with an on-screen reason.
    pub fn disconnect(&self, client: &ConnWriter, reason: &str) {
        client.try_write_packet(Packet::Disconnect(
            mcproxy_proto::packets::Disconnect {
                reason: 0,
                hide_screen: false,
                message: reason.to_string(),
            },
        ));
        client.close();
    }

    pub fn close(&self) {
        let _ = self.shared.closed_tx.send(true);
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl ListenerDriver {
    /// Build a connection for a newly accepted client and queue it.
    /// Returns the driver half for the transport to pump.
    pub fn push_client(&self, remote_addr: SocketAddr) -> Option<ConnDriver> {
        let (conn, driver) = pair(self.local_addr, remote_addr);
        match self.accept_tx.try_send(conn) {
            Ok(()) => Some(driver),
            Err(_) => None,
        }
    }
}

// -----------------------------------------------------------------------
// Connector
// -----------------------------------------------------------------------

/// Produces peers for a session: an upstream dial and a local listener.
/// Implemented by the transport stack the embedder links in, by the replay
/// reader, and by the in-process pipe used in tests.
#[allow(async_fn_in_trait)]
pub trait Connector {
    async fn dial(&self, address: &str) -> Result<Conn, SessionError>;
    async fn listen(&self, address: &str) -> Result<Listener, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcproxy_proto::packets::{SetTime, Transfer};

    #[tokio::test]
    async fn deliver_and_read() {
        let (mut conn, driver) = pair(loopback_addr(19132), loopback_addr(50000));
        driver.deliver(Packet::SetTime(SetTime { time: 10 }));
        let (pk, _) = conn.read_packet().await.unwrap();
        assert_eq!(pk.name(), "SetTime");
    }

    #[tokio::test]
    async fn close_reason_becomes_disconnect_error() {
        let (mut conn, driver) = pair(loopback_addr(1), loopback_addr(2));
        driver.close_with_reason("kicked by admin");
        let err = conn.read_packet().await.unwrap_err();
        assert_eq!(err, SessionError::Disconnect("kicked by admin".into()));
    }

    #[tokio::test]
    async fn local_close_is_clean_eof() {
        let (mut conn, _driver) = pair(loopback_addr(1), loopback_addr(2));
        conn.close();
        let err = conn.read_packet().await.unwrap_err();
        assert_eq!(err, SessionError::PeerClosed);
    }

    #[tokio::test]
    async fn writes_reach_the_driver() {
        let (conn, mut driver) = pair(loopback_addr(1), loopback_addr(2));
        conn.write_packet(Packet::Transfer(Transfer::new("h", 1)))
            .await
            .unwrap();
        let pk = driver.next_outgoing().await.unwrap();
        assert_eq!(pk.name(), "Transfer");
    }

    #[tokio::test]
    async fn tap_sees_encoded_frames() {
        let (mut conn, driver) = pair(loopback_addr(1), loopback_addr(2));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        conn.set_tap(Arc::new(move |header, payload, _, _| {
            seen2.lock().unwrap().push((header.packet_id, payload.len()));
        }));
        driver.deliver(Packet::SetTime(SetTime { time: 99 }));
        conn.read_packet().await.unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, mcproxy_proto::packets::id::SET_TIME);
    }

    #[tokio::test]
    async fn spawn_handshake() {
        let (conn, driver) = pair(loopback_addr(1), loopback_addr(2));
        driver.complete_spawn();
        conn.do_spawn().await.unwrap();
    }
}
