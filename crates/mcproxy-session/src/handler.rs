//! The handler pipeline: pluggable observers/transformers of packets and
//! session events.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use mcproxy_proto::packets::{Packet, PacketHeader};
use tracing::trace;

use crate::conn::GameData;
use crate::error::SessionError;
use crate::packs::FinishedPack;

/// Lock a mutex, ignoring poisoning: a panicking handler must not take the
/// whole session's shared state down with it.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of a packet callback: the (possibly replaced) packet, or `None`
/// to drop it.
pub type PacketResult = Result<Option<Packet>, SessionError>;

type AddressCb = Box<dyn FnMut(&str, &str) -> Result<(), SessionError> + Send>;
type ServerConnectCb = Box<dyn FnMut() -> Result<bool, SessionError> + Send>;
type VoidCb = Box<dyn FnMut() + Send>;
type ConnectCb = Box<dyn FnMut() -> bool + Send>;
type PacketCb = Box<dyn FnMut(Packet, bool, Instant, bool) -> PacketResult + Send>;
type RawCb = Box<dyn FnMut(&PacketHeader, &[u8], SocketAddr, SocketAddr) + Send>;
type FilterPackCb = Box<dyn FnMut(&str) -> bool + Send>;
type GameDataCb = Box<dyn FnMut(&mut GameData) + Send>;
type FinishedPacksCb = Box<dyn FnMut(&[FinishedPack]) -> Result<(), SessionError> + Send>;

/// A bundle of optional callbacks. All fields default to absent; a handler
/// implements only what it observes.
#[derive(Default)]
pub struct Handler {
    pub name: &'static str,
    /// Called with the resolved upstream address and display name.
    pub on_address_and_name: Option<AddressCb>,
    /// Pre-spawn server hook; returning `Ok(true)` cancels the session.
    pub on_server_connect: Option<ServerConnectCb>,
    pub on_client_connect: Option<VoidCb>,
    /// Post-spawn hook; returning `true` finishes the session cleanly.
    pub on_connect: Option<ConnectCb>,
    /// `(packet, to_server, received, pre_login)`.
    pub packet_callback: Option<PacketCb>,
    /// Sees every delivered frame in encoded form, drops included.
    pub packet_raw: Option<RawCb>,
    /// Returning `true` excludes a pack id from download.
    pub filter_resource_pack: Option<FilterPackCb>,
    pub game_data_modifier: Option<GameDataCb>,
    /// Pack downloads finished (with per-pack errors).
    pub on_finished_packs: Option<FinishedPacksCb>,
    pub on_session_end: Option<VoidCb>,
    pub on_proxy_end: Option<VoidCb>,
}

/// The shared, registration-ordered handler chain. Locked per event; a
/// handler needing its own state across directions brings its own lock.
pub type Handlers = Arc<Mutex<Vec<Handler>>>;

pub fn new_handlers() -> Handlers {
    Arc::new(Mutex::new(Vec::new()))
}

/// Run the packet-callback chain in registration order.
///
/// A `None` return from any handler short-circuits the chain and drops the
/// packet; an error aborts the session with that cause.
pub fn run_packet_callbacks(
    handlers: &Handlers,
    pk: Packet,
    to_server: bool,
    received: Instant,
    pre_login: bool,
) -> PacketResult {
    let name = pk.name();
    let mut current = pk;
    for handler in lock(handlers).iter_mut() {
        let Some(cb) = handler.packet_callback.as_mut() else {
            continue;
        };
        match cb(current, to_server, received, pre_login)? {
            Some(pk) => current = pk,
            None => {
                trace!(packet = name, handler = handler.name, "dropped packet");
                return Ok(None);
            }
        }
    }
    Ok(Some(current))
}

/// Invoke every `packet_raw` callback. Always runs, regardless of what the
/// typed chain decided.
pub fn run_packet_raw(
    handlers: &Handlers,
    header: &PacketHeader,
    payload: &[u8],
    src: SocketAddr,
    dst: SocketAddr,
) {
    for handler in lock(handlers).iter_mut() {
        if let Some(cb) = handler.packet_raw.as_mut() {
            cb(header, payload, src, dst);
        }
    }
}

/// Ask every handler whether a pack should be skipped. Mirrors the original
/// semantics: the last handler with an opinion wins.
pub fn filter_resource_pack(handlers: &Handlers, id: &str) -> bool {
    let mut ignore = false;
    for handler in lock(handlers).iter_mut() {
        if let Some(cb) = handler.filter_resource_pack.as_mut() {
            ignore = cb(id);
        }
    }
    ignore
}
