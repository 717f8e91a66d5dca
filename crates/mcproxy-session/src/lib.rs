//! Session core of the Bedrock man-in-the-middle proxy.
//!
//! The [`session::Proxy`] controller dials the upstream server on the
//! user's behalf, accepts one client, negotiates resource packs, replays
//! the spawn sequence, then runs a full-duplex packet pipeline driven by
//! pluggable [`handler::Handler`]s. The wire transport itself is external:
//! it plugs in through [`conn::Connector`] and the [`conn::ConnDriver`]
//! half of each peer.

pub mod commands;
pub mod conn;
pub mod error;
pub mod events;
pub mod handler;
pub mod packs;
pub mod player;
pub mod replay;
pub mod session;

pub use conn::{Conn, ConnDriver, Connector, GameData, Listener};
pub use error::SessionError;
pub use events::{EventSink, SessionEvent};
pub use handler::Handler;
pub use session::{Proxy, ProxyConfig, SessionIo};
