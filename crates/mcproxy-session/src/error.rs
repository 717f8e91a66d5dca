//! Session error taxonomy.

use thiserror::Error;

/// Errors flowing through the session controller. `TransferRequested` is a
/// control-flow signal rather than a failure; the outer connect loop
/// consumes it and reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Read or write on a peer that was closed locally. Treated as clean EOF.
    #[error("peer closed")]
    PeerClosed,

    /// The remote ended the connection; the message is the server-supplied
    /// reason and becomes the user-visible disconnect cause.
    #[error("{0}")]
    Disconnect(String),

    /// A handler returned an error; aborts the session with that cause.
    #[error("handler {name}: {message}")]
    Handler { name: String, message: String },

    /// A pre-spawn server hook vetoed the connection. Clean teardown.
    #[error("connection cancelled")]
    CancelConnect,

    /// An intercepted Transfer packet; the controller reconnects upstream.
    #[error("transfer to {address}:{port}")]
    TransferRequested { address: String, port: u16 },

    #[error("listen on {address}: {message}")]
    Listen { address: String, message: String },

    #[error("dial {address}: {message}")]
    Dial { address: String, message: String },

    #[error("replay: {0}")]
    Replay(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid connect string: {0}")]
    BadConnectString(String),
}

impl SessionError {
    pub fn handler(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Handler {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
