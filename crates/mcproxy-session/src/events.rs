//! Session events published to the embedding UI.

use tokio::sync::mpsc;

/// Summary of one advertised pack, for download UIs.
#[derive(Debug, Clone)]
pub struct PackSummary {
    pub pack_id: String,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The proxy listener is bound and waiting for a client.
    ConnectStateBegin { listen_ip: String, listen_port: u16 },
    /// Both peers are connected and the proxy loops are running.
    ConnectStateDone,
    /// The auth store holds no valid token; the embedder should log in and
    /// flip the login watch.
    RequestLogin,
    /// The server advertised its packs.
    InitialPacksInfo { packs: Vec<PackSummary> },
    /// A pack download advanced.
    PackDownloadProgress { pack_id: String, loaded_add: u64 },
    /// One pack finished downloading.
    FinishedPack { pack_id: String, size: u64 },
    /// All packs are done; per-pack failures are listed by id.
    FinishedDownloadingPacks { errors: Vec<(String, String)> },
    /// The outer run loop ended.
    Finished,
}

/// Fan-out point for session events. A default sink drops everything, so
/// library users without a UI pay nothing.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
