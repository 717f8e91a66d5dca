//! Resource-pack negotiation and forced-pack serving.

use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use mcproxy_proto::packets::{
    PackInfoEntry, PackResponseStatus, Packet, ResourcePackChunkData, ResourcePackChunkRequest,
    ResourcePackClientResponse, ResourcePackDataInfo, ResourcePackStack, ResourcePacksInfo,
    StackEntry,
};
use mcproxy_proto::types::Uuid;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::events::{EventSink, PackSummary, SessionEvent};

/// Transfer chunk size offered when serving forced packs to the client.
const SERVE_CHUNK_SIZE: u32 = 1_048_576;

/// Terminal state of one pack download.
#[derive(Debug, Clone)]
pub struct FinishedPack {
    pub pack_id: String,
    pub name: String,
    pub size: u64,
    pub content: Bytes,
    pub error: Option<String>,
}

struct PackDownload {
    pack_id: String,
    name: String,
    size: u64,
    expected_hash: Bytes,
    chunk_count: u32,
    next_chunk: u32,
    buffer: BytesMut,
    ignored: bool,
}

/// Negotiator state. Pre-login: runs to `Ready` before the spawn sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatorState {
    Idle,
    AwaitingInfo,
    Downloading,
    AwaitingStack,
    Ready,
}

/// Drives pack-info → pack-download → pack-stack against the server.
pub struct PackNegotiator {
    state: NegotiatorState,
    downloads: Vec<PackDownload>,
    finished: Vec<FinishedPack>,
    events: EventSink,
}

impl PackNegotiator {
    pub fn new(events: EventSink) -> Self {
        Self {
            state: NegotiatorState::Idle,
            downloads: Vec::new(),
            finished: Vec::new(),
            events,
        }
    }

    /// Enter the negotiation; the next server packet should be the info.
    pub fn begin(&mut self) {
        self.state = NegotiatorState::AwaitingInfo;
    }

    pub fn state(&self) -> NegotiatorState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == NegotiatorState::Ready
    }

    /// Per-pack outcomes, valid once ready.
    pub fn finished(&self) -> &[FinishedPack] {
        &self.finished
    }

    /// Feed one server packet; returns the responses to write back.
    /// `filter` returns true for pack ids the handlers want skipped.
    pub fn handle(
        &mut self,
        pk: &Packet,
        filter: &mut dyn FnMut(&str) -> bool,
    ) -> Vec<Packet> {
        match pk {
            Packet::ResourcePacksInfo(info) => self.on_info(info, filter),
            Packet::ResourcePackDataInfo(data_info) => self.on_data_info(data_info),
            Packet::ResourcePackChunkData(chunk) => self.on_chunk_data(chunk),
            Packet::ResourcePackStack(stack) => self.on_stack(stack),
            _ => Vec::new(),
        }
    }

    fn on_info(
        &mut self,
        info: &ResourcePacksInfo,
        filter: &mut dyn FnMut(&str) -> bool,
    ) -> Vec<Packet> {
        self.events.emit(SessionEvent::InitialPacksInfo {
            packs: info
                .packs
                .iter()
                .map(|p| PackSummary {
                    pack_id: p.pack_id.to_string(),
                    name: p.sub_pack_name.clone(),
                    size: p.size,
                })
                .collect(),
        });

        let mut wanted = Vec::new();
        for pack in &info.packs {
            let uuid = pack.pack_id.to_string();
            let pack_id = format!("{}_{}", uuid, pack.version);
            let ignored = filter(&uuid);
            if ignored {
                // Echoed as already-have: no download, no error.
                debug!(pack = %pack_id, "pack filtered, skipping download");
            } else {
                wanted.push(pack_id.clone());
            }
            self.downloads.push(PackDownload {
                pack_id,
                name: pack.sub_pack_name.clone(),
                size: pack.size,
                expected_hash: Bytes::new(),
                chunk_count: 0,
                next_chunk: 0,
                buffer: BytesMut::new(),
                ignored,
            });
        }

        let response = if wanted.is_empty() {
            self.state = NegotiatorState::AwaitingStack;
            ResourcePackClientResponse {
                response: PackResponseStatus::HaveAllPacks,
                packs_to_download: Vec::new(),
            }
        } else {
            self.state = NegotiatorState::Downloading;
            ResourcePackClientResponse {
                response: PackResponseStatus::SendPacks,
                packs_to_download: wanted,
            }
        };
        vec![Packet::ResourcePackClientResponse(response)]
    }

    fn on_data_info(&mut self, data_info: &ResourcePackDataInfo) -> Vec<Packet> {
        let Some(dl) = self
            .downloads
            .iter_mut()
            .find(|d| d.pack_id == data_info.pack_id)
        else {
            warn!(pack = %data_info.pack_id, "data info for unknown pack");
            return Vec::new();
        };
        dl.size = data_info.size;
        dl.expected_hash = data_info.hash.clone();
        dl.chunk_count = data_info.chunk_count;
        dl.buffer.reserve(data_info.size as usize);
        vec![Packet::ResourcePackChunkRequest(ResourcePackChunkRequest {
            pack_id: data_info.pack_id.clone(),
            chunk_index: 0,
        })]
    }

    fn on_chunk_data(&mut self, chunk: &ResourcePackChunkData) -> Vec<Packet> {
        let Some(dl) = self
            .downloads
            .iter_mut()
            .find(|d| d.pack_id == chunk.pack_id)
        else {
            warn!(pack = %chunk.pack_id, "chunk data for unknown pack");
            return Vec::new();
        };
        dl.buffer.extend_from_slice(&chunk.data);
        dl.next_chunk = chunk.chunk_index + 1;
        self.events.emit(SessionEvent::PackDownloadProgress {
            pack_id: dl.pack_id.clone(),
            loaded_add: chunk.data.len() as u64,
        });

        if dl.next_chunk < dl.chunk_count {
            return vec![Packet::ResourcePackChunkRequest(ResourcePackChunkRequest {
                pack_id: dl.pack_id.clone(),
                chunk_index: dl.next_chunk,
            })];
        }

        // Final chunk: verify and record the outcome.
        let content: Bytes = std::mem::take(&mut dl.buffer).freeze();
        let mut error = None;
        if content.len() as u64 != dl.size {
            error = Some(format!(
                "size mismatch: got {} bytes, expected {}",
                content.len(),
                dl.size
            ));
        } else if !dl.expected_hash.is_empty() {
            let digest = Sha256::digest(&content);
            if digest.as_slice() != &dl.expected_hash[..] {
                error = Some("content hash mismatch".into());
            }
        }
        if let Some(e) = &error {
            warn!(pack = %dl.pack_id, error = %e, "pack download failed");
        } else {
            info!(pack = %dl.pack_id, size = content.len(), "pack downloaded");
        }
        self.events.emit(SessionEvent::FinishedPack {
            pack_id: dl.pack_id.clone(),
            size: dl.size,
        });
        self.finished.push(FinishedPack {
            pack_id: dl.pack_id.clone(),
            name: dl.name.clone(),
            size: dl.size,
            content,
            error,
        });
        Vec::new()
    }

    fn on_stack(&mut self, _stack: &ResourcePackStack) -> Vec<Packet> {
        self.state = NegotiatorState::Ready;
        self.events.emit(SessionEvent::FinishedDownloadingPacks {
            errors: self
                .finished
                .iter()
                .filter_map(|p| p.error.clone().map(|e| (p.pack_id.clone(), e)))
                .collect(),
        });
        vec![Packet::ResourcePackClientResponse(
            ResourcePackClientResponse {
                response: PackResponseStatus::Completed,
                packs_to_download: Vec::new(),
            },
        )]
    }
}

// -----------------------------------------------------------------------
// Forced packs
// -----------------------------------------------------------------------

/// A pack loaded from the forced-packs directory and advertised to the
/// client in addition to whatever the server sends.
#[derive(Debug, Clone)]
pub struct ForcedPack {
    pub name: String,
    pub uuid: Uuid,
    pub version: String,
    pub content: Bytes,
    pub sha256: [u8; 32],
}

impl ForcedPack {
    fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = Bytes::from(std::fs::read(path)?);
        let digest = Sha256::digest(&content);
        let mut sha256 = [0u8; 32];
        sha256.copy_from_slice(&digest);
        // Identity is derived from the content hash; the same file always
        // advertises the same pack id.
        let uuid = Uuid::new(
            u64::from_be_bytes(sha256[0..8].try_into().unwrap()),
            u64::from_be_bytes(sha256[8..16].try_into().unwrap()),
        );
        Ok(Self {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            uuid,
            version: "1.0.0".into(),
            content,
            sha256,
        })
    }

    /// `uuid_version`, the id used in data-info and chunk packets.
    pub fn pack_id(&self) -> String {
        format!("{}_{}", self.uuid, self.version)
    }

    pub fn info_entry(&self) -> PackInfoEntry {
        PackInfoEntry::new(self.uuid, self.version.clone(), self.content.len() as u64)
    }
}

/// Recursively load `.mcpack`/`.zip` files; other extensions are logged
/// and skipped.
pub fn load_forced_packs(dir: &Path) -> Vec<ForcedPack> {
    let mut packs = Vec::new();
    walk_packs(dir, &mut packs);
    packs
}

fn walk_packs(dir: &Path, packs: &mut Vec<ForcedPack>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_packs(&path, packs);
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("mcpack") | Some("zip") => match ForcedPack::from_file(&path) {
                Ok(pack) => {
                    info!(pack = %pack.name, size = pack.content.len(), "added forced pack");
                    packs.push(pack);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to load pack"),
            },
            _ => warn!(path = %path.display(), "unrecognized file in forced packs directory"),
        }
    }
}

// -----------------------------------------------------------------------
// Client-side pack serving
// -----------------------------------------------------------------------

/// Serves the pre-spawn pack negotiation toward the attached client,
/// advertising the server's packs plus the forced ones and answering chunk
/// requests for forced content.
pub struct ClientPackServer {
    forced: Arc<Vec<ForcedPack>>,
    server_packs: Vec<PackInfoEntry>,
    done: bool,
}

impl ClientPackServer {
    pub fn new(forced: Arc<Vec<ForcedPack>>, server_packs: Vec<PackInfoEntry>) -> Self {
        Self {
            forced,
            server_packs,
            done: false,
        }
    }

    /// The advertisement written right after the client connects.
    pub fn advertisement(&self) -> Packet {
        let mut packs = self.server_packs.clone();
        packs.extend(self.forced.iter().map(ForcedPack::info_entry));
        Packet::ResourcePacksInfo(ResourcePacksInfo {
            must_accept: false,
            packs,
            ..Default::default()
        })
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn find_forced(&self, pack_id: &str) -> Option<&ForcedPack> {
        self.forced.iter().find(|p| p.pack_id() == pack_id)
    }

    fn stack(&self) -> Packet {
        Packet::ResourcePackStack(ResourcePackStack {
            texture_packs: self
                .forced
                .iter()
                .map(|p| StackEntry {
                    pack_id: p.uuid.to_string(),
                    version: p.version.clone(),
                    sub_pack_name: String::new(),
                })
                .collect(),
            ..Default::default()
        })
    }

    /// Feed one client packet; returns responses for the client. Packets
    /// that are not part of the negotiation yield nothing.
    pub fn handle(&mut self, pk: &Packet) -> Vec<Packet> {
        match pk {
            Packet::ResourcePackClientResponse(resp) => match resp.response {
                PackResponseStatus::SendPacks => resp
                    .packs_to_download
                    .iter()
                    .filter_map(|id| self.find_forced(id))
                    .map(|p| {
                        Packet::ResourcePackDataInfo(ResourcePackDataInfo {
                            pack_id: p.pack_id(),
                            max_chunk_size: SERVE_CHUNK_SIZE,
                            chunk_count: (p.content.len() as u32).div_ceil(SERVE_CHUNK_SIZE).max(1),
                            size: p.content.len() as u64,
                            hash: Bytes::copy_from_slice(&p.sha256),
                            premium: false,
                            pack_type: 1,
                        })
                    })
                    .collect(),
                PackResponseStatus::HaveAllPacks => vec![self.stack()],
                PackResponseStatus::Completed => {
                    self.done = true;
                    Vec::new()
                }
                PackResponseStatus::Refused => {
                    warn!("client refused packs");
                    self.done = true;
                    Vec::new()
                }
            },
            Packet::ResourcePackChunkRequest(req) => {
                let Some(pack) = self.find_forced(&req.pack_id) else {
                    return Vec::new();
                };
                let start = (req.chunk_index * SERVE_CHUNK_SIZE) as usize;
                let end = (start + SERVE_CHUNK_SIZE as usize).min(pack.content.len());
                if start >= pack.content.len() {
                    return Vec::new();
                }
                vec![Packet::ResourcePackChunkData(ResourcePackChunkData {
                    pack_id: req.pack_id.clone(),
                    chunk_index: req.chunk_index,
                    progress: start as u64,
                    data: pack.content.slice(start..end),
                })]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn info_packet(packs: Vec<PackInfoEntry>) -> Packet {
        Packet::ResourcePacksInfo(ResourcePacksInfo {
            must_accept: true,
            packs,
            ..Default::default()
        })
    }

    fn chunked(pack_id: &str, index: u32, data: &[u8]) -> Packet {
        Packet::ResourcePackChunkData(ResourcePackChunkData {
            pack_id: pack_id.into(),
            chunk_index: index,
            progress: 0,
            data: Bytes::copy_from_slice(data),
        })
    }

    #[test]
    fn full_negotiation_happy_path() {
        let mut negotiator = PackNegotiator::new(EventSink::default());
        negotiator.begin();
        assert_eq!(negotiator.state(), NegotiatorState::AwaitingInfo);

        let entry = PackInfoEntry::new(Uuid::new(1, 2), "1.0.0", 4);
        let pack_id = format!("{}_1.0.0", Uuid::new(1, 2));
        let responses = negotiator.handle(&info_packet(vec![entry]), &mut |_| false);
        assert_eq!(negotiator.state(), NegotiatorState::Downloading);
        match &responses[0] {
            Packet::ResourcePackClientResponse(r) => {
                assert_eq!(r.response, PackResponseStatus::SendPacks);
                assert_eq!(r.packs_to_download, vec![pack_id.clone()]);
            }
            other => panic!("unexpected {}", other.name()),
        }

        let content = b"pack";
        let digest = Sha256::digest(content);
        let responses = negotiator.handle(
            &Packet::ResourcePackDataInfo(ResourcePackDataInfo {
                pack_id: pack_id.clone(),
                max_chunk_size: 2,
                chunk_count: 2,
                size: 4,
                hash: Bytes::copy_from_slice(&digest),
                premium: false,
                pack_type: 1,
            }),
            &mut |_| false,
        );
        assert!(matches!(
            responses[0],
            Packet::ResourcePackChunkRequest(ResourcePackChunkRequest { chunk_index: 0, .. })
        ));

        let responses = negotiator.handle(&chunked(&pack_id, 0, b"pa"), &mut |_| false);
        assert!(matches!(
            responses[0],
            Packet::ResourcePackChunkRequest(ResourcePackChunkRequest { chunk_index: 1, .. })
        ));
        negotiator.handle(&chunked(&pack_id, 1, b"ck"), &mut |_| false);

        let responses = negotiator.handle(
            &Packet::ResourcePackStack(ResourcePackStack::default()),
            &mut |_| false,
        );
        assert!(negotiator.is_ready());
        match &responses[0] {
            Packet::ResourcePackClientResponse(r) => {
                assert_eq!(r.response, PackResponseStatus::Completed);
            }
            other => panic!("unexpected {}", other.name()),
        }
        let finished = negotiator.finished();
        assert_eq!(finished.len(), 1);
        assert!(finished[0].error.is_none());
        assert_eq!(&finished[0].content[..], b"pack");
    }

    #[test]
    fn filtered_packs_are_not_requested() {
        let mut negotiator = PackNegotiator::new(EventSink::default());
        negotiator.begin();
        let responses = negotiator.handle(
            &info_packet(vec![PackInfoEntry::new(Uuid::new(9, 9), "1.0.0", 10)]),
            &mut |_| true,
        );
        assert_eq!(negotiator.state(), NegotiatorState::AwaitingStack);
        match &responses[0] {
            Packet::ResourcePackClientResponse(r) => {
                assert_eq!(r.response, PackResponseStatus::HaveAllPacks);
                assert!(r.packs_to_download.is_empty());
            }
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[test]
    fn hash_mismatch_recorded_not_fatal() {
        let mut negotiator = PackNegotiator::new(EventSink::default());
        negotiator.begin();
        let uuid = Uuid::new(5, 5);
        let pack_id = format!("{uuid}_1.0.0");
        negotiator.handle(
            &info_packet(vec![PackInfoEntry::new(uuid, "1.0.0", 4)]),
            &mut |_| false,
        );
        negotiator.handle(
            &Packet::ResourcePackDataInfo(ResourcePackDataInfo {
                pack_id: pack_id.clone(),
                max_chunk_size: 4,
                chunk_count: 1,
                size: 4,
                hash: Bytes::from_static(&[0u8; 32]),
                premium: false,
                pack_type: 1,
            }),
            &mut |_| false,
        );
        negotiator.handle(&chunked(&pack_id, 0, b"data"), &mut |_| false);
        negotiator.handle(
            &Packet::ResourcePackStack(ResourcePackStack::default()),
            &mut |_| false,
        );
        assert!(negotiator.is_ready(), "session proceeds despite failure");
        assert!(negotiator.finished()[0].error.is_some());
    }

    #[test]
    fn forced_pack_dir_filters_extensions() {
        let dir: PathBuf =
            std::env::temp_dir().join(format!("mcproxy_packs_{}", rand::random::<u64>()));
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("a.mcpack"), b"AAAA").unwrap();
        std::fs::write(dir.join("nested/b.zip"), b"BBBB").unwrap();
        std::fs::write(dir.join("readme.txt"), b"nope").unwrap();

        let mut packs = load_forced_packs(&dir);
        packs.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(packs.len(), 2);
        assert_eq!(packs[0].name, "a");
        assert_eq!(packs[1].name, "b");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn client_pack_server_serves_forced_chunks() {
        let forced = Arc::new(vec![ForcedPack {
            name: "extra".into(),
            uuid: Uuid::new(7, 7),
            version: "1.0.0".into(),
            content: Bytes::from_static(b"forced pack bytes"),
            sha256: [0; 32],
        }]);
        let pack_id = forced[0].pack_id();
        let mut server = ClientPackServer::new(forced, Vec::new());

        match server.advertisement() {
            Packet::ResourcePacksInfo(info) => assert_eq!(info.packs.len(), 1),
            other => panic!("unexpected {}", other.name()),
        }

        let responses = server.handle(&Packet::ResourcePackClientResponse(
            ResourcePackClientResponse {
                response: PackResponseStatus::SendPacks,
                packs_to_download: vec![pack_id.clone()],
            },
        ));
        assert!(matches!(responses[0], Packet::ResourcePackDataInfo(_)));

        let responses = server.handle(&Packet::ResourcePackChunkRequest(
            ResourcePackChunkRequest {
                pack_id,
                chunk_index: 0,
            },
        ));
        match &responses[0] {
            Packet::ResourcePackChunkData(chunk) => {
                assert_eq!(&chunk.data[..], b"forced pack bytes");
            }
            other => panic!("unexpected {}", other.name()),
        }

        server.handle(&Packet::ResourcePackClientResponse(
            ResourcePackClientResponse {
                response: PackResponseStatus::Completed,
                packs_to_download: Vec::new(),
            },
        ));
        assert!(server.is_done());
    }
}
