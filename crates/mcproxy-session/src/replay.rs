//! Packet-capture files and the replay-backed peer.
//!
//! The capture format is a flat frame stream:
//! `"MCPR"` magic, `u16` version, then frames of
//! `[kind:u8][len:u32_le][body]`. Packet frames (kinds 0/1) carry
//! `[t_micros:u64_le][header varint + payload]`; kind 2 carries the
//! server's game data as JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::{Buf, Bytes};
use mcproxy_proto::codec::{ProtoDecode, ProtoEncode};
use mcproxy_proto::packets::{decode_packet, Packet, PacketHeader};
use tracing::{debug, warn};

use crate::conn::{loopback_addr, pair, Conn, GameData, PacketTap};
use crate::error::SessionError;

const MAGIC: &[u8; 4] = b"MCPR";
const VERSION: u16 = 1;

/// Frame kinds.
pub const KIND_CLIENTBOUND: u8 = 0;
pub const KIND_SERVERBOUND: u8 = 1;
pub const KIND_GAME_DATA: u8 = 2;

/// Streams captured frames to disk.
pub struct CaptureWriter {
    out: BufWriter<File>,
}

impl CaptureWriter {
    pub fn create(path: &Path) -> Result<Self, SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(MAGIC)?;
        out.write_all(&VERSION.to_le_bytes())?;
        Ok(Self { out })
    }

    pub fn write_frame(
        &mut self,
        kind: u8,
        t_micros: u64,
        header: &PacketHeader,
        payload: &[u8],
    ) -> Result<(), SessionError> {
        let mut head = bytes::BytesMut::new();
        header.proto_encode(&mut head);
        let len = 8 + head.len() + payload.len();
        self.out.write_all(&[kind])?;
        self.out.write_all(&(len as u32).to_le_bytes())?;
        self.out.write_all(&t_micros.to_le_bytes())?;
        self.out.write_all(&head)?;
        self.out.write_all(payload)?;
        Ok(())
    }

    pub fn write_game_data(&mut self, gd: &GameData) -> Result<(), SessionError> {
        let body = serde_json::to_vec(gd).map_err(|e| SessionError::Replay(e.to_string()))?;
        self.out.write_all(&[KIND_GAME_DATA])?;
        self.out.write_all(&(body.len() as u32).to_le_bytes())?;
        self.out.write_all(&body)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SessionError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Open a capture file as a server-side peer. Client-bound frames are
/// replayed through the returned [`Conn`]; server-bound frames only feed
/// the raw tap. The spawn sequence completes once the game-data frame (or
/// end of file) is reached.
pub fn open_replay(path: &Path, tap: Option<PacketTap>) -> Result<Conn, SessionError> {
    let data = Bytes::from(std::fs::read(path)?);
    if data.len() < 6 || &data[0..4] != MAGIC {
        return Err(SessionError::Replay("not a capture file".into()));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != VERSION {
        return Err(SessionError::Replay(format!(
            "unsupported capture version {version}"
        )));
    }

    let (conn, driver) = pair(loopback_addr(19132), loopback_addr(0));
    if let Some(tap) = tap {
        conn.set_tap(tap);
    }

    // Equivalent of reading until login on a live dial: find the game data
    // up front so the spawn sequence can complete before the packet stream
    // is consumed.
    if let Some(gd) = scan_game_data(&data) {
        driver.set_game_data(gd);
    }
    driver.complete_spawn();

    tokio::spawn(async move {
        let mut buf = data.slice(6..);
        while buf.remaining() >= 5 {
            let kind = buf.get_u8();
            let len = buf.get_u32_le() as usize;
            if buf.remaining() < len {
                warn!("truncated capture frame, stopping replay");
                break;
            }
            let mut body = buf.split_to(len);
            match kind {
                KIND_CLIENTBOUND => {
                    if body.remaining() < 8 {
                        continue;
                    }
                    let _t_micros = body.get_u64_le();
                    let Ok(header) = PacketHeader::proto_decode(&mut body) else {
                        continue;
                    };
                    let payload = body.copy_to_bytes(body.remaining());
                    let pk = decode_packet(header, payload.clone()).unwrap_or(Packet::Unknown {
                        packet_id: header.packet_id,
                        payload,
                    });
                    driver.deliver_async(pk).await;
                }
                // Server-bound frames are not replayed; the local player
                // drives the session.
                KIND_SERVERBOUND | KIND_GAME_DATA => {}
                other => debug!(kind = other, "skipping unknown capture frame"),
            }
            if driver.is_closed() {
                return;
            }
        }
        driver.close();
    });

    Ok(conn)
}

fn scan_game_data(data: &Bytes) -> Option<GameData> {
    let mut buf = data.slice(6..);
    while buf.remaining() >= 5 {
        let kind = buf.get_u8();
        let len = buf.get_u32_le() as usize;
        if buf.remaining() < len {
            return None;
        }
        let body = buf.split_to(len);
        if kind == KIND_GAME_DATA {
            match serde_json::from_slice::<GameData>(&body) {
                Ok(gd) => return Some(gd),
                Err(e) => {
                    warn!(error = %e, "bad game data frame");
                    return None;
                }
            }
        }
    }
    None
}
