//! Decorative top-down map tiles, one 16x16 image per chunk.

use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use mcproxy_proto::types::ChunkPos;
use mcproxy_world::{Chunk, AIR_RUNTIME_ID};
use tracing::debug;

/// Deterministic block color from its runtime id. Real palettes come from
/// resource packs; the map only needs stable, distinguishable hues.
fn block_color(runtime_id: u32) -> Rgba<u8> {
    let h = runtime_id.wrapping_mul(0x9E37_79B9);
    Rgba([
        96 + (h >> 8 & 0x7F) as u8,
        96 + (h >> 16 & 0x7F) as u8,
        96 + (h >> 24 & 0x7F) as u8,
        255,
    ])
}

/// Render one chunk to a 16x16 tile, heightmap-shaded. Empty columns are
/// transparent.
pub fn chunk_tile(chunk: &Chunk) -> RgbaImage {
    let mut img = RgbaImage::new(16, 16);
    let heights = chunk.heightmap();
    let (min_y, _) = chunk.dimension().range();

    for x in 0..16usize {
        for z in 0..16usize {
            let y = heights[x * 16 + z] as i32;
            if y <= min_y {
                img.put_pixel(x as u32, z as u32, Rgba([0, 0, 0, 0]));
                continue;
            }
            let rid = chunk.block(x, y, z);
            if rid == AIR_RUNTIME_ID {
                img.put_pixel(x as u32, z as u32, Rgba([0, 0, 0, 0]));
                continue;
            }
            let mut color = block_color(rid);
            // Checkerboard shading so adjacent columns stay readable;
            // saturating math keeps deep columns from wrapping.
            if (x + z) % 2 == 0 {
                for channel in color.0.iter_mut().take(3) {
                    *channel = channel.saturating_sub(10);
                }
            }
            let depth_shade = ((y - min_y) / 8).clamp(0, 24) as u8;
            for channel in color.0.iter_mut().take(3) {
                *channel = channel.saturating_add(depth_shade);
            }
            img.put_pixel(x as u32, z as u32, color);
        }
    }
    img
}

/// Writes tiles under `<world folder>/renders/`. Best effort: failures are
/// logged at debug and otherwise ignored.
pub struct MapRenderer {
    out_dir: PathBuf,
}

impl MapRenderer {
    pub fn new(world_folder: &std::path::Path) -> Self {
        Self {
            out_dir: world_folder.join("renders"),
        }
    }

    pub fn render(&self, pos: ChunkPos, chunk: &Chunk) {
        if std::fs::create_dir_all(&self.out_dir).is_err() {
            return;
        }
        let path = self.out_dir.join(format!("tile.{}.{}.png", pos.x, pos.z));
        if let Err(e) = chunk_tile(chunk).save(&path) {
            debug!(%pos, error = %e, "tile render failed");
        }
    }

    /// Remove the tile for a chunk that was dropped on resume.
    pub fn invalidate(&self, pos: ChunkPos) {
        let path = self.out_dir.join(format!("tile.{}.{}.png", pos.x, pos.z));
        std::fs::remove_file(path).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcproxy_world::{Dimension, SubChunk};

    #[test]
    fn empty_chunk_is_transparent() {
        let img = chunk_tile(&Chunk::empty(Dimension::Overworld));
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn blocks_get_opaque_stable_colors() {
        let mut chunk = Chunk::empty(Dimension::Overworld);
        let mut section = SubChunk::new_single(AIR_RUNTIME_ID);
        section.set_block(3, 0, 3, 42);
        chunk.set_section(0, Some(section));

        let a = chunk_tile(&chunk);
        let b = chunk_tile(&chunk);
        let px = a.get_pixel(3, 3);
        assert_eq!(px.0[3], 255);
        assert_eq!(a.get_pixel(3, 3), b.get_pixel(3, 3), "deterministic");
        assert_eq!(a.get_pixel(0, 0).0[3], 0, "untouched column transparent");
    }
}
