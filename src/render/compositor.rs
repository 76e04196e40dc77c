//! Tile compositor: copies the renderer's packed per-environment output
//! buffer into the tiled presentation texture.
//!
//! The source buffer holds every environment's pixels consecutively in
//! row-major environment order. Each environment becomes one rectangular
//! device-to-device copy; all copies for a frame are recorded on the same
//! encoder in tile order so a single stream synchronize covers them all.

use super::layout::TileLayout;
use glam::UVec2;

/// One planned device-to-device tile copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCopy {
    pub env_index: u32,
    /// Byte offset of this environment's pixels in the packed source buffer.
    pub src_offset: u64,
    /// Destination rectangle origin in the presentation image.
    pub dst_origin: UVec2,
    /// Destination rectangle size, always one tile.
    pub extent: UVec2,
}

/// Computes the per-tile copies for one frame, in environment-index order.
///
/// A 1x1 grid degenerates to a single full-image copy.
pub fn plan(layout: &TileLayout) -> Vec<TileCopy> {
    let mut copies = Vec::with_capacity(layout.env_count() as usize);
    for y in 0..layout.tiles.y {
        for x in 0..layout.tiles.x {
            let env_index = layout.env_index(x, y);
            copies.push(TileCopy {
                env_index,
                src_offset: u64::from(env_index) * layout.tile_bytes(),
                dst_origin: layout.tile_origin(x, y),
                extent: layout.tile_dim,
            });
        }
    }
    copies
}

/// Records the planned copies from `src` into `dst` on `encoder`.
///
/// `src` is the renderer's packed color buffer, `dst` the slot's texture; the
/// caller submits the encoder on the slot's copy stream and synchronizes it
/// before the texture is read for presentation.
pub fn encode(
    encoder: &mut wgpu::CommandEncoder,
    src: &wgpu::Buffer,
    dst: &wgpu::Texture,
    layout: &TileLayout,
) {
    for copy in plan(layout) {
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: src,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: copy.src_offset,
                    bytes_per_row: Some(layout.row_bytes()),
                    rows_per_image: Some(layout.tile_dim.y),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: dst,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: copy.dst_origin.x,
                    y: copy.dst_origin.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: copy.extent.x,
                height: copy.extent.y,
                depth_or_array_layers: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{plan, TileCopy};
    use crate::render::layout::{TileLayout, BYTES_PER_PIXEL};
    use glam::UVec2;

    fn layout(img: (u32, u32), tiles: (u32, u32)) -> TileLayout {
        TileLayout::new(UVec2::new(img.0, img.1), UVec2::new(tiles.0, tiles.1)).unwrap()
    }

    /// Applies a copy plan on host memory, mirroring the row-strided transfer
    /// the encoder records on the device.
    fn apply_on_host(layout: &TileLayout, copies: &[TileCopy], src: &[u8]) -> Vec<u8> {
        let image_row = (layout.image_dim.x * BYTES_PER_PIXEL) as usize;
        let mut dst = vec![0u8; image_row * layout.image_dim.y as usize];
        for copy in copies {
            let row_bytes = layout.row_bytes() as usize;
            for row in 0..copy.extent.y as usize {
                let src_start = copy.src_offset as usize + row * row_bytes;
                let dst_start = (copy.dst_origin.y as usize + row) * image_row
                    + copy.dst_origin.x as usize * BYTES_PER_PIXEL as usize;
                dst[dst_start..dst_start + row_bytes]
                    .copy_from_slice(&src[src_start..src_start + row_bytes]);
            }
        }
        dst
    }

    #[test]
    fn twelve_environments_copy_in_row_major_order() {
        let layout = layout((768, 1024), (3, 4));
        let copies = plan(&layout);
        assert_eq!(copies.len(), 12);
        let expected_origins = [
            (0, 0),
            (256, 0),
            (512, 0),
            (0, 256),
            (256, 256),
            (512, 256),
            (0, 512),
            (256, 512),
            (512, 512),
            (0, 768),
            (256, 768),
            (512, 768),
        ];
        for (i, copy) in copies.iter().enumerate() {
            assert_eq!(copy.env_index, i as u32);
            assert_eq!(copy.src_offset, i as u64 * 256 * 256 * 4);
            assert_eq!(
                copy.dst_origin,
                UVec2::new(expected_origins[i].0, expected_origins[i].1)
            );
            assert_eq!(copy.extent, UVec2::new(256, 256));
        }
    }

    #[test]
    fn destinations_tile_the_image_without_overlap_or_gaps() {
        let layout = layout((256, 192), (4, 3));
        let copies = plan(&layout);
        let mut covered = vec![0u32; (layout.image_dim.x * layout.image_dim.y) as usize];
        for copy in &copies {
            for y in 0..copy.extent.y {
                for x in 0..copy.extent.x {
                    let px = copy.dst_origin.x + x;
                    let py = copy.dst_origin.y + y;
                    covered[(py * layout.image_dim.x + px) as usize] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&count| count == 1));
    }

    #[test]
    fn constant_filled_tiles_round_trip_to_their_rectangles() {
        let layout = layout((192, 128), (3, 2));
        let tile_bytes = layout.tile_bytes() as usize;
        let mut src = vec![0u8; layout.buffer_bytes() as usize];
        for i in 0..layout.env_count() as usize {
            src[i * tile_bytes..(i + 1) * tile_bytes].fill(i as u8 + 1);
        }

        let image = apply_on_host(&layout, &plan(&layout), &src);

        let image_row = (layout.image_dim.x * BYTES_PER_PIXEL) as usize;
        for ty in 0..layout.tiles.y {
            for tx in 0..layout.tiles.x {
                let expected = layout.env_index(tx, ty) as u8 + 1;
                let origin = layout.tile_origin(tx, ty);
                for y in 0..layout.tile_dim.y as usize {
                    let start = (origin.y as usize + y) * image_row
                        + origin.x as usize * BYTES_PER_PIXEL as usize;
                    let row = &image[start..start + layout.row_bytes() as usize];
                    assert!(row.iter().all(|&b| b == expected));
                }
            }
        }
    }

    #[test]
    fn single_tile_matches_full_image_copy() {
        let layout = layout((128, 64), (1, 1));
        let copies = plan(&layout);
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].src_offset, 0);
        assert_eq!(copies[0].dst_origin, UVec2::ZERO);
        assert_eq!(copies[0].extent, layout.image_dim);

        // Byte-identical to copying the whole packed buffer straight through.
        let src: Vec<u8> = (0..layout.buffer_bytes()).map(|b| b as u8).collect();
        let image = apply_on_host(&layout, &copies, &src);
        assert_eq!(image, src);
    }
}
