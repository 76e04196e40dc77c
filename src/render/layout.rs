use glam::UVec2;

/// Packed frame buffers and the presentation image are both tightly packed
/// RGBA8.
pub const BYTES_PER_PIXEL: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tile grid must have at least one tile per axis, got {0}x{1}")]
    EmptyGrid(u32, u32),
    #[error("presentation image must be non-empty, got {0}x{1}")]
    EmptyImage(u32, u32),
    #[error("image {image_x}x{image_y} does not divide evenly into a {tiles_x}x{tiles_y} grid")]
    UnevenGrid {
        image_x: u32,
        image_y: u32,
        tiles_x: u32,
        tiles_y: u32,
    },
    #[error("tile row of {0} bytes is not {1}-byte aligned for buffer-to-texture copies")]
    RowAlignment(u32, u32),
}

/// Fixed mapping between the packed per-environment tiles and their
/// destinations in the presentation image. Environments are numbered
/// row-major across the grid, left to right then top to bottom, and a
/// tile's bytes sit at `env_index * tile_bytes` in the packed buffer.
#[derive(Debug, Clone, Copy)]
pub struct TileLayout {
    pub image_dim: UVec2,
    pub tiles: UVec2,
    pub tile_dim: UVec2,
}

impl TileLayout {
    /// Validates the grid at startup so every later copy can assume exact
    /// divisibility and copy-aligned rows.
    pub fn new(image_dim: UVec2, tiles: UVec2) -> Result<Self, ConfigError> {
        if tiles.x == 0 || tiles.y == 0 {
            return Err(ConfigError::EmptyGrid(tiles.x, tiles.y));
        }
        if image_dim.x == 0 || image_dim.y == 0 {
            return Err(ConfigError::EmptyImage(image_dim.x, image_dim.y));
        }
        if image_dim.x % tiles.x != 0 || image_dim.y % tiles.y != 0 {
            return Err(ConfigError::UnevenGrid {
                image_x: image_dim.x,
                image_y: image_dim.y,
                tiles_x: tiles.x,
                tiles_y: tiles.y,
            });
        }
        let tile_dim = image_dim / tiles;
        let row_bytes = tile_dim.x * BYTES_PER_PIXEL;
        if row_bytes % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT != 0 {
            return Err(ConfigError::RowAlignment(
                row_bytes,
                wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
            ));
        }
        Ok(Self {
            image_dim,
            tiles,
            tile_dim,
        })
    }

    pub fn env_count(&self) -> u32 {
        self.tiles.x * self.tiles.y
    }

    /// Row-major environment number for grid cell (x, y).
    pub fn env_index(&self, x: u32, y: u32) -> u32 {
        y * self.tiles.x + x
    }

    /// Top-left texel of cell (x, y) in the presentation image.
    pub fn tile_origin(&self, x: u32, y: u32) -> UVec2 {
        self.tile_dim * UVec2::new(x, y)
    }

    pub fn row_bytes(&self) -> u32 {
        self.tile_dim.x * BYTES_PER_PIXEL
    }

    pub fn tile_bytes(&self) -> u64 {
        u64::from(self.row_bytes()) * u64::from(self.tile_dim.y)
    }

    /// Size of one packed frame buffer holding every environment's tile.
    pub fn buffer_bytes(&self) -> u64 {
        self.tile_bytes() * u64::from(self.env_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_grid() {
        let layout = TileLayout::new(UVec2::new(768, 1024), UVec2::new(3, 4)).unwrap();
        assert_eq!(layout.tile_dim, UVec2::new(256, 256));
        assert_eq!(layout.env_count(), 12);
        assert_eq!(layout.env_index(0, 0), 0);
        assert_eq!(layout.env_index(2, 0), 2);
        assert_eq!(layout.env_index(0, 1), 3);
        assert_eq!(layout.env_index(2, 3), 11);
        assert_eq!(layout.tile_origin(2, 3), UVec2::new(512, 768));
        assert_eq!(layout.row_bytes(), 1024);
        assert_eq!(layout.tile_bytes(), 256 * 256 * 4);
        assert_eq!(layout.buffer_bytes(), 12 * 256 * 256 * 4);
    }

    #[test]
    fn single_tile() {
        let layout = TileLayout::new(UVec2::new(128, 64), UVec2::new(1, 1)).unwrap();
        assert_eq!(layout.tile_dim, layout.image_dim);
        assert_eq!(layout.env_count(), 1);
        assert_eq!(layout.tile_origin(0, 0), UVec2::ZERO);
        assert_eq!(layout.buffer_bytes(), 128 * 64 * 4);
    }

    #[test]
    fn rejects_uneven_grid() {
        let err = TileLayout::new(UVec2::new(768, 1022), UVec2::new(3, 4)).unwrap_err();
        assert!(matches!(err, ConfigError::UnevenGrid { .. }));
        let err = TileLayout::new(UVec2::new(770, 1024), UVec2::new(3, 4)).unwrap_err();
        assert!(matches!(err, ConfigError::UnevenGrid { .. }));
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(matches!(
            TileLayout::new(UVec2::new(768, 1024), UVec2::new(0, 4)),
            Err(ConfigError::EmptyGrid(0, 4))
        ));
        assert!(matches!(
            TileLayout::new(UVec2::new(768, 0), UVec2::new(3, 4)),
            Err(ConfigError::EmptyImage(768, 0))
        ));
    }

    #[test]
    fn rejects_unaligned_tile_rows() {
        // 100-texel tiles give 400-byte rows, not copyable as-is.
        let err = TileLayout::new(UVec2::new(300, 256), UVec2::new(3, 1)).unwrap_err();
        assert!(matches!(err, ConfigError::RowAlignment(400, _)));
    }
}
