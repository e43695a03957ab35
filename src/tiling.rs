// tiling.rs — Mapping the interior region onto fixed-size tiles.
//
// The interior of an R×C image is (R-2)×(C-2). It is covered by a grid of
// tiles, each `tile.x` columns wide and `tile.y` rows tall:
//
//   grid_x = ceil((C-2) / tile.x)
//   grid_y = ceil((R-2) / tile.y)
//
// The last tile in each axis usually overhangs the interior. Every tile
// element therefore checks
//
//   if row >= R-2 || col >= C-2 { skip }
//
// before touching memory. On the GPU the tile is the workgroup and the guard
// is the first statement of the shader; on the host it is `Tile::positions`.
//
// `row` and `col` here are interior coordinates: (0, 0) is image pixel (1, 1).

use std::fmt;

use crate::error::InputError;
use crate::stencil::interior_dims;

/// Tile (workgroup) shape in pixels. Both sides are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSize {
    x: u32,
    y: u32,
}

impl TileSize {
    pub const DEFAULT: TileSize = TileSize { x: 64, y: 2 };

    /// Validated constructor.
    pub fn new(x: u32, y: u32) -> Result<Self, InputError> {
        if x == 0 || y == 0 {
            return Err(InputError::InvalidTile { x, y });
        }
        Ok(TileSize { x, y })
    }

    /// Columns per tile.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Rows per tile.
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Elements per tile (x * y). Widened so no `u32` pair can overflow.
    pub fn total(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y)
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Block × grid descriptor for one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub tile: TileSize,
    /// Tiles along x (columns).
    pub grid_x: u32,
    /// Tiles along y (rows).
    pub grid_y: u32,
    /// Interior columns (C-2, or 0).
    pub interior_cols: usize,
    /// Interior rows (R-2, or 0).
    pub interior_rows: usize,
}

impl LaunchGeometry {
    /// Geometry for an image of `rows × cols`.
    ///
    /// Images with fewer than 3 rows or columns produce an empty grid.
    pub fn for_image(rows: usize, cols: usize, tile: TileSize) -> Self {
        let (interior_cols, interior_rows) = interior_dims(cols, rows);
        LaunchGeometry {
            tile,
            grid_x: grid_len(interior_cols, tile.x),
            grid_y: grid_len(interior_rows, tile.y),
            interior_cols,
            interior_rows,
        }
    }

    /// True when there is nothing to compute.
    pub fn is_empty(&self) -> bool {
        self.grid_x == 0 || self.grid_y == 0
    }

    pub fn tile_count(&self) -> usize {
        self.grid_x as usize * self.grid_y as usize
    }

    /// Elements launched, including the guarded overhang.
    pub fn launched_elements(&self) -> usize {
        self.tile_count().saturating_mul(self.tile.total() as usize)
    }

    /// Elements that pass the guard (the interior pixel count).
    pub fn active_elements(&self) -> usize {
        self.interior_cols * self.interior_rows
    }

    /// Tile at grid position (gx, gy).
    pub fn tile_at(&self, gx: u32, gy: u32) -> Tile {
        debug_assert!(gx < self.grid_x && gy < self.grid_y);
        Tile {
            gx,
            gy,
            size: self.tile,
            interior_cols: self.interior_cols,
            interior_rows: self.interior_rows,
        }
    }

    /// All tiles in row-major grid order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.grid_y).flat_map(move |gy| (0..self.grid_x).map(move |gx| self.tile_at(gx, gy)))
    }

    /// Tiles of grid row `gy` (one horizontal band of the interior).
    pub fn band(&self, gy: u32) -> impl Iterator<Item = Tile> + '_ {
        (0..self.grid_x).map(move |gx| self.tile_at(gx, gy))
    }
}

/// One GPU dispatch covering a rectangle of the launch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchChunk {
    pub groups_x: u32,
    pub groups_y: u32,
    /// Interior row of the chunk's first element.
    pub row_offset: usize,
    /// Interior column of the chunk's first element.
    pub col_offset: usize,
}

impl LaunchGeometry {
    /// Split the grid into dispatches of at most `max_groups` workgroups
    /// per axis, in row-major chunk order. Empty for an empty grid.
    pub fn dispatch_chunks(&self, max_groups: u32) -> Vec<DispatchChunk> {
        let max_groups = max_groups.max(1);
        let mut chunks = Vec::new();
        let mut gy = 0u32;
        while gy < self.grid_y {
            let groups_y = (self.grid_y - gy).min(max_groups);
            let mut gx = 0u32;
            while gx < self.grid_x {
                let groups_x = (self.grid_x - gx).min(max_groups);
                chunks.push(DispatchChunk {
                    groups_x,
                    groups_y,
                    row_offset: gy as usize * self.tile.y as usize,
                    col_offset: gx as usize * self.tile.x as usize,
                });
                gx += groups_x;
            }
            gy += groups_y;
        }
        chunks
    }
}

impl fmt::Display for LaunchGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grid {}×{} of {}×{} tiles over {}×{} interior",
            self.grid_x, self.grid_y, self.tile.x, self.tile.y, self.interior_cols, self.interior_rows,
        )
    }
}

/// One unit of parallel work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub gx: u32,
    pub gy: u32,
    size: TileSize,
    interior_cols: usize,
    interior_rows: usize,
}

impl Tile {
    /// First interior (row, col) covered by this tile, before guarding.
    pub fn origin(&self) -> (usize, usize) {
        (
            self.gy as usize * self.size.y as usize,
            self.gx as usize * self.size.x as usize,
        )
    }

    /// Interior `(row, col)` positions this tile computes. Elements past the
    /// interior bound are skipped.
    pub fn positions(&self) -> impl Iterator<Item = (usize, usize)> {
        let (r0, c0) = self.origin();
        let row_end = (r0 + self.size.y as usize).min(self.interior_rows);
        let col_end = (c0 + self.size.x as usize).min(self.interior_cols);
        (r0..row_end).flat_map(move |row| (c0..col_end).map(move |col| (row, col)))
    }
}

/// Tiles needed to cover `n` elements, saturating at `u32::MAX`.
#[inline]
fn grid_len(n: usize, tile: u32) -> u32 {
    u32::try_from(n.div_ceil(tile as usize)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_size_rejects_zero() {
        assert!(matches!(TileSize::new(0, 2), Err(InputError::InvalidTile { x: 0, y: 2 })));
        assert!(TileSize::new(64, 0).is_err());
        assert_eq!(TileSize::new(64, 2).unwrap(), TileSize::DEFAULT);
    }

    #[test]
    fn test_grid_exact() {
        // 130 cols → 128 interior = 2 tiles of 64; 6 rows → 4 interior = 2 tiles of 2.
        let g = LaunchGeometry::for_image(6, 130, TileSize::DEFAULT);
        assert_eq!((g.grid_x, g.grid_y), (2, 2));
        assert_eq!(g.launched_elements(), g.active_elements());
    }

    #[test]
    fn test_grid_ceiling() {
        // 100×100 image → 98×98 interior. ceil(98/64) = 2, ceil(98/2) = 49.
        let g = LaunchGeometry::for_image(100, 100, TileSize::DEFAULT);
        assert_eq!((g.grid_x, g.grid_y), (2, 49));
        assert!(g.launched_elements() > g.active_elements());
    }

    #[test]
    fn test_grid_empty_for_tiny_images() {
        for (r, c) in [(0, 0), (2, 100), (100, 2), (1, 1)] {
            let g = LaunchGeometry::for_image(r, c, TileSize::DEFAULT);
            assert!(g.is_empty(), "{r}×{c} should have no tiles");
            assert_eq!(g.tiles().count(), 0);
        }
    }

    #[test]
    fn test_positions_cover_interior_exactly_once() {
        let g = LaunchGeometry::for_image(9, 13, TileSize::new(4, 3).unwrap());
        let mut seen = vec![0u32; g.active_elements()];
        for tile in g.tiles() {
            for (row, col) in tile.positions() {
                seen[row * g.interior_cols + col] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1), "coverage: {seen:?}");
    }

    #[test]
    fn test_overhanging_tile_is_guarded() {
        // 5×5 image → 3×3 interior; a single 4×4 tile overhangs by one.
        let g = LaunchGeometry::for_image(5, 5, TileSize::new(4, 4).unwrap());
        assert_eq!(g.tile_count(), 1);
        let pos: Vec<_> = g.tile_at(0, 0).positions().collect();
        assert_eq!(pos.len(), 9);
        assert!(pos.iter().all(|&(r, c)| r < 3 && c < 3));
    }

    #[test]
    fn test_band_order() {
        let g = LaunchGeometry::for_image(10, 20, TileSize::new(8, 4).unwrap());
        let band: Vec<_> = g.band(1).map(|t| t.origin()).collect();
        assert_eq!(band, vec![(4, 0), (4, 8), (4, 16)]);
    }

    #[test]
    fn test_total_does_not_overflow() {
        let t = TileSize::new(65_536, 65_536).unwrap();
        assert_eq!(t.total(), 1 << 32);
        let g = LaunchGeometry::for_image(10, 10, t);
        assert_eq!(g.tile_count(), 1);
        assert_eq!(g.active_elements(), 64);
    }

    #[test]
    fn test_tall_grid_splits_into_dispatches() {
        // 131 074 rows → 131 072 interior rows → 65 536 tiles of 2 rows.
        let g = LaunchGeometry::for_image(131_074, 3, TileSize::DEFAULT);
        assert_eq!((g.grid_x, g.grid_y), (1, 65_536));
        let chunks = g.dispatch_chunks(65_535);
        assert_eq!(
            chunks,
            vec![
                DispatchChunk { groups_x: 1, groups_y: 65_535, row_offset: 0, col_offset: 0 },
                DispatchChunk { groups_x: 1, groups_y: 1, row_offset: 131_070, col_offset: 0 },
            ]
        );
    }

    #[test]
    fn test_dispatch_chunks_cover_grid_once() {
        let g = LaunchGeometry::for_image(40, 50, TileSize::new(4, 3).unwrap());
        let mut seen = vec![0u32; g.tile_count()];
        for c in g.dispatch_chunks(5) {
            assert!(c.groups_x <= 5 && c.groups_y <= 5);
            for ly in 0..c.groups_y as usize {
                for lx in 0..c.groups_x as usize {
                    let gy = c.row_offset / 3 + ly;
                    let gx = c.col_offset / 4 + lx;
                    seen[gy * g.grid_x as usize + gx] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
        assert_eq!(g.dispatch_chunks(u32::MAX).len(), 1);
        assert!(LaunchGeometry::for_image(2, 2, TileSize::DEFAULT).dispatch_chunks(8).is_empty());
    }
}
