//! Tile geometry shared by the tiled deposition paths.
//!
//! Tiles partition a `Box2` starting at its low corner; the last tile along
//! each axis may be partial. Host tiles are numbered x-major
//! (`tx * ntile_y + ty`), accelerator tiles y-major (`tx + ty * ntile_x`),
//! so both orderings are exposed.

use super::field::Box2;

/// Number of interference classes of the host tiling.
pub const NUM_COLORS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    lo: [i32; 2],
    tile: [usize; 2],
    ntile: [usize; 2],
}

impl TileGrid {
    pub fn new(bounds: Box2, tile_x: usize, tile_y: usize) -> Self {
        assert!(tile_x > 0 && tile_y > 0, "tile size must be positive");
        Self {
            lo: bounds.lo,
            tile: [tile_x, tile_y],
            ntile: [bounds.length(0).div_ceil(tile_x), bounds.length(1).div_ceil(tile_y)],
        }
    }

    #[cfg(test)]
    pub fn ntile(&self) -> [usize; 2] {
        self.ntile
    }

    #[inline]
    pub fn num_tiles(&self) -> usize {
        self.ntile[0] * self.ntile[1]
    }

    #[inline]
    pub fn tile_size(&self) -> [usize; 2] {
        self.tile
    }

    /// Tile coordinates and the cell offset inside that tile.
    #[inline(always)]
    pub fn locate(&self, cell: [i32; 2]) -> ([usize; 2], [usize; 2]) {
        let rx = (cell[0] - self.lo[0]) as usize;
        let ry = (cell[1] - self.lo[1]) as usize;
        let tx = rx / self.tile[0];
        let ty = ry / self.tile[1];
        debug_assert!(
            cell[0] >= self.lo[0] && cell[1] >= self.lo[1] && tx < self.ntile[0] && ty < self.ntile[1],
            "start cell {cell:?} outside the tiled region"
        );
        ([tx, ty], [rx - tx * self.tile[0], ry - ty * self.tile[1]])
    }

    #[inline(always)]
    pub fn id_x_major(&self, t: [usize; 2]) -> usize {
        t[0] * self.ntile[1] + t[1]
    }

    #[inline(always)]
    pub fn id_y_major(&self, t: [usize; 2]) -> usize {
        t[0] + t[1] * self.ntile[0]
    }

    #[inline(always)]
    pub fn coords_y_major(&self, id: usize) -> [usize; 2] {
        [id % self.ntile[0], id / self.ntile[0]]
    }

    /// Lowest cell of tile `t`.
    #[inline(always)]
    pub fn tile_begin(&self, t: [usize; 2]) -> [i32; 2] {
        [
            self.lo[0] + (t[0] * self.tile[0]) as i32,
            self.lo[1] + (t[1] * self.tile[1]) as i32,
        ]
    }

    /// Interference class of tile `t`: `(tx mod 2, ty mod 2)` packed into `0..4`.
    #[inline(always)]
    pub fn color(t: [usize; 2]) -> usize {
        (t[0] & 1) * 2 + (t[1] & 1)
    }

    /// All x-major tile ids of one color class, in ascending order.
    pub fn color_tiles(&self, color: usize) -> Vec<usize> {
        debug_assert!(color < NUM_COLORS);
        let (px, py) = (color / 2, color % 2);
        let mut out = Vec::with_capacity(self.num_tiles().div_ceil(NUM_COLORS));
        for tx in (px..self.ntile[0]).step_by(2) {
            for ty in (py..self.ntile[1]).step_by(2) {
                out.push(self.id_x_major([tx, ty]));
            }
        }
        out
    }
}
