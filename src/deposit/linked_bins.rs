//! Atomic linked-list binner for the shared-scratch path.
//!
//! Every tile owns `THREADS_PER_TILE` list heads. A particle is routed to
//! the head `loc % COMBINE_STRIDE + (count % COMBINE_THREADS) * COMBINE_STRIDE`,
//! where `loc` is its start cell inside the tile and `count` an atomically
//! incremented counter shared by the `COMBINE_THREADS` cells folded onto the
//! same stride slot. Prepending is one `swap` on the head plus a store of
//! the old head into the particle's `next` slot: an intrusive list over
//! flat index arrays, terminated by `LL_GUARD`.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use super::tiling::TileGrid;

/// Accelerator tile edge, in cells.
pub const TILE: usize = 16;
/// List heads (workers) per tile: one per cell of the tile.
pub const THREADS_PER_TILE: usize = TILE * TILE;
/// Cells sharing one counter are load-balanced over this many heads.
pub const COMBINE_THREADS: usize = 4;
pub const COMBINE_STRIDE: usize = THREADS_PER_TILE / COMBINE_THREADS;
/// End-of-list marker.
pub const LL_GUARD: u32 = u32::MAX;

const _: () = assert!(THREADS_PER_TILE % COMBINE_THREADS == 0);

pub struct LinkedBins {
    heads: Vec<AtomicU32>,
    counts: Vec<AtomicU32>,
    next: Vec<AtomicU32>,
}

impl LinkedBins {
    /// Link every particle for which `start_cell` yields `Some` into its tile.
    ///
    /// `grid` must use `TILE × TILE` tiles.
    pub fn build<S>(num_particles: usize, grid: &TileGrid, start_cell: S) -> Self
    where
        S: Fn(usize) -> Option<[i32; 2]> + Sync,
    {
        debug_assert_eq!(grid.tile_size(), [TILE, TILE]);
        assert!(num_particles < LL_GUARD as usize, "too many particles to link: {num_particles}");

        let num_tiles = grid.num_tiles();
        let bins = Self {
            heads: (0..num_tiles * THREADS_PER_TILE).map(|_| AtomicU32::new(LL_GUARD)).collect(),
            counts: (0..num_tiles * COMBINE_STRIDE).map(|_| AtomicU32::new(0)).collect(),
            next: (0..num_particles).map(|_| AtomicU32::new(LL_GUARD)).collect(),
        };

        (0..num_particles).into_par_iter().for_each(|ip| {
            let Some(cell) = start_cell(ip) else {
                return;
            };
            let (t, loc) = grid.locate(cell);
            let tile_id = grid.id_y_major(t);
            let loc_id = loc[0] + loc[1] * TILE;
            let slot = loc_id % COMBINE_STRIDE;

            let count = bins.counts[tile_id * COMBINE_STRIDE + slot].fetch_add(1, Ordering::Relaxed);
            let head = tile_id * THREADS_PER_TILE
                + slot
                + (count as usize % COMBINE_THREADS) * COMBINE_STRIDE;
            let prev = bins.heads[head].swap(ip as u32, Ordering::Relaxed);
            bins.next[ip].store(prev, Ordering::Relaxed);
        });

        bins
    }

    /// Head of list `thread` of tile `tile_id`.
    #[inline(always)]
    pub fn head(&self, tile_id: usize, thread: usize) -> u32 {
        self.heads[tile_id * THREADS_PER_TILE + thread].load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn next(&self, ip: u32) -> u32 {
        self.next[ip as usize].load(Ordering::Relaxed)
    }

    /// Number of particles linked into `tile_id`.
    #[cfg(test)]
    pub fn tile_len(&self, tile_id: usize) -> usize {
        self.counts[tile_id * COMBINE_STRIDE..(tile_id + 1) * COMBINE_STRIDE]
            .iter()
            .map(|c| c.load(Ordering::Relaxed) as usize)
            .sum()
    }

    #[inline]
    pub fn tile_is_empty(&self, tile_id: usize) -> bool {
        (0..THREADS_PER_TILE).all(|t| self.head(tile_id, t) == LL_GUARD)
    }

    pub fn total_len(&self) -> usize {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed) as usize).sum()
    }

    /// Walk list `thread` of `tile_id`, calling `f` for every particle.
    #[inline(always)]
    pub fn for_each_in_list<F: FnMut(usize)>(&self, tile_id: usize, thread: usize, mut f: F) {
        let mut current = self.head(tile_id, thread);
        while current != LL_GUARD {
            f(current as usize);
            current = self.next(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{COMBINE_STRIDE, COMBINE_THREADS, LinkedBins, THREADS_PER_TILE, TILE};
    use crate::deposit::field::Box2;
    use crate::deposit::tiling::TileGrid;
    use rand::{Rng, SeedableRng};

    fn collect_tile(bins: &LinkedBins, tile_id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        for t in 0..THREADS_PER_TILE {
            bins.for_each_in_list(tile_id, t, |ip| out.push(ip));
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn every_valid_particle_is_linked_once() {
        let bounds = Box2::from_size(50, 40);
        let grid = TileGrid::new(bounds, TILE, TILE);
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x11_57);
        let cells: Vec<[i32; 2]> =
            (0..5_000).map(|_| [rng.random_range(0..50), rng.random_range(0..40)]).collect();

        let bins = LinkedBins::build(cells.len(), &grid, |ip| (ip % 7 != 0).then(|| cells[ip]));

        let mut seen = vec![0u32; cells.len()];
        for tile_id in 0..grid.num_tiles() {
            for ip in collect_tile(&bins, tile_id) {
                seen[ip] += 1;
                let (t, _) = grid.locate(cells[ip]);
                assert_eq!(grid.id_y_major(t), tile_id, "particle {ip} in wrong tile");
            }
        }
        for (ip, &n) in seen.iter().enumerate() {
            assert_eq!(n, u32::from(ip % 7 != 0), "particle {ip} linked {n} times");
        }
        assert_eq!(bins.total_len(), cells.len() - cells.len().div_ceil(7));
    }

    #[test]
    fn same_cell_particles_spread_over_combine_heads() {
        let grid = TileGrid::new(Box2::from_size(16, 16), TILE, TILE);
        let bins = LinkedBins::build(40, &grid, |_| Some([3, 2]));
        let slot = (3 + 2 * TILE) % COMBINE_STRIDE;

        let mut lens = [0usize; COMBINE_THREADS];
        for (g, len) in lens.iter_mut().enumerate() {
            bins.for_each_in_list(0, slot + g * COMBINE_STRIDE, |_| *len += 1);
        }
        assert_eq!(lens, [10; COMBINE_THREADS]);
        assert_eq!(bins.tile_len(0), 40);
    }

    #[test]
    fn untouched_tiles_stay_empty() {
        let grid = TileGrid::new(Box2::from_size(64, 16), TILE, TILE);
        let bins = LinkedBins::build(3, &grid, |_| Some([40, 5]));
        assert!(bins.tile_is_empty(0));
        assert!(bins.tile_is_empty(1));
        assert!(!bins.tile_is_empty(2));
        assert!(bins.tile_is_empty(3));
        assert_eq!(collect_tile(&bins, 2), vec![0, 1, 2]);
    }
}
