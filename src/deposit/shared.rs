//! Shared-scratch deposition (accelerator path).
//!
//! Phase 1 links valid particles into per-tile lists (`LinkedBins`).
//! Phase 2 runs one worker group per tile:
//! - stage the halo-expanded cached components into the tile's scratch
//!   buffer and zero its deposited components
//! - walk the `THREADS_PER_TILE` lists in parallel, depositing into scratch
//!   through tile-local component indices
//! - fold the deposited components back into the field with atomic adds,
//!   since neighbouring halos overlap the same global cells
//!
//! Rayon join points stand in for the block barriers, and the linked-list
//! arenas are dropped only after every tile has returned.

use rayon::prelude::*;

use super::components::ComponentMap;
use super::engine::Stencil;
use super::field::{Array3, AtomicReal, Box2};
use super::linked_bins::{COMBINE_STRIDE, LinkedBins, THREADS_PER_TILE, TILE};
use super::tiling::TileGrid;

/// Scratch reals available to one tile per z slice.
pub const SCRATCH_CAPACITY: usize = 6144;

struct ScratchShape<const SX: usize, const SY: usize, const NC: usize, const ND: usize>;

impl<const SX: usize, const SY: usize, const NC: usize, const ND: usize> ScratchShape<SX, SY, NC, ND> {
    const TILE_S_X: usize = TILE + SX - 1;
    const TILE_S_Y: usize = TILE + SY - 1;
    const NCOMP: usize = NC + ND;
    const CHECK: () = {
        assert!(SX >= 1 && SY >= 1, "stencil extent must be at least one cell");
        assert!(
            Self::TILE_S_X * Self::TILE_S_Y * Self::NCOMP <= SCRATCH_CAPACITY,
            "stencil and component count exceed the tile scratch capacity"
        );
    };
}

/// Returns `(valid_particles, tiles)`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn deposit_shared<const SX: usize, const SY: usize, const NC: usize, const ND: usize, P, V, C, F>(
    num_particles: usize,
    is_valid: &V,
    start_cell: &C,
    do_deposit: &F,
    field: Array3<'_>,
    bounds: Box2,
    particles: &P,
    idx_cache: ComponentMap<NC>,
    idx_depos: ComponentMap<ND>,
) -> (usize, usize)
where
    P: Sync + ?Sized,
    V: Fn(usize, &P) -> bool + Sync,
    C: Fn(usize, &P) -> [i32; 2] + Sync,
    F: Fn(usize, &P, Array3<'_>, &ComponentMap<NC>, &ComponentMap<ND>) + Sync,
{
    #[allow(clippy::let_unit_value)]
    let () = ScratchShape::<SX, SY, NC, ND>::CHECK;
    let tile_s = [ScratchShape::<SX, SY, NC, ND>::TILE_S_X, ScratchShape::<SX, SY, NC, ND>::TILE_S_Y];
    let ncomp = ScratchShape::<SX, SY, NC, ND>::NCOMP;

    let grid = TileGrid::new(bounds, TILE, TILE);
    let bins = LinkedBins::build(num_particles, &grid, |ip| {
        is_valid(ip, particles).then(|| {
            let cell = start_cell(ip, particles);
            Stencil::<SX, SY>::debug_check(cell, &bounds);
            cell
        })
    });

    let (z_begin, z_end) = (field.begin()[2], field.end()[2]);
    let loc_cache = idx_cache.to_local(0);
    let loc_depos = idx_depos.to_local(NC);

    (0..grid.num_tiles())
        .into_par_iter()
        .for_each_init(Vec::<AtomicReal>::new, |scratch, tile_id| {
            if bins.tile_is_empty(tile_id) {
                return;
            }
            let begin = grid.tile_begin(grid.coords_y_major(tile_id));
            let end = [
                (begin[0] + tile_s[0] as i32).min(bounds.hi[0] + 1),
                (begin[1] + tile_s[1] as i32).min(bounds.hi[1] + 1),
            ];

            // Deposited slots start at zero: the buffer is rebuilt per tile.
            let len = tile_s[0] * tile_s[1] * (z_end - z_begin) as usize * ncomp;
            scratch.clear();
            scratch.resize_with(len, AtomicReal::default);
            let shared = Array3::new(
                scratch.as_slice(),
                [begin[0], begin[1], z_begin],
                [end[0], end[1], z_end],
                ncomp,
            );

            for k in z_begin..z_end {
                for j in begin[1]..end[1] {
                    for i in begin[0]..end[0] {
                        for (n, c) in idx_cache.enabled() {
                            shared.store(i, j, k, n, field.get(i, j, k, c));
                        }
                    }
                }
            }

            (0..THREADS_PER_TILE)
                .into_par_iter()
                .with_min_len(COMBINE_STRIDE)
                .for_each(|thread| {
                    bins.for_each_in_list(tile_id, thread, |ip| {
                        do_deposit(ip, particles, shared, &loc_cache, &loc_depos);
                    });
                });

            for k in z_begin..z_end {
                for j in begin[1]..end[1] {
                    for i in begin[0]..end[0] {
                        for (n, c) in idx_depos.enabled() {
                            field.add(i, j, k, c, shared.get(i, j, k, NC + n));
                        }
                    }
                }
            }
        });

    (bins.total_len(), grid.num_tiles())
}
