//! Four-color tiled deposition (host multicore path).
//!
//! Particles are counting-sorted by the tile of their start cell. Tiles are
//! split into four classes by `(tx mod 2, ty mod 2)`; classes run one after
//! another and the tiles of a class run in parallel. With tiles at least as
//! large as the stencil, a particle writes at most into the next tile along
//! each axis, which always belongs to another class, so concurrently running
//! tiles never write the same cell.

use rayon::prelude::*;

use super::bins::DenseBins;
use super::components::ComponentMap;
use super::engine::Stencil;
use super::field::{Array3, Box2};
use super::tiling::{NUM_COLORS, TileGrid};

/// Order in which the tiles of one color are handed to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TileOrder {
    Forward,
    Reverse,
}

/// Returns `(valid_particles, tiles)`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn deposit_colored<const SX: usize, const SY: usize, const NC: usize, const ND: usize, P, V, C, F>(
    tile_size: usize,
    order: TileOrder,
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
    assert!(
        tile_size >= SX && tile_size >= SY,
        "tile size {tile_size} is smaller than the {SX}x{SY} stencil"
    );

    let grid = TileGrid::new(bounds, tile_size, tile_size);
    let num_tiles = grid.num_tiles();

    // Bin `num_tiles` collects invalid particles and is never deposited.
    let bins = DenseBins::build(num_particles, num_tiles + 1, |ip| {
        if is_valid(ip, particles) {
            let cell = start_cell(ip, particles);
            Stencil::<SX, SY>::debug_check(cell, &bounds);
            let (t, _) = grid.locate(cell);
            grid.id_x_major(t)
        } else {
            num_tiles
        }
    });

    for color in 0..NUM_COLORS {
        let mut tiles = grid.color_tiles(color);
        if order == TileOrder::Reverse {
            tiles.reverse();
        }
        tiles.par_iter().for_each(|&tile_id| {
            for &ip in bins.bin(tile_id) {
                do_deposit(ip as usize, particles, field, &idx_cache, &idx_depos);
            }
        });
    }

    (bins.offsets()[num_tiles] as usize, num_tiles)
}

#[cfg(test)]
mod tests {
    use super::{TileOrder, deposit_colored};
    use crate::deposit::components::ComponentMap;
    use crate::deposit::field::{Array3, Box2, Field};
    use rand::{Rng, SeedableRng};

    struct Cloud {
        pos: Vec<[f64; 2]>,
        weight: Vec<f64>,
    }

    fn cloud(n: usize, size: f64, seed: u64) -> Cloud {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        Cloud {
            pos: (0..n)
                .map(|_| [rng.random_range(1.0..size - 1.0), rng.random_range(1.0..size - 1.0)])
                .collect(),
            weight: (0..n).map(|_| rng.random_range(0.1..2.0)).collect(),
        }
    }

    fn start_cell(ip: usize, c: &Cloud) -> [i32; 2] {
        [c.pos[ip][0].floor() as i32 - 1, c.pos[ip][1].floor() as i32 - 1]
    }

    fn deposit_tsc(ip: usize, c: &Cloud, field: Array3<'_>, _: &ComponentMap<0>, depos: &ComponentMap<1>) {
        let Some(rho) = depos.get(0) else {
            return;
        };
        let [x, y] = c.pos[ip];
        let [cx, cy] = [x.floor(), y.floor()];
        let (dx, dy) = (x - cx - 0.5, y - cy - 0.5);
        let wx = [0.5 * (0.5 - dx).powi(2), 0.75 - dx * dx, 0.5 * (0.5 + dx).powi(2)];
        let wy = [0.5 * (0.5 - dy).powi(2), 0.75 - dy * dy, 0.5 * (0.5 + dy).powi(2)];
        for (b, wyb) in wy.iter().enumerate() {
            for (a, wxa) in wx.iter().enumerate() {
                let i = cx as i32 - 1 + a as i32;
                let j = cy as i32 - 1 + b as i32;
                field.add(i, j, 0, rho, c.weight[ip] * wxa * wyb);
            }
        }
    }

    fn run(cloud: &Cloud, order: TileOrder, pool: &rayon::ThreadPool) -> Vec<f64> {
        let bounds = Box2::from_size(64, 64);
        let field = Field::new(bounds, 1, &["rho"]);
        pool.install(|| {
            deposit_colored::<3, 3, 0, 1, _, _, _, _>(
                8,
                order,
                cloud.pos.len(),
                &|_, _: &Cloud| true,
                &start_cell,
                &deposit_tsc,
                field.array(),
                bounds,
                cloud,
                ComponentMap::new([]),
                ComponentMap::new([0]),
            )
        });
        field.component_values(0)
    }

    #[test]
    fn tile_order_within_color_does_not_change_bits() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let cloud = cloud(20_000, 64.0, 0xC0_10_2);
        let forward = run(&cloud, TileOrder::Forward, &pool);
        let reverse = run(&cloud, TileOrder::Reverse, &pool);
        for (i, (a, b)) in forward.iter().zip(&reverse).enumerate() {
            assert_eq!(a.to_bits(), b.to_bits(), "cell {i} differs: {a} vs {b}");
        }
    }

    #[test]
    fn repeated_runs_are_bit_reproducible() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        let cloud = cloud(5_000, 64.0, 7);
        let first = run(&cloud, TileOrder::Forward, &pool);
        for _ in 0..3 {
            let again = run(&cloud, TileOrder::Forward, &pool);
            assert!(first.iter().zip(&again).all(|(a, b)| a.to_bits() == b.to_bits()));
        }
    }

    #[test]
    #[should_panic(expected = "smaller than the 3x3 stencil")]
    fn tile_smaller_than_stencil_is_fatal() {
        let bounds = Box2::from_size(8, 8);
        let field = Field::new(bounds, 1, &["rho"]);
        let cloud = cloud(1, 8.0, 1);
        deposit_colored::<3, 3, 0, 1, _, _, _, _>(
            2,
            TileOrder::Forward,
            1,
            &|_, _: &Cloud| true,
            &start_cell,
            &deposit_tsc,
            field.array(),
            bounds,
            &cloud,
            ComponentMap::new([]),
            ComponentMap::new([0]),
        );
    }
}
