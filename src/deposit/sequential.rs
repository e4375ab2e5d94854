use super::components::ComponentMap;
use super::engine::Stencil;
use super::field::{Array3, Box2};

/// Reference loop: one worker, every valid particle deposited in index order.
/// Returns the number of valid particles.
#[allow(clippy::too_many_arguments)]
pub(crate) fn deposit_sequential<const SX: usize, const SY: usize, const NC: usize, const ND: usize, P, V, C, F>(
    num_particles: usize,
    is_valid: &V,
    start_cell: &C,
    do_deposit: &F,
    field: Array3<'_>,
    bounds: Box2,
    particles: &P,
    idx_cache: ComponentMap<NC>,
    idx_depos: ComponentMap<ND>,
) -> usize
where
    P: ?Sized,
    V: Fn(usize, &P) -> bool,
    C: Fn(usize, &P) -> [i32; 2],
    F: Fn(usize, &P, Array3<'_>, &ComponentMap<NC>, &ComponentMap<ND>),
{
    let mut valid = 0;
    for ip in 0..num_particles {
        if is_valid(ip, particles) {
            // The loop never bins, so the start cell is only consulted here.
            if cfg!(debug_assertions) {
                Stencil::<SX, SY>::debug_check(start_cell(ip, particles), &bounds);
            }
            do_deposit(ip, particles, field, &idx_cache, &idx_depos);
            valid += 1;
        }
    }
    valid
}
