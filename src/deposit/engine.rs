use log::{debug, trace};

use super::colored::{TileOrder, deposit_colored};
use super::components::ComponentMap;
use super::config::{DepositConfig, Strategy};
use super::error::DepositResult;
use super::field::{Array3, Box2, Field};
use super::sequential::deposit_sequential;
use super::shared::deposit_shared;

/// Largest cell extent a single particle writes to, fixed per kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stencil<const X: usize, const Y: usize>;

impl<const X: usize, const Y: usize> Stencil<X, Y> {
    pub const EXTENT: [usize; 2] = [X, Y];

    /// Debug-build check that the footprint starting at `cell` lies in `bounds`.
    #[inline(always)]
    pub(crate) fn debug_check(cell: [i32; 2], bounds: &Box2) {
        debug_assert!(
            bounds.contains_footprint(cell, Self::EXTENT),
            "start cell {cell:?} of the {X}x{Y} stencil outside deposition region {bounds:?}"
        );
    }
}

/// Summary of one `deposit` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositStats {
    pub strategy: Strategy,
    /// Particles for which the deposit function ran.
    pub valid_particles: usize,
    /// Tiles the region was split into (zero for the sequential loop).
    pub tiles: usize,
}

/// Particle-to-grid deposition engine.
///
/// The strategy and worker pool are fixed at construction; every call to
/// [`DepositEngine::deposit`] runs the same algorithm.
pub struct DepositEngine {
    config: DepositConfig,
    strategy: Strategy,
    threads: usize,
    pool: rayon::ThreadPool,
}

impl DepositEngine {
    pub fn new() -> DepositResult<Self> {
        Self::with_config(DepositConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(config: DepositConfig) -> DepositResult<Self> {
        config.validate()?;
        let threads = config.resolve_thread_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("deposit-{i}"))
            .build()?;
        let strategy = config.resolve_strategy(threads);
        debug!(
            "deposition engine: strategy={}, threads={threads}, tile_size={}",
            strategy.name(),
            config.tile_size
        );
        Ok(Self { config, strategy, threads, pool })
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[inline]
    pub fn config(&self) -> &DepositConfig {
        &self.config
    }

    /// Deposit every particle for which `is_valid` holds exactly once.
    ///
    /// `start_cell` gives the lowest `(x, y)` cell a particle writes to; its
    /// whole `SX × SY` footprint (and every z slice it touches) must lie in
    /// `bounds`, which must lie in `field`. `do_deposit` receives a view and
    /// the component maps to use with it: the global field with the caller's
    /// maps, or a tile scratch buffer with tile-local maps. Components marked
    /// `DISABLED` are never staged, folded back or handed out.
    ///
    /// # Panics
    /// On an empty `bounds`, `bounds` outside the field, a component index
    /// past the field's component count, or (host tiling) a tile size
    /// smaller than the stencil.
    #[allow(clippy::too_many_arguments)]
    pub fn deposit<const SX: usize, const SY: usize, const NC: usize, const ND: usize, P, V, C, F>(
        &self,
        _stencil: Stencil<SX, SY>,
        num_particles: usize,
        is_valid: V,
        start_cell: C,
        do_deposit: F,
        field: &mut Field,
        bounds: Box2,
        particles: &P,
        idx_cache: ComponentMap<NC>,
        idx_depos: ComponentMap<ND>,
    ) -> DepositStats
    where
        P: Sync + ?Sized,
        V: Fn(usize, &P) -> bool + Sync,
        C: Fn(usize, &P) -> [i32; 2] + Sync,
        F: Fn(usize, &P, Array3<'_>, &ComponentMap<NC>, &ComponentMap<ND>) + Sync,
    {
        assert!(!bounds.is_empty(), "deposition region is empty: {bounds:?}");
        assert!(
            field.bounds().contains_box(&bounds),
            "deposition region {bounds:?} outside field {:?}",
            field.bounds()
        );
        let ncomp = field.ncomp();
        for max in [idx_cache.max_component(), idx_depos.max_component()].into_iter().flatten() {
            assert!(max < ncomp, "component {max} out of range ({ncomp} components)");
        }

        let array = field.array();
        let (valid_particles, tiles) = match self.strategy {
            Strategy::SharedScratch => self.pool.install(|| {
                deposit_shared::<SX, SY, NC, ND, _, _, _, _>(
                    num_particles,
                    &is_valid,
                    &start_cell,
                    &do_deposit,
                    array,
                    bounds,
                    particles,
                    idx_cache,
                    idx_depos,
                )
            }),
            Strategy::ColorTiled => self.pool.install(|| {
                deposit_colored::<SX, SY, NC, ND, _, _, _, _>(
                    self.config.tile_size,
                    TileOrder::Forward,
                    num_particles,
                    &is_valid,
                    &start_cell,
                    &do_deposit,
                    array,
                    bounds,
                    particles,
                    idx_cache,
                    idx_depos,
                )
            }),
            Strategy::Sequential => {
                let valid = deposit_sequential::<SX, SY, NC, ND, _, _, _, _>(
                    num_particles,
                    &is_valid,
                    &start_cell,
                    &do_deposit,
                    array,
                    bounds,
                    particles,
                    idx_cache,
                    idx_depos,
                );
                (valid, 0)
            }
        };

        trace!(
            "deposit: strategy={}, particles={num_particles}, valid={valid_particles}, tiles={tiles}",
            self.strategy.name()
        );
        DepositStats { strategy: self.strategy, valid_particles, tiles }
    }
}
