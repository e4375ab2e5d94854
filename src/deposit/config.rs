//! Engine configuration and strategy selection.

use super::error::{DepositError, DepositResult};

/// Default host tile edge, in cells.
pub const DEFAULT_TILE_SIZE: usize = 16;

const ENV_ACCELERATOR: &str = "TILED_DEPOSIT_ACCELERATOR";
const ENV_TILING: &str = "TILED_DEPOSIT_TILING";
const ENV_TILE_SIZE: &str = "TILED_DEPOSIT_TILE_SIZE";
const ENV_THREADS: &str = "TILED_DEPOSIT_THREADS";

/// Deposition algorithm used by an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Linked-list binning plus per-tile scratch buffers folded back atomically.
    SharedScratch,
    /// Counting-sort binning plus a four-color parallel loop over tiles.
    ColorTiled,
    /// Single-threaded loop over particles.
    Sequential,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::SharedScratch, Strategy::ColorTiled, Strategy::Sequential];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::SharedScratch => "shared-scratch",
            Strategy::ColorTiled => "color-tiled",
            Strategy::Sequential => "sequential",
        }
    }

    /// Parse a strategy name as printed by [`Strategy::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Strategy::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Configuration for a `DepositEngine`.
///
/// Capability flags are resolved once when the engine is built. Use the
/// builder methods to override individual knobs.
#[derive(Clone, Debug)]
pub struct DepositConfig {
    /// Run the shared-scratch (accelerator) algorithm.
    pub accelerator: bool,
    /// Enable the four-color tiled host loop.
    pub tiling: bool,
    /// Host tile edge. Must be at least the stencil extent of every call.
    pub tile_size: usize,
    /// Worker threads. `None` means available parallelism.
    pub thread_count: Option<usize>,
    /// Hard cap on worker threads.
    pub max_threads: Option<usize>,
    /// Force a strategy regardless of the capability flags.
    pub strategy: Option<Strategy>,
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self {
            accelerator: false,
            tiling: true,
            tile_size: DEFAULT_TILE_SIZE,
            thread_count: None,
            max_threads: None,
            strategy: None,
        }
    }
}

fn parse_flag(var: &'static str, raw: Option<String>) -> DepositResult<Option<bool>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let v = raw.trim();
    if v.is_empty() {
        Ok(None)
    } else if v == "1" || v.eq_ignore_ascii_case("true") {
        Ok(Some(true))
    } else if v == "0" || v.eq_ignore_ascii_case("false") {
        Ok(Some(false))
    } else {
        Err(DepositError::InvalidEnv { var, value: raw })
    }
}

fn parse_count(var: &'static str, raw: Option<String>) -> DepositResult<Option<usize>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let v = raw.trim();
    if v.is_empty() {
        return Ok(None);
    }
    match v.parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(DepositError::InvalidEnv { var, value: raw }),
    }
}

impl DepositConfig {
    /// Defaults overridden by `TILED_DEPOSIT_*` environment variables.
    pub fn from_env() -> DepositResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by `TILED_DEPOSIT_*` values from `get`.
    ///
    /// Unset or blank values keep the default.
    pub fn from_lookup<G>(get: G) -> DepositResult<Self>
    where
        G: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(flag) = parse_flag(ENV_ACCELERATOR, get(ENV_ACCELERATOR))? {
            config.accelerator = flag;
        }
        if let Some(flag) = parse_flag(ENV_TILING, get(ENV_TILING))? {
            config.tiling = flag;
        }
        if let Some(size) = parse_count(ENV_TILE_SIZE, get(ENV_TILE_SIZE))? {
            config.tile_size = size;
        }
        if let Some(n) = parse_count(ENV_THREADS, get(ENV_THREADS))? {
            config.thread_count = Some(n);
        }
        Ok(config)
    }

    pub fn accelerator(mut self, enabled: bool) -> Self {
        self.accelerator = enabled;
        self
    }

    pub fn tiling(mut self, enabled: bool) -> Self {
        self.tiling = enabled;
        self
    }

    pub fn tile_size(mut self, n: usize) -> Self {
        self.tile_size = n;
        self
    }

    /// Set an explicit worker count.
    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = Some(n.max(1));
        self
    }

    /// Set a hard upper bound on workers.
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n.max(1));
        self
    }

    /// Force a specific strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn validate(&self) -> DepositResult<()> {
        if self.tile_size == 0 {
            return Err(DepositError::InvalidTileSize(self.tile_size));
        }
        Ok(())
    }

    /// Worker count after auto-detection and capping.
    pub fn resolve_thread_count(&self) -> usize {
        let mut threads = self.thread_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        if let Some(cap) = self.max_threads {
            threads = threads.min(cap);
        }
        threads.max(1)
    }

    /// Strategy for an engine running `threads` workers.
    pub fn resolve_strategy(&self, threads: usize) -> Strategy {
        if let Some(forced) = self.strategy {
            return forced;
        }
        if self.accelerator {
            Strategy::SharedScratch
        } else if self.tiling && threads > 1 {
            Strategy::ColorTiled
        } else {
            Strategy::Sequential
        }
    }
}
