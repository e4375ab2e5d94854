//! Deposition engine internals and public API.

mod bins;
mod colored;
mod components;
mod config;
mod engine;
mod error;
mod field;
mod linked_bins;
mod sequential;
mod shared;
mod tiling;

pub use components::{ComponentMap, DISABLED};
pub use config::{DEFAULT_TILE_SIZE, DepositConfig, Strategy};
pub use engine::{DepositEngine, DepositStats, Stencil};
pub use error::{DepositError, DepositResult};
pub use field::{Array3, AtomicReal, Box2, Field};
pub use linked_bins::TILE as SHARED_TILE;
pub use shared::SCRATCH_CAPACITY;
