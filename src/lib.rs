//! Particle-to-grid deposition of charge and current.
//!
//! One entry point, [`DepositEngine::deposit`], runs one of three race-free
//! strategies picked from the engine configuration: shared-scratch tiles
//! with linked-list binning, four-color tiled host loops, or a sequential
//! reference loop.

pub mod deposit;
pub use deposit::{
    Array3, Box2, ComponentMap, DISABLED, DepositConfig, DepositEngine, DepositError, DepositResult,
    DepositStats, Field, Stencil, Strategy,
};
