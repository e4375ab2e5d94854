use thiserror::Error;

/// Errors raised while configuring a `DepositEngine`.
///
/// Deposition itself has no recoverable failures; contract violations panic.
#[derive(Error, Debug)]
pub enum DepositError {
    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(usize),

    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("failed to build deposition thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type DepositResult<T> = Result<T, DepositError>;
