/// Errors raised at the edges of the optimizer: input validation, engine
/// configuration and history persistence. The search itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid desired length '{0}', expected a positive number with up to six decimal places")]
    InvalidTarget(String),

    #[error("invalid pipe '{0}', expected LEN:COUNT")]
    InvalidPipe(String),

    #[error("pipe length must be a positive number at the configured precision, got {0}")]
    InvalidLength(f64),

    #[error("pipe count must be positive for length {0}")]
    InvalidStock(f64),

    #[error("too many pipes of length {0} in total")]
    StockOverflow(f64),

    #[error("at least one available pipe is required")]
    EmptyInventory,

    #[error("number of solutions must be at least 1")]
    InvalidTopN,

    #[error("unsupported precision of {0} decimal places (maximum {max})", max = crate::scale::MAX_DECIMALS)]
    InvalidDecimals(u32),

    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history format error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
