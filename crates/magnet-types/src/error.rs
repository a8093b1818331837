use thiserror::Error;

#[derive(Error, Debug)]
pub enum MagnetError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Initial guess infeasible at site {site}: |m| = {norm} exceeds bound {bound}")]
    InvalidInitialGuess { site: usize, norm: f64, bound: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type MagnetResult<T> = Result<T, MagnetError>;
