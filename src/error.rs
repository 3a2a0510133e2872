use thiserror::Error;

/// Error types for the kinopt-rs library.
#[derive(Error, Debug)]
pub enum KinOptError {
    /// Error indicating a mismatch in array dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A parameter range with lower > upper, or non-finite limits.
    #[error("Invalid bounds: lower ({lower}) must not exceed upper ({upper}) for slot {slot}")]
    InvalidBounds { slot: usize, lower: f64, upper: f64 },

    /// Error for invalid parameter values.
    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),

    /// Parameter not found.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// The simulator lacks a capability the estimator needs.
    #[error("Unsupported simulator capability: {0}")]
    UnsupportedCapability(String),

    /// Error while integrating the model equations.
    #[error("Integration error: {0}")]
    Integration(String),

    /// Error indicating optimization failed.
    #[error("Optimization failed: {0}")]
    OptimizationFailure(String),

    /// Chi-square test requested with non-positive degrees of freedom.
    #[error("Insufficient degrees of freedom: {0}")]
    InsufficientDegreesOfFreedom(i64),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operation that needs a fitted model was called before fitting.
    #[error("No fit available: {0}")]
    NotFitted(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for kinopt-rs operations.
pub type Result<T> = std::result::Result<T, KinOptError>;

impl From<String> for KinOptError {
    fn from(s: String) -> Self {
        KinOptError::Other(s)
    }
}

impl From<&str> for KinOptError {
    fn from(s: &str) -> Self {
        KinOptError::Other(s.to_string())
    }
}

impl From<crate::lm::bounds::BoundsError> for KinOptError {
    fn from(err: crate::lm::bounds::BoundsError) -> Self {
        KinOptError::InvalidParameter(format!("{}", err))
    }
}
