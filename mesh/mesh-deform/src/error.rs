//! Error types for point-set deformation.

use thiserror::Error;

/// Errors that can occur while building or applying a deformation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeformError {
    /// A tetrahedral frame has (near-)zero volume, so no unique affine map exists.
    #[error("{frame} frame is degenerate (normalized volume {volume:e})")]
    DegenerateFrame {
        /// Which frame failed, e.g. `"source"` or `"target"`.
        frame: &'static str,
        /// Signed volume of the edge matrix divided by the product of edge lengths.
        volume: f64,
    },

    /// The augmented RBF system cannot be solved to within tolerance.
    #[error("RBF system is singular: {reason}")]
    SingularSystem {
        /// What made the system unsolvable.
        reason: String,
    },

    /// A kernel tag that does not name any known radial kernel.
    #[error("unknown radial kernel '{0}'")]
    UnknownKernel(String),

    /// Input shapes are inconsistent with each other.
    #[error("dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The input whose shape is wrong.
        what: &'static str,
        /// The expected length or width.
        expected: usize,
        /// The length or width actually supplied.
        actual: usize,
    },

    /// A numeric parameter is out of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The control-point set is empty.
    #[error("no control points provided")]
    NoControlPoints,
}

/// Result type for deformation operations.
pub type DeformResult<T> = Result<T, DeformError>;
