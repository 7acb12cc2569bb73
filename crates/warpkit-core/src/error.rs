//! Error types for warp-field operations.
//!
//! Every fallible operation in the core returns [`WarpError`]. Partial-domain
//! results (voxels a model cannot explain) are not errors; they are counted and
//! reported by the sweep instead.

use thiserror::Error;

/// Main error type for warp-field operations.
#[derive(Error, Debug)]
pub enum WarpError {
    /// A Vox2RAS or other affine could not be inverted.
    #[error("Singular affine: {0}")]
    SingularAffine(String),

    /// Shape mismatch between a buffer and the geometry it should fill.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Invalid configuration or parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The container already holds a field; convert/invert run once.
    #[error("Warp field is already populated")]
    AlreadyPopulated,

    /// The container holds no field yet.
    #[error("Warp field is empty; convert, invert or read it first")]
    NotPopulated,

    /// Direct node lookup was asked for a node outside the model lattice.
    #[error("Node lookup outside the morph lattice at index {index:?}")]
    NodeOutOfLattice { index: [usize; 3] },

    /// Input file is not of the type the operation requires.
    #[error("Unsupported input {path}: expected {expected}, found {found}")]
    UnsupportedInput {
        path: String,
        expected: String,
        found: String,
    },

    /// Persisted data-format code is not one of the four known formats.
    #[error("Unknown data format code: {0}")]
    UnknownFormat(i32),

    /// Persisted version tag is not one this crate understands.
    #[error("Unknown warp version tag: {0:#06x}")]
    UnknownVersion(i32),

    /// Operation is reserved but not implemented.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Result type for warp-field operations.
pub type Result<T> = std::result::Result<T, WarpError>;

impl WarpError {
    /// Create a singular-affine error.
    pub fn singular_affine(msg: impl Into<String>) -> Self {
        Self::SingularAffine(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an unsupported-input error.
    pub fn unsupported_input(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::UnsupportedInput {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}
