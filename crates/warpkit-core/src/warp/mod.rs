//! Warp field conversion.
//!
//! A deformation model is swept over one of its grids and every voxel's
//! correspondence is stored in a [`WarpField`] in one of four
//! [`DataFormat`]s. Forward fields are indexed by the atlas grid, inverse
//! fields by the image grid.

pub mod engine;
pub mod field;
pub mod format;
pub mod options;
pub mod selector;
pub mod stats;

pub use engine::{convert_forward, convert_inverse, SweepReport, VECTOR_FRAMES};
pub use field::{WarpField, WarpHeader};
pub use format::{DataFormat, WarpDirection, WarpLayout, MGH_VERSION};
pub use options::{ConversionOptions, OutOfDomainPolicy, SamplingStrategy};
pub use selector::FormatSelector;
pub use stats::{vector_stats, VectorStats};
