//! Interpolation methods for sampling volumes at continuous indices.

pub mod linear;

pub use linear::LinearInterpolator;
