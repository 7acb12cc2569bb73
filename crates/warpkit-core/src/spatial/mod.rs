//! Spatial types for points, spacing, direction cosines and affines.
//!
//! All types are based on nalgebra.

pub mod point;
pub mod affine;

pub use point::Point;
pub use affine::Affine;

pub type Point3 = Point<3>;
pub type Spacing3 = nalgebra::Vector3<f64>;
pub type Direction3 = nalgebra::Matrix3<f64>;
