//! Volume types and grid geometry.
//!
//! This module provides the grid descriptor ([`VolumeGeometry`]) and the
//! dense multi-frame container ([`Volume`]) used for warp fields and images.

pub mod geometry;
pub mod volume;
pub mod grid;

pub use geometry::VolumeGeometry;
pub use volume::Volume;
pub use grid::raster;
