pub mod error;
pub mod spatial;
pub mod image;
pub mod interpolation;
pub mod morph;
pub mod warp;
pub mod filter;

pub use error::{Result, WarpError};
pub use image::{Volume, VolumeGeometry};
pub use morph::{DeformationModel, DenseMorph, Sample};
pub use spatial::{Affine, Point, Point3};
pub use warp::{ConversionOptions, DataFormat, WarpDirection, WarpField, WarpHeader};
