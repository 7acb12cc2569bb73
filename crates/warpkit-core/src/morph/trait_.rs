//! Deformation model trait consumed by the conversion engines.

use crate::error::Result;
use crate::image::VolumeGeometry;
use crate::spatial::Point3;

/// Outcome of asking a model where a point maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Continuous index in the other grid.
    Mapped(Point3),
    /// The model has no defined mapping at the query point.
    OutOfDomain,
}

impl Sample {
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self, Sample::OutOfDomain)
    }

    pub fn mapped(&self) -> Option<Point3> {
        match self {
            Sample::Mapped(p) => Some(*p),
            Sample::OutOfDomain => None,
        }
    }
}

/// Non-linear mapping between an *image* (source) grid and an *atlas* (target) grid.
///
/// Forward maps atlas indices to image indices; inverse maps image indices
/// to atlas indices. Models are read-only during a sweep and may be queried
/// from several threads at once.
pub trait DeformationModel: Send + Sync {
    /// Source (pre-morph) grid.
    fn image(&self) -> &VolumeGeometry;

    /// Target (post-morph) grid.
    fn atlas(&self) -> &VolumeGeometry;

    /// Atlas index → image index, interpolated by the model.
    fn sample_forward(&self, atlas_index: &Point3) -> Sample;

    /// Image index → atlas index.
    ///
    /// Only meaningful after [`DeformationModel::build_inverse`].
    fn sample_inverse(&self, image_index: &Point3) -> Sample;

    /// Image index stored at a lattice node, without interpolation.
    ///
    /// `None` when the index is outside the model's native lattice.
    fn node(&self, _index: [usize; 3]) -> Option<Point3> {
        None
    }

    /// Materialise whatever structure `sample_inverse` needs, sized to an
    /// image grid of `image_dims`.
    fn build_inverse(&mut self, _image_dims: [usize; 3]) -> Result<()> {
        Ok(())
    }
}
