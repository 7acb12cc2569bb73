//! Re-expression of a correspondence in one of the four data formats.

use super::format::DataFormat;
use crate::image::VolumeGeometry;
use crate::spatial::{Affine, Point3};

/// Per-sweep coordinate re-expression.
///
/// Built once from the query grid (the one the field is indexed by) and the
/// other grid (the one the stored vectors point into). Both affines it needs
/// are composed here, so `express` does no allocation and no inversion.
#[derive(Debug, Clone, Copy)]
pub struct FormatSelector {
    format: DataFormat,
    /// `other.ras2vox · query.vox2ras`
    affine_only: Affine,
    other_vox2ras: Affine,
}

impl FormatSelector {
    pub fn new(format: DataFormat, query: &VolumeGeometry, other: &VolumeGeometry) -> Self {
        Self {
            format,
            affine_only: *other.ras2vox() * *query.vox2ras(),
            other_vox2ras: *other.vox2ras(),
        }
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Linear-registration prediction of where query voxel `index` lands in the other grid.
    pub fn affine_only_index(&self, index: [usize; 3]) -> Point3 {
        self.affine_only.transform_point(&Point3::from_index(index))
    }

    /// The vector stored at query voxel `index` whose correspondence is `mapped`.
    pub fn express(&self, index: [usize; 3], mapped: &Point3) -> [f64; 3] {
        match self.format {
            DataFormat::AbsoluteIndex => mapped.to_array(),
            DataFormat::DisplacementIndex => (*mapped - self.affine_only_index(index)).into(),
            DataFormat::AbsolutePhysical => self.absolute_physical(mapped).to_array(),
            DataFormat::DisplacementPhysical => {
                let predicted = self
                    .other_vox2ras
                    .transform_point(&self.affine_only_index(index));
                (self.absolute_physical(mapped) - predicted).into()
            }
        }
    }

    fn absolute_physical(&self, mapped: &Point3) -> Point3 {
        self.other_vox2ras.transform_point(&mapped.round())
    }
}
