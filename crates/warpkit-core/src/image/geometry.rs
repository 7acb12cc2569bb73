//! Grid descriptor: dimensions plus the Vox2RAS / RAS2Vox pair.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::spatial::{Affine, Direction3, Point3, Spacing3};

/// Volume geometry with physical metadata.
///
/// Describes a 3-D index space `(c, r, s)` of `dims = [width, height, depth]`
/// and how indices map to physical (RAS) coordinates.
///
/// # Coordinate Systems
/// * **Index Space**: voxel indices, column / row / slice
/// * **Physical Space**: continuous RAS coordinates in mm
///
/// `ras2vox` is always the inverse of `vox2ras`; both are fixed at
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeGeometry {
    dims: [usize; 3],
    vox2ras: Affine,
    ras2vox: Affine,
}

impl VolumeGeometry {
    /// Create a geometry from dimensions and an index-to-physical affine.
    ///
    /// Fails if `vox2ras` is singular.
    pub fn new(dims: [usize; 3], vox2ras: Affine) -> Result<Self> {
        let ras2vox = vox2ras.inverse()?;
        Ok(Self {
            dims,
            vox2ras,
            ras2vox,
        })
    }

    /// Geometry whose physical and index coordinates coincide.
    pub fn identity(dims: [usize; 3]) -> Self {
        Self {
            dims,
            vox2ras: Affine::identity(),
            ras2vox: Affine::identity(),
        }
    }

    /// Create from spacing, direction cosines and the physical position of voxel (0, 0, 0).
    ///
    /// `point = origin + Direction * (index * spacing)`
    pub fn from_origin(
        dims: [usize; 3],
        spacing: Spacing3,
        direction: Direction3,
        origin: Point3,
    ) -> Result<Self> {
        Self::new(
            dims,
            Affine::from_spacing_direction_origin(&spacing, &direction, &origin),
        )
    }

    /// Create from spacing, direction cosines and the physical position of the volume centre.
    ///
    /// The centre is the physical point of continuous index `dims / 2`, so
    /// `origin = c_ras - Direction * (spacing * dims / 2)`.
    pub fn from_center(
        dims: [usize; 3],
        spacing: Spacing3,
        direction: Direction3,
        c_ras: Point3,
    ) -> Result<Self> {
        let half = Spacing3::new(
            dims[0] as f64 / 2.0,
            dims[1] as f64 / 2.0,
            dims[2] as f64 / 2.0,
        );
        let offset = direction * spacing.component_mul(&half);
        let origin = Point3::new([
            c_ras[0] - offset[0],
            c_ras[1] - offset[1],
            c_ras[2] - offset[2],
        ]);
        Self::from_origin(dims, spacing, direction, origin)
    }

    /// `[width, height, depth]`.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn width(&self) -> usize {
        self.dims[0]
    }

    pub fn height(&self) -> usize {
        self.dims[1]
    }

    pub fn depth(&self) -> usize {
        self.dims[2]
    }

    /// Number of voxels.
    pub fn voxel_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Index-to-physical affine.
    pub fn vox2ras(&self) -> &Affine {
        &self.vox2ras
    }

    /// Physical-to-index affine.
    pub fn ras2vox(&self) -> &Affine {
        &self.ras2vox
    }

    /// Voxel size along each index axis (column norms of the linear part).
    pub fn spacing(&self) -> Spacing3 {
        let linear = self.vox2ras.linear();
        Spacing3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        )
    }

    /// Unit direction cosines, one column per index axis.
    ///
    /// A degenerate (zero-length) column falls back to the matching unit axis.
    pub fn direction(&self) -> Direction3 {
        let linear = self.vox2ras.linear();
        let spacing = self.spacing();
        let mut direction = Direction3::identity();
        for i in 0..3 {
            if spacing[i] > 1e-12 {
                direction.set_column(i, &(linear.column(i) / spacing[i]));
            }
        }
        direction
    }

    /// Physical coordinate of the volume centre (continuous index `dims / 2`).
    pub fn center(&self) -> Point3 {
        self.index_to_physical(&Point3::new([
            self.dims[0] as f64 / 2.0,
            self.dims[1] as f64 / 2.0,
            self.dims[2] as f64 / 2.0,
        ]))
    }

    /// Map a continuous index to a physical point.
    pub fn index_to_physical(&self, index: &Point3) -> Point3 {
        self.vox2ras.transform_point(index)
    }

    /// Map a physical point to a continuous index.
    pub fn physical_to_index(&self, point: &Point3) -> Point3 {
        self.ras2vox.transform_point(point)
    }

    /// True if the integer index lies inside the volume.
    pub fn contains(&self, index: [usize; 3]) -> bool {
        index[0] < self.dims[0] && index[1] < self.dims[1] && index[2] < self.dims[2]
    }
}
