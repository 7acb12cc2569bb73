//! Homogeneous 4×4 affine used for voxel ↔ RAS mappings.
//!
//! `Affine` is the only matrix type the engines touch. Composition follows
//! ordinary matrix products: `(a * b).transform_point(p) == a.transform_point(b.transform_point(p))`.

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use super::{Point3, Spacing3};
use crate::error::{Result, WarpError};

/// 4×4 homogeneous affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine(pub Matrix4<f64>);

impl Affine {
    /// Identity transform.
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Wrap an existing matrix.
    pub fn new(matrix: Matrix4<f64>) -> Self {
        Self(matrix)
    }

    /// Build from row-major rows.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self(Matrix4::from_fn(|r, c| rows[r][c]))
    }

    /// Build the index-to-physical matrix `[Direction · diag(spacing) | origin]`.
    ///
    /// Column `i` of `direction` is the physical direction of index axis `i`.
    pub fn from_spacing_direction_origin(
        spacing: &Spacing3,
        direction: &Matrix3<f64>,
        origin: &Point3,
    ) -> Self {
        let linear = direction * Matrix3::from_diagonal(spacing);
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&linear);
        m.fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&Vector3::new(origin[0], origin[1], origin[2]));
        Self(m)
    }

    /// Translation by `offset`.
    pub fn translation(offset: [f64; 3]) -> Self {
        Self(Matrix4::new_translation(&Vector3::from(offset)))
    }

    /// Inverse transform, or an error if the matrix is singular.
    pub fn inverse(&self) -> Result<Self> {
        self.0
            .try_inverse()
            .map(Self)
            .ok_or_else(|| WarpError::singular_affine(format!("{:?}", self.rows())))
    }

    /// Apply to a point (homogeneous coordinate 1).
    pub fn transform_point(&self, point: &Point3) -> Point3 {
        let h = self.0 * Vector4::new(point[0], point[1], point[2], 1.0);
        Point3::new([h[0], h[1], h[2]])
    }

    /// Upper-left 3×3 linear part.
    pub fn linear(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Row-major rows.
    pub fn rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self.0[(r, c)];
            }
        }
        rows
    }

    /// Get the inner nalgebra matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Affine {
    type Output = Affine;

    fn mul(self, rhs: Affine) -> Self::Output {
        Affine(self.0 * rhs.0)
    }
}
