//! Linear interpolation implementation.
//!
//! Trilinear sampling of [`Volume`] frames at continuous indices.

use serde::{Deserialize, Serialize};

use crate::image::Volume;
use crate::spatial::Point3;

/// Eight `(voxel offset, weight)` pairs around a continuous index.
pub type Stencil = [(usize, f64); 8];

/// Linear Interpolator.
///
/// Performs trilinear interpolation. A point is inside the sampling domain
/// when every coordinate lies in `[0, dim - 1]`; there is no extrapolation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    /// Create a new linear interpolator.
    pub fn new() -> Self {
        Self
    }

    /// Corner offsets and weights for `point`, or `None` outside the domain.
    pub fn stencil(&self, dims: [usize; 3], point: &Point3) -> Option<Stencil> {
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        let mut frac = [0.0f64; 3];
        for axis in 0..3 {
            let x = point[axis];
            let n = dims[axis];
            if n == 0 || !(x >= 0.0 && x <= (n - 1) as f64) {
                return None;
            }
            let x0 = (x.floor() as usize).min(n - 1);
            lo[axis] = x0;
            hi[axis] = (x0 + 1).min(n - 1);
            frac[axis] = x - x0 as f64;
        }

        let [w, h, _] = dims;
        let offset = |c: usize, r: usize, s: usize| (s * h + r) * w + c;
        let mut stencil = [(0usize, 0.0f64); 8];
        for (k, slot) in stencil.iter_mut().enumerate() {
            let (bx, by, bz) = (k & 1, (k >> 1) & 1, (k >> 2) & 1);
            let c = if bx == 1 { hi[0] } else { lo[0] };
            let r = if by == 1 { hi[1] } else { lo[1] };
            let s = if bz == 1 { hi[2] } else { lo[2] };
            let wx = if bx == 1 { frac[0] } else { 1.0 - frac[0] };
            let wy = if by == 1 { frac[1] } else { 1.0 - frac[1] };
            let wz = if bz == 1 { frac[2] } else { 1.0 - frac[2] };
            *slot = (offset(c, r, s), wx * wy * wz);
        }
        Some(stencil)
    }

    /// Interpolate the first `N` frames at `point`.
    ///
    /// `valid`, when given, is a per-voxel mask; a corner that contributes a
    /// non-zero weight and is masked out makes the sample undefined.
    pub fn sample<const N: usize>(
        &self,
        volume: &Volume,
        point: &Point3,
        valid: Option<&[bool]>,
    ) -> Option<[f64; N]> {
        debug_assert!(volume.frames() >= N);
        let stencil = self.stencil(volume.dims(), point)?;
        let frames = volume.frames();
        let data = volume.data();
        let mut out = [0.0f64; N];
        for &(voxel, weight) in &stencil {
            if weight == 0.0 {
                continue;
            }
            if let Some(mask) = valid {
                if !mask[voxel] {
                    return None;
                }
            }
            let base = voxel * frames;
            for (f, acc) in out.iter_mut().enumerate() {
                *acc += weight * data[base + f] as f64;
            }
        }
        Some(out)
    }

    /// Interpolate one frame, treating everything outside the volume as zero.
    pub fn sample_or_zero(&self, volume: &Volume, frame: usize, point: &Point3) -> f64 {
        let Some(stencil) = self.stencil(volume.dims(), point) else {
            return 0.0;
        };
        let frames = volume.frames();
        let data = volume.data();
        stencil
            .iter()
            .map(|&(voxel, weight)| weight * data[voxel * frames + frame] as f64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::VolumeGeometry;

    fn ramp() -> Volume {
        // value = c + 10 r + 100 s
        let mut v = Volume::zeros(VolumeGeometry::identity([3, 3, 3]), 1);
        for s in 0..3 {
            for r in 0..3 {
                for c in 0..3 {
                    v.set(c, r, s, 0, (c + 10 * r + 100 * s) as f32);
                }
            }
        }
        v
    }

    #[test]
    fn test_exact_at_grid_points() {
        let interp = LinearInterpolator::new();
        let v = ramp();
        let out = interp.sample::<1>(&v, &Point3::new([2.0, 1.0, 2.0]), None).unwrap();
        assert_eq!(out[0], 212.0);
    }

    #[test]
    fn test_linear_between_points() {
        let interp = LinearInterpolator::new();
        let v = ramp();
        let out = interp.sample::<1>(&v, &Point3::new([0.5, 1.25, 1.5]), None).unwrap();
        assert!((out[0] - (0.5 + 12.5 + 150.0)).abs() < 1e-9);
    }

    #[test]
    fn test_outside_domain() {
        let interp = LinearInterpolator::new();
        let v = ramp();
        assert!(interp.sample::<1>(&v, &Point3::new([2.01, 0.0, 0.0]), None).is_none());
        assert!(interp.sample::<1>(&v, &Point3::new([-0.01, 0.0, 0.0]), None).is_none());
        assert_eq!(interp.sample_or_zero(&v, 0, &Point3::new([5.0, 0.0, 0.0])), 0.0);
    }

    #[test]
    fn test_mask_only_checks_contributing_corners() {
        let interp = LinearInterpolator::new();
        let v = ramp();
        let mut mask = vec![true; 27];
        mask[1] = false; // voxel (1, 0, 0)

        assert!(interp.sample::<1>(&v, &Point3::new([0.0, 0.0, 0.0]), Some(&mask)).is_some());
        assert!(interp.sample::<1>(&v, &Point3::new([0.5, 0.0, 0.0]), Some(&mask)).is_none());
    }

    #[test]
    fn test_nan_is_outside() {
        let interp = LinearInterpolator::new();
        assert!(interp.stencil([3, 3, 3], &Point3::new([f64::NAN, 0.0, 0.0])).is_none());
    }
}
