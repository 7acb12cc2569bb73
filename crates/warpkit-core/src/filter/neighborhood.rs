//! Per-voxel neighbourhood statistics.
//!
//! All statistics read frame 0 of a [`Volume`]. Finite differences clamp
//! out-of-range indices to the border; window statistics clip the window to
//! the volume.

use crate::error::{Result, WarpError};
use crate::image::Volume;
use crate::interpolation::LinearInterpolator;
use crate::spatial::Point3;

/// Largest window accepted by [`NeighborhoodStats::local_direction`].
pub const MAX_DIRECTION_WINDOW: usize = 7;

const DIRECTION_SCALE: f64 = 1.0 / (1000.0 * 27.0);

/// Neighbourhood statistics over one volume.
pub struct NeighborhoodStats<'a> {
    volume: &'a Volume,
    interpolator: LinearInterpolator,
}

impl<'a> NeighborhoodStats<'a> {
    pub fn new(volume: &'a Volume) -> Self {
        Self {
            volume,
            interpolator: LinearInterpolator::new(),
        }
    }

    /// Border-clamped voxel value.
    fn at(&self, x: isize, y: isize, z: isize) -> f64 {
        let [w, h, d] = self.volume.dims();
        let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;
        self.volume.get(clamp(x, w), clamp(y, h), clamp(z, d), 0) as f64
    }

    /// Smoothed central difference along `axis`, weighting the on-axis
    /// neighbour twice and its two neighbours along `across` once.
    fn derivative(&self, index: [isize; 3], axis: usize, across: usize) -> f64 {
        let tap = |sign: isize, offset: isize| {
            let mut p = index;
            p[axis] += sign;
            p[across] += offset;
            self.at(p[0], p[1], p[2])
        };
        let lower = 2.0 * tap(-1, 0) + tap(-1, -1) + tap(-1, 1);
        let upper = 2.0 * tap(1, 0) + tap(1, -1) + tap(1, 1);
        (upper - lower) / 8.0
    }

    fn signed(index: [usize; 3]) -> [isize; 3] {
        index.map(|v| v as isize)
    }

    pub fn gradient_x(&self, index: [usize; 3]) -> f64 {
        self.derivative(Self::signed(index), 0, 1)
    }

    /// Symmetric kernel, the transpose of [`Self::gradient_x`]. Values differ from
    /// kernels that weight the `x - 1` corner twice.
    pub fn gradient_y(&self, index: [usize; 3]) -> f64 {
        self.derivative(Self::signed(index), 1, 0)
    }

    /// Symmetric kernel, like [`Self::gradient_y`]; not the corner-weighted legacy form.
    pub fn gradient_z(&self, index: [usize; 3]) -> f64 {
        self.derivative(Self::signed(index), 2, 0)
    }

    fn gradient_at(&self, index: [isize; 3]) -> [f64; 3] {
        [
            self.derivative(index, 0, 1),
            self.derivative(index, 1, 0),
            self.derivative(index, 2, 0),
        ]
    }

    /// Gradient magnitude and components.
    pub fn gradient(&self, index: [usize; 3]) -> (f64, [f64; 3]) {
        let g = self.gradient_at(Self::signed(index));
        let mag = (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt();
        (mag, g)
    }

    /// Inclusive window bounds per axis, clipped to the volume.
    fn window(&self, index: [usize; 3], size: usize) -> [(usize, usize); 3] {
        let half = size / 2;
        let dims = self.volume.dims();
        [0, 1, 2].map(|a| {
            (
                index[a].saturating_sub(half),
                (index[a] + half).min(dims[a] - 1),
            )
        })
    }

    fn window_values(&self, index: [usize; 3], size: usize) -> impl Iterator<Item = f64> + '_ {
        let [(x0, x1), (y0, y1), (z0, z1)] = self.window(index, size);
        (z0..=z1).flat_map(move |z| {
            (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| self.volume.get(x, y, z, 0) as f64))
        })
    }

    fn window_len(&self, index: [usize; 3], size: usize) -> usize {
        self.window(index, size)
            .iter()
            .map(|(lo, hi)| hi - lo + 1)
            .product()
    }

    pub fn local_mean(&self, index: [usize; 3], size: usize) -> f64 {
        let n = self.window_len(index, size);
        self.window_values(index, size).sum::<f64>() / n as f64
    }

    pub fn local_min(&self, index: [usize; 3], size: usize) -> f64 {
        let [x, y, z] = index;
        let centre = self.volume.get(x, y, z, 0) as f64;
        self.window_values(index, size).fold(centre, f64::min)
    }

    /// Root of the summed squared deviation, divided by the window count.
    ///
    /// This is not the usual standard deviation; it keeps the normalisation
    /// existing thresholds were tuned against.
    pub fn local_std(&self, index: [usize; 3], size: usize) -> f64 {
        let mean = self.local_mean(index, size);
        self.spread(index, size, mean)
    }

    fn spread(&self, index: [usize; 3], size: usize, mean: f64) -> f64 {
        let n = self.window_len(index, size);
        let total: f64 = self
            .window_values(index, size)
            .map(|v| (mean - v) * (mean - v))
            .sum();
        total.sqrt() / n as f64
    }

    /// `(v − mean) / std` over the window; zero when the window is flat.
    pub fn local_zscore(&self, index: [usize; 3], size: usize) -> f64 {
        let [x, y, z] = index;
        let v = self.volume.get(x, y, z, 0) as f64;
        let mean = self.local_mean(index, size);
        let std = self.spread(index, size, mean);
        if std.abs() < f64::EPSILON {
            0.0
        } else {
            (v - mean) / std
        }
    }

    /// Coherence of the gradient field around a voxel.
    ///
    /// Each window gradient is projected on the centre gradient and weighted
    /// by how far along that gradient it sits. Window positions past the
    /// border use clamped samples.
    pub fn local_direction(&self, index: [usize; 3], size: usize) -> Result<f64> {
        if size > MAX_DIRECTION_WINDOW {
            return Err(WarpError::invalid_configuration(format!(
                "direction window {} exceeds {}",
                size, MAX_DIRECTION_WINDOW
            )));
        }
        let half = (size / 2) as isize;
        let centre = Self::signed(index);
        let o = self.gradient_at(centre);

        let mut dir = 0.0;
        for dz in -half..=half {
            for dy in -half..=half {
                for dx in -half..=half {
                    let g = self.gradient_at([centre[0] + dx, centre[1] + dy, centre[2] + dz]);
                    let along = dx as f64 * o[0] + dy as f64 * o[1] + dz as f64 * o[2];
                    let aligned = g[0] * o[0] + g[1] * o[1] + g[2] * o[2];
                    dir += along * aligned;
                }
            }
        }
        Ok(dir * DIRECTION_SCALE)
    }

    /// Second derivative of intensity along the unit gradient direction.
    ///
    /// Zero where the gradient vanishes. Samples off the volume read as zero.
    pub fn gradient_second_derivative(&self, index: [usize; 3], size: usize) -> f64 {
        let (len, g) = self.gradient(index);
        if len.abs() < f64::EPSILON {
            return 0.0;
        }
        let u = g.map(|v| v / len);
        let p = Point3::from_index(index);
        let sample = |t: f64| {
            let q = Point3::new([p[0] + t * u[0], p[1] + t * u[1], p[2] + t * u[2]]);
            self.interpolator.sample_or_zero(self.volume, 0, &q)
        };

        let mut d2 = (size as f64 - 1.0) * sample(0.0);
        for d in 1..=size / 2 {
            d2 -= sample(d as f64);
            d2 -= sample(-(d as f64));
        }
        d2 / size as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::VolumeGeometry;

    fn volume_from<F: Fn(usize, usize, usize) -> f32>(dims: [usize; 3], f: F) -> Volume {
        let mut v = Volume::zeros(VolumeGeometry::identity(dims), 1);
        for s in 0..dims[2] {
            for r in 0..dims[1] {
                for c in 0..dims[0] {
                    v.set(c, r, s, 0, f(c, r, s));
                }
            }
        }
        v
    }

    #[test]
    fn test_ramp_gradient() {
        let v = volume_from([5, 5, 5], |c, _, _| 2.0 * c as f32);
        let stats = NeighborhoodStats::new(&v);
        assert_eq!(stats.gradient_x([2, 2, 2]), 2.0);
        assert_eq!(stats.gradient_y([2, 2, 2]), 0.0);
        assert_eq!(stats.gradient_z([2, 2, 2]), 0.0);
        // clamped at the border: (4·2 − 4·0) / 8
        assert_eq!(stats.gradient_x([0, 2, 2]), 1.0);
        let (mag, g) = stats.gradient([2, 2, 2]);
        assert_eq!(mag, 2.0);
        assert_eq!(g, [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_y_and_z_kernels_are_symmetric() {
        let v = volume_from([5, 5, 5], |c, r, s| (c * 7 + r + 3 * s) as f32);
        let stats = NeighborhoodStats::new(&v);
        assert_eq!(stats.gradient_y([2, 2, 2]), 1.0);
        assert_eq!(stats.gradient_z([2, 2, 2]), 3.0);
    }

    #[test]
    fn test_cross_term_weights_columns_evenly() {
        // d(c·r)/dr = c; a kernel doubling column c − 1 would give 14 / 8
        let v = volume_from([5, 5, 5], |c, r, _| (c * r) as f32);
        assert_eq!(NeighborhoodStats::new(&v).gradient_y([2, 2, 2]), 2.0);

        let v = volume_from([5, 5, 5], |c, _, s| (c * s) as f32);
        assert_eq!(NeighborhoodStats::new(&v).gradient_z([2, 2, 2]), 2.0);
    }

    #[test]
    fn test_window_statistics() {
        let v = volume_from([3, 1, 1], |c, _, _| (c + 1) as f32);
        let stats = NeighborhoodStats::new(&v);
        assert_eq!(stats.local_mean([1, 0, 0], 3), 2.0);
        assert_eq!(stats.local_min([1, 0, 0], 3), 1.0);
        assert_eq!(stats.local_mean([2, 0, 0], 3), 2.5);
        assert!((stats.local_std([1, 0, 0], 3) - 2f64.sqrt() / 3.0).abs() < 1e-12);

        // window clipped to x in 1..=2: mean 2.5, std sqrt(0.5)/2
        let expected = 0.5 / (0.5f64.sqrt() / 2.0);
        assert!((stats.local_zscore([2, 0, 0], 3) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_flat_window_zscore_is_zero() {
        let v = volume_from([3, 3, 3], |_, _, _| 4.0);
        let stats = NeighborhoodStats::new(&v);
        assert_eq!(stats.local_std([1, 1, 1], 3), 0.0);
        assert_eq!(stats.local_zscore([1, 1, 1], 3), 0.0);
    }

    #[test]
    fn test_local_direction() {
        // v = x² gives dx = 2x away from the border
        let v = volume_from([9, 9, 9], |c, _, _| (c * c) as f32);
        let stats = NeighborhoodStats::new(&v);
        let dir = stats.local_direction([4, 4, 4], 3).unwrap();
        // 9 rows · 64 · (−6 + 10)
        assert!((dir - 2304.0 / 27000.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_direction_window_limit() {
        let v = volume_from([3, 3, 3], |_, _, _| 0.0);
        let stats = NeighborhoodStats::new(&v);
        assert!(stats.local_direction([1, 1, 1], MAX_DIRECTION_WINDOW).is_ok());
        assert!(matches!(
            stats.local_direction([1, 1, 1], 9),
            Err(WarpError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_second_derivative_along_gradient() {
        let v = volume_from([9, 9, 9], |c, _, _| (c * c) as f32);
        let stats = NeighborhoodStats::new(&v);
        // (2·16 − 25 − 9) / 3
        let d2 = stats.gradient_second_derivative([4, 4, 4], 3);
        assert!((d2 + 2.0 / 3.0).abs() < 1e-9);

        let flat = volume_from([3, 3, 3], |_, _, _| 1.0);
        assert_eq!(NeighborhoodStats::new(&flat).gradient_second_derivative([1, 1, 1], 3), 0.0);
    }
}
