//! Dense node-lattice deformation model.
//!
//! The lattice covers the atlas grid at an integer node spacing, with the
//! last node on each axis at or past the last atlas voxel. Each node
//! stores the continuous image index its atlas position maps to, plus a
//! validity flag. Forward sampling is trilinear over the nodes; the inverse
//! is a splatted lattice over the image grid built on demand.

use tracing::{debug, info};

use super::trait_::{DeformationModel, Sample};
use crate::error::{Result, WarpError};
use crate::image::grid::unravel;
use crate::image::{Volume, VolumeGeometry};
use crate::interpolation::LinearInterpolator;
use crate::spatial::Point3;

/// Node-lattice deformation model.
#[derive(Debug, Clone)]
pub struct DenseMorph {
    image: VolumeGeometry,
    atlas: VolumeGeometry,
    spacing: usize,
    /// 3 frames over the lattice dims: image index of each node.
    nodes: Volume,
    valid: Vec<bool>,
    inverse: Option<InverseLattice>,
    interpolator: LinearInterpolator,
}

#[derive(Debug, Clone)]
struct InverseLattice {
    /// 3 frames over the image dims: atlas index of each image voxel.
    coords: Volume,
    valid: Vec<bool>,
}

impl DenseMorph {
    /// Lattice dimensions for an atlas grid and node spacing.
    ///
    /// Node `n` sits at atlas index `n * spacing`; there are enough nodes that
    /// `(n - 1) * spacing >= d - 1`, so every atlas voxel is bracketed.
    pub fn lattice_dims(atlas_dims: [usize; 3], spacing: usize) -> [usize; 3] {
        let spacing = spacing.max(1);
        atlas_dims.map(|d| if d == 0 { 0 } else { (d - 1).div_ceil(spacing) + 1 })
    }

    /// Build from explicit node positions and validity.
    ///
    /// `nodes` must have 3 frames over [`DenseMorph::lattice_dims`].
    pub fn new(
        image: VolumeGeometry,
        atlas: VolumeGeometry,
        spacing: usize,
        nodes: Volume,
        valid: Vec<bool>,
    ) -> Result<Self> {
        if spacing == 0 {
            return Err(WarpError::invalid_configuration("node spacing must be positive"));
        }
        let lattice = Self::lattice_dims(atlas.dims(), spacing);
        if nodes.dims() != lattice || nodes.frames() != 3 {
            let [w, h, d] = nodes.dims();
            return Err(WarpError::ShapeMismatch {
                expected: vec![lattice[0], lattice[1], lattice[2], 3],
                actual: vec![w, h, d, nodes.frames()],
            });
        }
        if valid.len() != nodes.geometry().voxel_count() {
            return Err(WarpError::ShapeMismatch {
                expected: vec![nodes.geometry().voxel_count()],
                actual: vec![valid.len()],
            });
        }
        Ok(Self {
            image,
            atlas,
            spacing,
            nodes,
            valid,
            inverse: None,
            interpolator: LinearInterpolator::new(),
        })
    }

    /// Build by evaluating `f` at the atlas index of every node.
    ///
    /// `f` returns `None` for nodes with no valid mapping.
    pub fn from_fn<F>(image: VolumeGeometry, atlas: VolumeGeometry, spacing: usize, f: F) -> Result<Self>
    where
        F: Fn([usize; 3]) -> Option<Point3>,
    {
        let lattice = Self::lattice_dims(atlas.dims(), spacing);
        let mut nodes = Volume::zeros(VolumeGeometry::identity(lattice), 3);
        let mut valid = vec![false; nodes.geometry().voxel_count()];
        for (n, is_valid) in valid.iter_mut().enumerate() {
            let [i, j, k] = unravel(lattice, n);
            if let Some(p) = f([i * spacing, j * spacing, k * spacing]) {
                nodes.voxel_mut(i, j, k).copy_from_slice(&[p[0] as f32, p[1] as f32, p[2] as f32]);
                *is_valid = true;
            }
        }
        Self::new(image, atlas, spacing, nodes, valid)
    }

    /// Model with no non-linear component: every node sits at its
    /// linear-registration position `image.ras2vox · atlas.vox2ras · index`.
    pub fn affine_only(image: VolumeGeometry, atlas: VolumeGeometry, spacing: usize) -> Result<Self> {
        let atlas_to_image = *image.ras2vox() * *atlas.vox2ras();
        Self::from_fn(image, atlas, spacing, |idx| {
            Some(atlas_to_image.transform_point(&Point3::from_index(idx)))
        })
    }

    pub fn spacing(&self) -> usize {
        self.spacing
    }

    /// Node positions (3 frames over the lattice).
    pub fn nodes(&self) -> &Volume {
        &self.nodes
    }

    /// Per-node validity, in lattice storage order.
    pub fn valid(&self) -> &[bool] {
        &self.valid
    }

    pub fn has_inverse(&self) -> bool {
        self.inverse.is_some()
    }

    /// Splat every valid node into the image grid, then fill the gaps
    /// front by front with the mean of already-filled 6-neighbours.
    fn splat_inverse(&self, image_dims: [usize; 3]) -> InverseLattice {
        let grid = VolumeGeometry::identity(image_dims);
        let mut coords = Volume::zeros(grid, 3);
        let count = coords.geometry().voxel_count();
        let mut sums = vec![[0.0f64; 3]; count];
        let mut hits = vec![0u32; count];

        let lattice = self.nodes.dims();
        for (n, _) in self.valid.iter().enumerate().filter(|(_, v)| **v) {
            let [i, j, k] = unravel(lattice, n);
            let target = self.nodes.voxel(i, j, k);
            let v = [target[0].round(), target[1].round(), target[2].round()];
            if v.iter().zip(image_dims).any(|(&x, d)| x < 0.0 || x >= d as f32) {
                continue;
            }
            let offset = coords.voxel_offset(v[0] as usize, v[1] as usize, v[2] as usize);
            let atlas_index = [i * self.spacing, j * self.spacing, k * self.spacing];
            for axis in 0..3 {
                sums[offset][axis] += atlas_index[axis] as f64;
            }
            hits[offset] += 1;
        }

        let mut filled: Vec<bool> = hits.iter().map(|&h| h > 0).collect();
        for offset in 0..count {
            if filled[offset] {
                let h = hits[offset] as f64;
                sums[offset] = sums[offset].map(|x| x / h);
            }
        }
        let splatted = filled.iter().filter(|&&f| f).count();

        let mut queued = filled.clone();
        let mut frontier: Vec<usize> = Vec::new();
        for offset in 0..count {
            if !filled[offset] && neighbours(image_dims, offset).any(|n| filled[n]) {
                frontier.push(offset);
                queued[offset] = true;
            }
        }
        while !frontier.is_empty() {
            let updates: Vec<(usize, [f64; 3])> = frontier
                .iter()
                .map(|&offset| {
                    let mut acc = [0.0f64; 3];
                    let mut n_filled = 0.0;
                    for n in neighbours(image_dims, offset).filter(|&n| filled[n]) {
                        for axis in 0..3 {
                            acc[axis] += sums[n][axis];
                        }
                        n_filled += 1.0;
                    }
                    (offset, acc.map(|x| x / n_filled))
                })
                .collect();

            let mut next = Vec::new();
            for (offset, value) in updates {
                sums[offset] = value;
                filled[offset] = true;
                for n in neighbours(image_dims, offset) {
                    if !queued[n] {
                        queued[n] = true;
                        next.push(n);
                    }
                }
            }
            frontier = next;
        }

        for (offset, value) in sums.iter().enumerate() {
            let [c, r, s] = unravel(image_dims, offset);
            coords
                .voxel_mut(c, r, s)
                .copy_from_slice(&[value[0] as f32, value[1] as f32, value[2] as f32]);
        }
        debug!(
            "inverse lattice: {} of {} voxels splatted, {} filled",
            splatted,
            count,
            filled.iter().filter(|&&f| f).count() - splatted
        );
        InverseLattice {
            coords,
            valid: filled,
        }
    }
}

/// In-bounds 6-neighbours of a voxel.
fn neighbours(dims: [usize; 3], offset: usize) -> impl Iterator<Item = usize> {
    let [c, r, s] = unravel(dims, offset);
    let [w, h, d] = dims;
    let steps: [(isize, isize, isize); 6] = [
        (-1, 0, 0),
        (1, 0, 0),
        (0, -1, 0),
        (0, 1, 0),
        (0, 0, -1),
        (0, 0, 1),
    ];
    steps.into_iter().filter_map(move |(dc, dr, ds)| {
        let nc = c.checked_add_signed(dc).filter(|&x| x < w)?;
        let nr = r.checked_add_signed(dr).filter(|&x| x < h)?;
        let ns = s.checked_add_signed(ds).filter(|&x| x < d)?;
        Some((ns * h + nr) * w + nc)
    })
}

impl DeformationModel for DenseMorph {
    fn image(&self) -> &VolumeGeometry {
        &self.image
    }

    fn atlas(&self) -> &VolumeGeometry {
        &self.atlas
    }

    fn sample_forward(&self, atlas_index: &Point3) -> Sample {
        let sp = self.spacing as f64;
        let q = Point3::new([atlas_index[0] / sp, atlas_index[1] / sp, atlas_index[2] / sp]);
        match self.interpolator.sample::<3>(&self.nodes, &q, Some(&self.valid)) {
            Some(p) => Sample::Mapped(Point3::new(p)),
            None => Sample::OutOfDomain,
        }
    }

    fn sample_inverse(&self, image_index: &Point3) -> Sample {
        let Some(inverse) = &self.inverse else {
            return Sample::OutOfDomain;
        };
        match self
            .interpolator
            .sample::<3>(&inverse.coords, image_index, Some(&inverse.valid))
        {
            Some(p) => Sample::Mapped(Point3::new(p)),
            None => Sample::OutOfDomain,
        }
    }

    fn node(&self, index: [usize; 3]) -> Option<Point3> {
        if !self.nodes.geometry().contains(index) {
            return None;
        }
        let v = self.nodes.voxel(index[0], index[1], index[2]);
        Some(Point3::new([v[0] as f64, v[1] as f64, v[2] as f64]))
    }

    fn build_inverse(&mut self, image_dims: [usize; 3]) -> Result<()> {
        info!("building inverse lattice over image grid {:?}", image_dims);
        self.inverse = Some(self.splat_inverse(image_dims));
        Ok(())
    }
}
