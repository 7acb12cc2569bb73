//! Multi-frame float volume.
//!
//! A [`Volume`] is the dense grid behind every warp field and every scalar
//! image the statistics helpers read. Storage is voxel-interleaved: the frame
//! index is fastest, then column, row and slice, so each voxel's frames form
//! one contiguous chunk that can be written independently of its neighbours.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use super::geometry::VolumeGeometry;
use crate::error::{Result, WarpError};

/// Dense volume with `frames` float channels per voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    geometry: VolumeGeometry,
    frames: usize,
    data: Vec<f32>,
}

impl Volume {
    /// Zero-filled volume over `geometry` with `frames` channels.
    pub fn zeros(geometry: VolumeGeometry, frames: usize) -> Self {
        let len = geometry.voxel_count() * frames;
        Self {
            geometry,
            frames,
            data: vec![0.0; len],
        }
    }

    /// Wrap an existing voxel-interleaved buffer.
    pub fn from_vec(geometry: VolumeGeometry, frames: usize, data: Vec<f32>) -> Result<Self> {
        let expected = geometry.voxel_count() * frames;
        if data.len() != expected {
            return Err(WarpError::ShapeMismatch {
                expected: vec![geometry.width(), geometry.height(), geometry.depth(), frames],
                actual: vec![data.len()],
            });
        }
        Ok(Self {
            geometry,
            frames,
            data,
        })
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    /// `[width, height, depth]`.
    pub fn dims(&self) -> [usize; 3] {
        self.geometry.dims()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Raw voxel-interleaved samples.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Linear voxel number of `(c, r, s)`.
    #[inline]
    pub fn voxel_offset(&self, c: usize, r: usize, s: usize) -> usize {
        let [w, h, _] = self.geometry.dims();
        (s * h + r) * w + c
    }

    /// Inverse of [`Volume::voxel_offset`].
    #[inline]
    pub fn voxel_index(&self, offset: usize) -> [usize; 3] {
        super::grid::unravel(self.geometry.dims(), offset)
    }

    /// Value of one frame at one voxel.
    #[inline]
    pub fn get(&self, c: usize, r: usize, s: usize, frame: usize) -> f32 {
        self.data[self.voxel_offset(c, r, s) * self.frames + frame]
    }

    #[inline]
    pub fn set(&mut self, c: usize, r: usize, s: usize, frame: usize, value: f32) {
        let i = self.voxel_offset(c, r, s) * self.frames + frame;
        self.data[i] = value;
    }

    /// All frames of one voxel.
    pub fn voxel(&self, c: usize, r: usize, s: usize) -> &[f32] {
        let start = self.voxel_offset(c, r, s) * self.frames;
        &self.data[start..start + self.frames]
    }

    pub fn voxel_mut(&mut self, c: usize, r: usize, s: usize) -> &mut [f32] {
        let start = self.voxel_offset(c, r, s) * self.frames;
        &mut self.data[start..start + self.frames]
    }

    /// Copy into a tensor of shape `[frames, depth, height, width]`.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let [w, h, d] = self.geometry.dims();
        Tensor::<B, 1>::from_data(
            TensorData::new(self.data.clone(), Shape::new([self.data.len()])),
            device,
        )
        .reshape([d, h, w, self.frames])
        .permute([3, 0, 1, 2])
    }
}
