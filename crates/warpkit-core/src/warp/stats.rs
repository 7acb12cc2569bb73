//! Summary statistics of a vector volume, computed on a burn backend.

use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};

use crate::image::Volume;

/// Euclidean-norm statistics over every voxel of a 3-frame volume.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VectorStats {
    pub mean_norm: f32,
    pub max_norm: f32,
    /// Voxels whose vector is not exactly zero.
    pub nonzero: usize,
}

/// Norm statistics of `volume`'s per-voxel vectors.
pub fn vector_stats<B: Backend>(volume: &Volume, device: &B::Device) -> VectorStats {
    if volume.data().is_empty() {
        return VectorStats::default();
    }
    let t = volume.to_tensor::<B>(device);
    let norms = (t.clone() * t).sum_dim(0).sqrt();

    let mean_norm = norms.clone().mean().into_scalar().elem::<f32>();
    let max_norm = norms.clone().max().into_scalar().elem::<f32>();
    let nonzero = norms.greater_elem(0.0).int().sum().into_scalar().elem::<i64>();
    VectorStats {
        mean_norm,
        max_norm,
        nonzero: nonzero as usize,
    }
}
