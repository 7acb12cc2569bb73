//! Warp field container.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::{convert_forward, convert_inverse, SweepReport, VECTOR_FRAMES};
use super::format::{DataFormat, WarpDirection, WarpLayout};
use super::options::ConversionOptions;
use super::stats::{vector_stats, VectorStats};
use crate::error::{Result, WarpError};
use crate::image::Volume;
use crate::morph::DeformationModel;
use crate::spatial::{Affine, Point3};

/// Metadata persisted alongside the vector payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpHeader {
    /// Packed intent and container revision.
    pub version: i32,
    pub format: DataFormat,
    pub direction: WarpDirection,
    /// RAS2Vox of the grid the stored vectors point into.
    pub provenance: Affine,
}

impl WarpHeader {
    pub fn layout(&self) -> WarpLayout {
        WarpLayout::new(self.format, self.direction)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FieldState {
    volume: Volume,
    layout: WarpLayout,
    provenance: Affine,
}

/// Dense 3-vector field produced from a deformation model.
///
/// Starts empty. [`WarpField::convert`] or [`WarpField::invert`] populate it
/// once; persistence layers replace it wholesale from storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarpField {
    state: Option<FieldState>,
}

impl WarpField {
    /// Create an empty field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a populated field from stored parts.
    pub fn from_parts(volume: Volume, layout: WarpLayout, provenance: Affine) -> Result<Self> {
        if volume.frames() != VECTOR_FRAMES {
            let [w, h, d] = volume.dims();
            return Err(WarpError::ShapeMismatch {
                expected: vec![w, h, d, VECTOR_FRAMES],
                actual: vec![w, h, d, volume.frames()],
            });
        }
        Ok(Self {
            state: Some(FieldState {
                volume,
                layout,
                provenance,
            }),
        })
    }

    pub fn is_populated(&self) -> bool {
        self.state.is_some()
    }

    /// Fill the field over the model's atlas grid.
    pub fn convert<M>(&mut self, model: &M, options: &ConversionOptions) -> Result<SweepReport>
    where
        M: DeformationModel + ?Sized,
    {
        self.ensure_empty()?;
        let (volume, report) = convert_forward(model, options)?;
        self.state = Some(FieldState {
            volume,
            layout: WarpLayout::new(options.format, WarpDirection::Forward),
            provenance: *model.image().ras2vox(),
        });
        Ok(report)
    }

    /// Fill the field over the model's image grid.
    pub fn invert<M>(&mut self, model: &mut M, options: &ConversionOptions) -> Result<SweepReport>
    where
        M: DeformationModel + ?Sized,
    {
        self.ensure_empty()?;
        let (volume, report) = convert_inverse(model, options)?;
        self.state = Some(FieldState {
            volume,
            layout: WarpLayout::new(options.format, WarpDirection::Inverse),
            provenance: *model.atlas().ras2vox(),
        });
        Ok(report)
    }

    fn ensure_empty(&self) -> Result<()> {
        if self.is_populated() {
            return Err(WarpError::AlreadyPopulated);
        }
        Ok(())
    }

    fn state(&self) -> Result<&FieldState> {
        self.state.as_ref().ok_or(WarpError::NotPopulated)
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.state.as_ref().map(|s| &s.volume)
    }

    pub fn layout(&self) -> Option<WarpLayout> {
        self.state.as_ref().map(|s| s.layout)
    }

    pub fn provenance(&self) -> Option<&Affine> {
        self.state.as_ref().map(|s| &s.provenance)
    }

    /// The metadata a writer persists. Fails on an empty field.
    pub fn header(&self) -> Result<WarpHeader> {
        let state = self.state()?;
        let header = WarpHeader {
            version: state.layout.direction.version_tag(),
            format: state.layout.format,
            direction: state.layout.direction,
            provenance: state.provenance,
        };
        debug!(
            "warp header: version {:#06x}, {} {}",
            header.version, header.direction, header.format
        );
        Ok(header)
    }

    /// Vector stored at voxel `(c, r, s)`.
    pub fn vector(&self, c: usize, r: usize, s: usize) -> Result<[f32; 3]> {
        let v = self.state()?.volume.voxel(c, r, s);
        Ok([v[0], v[1], v[2]])
    }

    /// Norm statistics of the stored vectors, computed on backend `B`.
    pub fn vector_stats<B: Backend>(&self, device: &B::Device) -> Result<VectorStats> {
        Ok(vector_stats::<B>(&self.state()?.volume, device))
    }

    /// Resample an image through the field.
    pub fn apply_to_volume(&self, _input: &Volume) -> Result<Volume> {
        Err(WarpError::Unsupported("applying a warp field to a volume"))
    }

    /// Move surface vertices through the field.
    pub fn apply_to_vertices(&self, _vertices: &mut [Point3]) -> Result<()> {
        Err(WarpError::Unsupported("applying a warp field to surface vertices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::VolumeGeometry;
    use crate::morph::DenseMorph;

    fn identity_morph() -> DenseMorph {
        DenseMorph::affine_only(
            VolumeGeometry::identity([3, 3, 3]),
            VolumeGeometry::identity([3, 3, 3]),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_field_has_no_header() {
        let field = WarpField::new();
        assert!(!field.is_populated());
        assert!(matches!(field.header(), Err(WarpError::NotPopulated)));
        assert!(field.vector(0, 0, 0).is_err());
    }

    #[test]
    fn test_second_populate_rejected() {
        let mut morph = identity_morph();
        let mut field = WarpField::new();
        field.convert(&morph, &ConversionOptions::new()).unwrap();
        assert!(matches!(
            field.convert(&morph, &ConversionOptions::new()),
            Err(WarpError::AlreadyPopulated)
        ));
        assert!(matches!(
            field.invert(&mut morph, &ConversionOptions::new()),
            Err(WarpError::AlreadyPopulated)
        ));
    }

    #[test]
    fn test_header_reflects_direction() {
        let mut morph = identity_morph();
        let opts = ConversionOptions::new().with_format(DataFormat::DisplacementPhysical);

        let mut fwd = WarpField::new();
        fwd.convert(&morph, &opts).unwrap();
        let h = fwd.header().unwrap();
        assert_eq!(h.direction, WarpDirection::Forward);
        assert_eq!(h.format, DataFormat::DisplacementPhysical);
        assert_eq!(h.version, WarpDirection::Forward.version_tag());

        let mut inv = WarpField::new();
        inv.invert(&mut morph, &opts).unwrap();
        assert_eq!(inv.header().unwrap().direction, WarpDirection::Inverse);
        assert_ne!(inv.header().unwrap().version, h.version);
    }

    #[test]
    fn test_from_parts_requires_three_frames() {
        let layout = WarpLayout::new(DataFormat::AbsoluteIndex, WarpDirection::Forward);
        let volume = Volume::zeros(VolumeGeometry::identity([2, 2, 2]), 1);
        assert!(matches!(
            WarpField::from_parts(volume, layout, Affine::identity()),
            Err(WarpError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_vector_stats_of_displacement() {
        use burn_ndarray::NdArray;

        let morph = DenseMorph::from_fn(
            VolumeGeometry::identity([3, 3, 3]),
            VolumeGeometry::identity([3, 3, 3]),
            1,
            |[c, r, s]| Some(Point3::new([c as f64, r as f64 + 2.0, s as f64])),
        )
        .unwrap();
        let mut field = WarpField::new();
        assert!(matches!(
            field.vector_stats::<NdArray<f32>>(&Default::default()),
            Err(WarpError::NotPopulated)
        ));

        let opts = ConversionOptions::new().with_format(DataFormat::DisplacementIndex);
        field.convert(&morph, &opts).unwrap();
        let stats = field.vector_stats::<NdArray<f32>>(&Default::default()).unwrap();
        assert!((stats.max_norm - 2.0).abs() < 1e-6);
        assert_eq!(stats.nonzero, 27);
    }

    #[test]
    fn test_apply_is_unsupported() {
        let field = WarpField::new();
        let volume = Volume::zeros(VolumeGeometry::identity([2, 2, 2]), 1);
        assert!(matches!(field.apply_to_volume(&volume), Err(WarpError::Unsupported(_))));
        assert!(matches!(
            field.apply_to_vertices(&mut [Point3::origin()]),
            Err(WarpError::Unsupported(_))
        ));
    }
}
