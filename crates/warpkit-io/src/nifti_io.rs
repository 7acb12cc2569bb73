//! NIfTI-1 export of warp fields as 4-D vector volumes.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array4;
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use tracing::info;
use warpkit_core::WarpField;

/// NIfTI intent for displacement vectors.
pub const NIFTI_INTENT_DISPVECT: i16 = 1006;
/// NIfTI intent for generic vectors.
pub const NIFTI_INTENT_VECTOR: i16 = 1007;
const NIFTI_XFORM_SCANNER_ANAT: i16 = 1;

/// Export a warp field as a 4-D float NIfTI volume `(width, height, depth, 3)`.
///
/// The sform carries the field's Vox2RAS. Displacement formats are tagged
/// DISPVECT, absolute formats VECTOR.
pub fn export_nifti<P: AsRef<Path>>(path: P, field: &WarpField) -> Result<()> {
    let path = path.as_ref();
    let warp = field.header()?;
    let volume = field.volume().context("warp field has no volume")?;
    let geometry = volume.geometry();
    let [w, h, d] = geometry.dims();
    let frames = volume.frames();

    let array = Array4::from_shape_fn((w, h, d, frames), |(c, r, s, f)| volume.get(c, r, s, f));

    let rows = geometry.vox2ras().rows();
    let spacing = geometry.spacing();
    let mut header = NiftiHeader::default();
    header.sform_code = NIFTI_XFORM_SCANNER_ANAT;
    header.srow_x = rows[0].map(|v| v as f32);
    header.srow_y = rows[1].map(|v| v as f32);
    header.srow_z = rows[2].map(|v| v as f32);
    header.pixdim[1] = spacing[0] as f32;
    header.pixdim[2] = spacing[1] as f32;
    header.pixdim[3] = spacing[2] as f32;
    header.intent_code = if warp.format.is_displacement() {
        NIFTI_INTENT_DISPVECT
    } else {
        NIFTI_INTENT_VECTOR
    };

    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&array)
        .map_err(|e| anyhow::anyhow!("Failed to write NIfTI file {}: {}", path.display(), e))?;

    info!("exported {} warp field to {}", warp.format, path.display());
    Ok(())
}
