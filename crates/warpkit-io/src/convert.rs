//! File-level conversion: load a morph from disk and sweep it.

use std::path::Path;

use anyhow::Result;
use tracing::info;
use warpkit_core::warp::{ConversionOptions, SweepReport};
use warpkit_core::{DenseMorph, WarpError, WarpField};

use crate::filetype::FileType;
use crate::morph_io::read_morph;

/// Load the morph at `path`, refusing anything that is not a morph lattice.
///
/// A wrong file type surfaces as [`WarpError::UnsupportedInput`] inside the
/// returned error.
pub fn load_morph_input<P: AsRef<Path>>(path: P) -> Result<DenseMorph> {
    let path = path.as_ref();
    match FileType::probe(path) {
        FileType::MorphLattice => read_morph(path),
        found => Err(WarpError::unsupported_input(
            path.display().to_string(),
            FileType::MorphLattice.to_string(),
            found.to_string(),
        )
        .into()),
    }
}

/// Forward warp field from the morph stored at `path`.
pub fn convert_morph_file<P: AsRef<Path>>(
    path: P,
    options: &ConversionOptions,
) -> Result<(WarpField, SweepReport)> {
    let path = path.as_ref();
    let morph = load_morph_input(path)?;
    info!("converting {}", path.display());
    let mut field = WarpField::new();
    let report = field.convert(&morph, options)?;
    Ok((field, report))
}

/// Inverse warp field from the morph stored at `path`.
pub fn invert_morph_file<P: AsRef<Path>>(
    path: P,
    options: &ConversionOptions,
) -> Result<(WarpField, SweepReport)> {
    let path = path.as_ref();
    let mut morph = load_morph_input(path)?;
    info!("inverting {}", path.display());
    let mut field = WarpField::new();
    let report = field.invert(&mut morph, options)?;
    Ok((field, report))
}
