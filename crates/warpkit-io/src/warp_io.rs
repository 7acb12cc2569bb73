//! Warp field persistence in the MGH layout.
//!
//! The direction rides in the packed version tag; data format and provenance
//! affine are trailer tags.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use warpkit_core::warp::{DataFormat, WarpDirection, WarpLayout, VECTOR_FRAMES};
use warpkit_core::WarpField;

use crate::mgh::{read_mgh, write_mgh};
use crate::tags::{find_tag, Tag, TAG_WARP_FORMAT, TAG_WARP_PROVENANCE};

/// Load a warp field from an `.mgz`/`.mgh` file.
pub fn read_warp<P: AsRef<Path>>(path: P) -> Result<WarpField> {
    let path = path.as_ref();
    let file = read_mgh(path)?;

    let direction = WarpDirection::from_version_tag(file.header.version)
        .with_context(|| format!("{} is not a warp field", path.display()))?;
    if file.header.frames != VECTOR_FRAMES {
        bail!(
            "{}: warp field must have {} frames, found {}",
            path.display(),
            VECTOR_FRAMES,
            file.header.frames
        );
    }
    let format_tag = find_tag(&file.tags, TAG_WARP_FORMAT)
        .with_context(|| format!("{}: missing data format tag", path.display()))?;
    let format = DataFormat::from_code(format_tag.as_i32()?)?;
    let provenance = find_tag(&file.tags, TAG_WARP_PROVENANCE)
        .with_context(|| format!("{}: missing provenance tag", path.display()))?
        .as_affine()?;

    debug!("read {} warp field ({}) from {}", direction, format, path.display());
    let field = WarpField::from_parts(file.volume, WarpLayout::new(format, direction), provenance)?;
    Ok(field)
}

/// Persist a populated warp field. `.mgz` paths are gzip-compressed.
pub fn write_warp<P: AsRef<Path>>(path: P, field: &WarpField) -> Result<()> {
    let path = path.as_ref();
    let header = field.header()?;
    let volume = field.volume().context("warp field has no volume")?;
    let tags = [
        Tag::from_i32(TAG_WARP_FORMAT, header.format.code()),
        Tag::from_affine(TAG_WARP_PROVENANCE, &header.provenance),
    ];
    write_mgh(path, volume, header.version, &tags)
        .with_context(|| format!("Failed to write warp field {}", path.display()))?;
    info!(
        "wrote {} warp field ({}) to {}",
        header.direction,
        header.format,
        path.display()
    );
    Ok(())
}

/// Storage operations on a [`WarpField`].
pub trait WarpFieldIo {
    /// Replace the field with the one stored at `path`.
    ///
    /// On failure the field is left exactly as it was.
    fn read<P: AsRef<Path>>(&mut self, path: P) -> Result<()>;

    /// Persist the field. Fails on an empty field.
    fn write<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

impl WarpFieldIo for WarpField {
    fn read<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        *self = read_warp(path)?;
        Ok(())
    }

    fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_warp(path, self)
    }
}
