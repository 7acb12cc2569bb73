//! Node-lattice morph files (`.m3z`).
//!
//! Always gzip-compressed, big-endian: f32 version, lattice dims (3×i32),
//! node spacing (i32), then per node (column fastest) the image index as
//! 3×f32 and a validity byte, then geometry tags for the image and atlas
//! grids.

use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;
use warpkit_core::image::grid::raster;
use warpkit_core::image::Volume;
use warpkit_core::{DeformationModel, DenseMorph, VolumeGeometry};

use crate::mgh::{read_all, write_all};
use crate::tags::{find_tag, read_tags, write_tags, Tag, TAG_MORPH_ATLAS_GEOMETRY, TAG_MORPH_IMAGE_GEOMETRY};

pub const MORPH_VERSION: f32 = 1.0;

/// Three f32 coordinates and a validity byte.
const NODE_BYTES: usize = 13;

pub fn read_morph<P: AsRef<Path>>(path: P) -> Result<DenseMorph> {
    let path = path.as_ref();
    let bytes = read_all(path)?;
    let morph = decode_morph(&bytes).with_context(|| format!("Failed to decode morph {}", path.display()))?;
    debug!(
        "read morph {}: lattice {:?}, spacing {}",
        path.display(),
        morph.nodes().dims(),
        morph.spacing()
    );
    Ok(morph)
}

pub fn decode_morph(bytes: &[u8]) -> Result<DenseMorph> {
    let mut cur = Cursor::new(bytes);
    let version = cur.read_f32::<BigEndian>().context("missing morph version")?;
    if version != MORPH_VERSION {
        bail!("unsupported morph version {}", version);
    }
    let mut lattice = [0usize; 3];
    for d in lattice.iter_mut() {
        let v = cur.read_i32::<BigEndian>()?;
        if v <= 0 {
            bail!("morph lattice dimension must be positive, found {}", v);
        }
        *d = v as usize;
    }
    let spacing = cur.read_i32::<BigEndian>()?;
    if spacing <= 0 {
        bail!("morph node spacing must be positive, found {}", spacing);
    }
    let remaining = bytes.len() - cur.position() as usize;
    let needed = lattice.iter().try_fold(NODE_BYTES, |acc, &d| acc.checked_mul(d));
    if needed.map_or(true, |n| n > remaining) {
        bail!("morph node data truncated: lattice {:?} needs more than {} bytes", lattice, remaining);
    }

    let mut nodes = Volume::zeros(VolumeGeometry::identity(lattice), 3);
    let mut valid = Vec::with_capacity(nodes.geometry().voxel_count());
    for [c, r, s] in raster(lattice) {
        for v in nodes.voxel_mut(c, r, s).iter_mut() {
            *v = cur.read_f32::<BigEndian>().context("morph node data truncated")?;
        }
        valid.push(cur.read_u8()? != 0);
    }

    let tags = read_tags(&mut cur)?;
    let image = find_tag(&tags, TAG_MORPH_IMAGE_GEOMETRY)
        .context("missing image geometry tag")?
        .as_geometry()?;
    let atlas = find_tag(&tags, TAG_MORPH_ATLAS_GEOMETRY)
        .context("missing atlas geometry tag")?
        .as_geometry()?;

    let morph = DenseMorph::new(image, atlas, spacing as usize, nodes, valid)?;
    Ok(morph)
}

pub fn encode_morph(morph: &DenseMorph) -> Result<Vec<u8>> {
    let nodes = morph.nodes();
    let lattice = nodes.dims();
    let mut out = Vec::new();
    out.write_f32::<BigEndian>(MORPH_VERSION)?;
    for d in lattice {
        out.write_i32::<BigEndian>(d as i32)?;
    }
    out.write_i32::<BigEndian>(morph.spacing() as i32)?;
    for (n, [c, r, s]) in raster(lattice).enumerate() {
        for &v in nodes.voxel(c, r, s) {
            out.write_f32::<BigEndian>(v)?;
        }
        out.write_u8(morph.valid()[n] as u8)?;
    }
    write_tags(
        &mut out,
        &[
            Tag::from_geometry(TAG_MORPH_IMAGE_GEOMETRY, morph.image()),
            Tag::from_geometry(TAG_MORPH_ATLAS_GEOMETRY, morph.atlas()),
        ],
    )?;
    Ok(out)
}

pub fn write_morph<P: AsRef<Path>>(path: P, morph: &DenseMorph) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_morph(morph)?;
    write_all(path, &bytes, true)?;
    debug!("wrote morph {}", path.display());
    Ok(())
}
