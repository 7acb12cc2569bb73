//! Tagged trailer records.
//!
//! A tag is `{i32 id, i64 length, length bytes}`, big-endian, repeated until
//! end of stream.

use std::io::{ErrorKind, Read, Write};

use anyhow::{bail, Context, Result};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use warpkit_core::spatial::Affine;
use warpkit_core::VolumeGeometry;

/// Data format code of a warp field (i32).
pub const TAG_WARP_FORMAT: i32 = 51;
/// RAS2Vox of the grid a warp field points into (16×f64, row-major).
pub const TAG_WARP_PROVENANCE: i32 = 52;
/// Image grid of a morph lattice (dims 3×i32 + Vox2RAS 16×f64).
pub const TAG_MORPH_IMAGE_GEOMETRY: i32 = 10;
/// Atlas grid of a morph lattice.
pub const TAG_MORPH_ATLAS_GEOMETRY: i32 = 11;

const AFFINE_BYTES: usize = 16 * 8;
const GEOMETRY_BYTES: usize = 3 * 4 + AFFINE_BYTES;

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: i32,
    pub data: Vec<u8>,
}

impl Tag {
    pub fn new(id: i32, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    pub fn from_i32(id: i32, value: i32) -> Self {
        let mut data = vec![0u8; 4];
        BigEndian::write_i32(&mut data, value);
        Self::new(id, data)
    }

    pub fn from_affine(id: i32, affine: &Affine) -> Self {
        let mut data = vec![0u8; AFFINE_BYTES];
        write_affine(&mut data, affine);
        Self::new(id, data)
    }

    pub fn from_geometry(id: i32, geometry: &VolumeGeometry) -> Self {
        let mut data = vec![0u8; GEOMETRY_BYTES];
        for (axis, &d) in geometry.dims().iter().enumerate() {
            BigEndian::write_i32(&mut data[axis * 4..axis * 4 + 4], d as i32);
        }
        write_affine(&mut data[12..], geometry.vox2ras());
        Self::new(id, data)
    }

    pub fn as_i32(&self) -> Result<i32> {
        if self.data.len() != 4 {
            bail!("tag {}: expected 4 bytes, found {}", self.id, self.data.len());
        }
        Ok(BigEndian::read_i32(&self.data))
    }

    pub fn as_affine(&self) -> Result<Affine> {
        if self.data.len() != AFFINE_BYTES {
            bail!(
                "tag {}: expected {} bytes, found {}",
                self.id,
                AFFINE_BYTES,
                self.data.len()
            );
        }
        Ok(read_affine(&self.data))
    }

    pub fn as_geometry(&self) -> Result<VolumeGeometry> {
        if self.data.len() != GEOMETRY_BYTES {
            bail!(
                "tag {}: expected {} bytes, found {}",
                self.id,
                GEOMETRY_BYTES,
                self.data.len()
            );
        }
        let mut dims = [0usize; 3];
        for (axis, d) in dims.iter_mut().enumerate() {
            let v = BigEndian::read_i32(&self.data[axis * 4..axis * 4 + 4]);
            if v <= 0 {
                bail!("tag {}: non-positive dimension {}", self.id, v);
            }
            *d = v as usize;
        }
        let geometry = VolumeGeometry::new(dims, read_affine(&self.data[12..]))
            .with_context(|| format!("tag {}: invalid geometry", self.id))?;
        Ok(geometry)
    }
}

fn write_affine(buf: &mut [u8], affine: &Affine) {
    for (i, v) in affine.rows().iter().flatten().enumerate() {
        BigEndian::write_f64(&mut buf[i * 8..i * 8 + 8], *v);
    }
}

fn read_affine(buf: &[u8]) -> Affine {
    let mut rows = [[0.0f64; 4]; 4];
    for (i, v) in rows.iter_mut().flatten().enumerate() {
        *v = BigEndian::read_f64(&buf[i * 8..i * 8 + 8]);
    }
    Affine::from_rows(rows)
}

/// Find the first tag with `id`.
pub fn find_tag(tags: &[Tag], id: i32) -> Option<&Tag> {
    tags.iter().find(|t| t.id == id)
}

pub fn write_tags<W: Write>(w: &mut W, tags: &[Tag]) -> Result<()> {
    for tag in tags {
        w.write_i32::<BigEndian>(tag.id)?;
        w.write_i64::<BigEndian>(tag.data.len() as i64)?;
        w.write_all(&tag.data)?;
    }
    Ok(())
}

/// Read tags until the stream ends.
pub fn read_tags<R: Read>(r: &mut R) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    loop {
        let id = match r.read_i32::<BigEndian>() {
            Ok(id) => id,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let len = r
            .read_i64::<BigEndian>()
            .with_context(|| format!("truncated length of tag {}", id))?;
        if len < 0 {
            bail!("tag {} has negative length {}", id, len);
        }
        let mut data = Vec::new();
        r.by_ref().take(len as u64).read_to_end(&mut data)?;
        if data.len() as i64 != len {
            bail!("tag {} truncated: expected {} bytes, found {}", id, len, data.len());
        }
        tags.push(Tag::new(id, data));
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_tag_stream() -> Result<()> {
        let affine = Affine::from_rows([
            [0.0, -1.0, 0.0, 128.5],
            [0.0, 0.0, 1.0, -3.25],
            [1.0, 0.0, 0.0, 7.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let tags = vec![
            Tag::from_i32(TAG_WARP_FORMAT, 3),
            Tag::from_affine(TAG_WARP_PROVENANCE, &affine),
        ];
        let mut buf = Vec::new();
        write_tags(&mut buf, &tags)?;
        assert_eq!(buf.len(), (4 + 8 + 4) + (4 + 8 + 128));

        let back = read_tags(&mut Cursor::new(buf))?;
        assert_eq!(back, tags);
        assert_eq!(find_tag(&back, TAG_WARP_FORMAT).unwrap().as_i32()?, 3);
        assert_eq!(find_tag(&back, TAG_WARP_PROVENANCE).unwrap().as_affine()?, affine);
        Ok(())
    }

    #[test]
    fn test_truncated_tag_rejected() {
        let mut buf = Vec::new();
        write_tags(&mut buf, &[Tag::from_i32(TAG_WARP_FORMAT, 1)]).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(read_tags(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn test_geometry_tag() -> Result<()> {
        let geometry = VolumeGeometry::new(
            [10, 12, 14],
            Affine::from_rows([
                [-1.0, 0.0, 0.0, 5.0],
                [0.0, 0.0, 1.0, -6.0],
                [0.0, -1.0, 0.0, 7.0],
                [0.0, 0.0, 0.0, 1.0],
            ]),
        )?;
        let tag = Tag::from_geometry(TAG_MORPH_ATLAS_GEOMETRY, &geometry);
        assert_eq!(tag.as_geometry()?, geometry);
        Ok(())
    }
}
