//! MGH / MGZ volume codec.
//!
//! Layout (big-endian): a 284-byte header, the voxel payload frame by frame
//! with the column index fastest, five scan-parameter floats, then tags.
//! `.mgz` files are the same stream gzip-compressed; readers detect the gzip
//! magic rather than trusting the suffix.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use nalgebra::Matrix3;
use tracing::debug;
use warpkit_core::spatial::{Point3, Spacing3};
use warpkit_core::{Volume, VolumeGeometry};

use crate::filetype::is_compressed_mgh;
use crate::tags::{read_tags, write_tags, Tag};

pub const HEADER_SIZE: usize = 284;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

mod offsets {
    pub const VERSION: usize = 0;
    pub const WIDTH: usize = 4;
    pub const HEIGHT: usize = 8;
    pub const DEPTH: usize = 12;
    pub const FRAMES: usize = 16;
    pub const TYPE: usize = 20;
    pub const DOF: usize = 24;
    pub const GOOD_RAS: usize = 28;
    pub const SPACING: usize = 30;
    pub const MDC: usize = 42;
    pub const C_RAS: usize = 78;
}

/// Voxel storage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MghDataType {
    UChar,
    Int,
    Float,
    Short,
}

impl MghDataType {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::UChar),
            1 => Ok(Self::Int),
            3 => Ok(Self::Float),
            4 => Ok(Self::Short),
            other => bail!("unsupported MGH data type {}", other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::UChar => 0,
            Self::Int => 1,
            Self::Float => 3,
            Self::Short => 4,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::UChar => 1,
            Self::Short => 2,
            Self::Int | Self::Float => 4,
        }
    }

    fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            Self::UChar => bytes[0] as f32,
            Self::Int => BigEndian::read_i32(bytes) as f32,
            Self::Float => BigEndian::read_f32(bytes),
            Self::Short => BigEndian::read_i16(bytes) as f32,
        }
    }
}

/// Decoded MGH header.
#[derive(Debug, Clone, PartialEq)]
pub struct MghHeader {
    pub version: i32,
    pub dims: [usize; 3],
    pub frames: usize,
    pub data_type: MghDataType,
    pub dof: i32,
    pub good_ras: bool,
    pub spacing: [f32; 3],
    /// Direction cosines, one column per index axis.
    pub direction: [[f32; 3]; 3],
    pub c_ras: [f32; 3],
}

impl MghHeader {
    /// Header for a float volume over `geometry`.
    pub fn for_geometry(geometry: &VolumeGeometry, frames: usize, version: i32) -> Self {
        let spacing = geometry.spacing();
        let direction = geometry.direction();
        let centre = geometry.center();
        Self {
            version,
            dims: geometry.dims(),
            frames,
            data_type: MghDataType::Float,
            dof: 0,
            good_ras: true,
            spacing: [spacing[0] as f32, spacing[1] as f32, spacing[2] as f32],
            direction: [0, 1, 2].map(|col| [0, 1, 2].map(|row| direction[(row, col)] as f32)),
            c_ras: [centre[0] as f32, centre[1] as f32, centre[2] as f32],
        }
    }

    /// Grid geometry described by the header.
    ///
    /// Volumes without valid RAS information get the default coronal
    /// orientation centred on the origin.
    pub fn geometry(&self) -> Result<VolumeGeometry> {
        let (spacing, direction, c_ras) = if self.good_ras {
            let d = self.direction;
            let direction = Matrix3::from_fn(|row, col| d[col][row] as f64);
            (
                Spacing3::new(
                    self.spacing[0] as f64,
                    self.spacing[1] as f64,
                    self.spacing[2] as f64,
                ),
                direction,
                Point3::new(self.c_ras.map(|v| v as f64)),
            )
        } else {
            (
                Spacing3::new(1.0, 1.0, 1.0),
                Matrix3::new(-1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0),
                Point3::origin(),
            )
        };
        let geometry = VolumeGeometry::from_center(self.dims, spacing, direction, c_ras)
            .context("MGH header describes a singular vox2ras")?;
        Ok(geometry)
    }

    pub fn voxel_count(&self) -> usize {
        self.dims.iter().product::<usize>() * self.frames
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        use offsets::*;
        if buf.len() < HEADER_SIZE {
            bail!("MGH header truncated: {} of {} bytes", buf.len(), HEADER_SIZE);
        }
        let read_dim = |at: usize, name: &str| -> Result<usize> {
            let v = BigEndian::read_i32(&buf[at..at + 4]);
            if v <= 0 {
                bail!("MGH {} must be positive, found {}", name, v);
            }
            Ok(v as usize)
        };
        let read_f32s = |at: usize, out: &mut [f32]| {
            for (i, v) in out.iter_mut().enumerate() {
                *v = BigEndian::read_f32(&buf[at + 4 * i..at + 4 * i + 4]);
            }
        };

        let dims = [
            read_dim(WIDTH, "width")?,
            read_dim(HEIGHT, "height")?,
            read_dim(DEPTH, "depth")?,
        ];
        let frames = read_dim(FRAMES, "frame count")?;
        let data_type = MghDataType::from_code(BigEndian::read_i32(&buf[TYPE..TYPE + 4]))?;

        let mut spacing = [0.0f32; 3];
        read_f32s(SPACING, &mut spacing);
        let mut mdc = [0.0f32; 9];
        read_f32s(MDC, &mut mdc);
        let mut c_ras = [0.0f32; 3];
        read_f32s(C_RAS, &mut c_ras);

        Ok(Self {
            version: BigEndian::read_i32(&buf[VERSION..VERSION + 4]),
            dims,
            frames,
            data_type,
            dof: BigEndian::read_i32(&buf[DOF..DOF + 4]),
            good_ras: BigEndian::read_i16(&buf[GOOD_RAS..GOOD_RAS + 2]) != 0,
            spacing,
            direction: [
                [mdc[0], mdc[1], mdc[2]],
                [mdc[3], mdc[4], mdc[5]],
                [mdc[6], mdc[7], mdc[8]],
            ],
            c_ras,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        use offsets::*;
        let mut buf = [0u8; HEADER_SIZE];
        BigEndian::write_i32(&mut buf[VERSION..VERSION + 4], self.version);
        BigEndian::write_i32(&mut buf[WIDTH..WIDTH + 4], self.dims[0] as i32);
        BigEndian::write_i32(&mut buf[HEIGHT..HEIGHT + 4], self.dims[1] as i32);
        BigEndian::write_i32(&mut buf[DEPTH..DEPTH + 4], self.dims[2] as i32);
        BigEndian::write_i32(&mut buf[FRAMES..FRAMES + 4], self.frames as i32);
        BigEndian::write_i32(&mut buf[TYPE..TYPE + 4], self.data_type.code());
        BigEndian::write_i32(&mut buf[DOF..DOF + 4], self.dof);
        BigEndian::write_i16(&mut buf[GOOD_RAS..GOOD_RAS + 2], self.good_ras as i16);

        let floats = self
            .spacing
            .iter()
            .chain(self.direction.iter().flatten())
            .chain(self.c_ras.iter());
        for (i, v) in floats.enumerate() {
            let at = SPACING + 4 * i;
            BigEndian::write_f32(&mut buf[at..at + 4], *v);
        }
        buf
    }
}

/// Scan parameters stored after the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanParameters {
    pub tr: f32,
    pub flip_angle: f32,
    pub te: f32,
    pub ti: f32,
    pub fov: f32,
}

/// A decoded MGH file.
#[derive(Debug, Clone)]
pub struct MghFile {
    pub header: MghHeader,
    pub volume: Volume,
    pub scan: ScanParameters,
    pub tags: Vec<Tag>,
}

/// Read a whole file, inflating it if it starts with the gzip magic.
pub(crate) fn read_all(path: &Path) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .read_to_end(&mut raw)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if raw.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut inflated)
            .with_context(|| format!("Failed to decompress {}", path.display()))?;
        return Ok(inflated);
    }
    Ok(raw)
}

/// Write `bytes` to `path`, gzip-compressed when `compress` is set.
pub(crate) fn write_all(path: &Path, bytes: &[u8], compress: bool) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);
    if compress {
        let mut gz = GzEncoder::new(writer, Compression::default());
        gz.write_all(bytes)?;
        gz.finish()?.flush()?;
    } else {
        let mut writer = writer;
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    Ok(())
}

pub fn read_mgh<P: AsRef<Path>>(path: P) -> Result<MghFile> {
    let path = path.as_ref();
    let bytes = read_all(path)?;
    let file = decode_mgh(&bytes).with_context(|| format!("Failed to decode MGH file {}", path.display()))?;
    debug!(
        "read MGH {}: dims {:?}, {} frames, version {:#06x}, {} tags",
        path.display(),
        file.header.dims,
        file.header.frames,
        file.header.version,
        file.tags.len()
    );
    Ok(file)
}

pub fn decode_mgh(bytes: &[u8]) -> Result<MghFile> {
    let header = MghHeader::parse(bytes)?;
    let geometry = header.geometry()?;

    let elem = header.data_type.size();
    let payload_len = header
        .dims
        .iter()
        .chain(std::iter::once(&header.frames))
        .try_fold(elem, |acc, &n| acc.checked_mul(n))
        .and_then(|n| n.checked_add(HEADER_SIZE).map(|_| n))
        .context("MGH dimensions overflow")?;
    let payload = bytes
        .get(HEADER_SIZE..HEADER_SIZE + payload_len)
        .with_context(|| {
            format!(
                "MGH payload truncated: expected {} bytes, found {}",
                payload_len,
                bytes.len().saturating_sub(HEADER_SIZE)
            )
        })?;

    let [w, h, d] = header.dims;
    let frames = header.frames;
    let mut volume = Volume::zeros(geometry, frames);
    let data = volume.data_mut();
    // payload is frame-major; volume storage is voxel-interleaved
    let per_frame = w * h * d;
    for (i, chunk) in payload.chunks_exact(elem).enumerate() {
        let (frame, voxel) = (i / per_frame, i % per_frame);
        data[voxel * frames + frame] = header.data_type.decode(chunk);
    }

    let mut trailer = Cursor::new(&bytes[HEADER_SIZE + payload_len..]);
    // files written without a trailer are still valid volumes
    let (scan, tags) = match read_scan_parameters(&mut trailer) {
        Ok(scan) => (scan, read_tags(&mut trailer)?),
        Err(_) => (ScanParameters::default(), Vec::new()),
    };
    Ok(MghFile {
        header,
        volume,
        scan,
        tags,
    })
}

fn read_scan_parameters<R: Read>(r: &mut R) -> std::io::Result<ScanParameters> {
    Ok(ScanParameters {
        tr: r.read_f32::<BigEndian>()?,
        flip_angle: r.read_f32::<BigEndian>()?,
        te: r.read_f32::<BigEndian>()?,
        ti: r.read_f32::<BigEndian>()?,
        fov: r.read_f32::<BigEndian>()?,
    })
}

/// Encode a float volume with the given version and trailing tags.
pub fn encode_mgh(volume: &Volume, version: i32, tags: &[Tag]) -> Result<Vec<u8>> {
    let header = MghHeader::for_geometry(volume.geometry(), volume.frames(), version);
    let frames = volume.frames();
    let per_frame = volume.geometry().voxel_count();

    let mut out = Vec::with_capacity(HEADER_SIZE + per_frame * frames * 4 + 64);
    out.extend_from_slice(&header.to_bytes());
    let data = volume.data();
    for frame in 0..frames {
        for voxel in 0..per_frame {
            out.write_f32::<BigEndian>(data[voxel * frames + frame])?;
        }
    }
    let scan = ScanParameters::default();
    for v in [scan.tr, scan.flip_angle, scan.te, scan.ti, scan.fov] {
        out.write_f32::<BigEndian>(v)?;
    }
    write_tags(&mut out, tags)?;
    Ok(out)
}

/// Write a float volume; the stream is gzip-compressed for `.mgz` paths.
pub fn write_mgh<P: AsRef<Path>>(path: P, volume: &Volume, version: i32, tags: &[Tag]) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_mgh(volume, version, tags)?;
    write_all(path, &bytes, is_compressed_mgh(path))?;
    debug!(
        "wrote MGH {}: dims {:?}, {} frames, version {:#06x}",
        path.display(),
        volume.dims(),
        volume.frames(),
        version
    );
    Ok(())
}
