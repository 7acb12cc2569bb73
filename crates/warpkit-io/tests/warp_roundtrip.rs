use anyhow::Result;
use nalgebra::Matrix3;
use tempfile::tempdir;
use warpkit_core::spatial::{Point3, Spacing3};
use warpkit_core::warp::{ConversionOptions, DataFormat, WarpDirection};
use warpkit_core::{DeformationModel, DenseMorph, Volume, VolumeGeometry, WarpError, WarpField};
use warpkit_io::mgh::write_mgh;
use warpkit_io::{
    convert_morph_file, invert_morph_file, read_morph, read_warp, write_morph, WarpFieldIo,
};

fn oblique(dims: [usize; 3], spacing: f64, origin: [f64; 3]) -> VolumeGeometry {
    let direction = Matrix3::new(-1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0);
    VolumeGeometry::from_origin(
        dims,
        Spacing3::new(spacing, spacing, spacing),
        direction,
        Point3::new(origin),
    )
    .unwrap()
}

fn sample_morph() -> DenseMorph {
    let image = oblique([8, 8, 8], 1.0, [4.0, -4.0, 4.0]);
    let atlas = oblique([4, 4, 4], 2.0, [4.0, -4.0, 4.0]);
    DenseMorph::from_fn(image, atlas, 1, |[c, r, s]| {
        (c + r + s != 9).then(|| {
            Point3::new([
                2.0 * c as f64 + 0.3,
                2.0 * r as f64 - 0.2,
                2.0 * s as f64 + 0.1 * r as f64,
            ])
        })
    })
    .unwrap()
}

fn assert_geometry_close(a: &VolumeGeometry, b: &VolumeGeometry) {
    assert_eq!(a.dims(), b.dims());
    let diff = (a.vox2ras().matrix() - b.vox2ras().matrix()).abs().max();
    assert!(diff < 1e-4, "vox2ras differs by {}", diff);
}

#[test]
fn test_field_roundtrip_every_format_and_direction() -> Result<()> {
    let dir = tempdir()?;
    for (i, format) in DataFormat::ALL.into_iter().enumerate() {
        for direction in [WarpDirection::Forward, WarpDirection::Inverse] {
            let mut morph = sample_morph();
            let opts = ConversionOptions::new().with_format(format);
            let mut field = WarpField::new();
            let (grid, provenance) = match direction {
                WarpDirection::Forward => {
                    field.convert(&morph, &opts)?;
                    (morph.atlas().clone(), *morph.image().ras2vox())
                }
                WarpDirection::Inverse => {
                    field.invert(&mut morph, &opts)?;
                    (morph.image().clone(), *morph.atlas().ras2vox())
                }
            };
            let ext = if i % 2 == 0 { "mgz" } else { "mgh" };
            let path = dir.path().join(format!("{}-{}.{}", format, direction, ext));
            field.write(&path)?;

            let mut back = WarpField::new();
            back.read(&path)?;
            let (h0, h1) = (field.header()?, back.header()?);
            assert_eq!(h1, h0, "{} {}", format, direction);
            assert_eq!(h1.format, format);
            assert_eq!(h1.direction, direction);
            assert_eq!(h1.provenance, provenance);

            let (v0, v1) = (field.volume().unwrap(), back.volume().unwrap());
            assert_eq!(v1.frames(), 3);
            assert_eq!(v1.data(), v0.data(), "{} {}", format, direction);
            assert_geometry_close(v1.geometry(), &grid);
        }
    }
    Ok(())
}

#[test]
fn test_write_empty_field_fails() {
    let dir = tempdir().unwrap();
    let err = WarpField::new().write(dir.path().join("empty.mgz")).unwrap_err();
    assert!(matches!(err.downcast_ref::<WarpError>(), Some(WarpError::NotPopulated)));
}

#[test]
fn test_failed_read_leaves_field_unchanged() -> Result<()> {
    let dir = tempdir()?;
    let corrupt = dir.path().join("corrupt.mgz");
    std::fs::write(&corrupt, b"\x1f\x8bnot really gzip")?;

    let mut empty = WarpField::new();
    assert!(empty.read(&corrupt).is_err());
    assert!(!empty.is_populated());

    let mut populated = WarpField::new();
    populated.convert(&sample_morph(), &ConversionOptions::new())?;
    let before = populated.clone();
    assert!(populated.read(&corrupt).is_err());
    assert!(populated.read(dir.path().join("missing.mgz")).is_err());
    assert_eq!(populated, before);
    Ok(())
}

#[test]
fn test_plain_volume_is_not_a_warp_field() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t1.mgz");
    write_mgh(&path, &Volume::zeros(VolumeGeometry::identity([3, 3, 3]), 3), 1, &[])?;
    assert!(read_warp(&path).is_err());

    // right version, wrong frame count
    let path = dir.path().join("one_frame.mgz");
    let version = WarpDirection::Forward.version_tag();
    write_mgh(&path, &Volume::zeros(VolumeGeometry::identity([3, 3, 3]), 1), version, &[])?;
    assert!(read_warp(&path).is_err());
    Ok(())
}

#[test]
fn test_morph_file_roundtrip() -> Result<()> {
    let dir = tempdir()?;
    let morph = sample_morph();
    let path = dir.path().join("talairach.m3z");
    write_morph(&path, &morph)?;

    let back = read_morph(&path)?;
    assert_eq!(back.spacing(), morph.spacing());
    assert_eq!(back.nodes().data(), morph.nodes().data());
    assert_eq!(back.valid(), morph.valid());
    assert_eq!(back.image(), morph.image());
    assert_eq!(back.atlas(), morph.atlas());
    Ok(())
}

#[test]
fn test_convert_morph_file_matches_in_memory() -> Result<()> {
    let dir = tempdir()?;
    let mut morph = sample_morph();
    let path = dir.path().join("talairach.m3z");
    write_morph(&path, &morph)?;
    let opts = ConversionOptions::new().with_format(DataFormat::DisplacementIndex);

    let (from_file, report) = convert_morph_file(&path, &opts)?;
    let mut in_memory = WarpField::new();
    let expected = in_memory.convert(&morph, &opts)?;
    assert_eq!(report, expected);
    assert_eq!(from_file, in_memory);

    let (inv_file, _) = invert_morph_file(&path, &opts)?;
    let mut inv_memory = WarpField::new();
    inv_memory.invert(&mut morph, &opts)?;
    assert_eq!(inv_file, inv_memory);
    Ok(())
}

#[test]
fn test_non_morph_input_is_rejected() {
    let err = convert_morph_file("subject/warp.mgz", &ConversionOptions::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WarpError>(),
        Some(WarpError::UnsupportedInput { .. })
    ));
    let err = invert_morph_file("subject/warp", &ConversionOptions::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WarpError>(),
        Some(WarpError::UnsupportedInput { .. })
    ));
}
