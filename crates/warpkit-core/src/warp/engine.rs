//! Conversion and inversion sweeps.
//!
//! Both directions run the same routine: allocate a 3-frame volume over the
//! query grid, ask a sampling closure for every voxel's correspondence,
//! re-express it through a [`FormatSelector`] and write it into the voxel's
//! own chunk. Voxels are independent, so the serial and parallel paths only
//! differ in how the chunks are iterated and how the out-of-domain count is
//! combined.

use rayon::prelude::*;
use tracing::{debug, info};

use super::options::{ConversionOptions, OutOfDomainPolicy, SamplingStrategy};
use super::selector::FormatSelector;
use crate::error::{Result, WarpError};
use crate::image::grid::unravel;
use crate::image::{Volume, VolumeGeometry};
use crate::morph::{DeformationModel, Sample};
use crate::spatial::Point3;

/// Channels per voxel of a warp field.
pub const VECTOR_FRAMES: usize = 3;

/// Summary of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Voxels visited.
    pub voxels: usize,
    /// Voxels the model could not explain; `None` when the policy does not count them.
    pub out_of_domain: Option<usize>,
}

/// Fill a new vector volume over `query`.
///
/// `sample` returns the correspondence of an integer query index, or an error
/// that aborts the whole sweep.
pub fn sweep<F>(
    query: &VolumeGeometry,
    selector: &FormatSelector,
    policy: OutOfDomainPolicy,
    parallel: bool,
    sample: F,
) -> Result<(Volume, SweepReport)>
where
    F: Fn([usize; 3]) -> Result<Sample> + Sync,
{
    let mut volume = Volume::zeros(query.clone(), VECTOR_FRAMES);
    let dims = query.dims();

    let visit = |(offset, cell): (usize, &mut [f32])| -> Result<usize> {
        let index = unravel(dims, offset);
        match sample(index)? {
            Sample::Mapped(p) => {
                let v = selector.express(index, &p);
                cell[0] = v[0] as f32;
                cell[1] = v[1] as f32;
                cell[2] = v[2] as f32;
                Ok(0)
            }
            Sample::OutOfDomain => match policy {
                OutOfDomainPolicy::Counted => {
                    cell.fill(0.0);
                    Ok(1)
                }
                OutOfDomainPolicy::LegacySkip => Ok(0),
            },
        }
    };

    let data = volume.data_mut();
    let out_of_domain = if parallel {
        data.par_chunks_mut(VECTOR_FRAMES)
            .enumerate()
            .map(visit)
            .try_reduce(|| 0, |a, b| Ok(a + b))?
    } else {
        data.chunks_mut(VECTOR_FRAMES)
            .enumerate()
            .map(visit)
            .sum::<Result<usize>>()?
    };

    let report = SweepReport {
        voxels: query.voxel_count(),
        out_of_domain: match policy {
            OutOfDomainPolicy::Counted => Some(out_of_domain),
            OutOfDomainPolicy::LegacySkip => None,
        },
    };
    Ok((volume, report))
}

/// Atlas-indexed sweep: every atlas voxel's image correspondence.
pub fn convert_forward<M>(model: &M, options: &ConversionOptions) -> Result<(Volume, SweepReport)>
where
    M: DeformationModel + ?Sized,
{
    let query = model.atlas();
    let selector = FormatSelector::new(options.format, query, model.image());
    info!(
        "converting morph over atlas grid {:?} to {} ({:?} sampling)",
        query.dims(),
        options.format,
        options.sampling
    );

    let (volume, report) = match options.sampling {
        SamplingStrategy::Interpolated => sweep(
            query,
            &selector,
            OutOfDomainPolicy::Counted,
            options.parallel,
            |index| Ok(model.sample_forward(&Point3::from_index(index))),
        )?,
        SamplingStrategy::NodeLookup => sweep(
            query,
            &selector,
            OutOfDomainPolicy::Counted,
            options.parallel,
            |index| {
                model
                    .node(index)
                    .map(Sample::Mapped)
                    .ok_or(WarpError::NodeOutOfLattice { index })
            },
        )?,
    };

    info!(
        "total out of range voxel count: {}",
        report.out_of_domain.unwrap_or(0)
    );
    Ok((volume, report))
}

/// Image-indexed sweep: every image voxel's atlas correspondence.
///
/// Builds the model's inverse structure first.
pub fn convert_inverse<M>(model: &mut M, options: &ConversionOptions) -> Result<(Volume, SweepReport)>
where
    M: DeformationModel + ?Sized,
{
    let image_dims = model.image().dims();
    model.build_inverse(image_dims)?;

    let model = &*model;
    let query = model.image();
    let selector = FormatSelector::new(options.format, query, model.atlas());
    info!(
        "inverting morph over image grid {:?} to {}",
        query.dims(),
        options.format
    );

    let (volume, report) = sweep(
        query,
        &selector,
        options.inverse_policy,
        options.parallel,
        |index| Ok(model.sample_inverse(&Point3::from_index(index))),
    )?;

    match report.out_of_domain {
        Some(n) => info!("total out of range voxel count: {}", n),
        None => debug!("out of range voxels skipped without counting"),
    }
    Ok((volume, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::DenseMorph;
    use crate::warp::format::DataFormat;

    fn wavy(dims: [usize; 3]) -> DenseMorph {
        DenseMorph::from_fn(
            VolumeGeometry::identity(dims),
            VolumeGeometry::identity(dims),
            1,
            |[c, r, s]| {
                if (c + r + s) % 7 == 0 {
                    return None;
                }
                Some(Point3::new([
                    c as f64 + 0.25 * (r as f64).sin(),
                    r as f64 - 0.5,
                    s as f64 + 0.1 * c as f64,
                ]))
            },
        )
        .unwrap()
    }

    #[test]
    fn test_parallel_matches_serial() {
        let morph = wavy([6, 5, 4]);
        for format in DataFormat::ALL {
            let serial = ConversionOptions::new().with_format(format);
            let parallel = serial.clone().parallel();
            let (a, ra) = convert_forward(&morph, &serial).unwrap();
            let (b, rb) = convert_forward(&morph, &parallel).unwrap();
            assert_eq!(a, b);
            assert_eq!(ra, rb);
        }
    }

    #[test]
    fn test_node_lookup_matches_interpolated_on_lattice() {
        let morph = DenseMorph::affine_only(
            VolumeGeometry::identity([4, 4, 4]),
            VolumeGeometry::identity([4, 4, 4]),
            1,
        )
        .unwrap();
        let interp = ConversionOptions::new();
        let lookup = ConversionOptions::new().with_sampling(SamplingStrategy::NodeLookup);
        let (a, _) = convert_forward(&morph, &interp).unwrap();
        let (b, _) = convert_forward(&morph, &lookup).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_node_lookup_outside_lattice_fails() {
        // node spacing 2 gives a 2x2x2 lattice under a 4x4x4 atlas
        let morph = DenseMorph::affine_only(
            VolumeGeometry::identity([4, 4, 4]),
            VolumeGeometry::identity([4, 4, 4]),
            2,
        )
        .unwrap();
        let opts = ConversionOptions::new().with_sampling(SamplingStrategy::NodeLookup);
        assert!(matches!(
            convert_forward(&morph, &opts),
            Err(WarpError::NodeOutOfLattice { .. })
        ));
        assert!(matches!(
            convert_forward(&morph, &opts.parallel()),
            Err(WarpError::NodeOutOfLattice { .. })
        ));
    }

    #[test]
    fn test_legacy_skip_reports_no_count() {
        let mut morph = wavy([4, 4, 4]);
        let opts = ConversionOptions::new().with_inverse_policy(OutOfDomainPolicy::LegacySkip);
        let (_, report) = convert_inverse(&mut morph, &opts).unwrap();
        assert_eq!(report.out_of_domain, None);
        assert_eq!(report.voxels, 64);
    }
}
