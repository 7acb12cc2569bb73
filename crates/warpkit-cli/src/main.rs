use anyhow::{Context, Result};
use burn_ndarray::NdArray;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use warpkit_core::warp::{ConversionOptions, DataFormat, OutOfDomainPolicy, SamplingStrategy, SweepReport};
use warpkit_io::{convert_morph_file, export_nifti, invert_morph_file, read_warp, WarpFieldIo};

#[derive(Parser)]
#[command(name = "warpkit")]
#[command(about = "Convert non-linear morphs to dense warp fields")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a morph (.m3z) to an atlas-indexed warp field
    Convert {
        /// Input morph lattice
        input: PathBuf,

        /// Output warp field (.mgz or .mgh)
        output: PathBuf,

        /// Sample lattice nodes directly instead of interpolating
        #[arg(long)]
        node_lookup: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Invert a morph (.m3z) into an image-indexed warp field
    Invert {
        /// Input morph lattice
        input: PathBuf,

        /// Output warp field (.mgz or .mgh)
        output: PathBuf,

        /// Leave unreachable voxels untouched and uncounted
        #[arg(long)]
        legacy_skip: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Print the metadata of a stored warp field
    Info {
        /// Warp field (.mgz or .mgh)
        path: PathBuf,
    },

    /// Export a stored warp field as a 4-D NIfTI vector volume
    ExportNifti {
        /// Warp field (.mgz or .mgh)
        input: PathBuf,

        /// Output NIfTI file (.nii or .nii.gz)
        output: PathBuf,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Data format (abs-crs, disp-crs, abs-ras, disp-ras)
    #[arg(short, long)]
    format: Option<DataFormat>,

    /// Run the sweep on all cores
    #[arg(short, long)]
    parallel: bool,

    /// JSON file with conversion options; flags override its values
    #[arg(long)]
    options: Option<PathBuf>,
}

impl CommonArgs {
    fn base_options(&self) -> Result<ConversionOptions> {
        let Some(path) = &self.options else {
            return Ok(ConversionOptions::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file {}", path.display()))?;
        let options = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse options file {}", path.display()))?;
        Ok(options)
    }

    fn apply(&self, mut options: ConversionOptions) -> ConversionOptions {
        if let Some(format) = self.format {
            options.format = format;
        }
        if self.parallel {
            options.parallel = true;
        }
        options
    }
}

fn forward_options(common: &CommonArgs, node_lookup: bool) -> Result<ConversionOptions> {
    let mut options = common.apply(common.base_options()?);
    if node_lookup {
        options.sampling = SamplingStrategy::NodeLookup;
    }
    Ok(options)
}

fn inverse_options(common: &CommonArgs, legacy_skip: bool) -> Result<ConversionOptions> {
    let mut options = common.apply(common.base_options()?);
    if legacy_skip {
        options.inverse_policy = OutOfDomainPolicy::LegacySkip;
    }
    Ok(options)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            node_lookup,
            common,
        } => {
            let options = forward_options(&common, node_lookup)?;
            let (field, report) = convert_morph_file(&input, &options)?;
            summarize(&report);
            field.write(&output)?;
        }
        Commands::Invert {
            input,
            output,
            legacy_skip,
            common,
        } => {
            let options = inverse_options(&common, legacy_skip)?;
            let (field, report) = invert_morph_file(&input, &options)?;
            summarize(&report);
            field.write(&output)?;
        }
        Commands::Info { path } => {
            print_info(&path)?;
        }
        Commands::ExportNifti { input, output } => {
            let field = read_warp(&input)?;
            export_nifti(&output, &field)?;
        }
    }

    Ok(())
}

fn summarize(report: &SweepReport) {
    match report.out_of_domain {
        Some(0) => info!("all {} voxels mapped", report.voxels),
        Some(n) => warn!("{} of {} voxels out of range", n, report.voxels),
        None => info!("{} voxels visited, out of range voxels not counted", report.voxels),
    }
}

fn print_info(path: &Path) -> Result<()> {
    let field = read_warp(path)?;
    let header = field.header()?;
    let volume = field.volume().context("warp field has no volume")?;
    let geometry = volume.geometry();
    let spacing = geometry.spacing();

    println!("file:        {}", path.display());
    println!("direction:   {}", header.direction);
    println!("format:      {} (code {})", header.format, header.format.code());
    println!("version:     {:#06x}", header.version);
    println!("dimensions:  {:?}", geometry.dims());
    println!(
        "spacing:     {:.4} {:.4} {:.4}",
        spacing[0], spacing[1], spacing[2]
    );
    let stats = field.vector_stats::<NdArray<f32>>(&Default::default())?;
    println!(
        "vectors:     mean |v| {:.4}, max |v| {:.4}, {} nonzero",
        stats.mean_norm, stats.max_norm, stats.nonzero
    );
    println!("provenance:");
    for row in header.provenance.rows() {
        println!(
            "  {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            row[0], row[1], row[2], row[3]
        );
    }
    Ok(())
}
