//! Input file-type detection by filename suffix.

use std::fmt;
use std::path::Path;

/// Kinds of file the io layer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Node-lattice morph (`.m3z`).
    MorphLattice,
    /// MGH volume, plain (`.mgh`) or gzip-compressed (`.mgz`).
    MghVolume,
    /// NIfTI-1 volume (`.nii`, `.nii.gz`).
    Nifti,
    Unknown,
}

impl FileType {
    /// Classify `path` by its lowercase suffix.
    pub fn probe(path: impl AsRef<Path>) -> Self {
        let name = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".m3z") {
            FileType::MorphLattice
        } else if name.ends_with(".mgz") || name.ends_with(".mgh") {
            FileType::MghVolume
        } else if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            FileType::Nifti
        } else {
            FileType::Unknown
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::MorphLattice => "morph lattice (.m3z)",
            FileType::MghVolume => "MGH volume (.mgh/.mgz)",
            FileType::Nifti => "NIfTI volume (.nii/.nii.gz)",
            FileType::Unknown => "unknown file type",
        };
        f.write_str(name)
    }
}

/// True when `path` names a gzip-compressed MGH volume.
pub fn is_compressed_mgh(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("mgz"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_suffixes() {
        assert_eq!(FileType::probe("subj/mri/transforms/talairach.m3z"), FileType::MorphLattice);
        assert_eq!(FileType::probe("warp.MGZ"), FileType::MghVolume);
        assert_eq!(FileType::probe("warp.mgh"), FileType::MghVolume);
        assert_eq!(FileType::probe("warp.nii.gz"), FileType::Nifti);
        assert_eq!(FileType::probe("warp.nii"), FileType::Nifti);
        assert_eq!(FileType::probe("warp.gz"), FileType::Unknown);
        assert_eq!(FileType::probe("m3z"), FileType::Unknown);
    }

    #[test]
    fn test_compressed_suffix() {
        assert!(is_compressed_mgh("a/b.mgz"));
        assert!(!is_compressed_mgh("a/b.mgh"));
    }
}
