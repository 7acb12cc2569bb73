//! Data formats, directions and version tags of a warp field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WarpError};

/// Container revision of the MGH volume layout.
pub const MGH_VERSION: i32 = 1;

/// Volume intent of a forward warp field.
pub const INTENT_WARPMAP: i32 = 1;

/// Volume intent of an inverted warp field.
pub const INTENT_WARPMAP_INV: i32 = 2;

/// Persisted code for "no format established".
pub const FORMAT_UNKNOWN_CODE: i32 = -1;

/// How each voxel's correspondence is expressed.
///
/// Serialized under the same short names the command line accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    /// Corresponding continuous index in the other grid.
    #[serde(rename = "abs-crs")]
    AbsoluteIndex,
    /// Corresponding index minus its affine-only prediction.
    #[serde(rename = "disp-crs")]
    DisplacementIndex,
    /// Physical coordinate of the (rounded) corresponding index.
    #[serde(rename = "abs-ras")]
    AbsolutePhysical,
    /// Physical coordinate minus the physical affine-only prediction.
    #[serde(rename = "disp-ras")]
    DisplacementPhysical,
}

impl DataFormat {
    pub const ALL: [DataFormat; 4] = [
        DataFormat::AbsoluteIndex,
        DataFormat::DisplacementIndex,
        DataFormat::AbsolutePhysical,
        DataFormat::DisplacementPhysical,
    ];

    /// Integer code written to file metadata.
    pub fn code(self) -> i32 {
        match self {
            DataFormat::AbsoluteIndex => 0,
            DataFormat::DisplacementIndex => 1,
            DataFormat::AbsolutePhysical => 2,
            DataFormat::DisplacementPhysical => 3,
        }
    }

    /// Parse a persisted code; the unknown code and anything else is rejected.
    pub fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.code() == code)
            .ok_or(WarpError::UnknownFormat(code))
    }

    /// Short name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            DataFormat::AbsoluteIndex => "abs-crs",
            DataFormat::DisplacementIndex => "disp-crs",
            DataFormat::AbsolutePhysical => "abs-ras",
            DataFormat::DisplacementPhysical => "disp-ras",
        }
    }

    pub fn is_displacement(self) -> bool {
        matches!(
            self,
            DataFormat::DisplacementIndex | DataFormat::DisplacementPhysical
        )
    }

    pub fn is_physical(self) -> bool {
        matches!(
            self,
            DataFormat::AbsolutePhysical | DataFormat::DisplacementPhysical
        )
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataFormat {
    type Err = WarpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                WarpError::invalid_configuration(format!(
                    "unknown data format '{}', expected one of abs-crs, disp-crs, abs-ras, disp-ras",
                    s
                ))
            })
    }
}

/// Which grid indexes the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarpDirection {
    /// Atlas-indexed, vectors point into the image grid.
    Forward,
    /// Image-indexed, vectors point into the atlas grid.
    Inverse,
}

impl WarpDirection {
    fn intent(self) -> i32 {
        match self {
            WarpDirection::Forward => INTENT_WARPMAP,
            WarpDirection::Inverse => INTENT_WARPMAP_INV,
        }
    }

    /// Packed version tag: intent in the high byte, container revision in the low byte.
    pub fn version_tag(self) -> i32 {
        ((self.intent() & 0xff) << 8) | MGH_VERSION
    }

    /// Recover the direction from a packed version tag.
    pub fn from_version_tag(version: i32) -> Result<Self> {
        if version & 0xff != MGH_VERSION {
            return Err(WarpError::UnknownVersion(version));
        }
        match (version >> 8) & 0xff {
            INTENT_WARPMAP => Ok(WarpDirection::Forward),
            INTENT_WARPMAP_INV => Ok(WarpDirection::Inverse),
            _ => Err(WarpError::UnknownVersion(version)),
        }
    }
}

impl fmt::Display for WarpDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarpDirection::Forward => f.write_str("forward"),
            WarpDirection::Inverse => f.write_str("inverse"),
        }
    }
}

/// Format and direction, fixed when a field is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpLayout {
    pub format: DataFormat,
    pub direction: WarpDirection,
}

impl WarpLayout {
    pub fn new(format: DataFormat, direction: WarpDirection) -> Self {
        Self { format, direction }
    }
}
