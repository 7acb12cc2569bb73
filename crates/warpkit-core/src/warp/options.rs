//! Conversion configuration.

use serde::{Deserialize, Serialize};

use super::format::DataFormat;

/// How the forward engine obtains a correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingStrategy {
    /// Continuous sampling through the model's own interpolation.
    #[default]
    Interpolated,
    /// Direct lattice node lookup at the integer index. Only meaningful when
    /// the output grid coincides with the model's node lattice.
    NodeLookup,
}

/// What the inverse engine does with voxels the model cannot explain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutOfDomainPolicy {
    /// Reset the voxel to zero and count it.
    #[default]
    Counted,
    /// Leave the voxel untouched and do not count it.
    LegacySkip,
}

/// Conversion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Output data format.
    pub format: DataFormat,
    /// Forward sampling strategy (ignored by the inverse engine).
    pub sampling: SamplingStrategy,
    /// Inverse out-of-domain handling (forward always counts).
    pub inverse_policy: OutOfDomainPolicy,
    /// Split the sweep across the rayon thread pool.
    pub parallel: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            format: DataFormat::AbsoluteIndex,
            sampling: SamplingStrategy::Interpolated,
            inverse_policy: OutOfDomainPolicy::Counted,
            parallel: false,
        }
    }
}

impl ConversionOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output data format.
    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the forward sampling strategy.
    pub fn with_sampling(mut self, sampling: SamplingStrategy) -> Self {
        self.sampling = sampling;
        self
    }

    /// Set the inverse out-of-domain policy.
    pub fn with_inverse_policy(mut self, policy: OutOfDomainPolicy) -> Self {
        self.inverse_policy = policy;
        self
    }

    /// Run the sweep in parallel.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ConversionOptions::new();
        assert_eq!(opts.format, DataFormat::AbsoluteIndex);
        assert_eq!(opts.sampling, SamplingStrategy::Interpolated);
        assert_eq!(opts.inverse_policy, OutOfDomainPolicy::Counted);
        assert!(!opts.parallel);
    }

    #[test]
    fn test_builder() {
        let opts = ConversionOptions::new()
            .with_format(DataFormat::DisplacementPhysical)
            .with_sampling(SamplingStrategy::NodeLookup)
            .with_inverse_policy(OutOfDomainPolicy::LegacySkip)
            .parallel();
        assert_eq!(opts.format, DataFormat::DisplacementPhysical);
        assert_eq!(opts.sampling, SamplingStrategy::NodeLookup);
        assert_eq!(opts.inverse_policy, OutOfDomainPolicy::LegacySkip);
        assert!(opts.parallel);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: ConversionOptions =
            serde_json::from_str(r#"{"format": "disp-ras", "sampling": "node-lookup"}"#).unwrap();
        assert_eq!(opts.format, DataFormat::DisplacementPhysical);
        assert_eq!(opts.sampling, SamplingStrategy::NodeLookup);
        assert_eq!(opts.inverse_policy, OutOfDomainPolicy::Counted);
        assert!(!opts.parallel);

        let json = serde_json::to_string(&ConversionOptions::new()).unwrap();
        assert!(json.contains(r#""format":"abs-crs""#));
    }
}
