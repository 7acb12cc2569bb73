//! Deformation models.
//!
//! The engines only talk to the [`DeformationModel`] trait; [`DenseMorph`]
//! is the node-lattice implementation shipped with the crate.

pub mod trait_;
pub mod lattice;

pub use trait_::{DeformationModel, Sample};
pub use lattice::DenseMorph;
