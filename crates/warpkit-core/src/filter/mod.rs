pub mod neighborhood;

pub use neighborhood::NeighborhoodStats;
