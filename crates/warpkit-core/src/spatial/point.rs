//! Point type for representing continuous coordinates.
//!
//! The same type carries continuous voxel indices and physical (RAS)
//! coordinates; which space a point lives in is a property of the code
//! holding it, not of the value.

use nalgebra::{Point as NaPoint, SVector};
use serde::{Deserialize, Serialize};

/// A point in D-dimensional space.
///
/// This is a thin wrapper around nalgebra's Point to provide
/// domain-specific functionality while maintaining all nalgebra operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    /// Create a new point from coordinates.
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    /// Create a point at the origin (all coordinates zero).
    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    /// Create a point from integer voxel indices.
    pub fn from_index(index: [usize; D]) -> Self {
        Self(NaPoint::from(index.map(|i| i as f64)))
    }

    /// Round every coordinate to the nearest integer, halves away from zero.
    pub fn round(&self) -> Self {
        Self(self.0.map(f64::round))
    }

    /// Coordinates as a plain array.
    pub fn to_array(&self) -> [f64; D] {
        self.0.coords.into()
    }

    /// Get the inner nalgebra point.
    pub fn inner(&self) -> &NaPoint<f64, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0.coords[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0.coords[index]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = SVector<f64, D>;

    fn sub(self, other: Self) -> Self::Output {
        self.0 - other.0
    }
}

impl<const D: usize> std::ops::Add<SVector<f64, D>> for Point<D> {
    type Output = Self;

    fn add(self, vector: SVector<f64, D>) -> Self::Output {
        Self(self.0 + vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Point3 = Point<3>;

    #[test]
    fn test_point_creation() {
        let p = Point3::new([1.0, 2.0, 3.0]);
        assert_eq!(p[0], 1.0);
        assert_eq!(p[1], 2.0);
        assert_eq!(p[2], 3.0);
    }

    #[test]
    fn test_point_from_index() {
        let p = Point3::from_index([4, 0, 7]);
        assert_eq!(p.to_array(), [4.0, 0.0, 7.0]);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let p = Point3::new([2.5, -2.5, 0.49999]);
        assert_eq!(p.round().to_array(), [3.0, -3.0, 0.0]);
    }

    #[test]
    fn test_point_subtraction() {
        let p1 = Point3::new([5.0, 5.0, 5.0]);
        let p2 = Point3::new([2.0, 3.0, 4.0]);
        let diff = p1 - p2;
        assert_eq!(diff, SVector::<f64, 3>::new(3.0, 2.0, 1.0));
    }

    #[test]
    fn test_point_vector_addition() {
        let p = Point3::new([1.0, 2.0, 3.0]);
        let result = p + SVector::<f64, 3>::new(4.0, 5.0, 6.0);
        assert_eq!(result, Point3::new([5.0, 7.0, 9.0]));
    }
}
