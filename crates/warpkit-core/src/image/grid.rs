/// Split a linear voxel number into `[c, r, s]` for a `[width, height, depth]` grid.
///
/// Column varies fastest, matching [`crate::image::Volume`] storage.
#[inline]
pub fn unravel(dims: [usize; 3], offset: usize) -> [usize; 3] {
    let [w, h, _] = dims;
    [offset % w, (offset / w) % h, offset / (w * h)]
}

/// Iterate every `[c, r, s]` of a grid in storage (raster) order.
///
/// # Examples
/// ```rust
/// use warpkit_core::image::grid::raster;
///
/// let all: Vec<_> = raster([2, 1, 2]).collect();
/// assert_eq!(all, vec![[0, 0, 0], [1, 0, 0], [0, 0, 1], [1, 0, 1]]);
/// ```
pub fn raster(dims: [usize; 3]) -> impl Iterator<Item = [usize; 3]> {
    let total = dims[0] * dims[1] * dims[2];
    (0..total).map(move |i| unravel(dims, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_is_exhaustive() {
        let dims = [3, 4, 5];
        let all: Vec<_> = raster(dims).collect();
        assert_eq!(all.len(), 60);
        assert_eq!(all[0], [0, 0, 0]);
        assert_eq!(all[1], [1, 0, 0]);
        assert_eq!(all[3], [0, 1, 0]);
        assert_eq!(all[12], [0, 0, 1]);
        assert_eq!(all[59], [2, 3, 4]);
    }

    #[test]
    fn test_empty_grid() {
        assert_eq!(raster([0, 4, 4]).count(), 0);
    }
}
