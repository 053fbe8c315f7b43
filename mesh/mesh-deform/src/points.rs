//! Ordered point sets.
//!
//! A [`PointSet`] is the unit of exchange with the outside world: callers hand
//! one to a deformer and get a new one back, with the same length and the
//! same positional order.

use crate::{DeformError, DeformResult};
use nalgebra::Point3;
use rayon::prelude::*;
use std::ops::Index;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An ordered sequence of 3D points.
///
/// Order is meaningful: deformers return a set whose `i`-th point is the image
/// of the input's `i`-th point.
///
/// # Example
///
/// ```
/// use mesh_deform::PointSet;
/// use nalgebra::Point3;
///
/// let points = PointSet::from_flat(&[0.0, 0.0, 0.0, 1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(points.len(), 2);
/// assert_eq!(points[1], Point3::new(1.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointSet {
    points: Vec<Point3<f64>>,
}

impl PointSet {
    /// Creates an empty point set.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Wraps an existing vector of points.
    #[must_use]
    pub const fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Builds a point set from a flat coordinate array `[x0, y0, z0, x1, ...]`.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::DimensionMismatch`] if the length is not a
    /// multiple of 3.
    pub fn from_flat(coords: &[f64]) -> DeformResult<Self> {
        if coords.len() % 3 != 0 {
            return Err(DeformError::DimensionMismatch {
                what: "flat coordinate array length",
                expected: coords.len().next_multiple_of(3),
                actual: coords.len(),
            });
        }

        Ok(Self {
            points: coords
                .chunks_exact(3)
                .map(|c| Point3::new(c[0], c[1], c[2]))
                .collect(),
        })
    }

    /// Builds a point set from rows of coordinates, each of which must have
    /// exactly three entries.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::DimensionMismatch`] for the first row whose
    /// width is not 3.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_deform::{DeformError, PointSet};
    ///
    /// let rows = vec![vec![0.0, 0.0, 0.0], vec![1.0, 1.0]];
    /// assert!(matches!(
    ///     PointSet::from_rows(&rows),
    ///     Err(DeformError::DimensionMismatch { expected: 3, actual: 2, .. })
    /// ));
    /// ```
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> DeformResult<Self> {
        rows.iter()
            .map(|row| match row.as_ref() {
                &[x, y, z] => Ok(Point3::new(x, y, z)),
                other => Err(DeformError::DimensionMismatch {
                    what: "point row width",
                    expected: 3,
                    actual: other.len(),
                }),
            })
            .collect::<DeformResult<Vec<_>>>()
            .map(Self::from_points)
    }

    /// Number of points.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set holds no points.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the point at `index`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Point3<f64>> {
        self.points.get(index)
    }

    /// Iterates over the points in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Point3<f64>> {
        self.points.iter()
    }

    /// Borrows the points as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Consumes the set, returning the underlying vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Point3<f64>> {
        self.points
    }

    /// Appends a point.
    pub fn push(&mut self, point: Point3<f64>) {
        self.points.push(point);
    }

    /// Flattens the set back to `[x0, y0, z0, x1, ...]`.
    #[must_use]
    pub fn to_flat(&self) -> Vec<f64> {
        self.points.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
    }
}

impl From<Vec<Point3<f64>>> for PointSet {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Self::from_points(points)
    }
}

impl FromIterator<Point3<f64>> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point3<f64>;
    type IntoIter = std::slice::Iter<'a, Point3<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl Index<usize> for PointSet {
    type Output = Point3<f64>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

/// Point counts above this are mapped in parallel.
pub(crate) const PARALLEL_THRESHOLD: usize = 1000;

/// Applies `f` to every point, in parallel for large inputs, keeping order.
pub(crate) fn map_points<F>(points: &[Point3<f64>], f: F) -> Vec<Point3<f64>>
where
    F: Fn(&Point3<f64>) -> Point3<f64> + Sync + Send,
{
    if points.len() > PARALLEL_THRESHOLD {
        points.par_iter().map(f).collect()
    } else {
        points.iter().map(f).collect()
    }
}
