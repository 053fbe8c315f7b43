//! Deformation output and displacement statistics.
//!
//! This module provides the [`DeformOutput`] struct, which carries the
//! deformed points together with a few numbers summarizing how far they moved.

use crate::PointSet;

/// Result of a one-shot deformation.
///
/// # Examples
///
/// ```
/// use mesh_deform::{deform_points, DeformParams, PointSet};
/// use nalgebra::Point3;
///
/// let points = PointSet::from_points(vec![Point3::new(0.5, 0.5, 0.5)]);
/// let output = deform_points(&points, &DeformParams::default()).unwrap();
///
/// assert!(output.is_identity(1e-12));
/// println!("{}", output.summary());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeformOutput {
    /// The deformed points, aligned with the input.
    pub points: PointSet,
    /// Number of points that moved by more than the motion tolerance.
    pub points_moved: usize,
    /// Largest displacement distance over all points.
    pub max_displacement: f64,
    /// Mean displacement distance over the points that moved.
    pub average_displacement: f64,
}

impl DeformOutput {
    /// Builds the output and its statistics by comparing against the input.
    ///
    /// Displacements at or below `tolerance` do not count as movement. The
    /// maximum is taken over every point regardless.
    #[must_use]
    pub fn measure(original: &PointSet, points: PointSet, tolerance: f64) -> Self {
        let mut points_moved = 0;
        let mut max_displacement = 0.0_f64;
        let mut total_displacement = 0.0;

        for (before, after) in original.iter().zip(points.iter()) {
            let disp = (after - before).norm();
            max_displacement = max_displacement.max(disp);
            if disp > tolerance {
                points_moved += 1;
                total_displacement += disp;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let average_displacement = if points_moved > 0 {
            total_displacement / points_moved as f64
        } else {
            0.0
        };

        Self {
            points,
            points_moved,
            max_displacement,
            average_displacement,
        }
    }

    /// Whether no point moved by more than `tolerance`.
    #[must_use]
    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.max_displacement <= tolerance
    }

    /// Returns a one-line summary of the deformation.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "DeformOutput: {} of {} points moved, max displacement: {:.6}, avg displacement: {:.6}",
            self.points_moved,
            self.points.len(),
            self.max_displacement,
            self.average_displacement
        )
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_measure_counts_moved_points() {
        let original = PointSet::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ]);
        let deformed = PointSet::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 3.0),
        ]);

        let output = DeformOutput::measure(&original, deformed, 1e-10);
        assert_eq!(output.points_moved, 2);
        assert_relative_eq!(output.max_displacement, 3.0);
        assert_relative_eq!(output.average_displacement, 2.0);
        assert!(!output.is_identity(1e-6));
        assert!(output.is_identity(3.0));
    }

    #[test]
    fn test_tolerance_hides_jitter() {
        let original = PointSet::from_points(vec![Point3::origin()]);
        let deformed = PointSet::from_points(vec![Point3::new(0.0, 1e-12, 0.0)]);
        let output = DeformOutput::measure(&original, deformed, 1e-10);
        assert_eq!(output.points_moved, 0);
        assert_eq!(output.average_displacement, 0.0);
        // Sub-tolerance motion still shows up in the maximum.
        assert_relative_eq!(output.max_displacement, 1e-12);
        assert!(!output.is_identity(1e-13));
        assert!(output.is_identity(1e-10));
    }

    #[test]
    fn test_summary_mentions_counts() {
        let points = PointSet::from_points(vec![Point3::origin(); 4]);
        let output = DeformOutput::measure(&points, points.clone(), 1e-10);
        let summary = output.summary();
        assert!(summary.contains("0 of 4 points moved"));
    }
}
