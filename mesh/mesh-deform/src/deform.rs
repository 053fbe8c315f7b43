//! One-shot deformation entry point.
//!
//! This module provides [`deform_points`], which runs the algorithm chosen in
//! [`DeformParams`] over a point set and reports how far the points moved.

use crate::{
    DeformAlgorithm, DeformOutput, DeformParams, DeformResult, FfdDeformer, PointSet, RbfDeformer,
};
use tracing::info;

/// Deforms a point set according to `params`.
///
/// The returned points have the same length and order as the input. The
/// input is never modified.
///
/// # Errors
///
/// Returns an error if:
/// - The lattice box is flat ([`DeformError::DegenerateFrame`](crate::DeformError::DegenerateFrame))
/// - The control set is empty ([`DeformError::NoControlPoints`](crate::DeformError::NoControlPoints))
/// - The RBF system cannot be solved ([`DeformError::SingularSystem`](crate::DeformError::SingularSystem))
/// - A kernel parameter is invalid ([`DeformError::InvalidParameter`](crate::DeformError::InvalidParameter))
///
/// # Examples
///
/// ## FFD
///
/// ```
/// use mesh_deform::{deform_points, DeformParams, LatticeBox, PointSet};
/// use nalgebra::{Point3, Vector3};
///
/// let lattice = LatticeBox::default()
///     .with_displacement(1, 1, 1, Vector3::new(0.0, 0.0, 0.5))
///     .unwrap();
/// let points = PointSet::from_points(vec![
///     Point3::new(1.0, 1.0, 1.0),
///     Point3::new(5.0, 5.0, 5.0),
/// ]);
///
/// let output = deform_points(&points, &DeformParams::ffd(lattice)).unwrap();
/// assert!((output.points[0].z - 1.5).abs() < 1e-12);
/// assert_eq!(output.points[1], points[1]);
/// assert_eq!(output.points_moved, 1);
/// ```
///
/// ## RBF
///
/// ```
/// use mesh_deform::{deform_points, ControlPair, ControlPointPairSet, DeformParams, PointSet, RbfKernel};
/// use nalgebra::Point3;
///
/// let controls = ControlPointPairSet::new()
///     .with_pair(ControlPair::fixed(Point3::new(0.0, 0.0, 0.0)))
///     .with_pair(ControlPair::fixed(Point3::new(1.0, 0.0, 0.0)))
///     .with_pair(ControlPair::fixed(Point3::new(0.0, 1.0, 0.0)))
///     .with_pair(ControlPair::new(
///         Point3::new(0.0, 0.0, 1.0),
///         Point3::new(0.0, 0.0, 1.5),
///     ));
/// let params = DeformParams::rbf(controls, RbfKernel::ThinPlateSpline { radius: 1.0 });
///
/// let points = PointSet::from_points(vec![Point3::new(0.0, 0.0, 1.0)]);
/// let output = deform_points(&points, &params).unwrap();
/// assert!((output.points[0].z - 1.5).abs() < 1e-9);
/// ```
pub fn deform_points(points: &PointSet, params: &DeformParams) -> DeformResult<DeformOutput> {
    let deformed = match &params.algorithm {
        DeformAlgorithm::Ffd(lattice) => FfdDeformer::new(lattice.clone()).perform(points)?,
        DeformAlgorithm::Rbf { controls, kernel } => {
            RbfDeformer::build(controls, *kernel)?.perform(points)
        }
    };

    let output = DeformOutput::measure(points, deformed, params.motion_tolerance);
    info!(
        algorithm = if params.is_rbf() { "rbf" } else { "ffd" },
        points = points.len(),
        moved = output.points_moved,
        max_displacement = output.max_displacement,
        "deformation complete"
    );
    Ok(output)
}
