//! Deformation parameters and configuration.
//!
//! This module provides the [`DeformParams`] struct for configuring a call to
//! [`deform_points`](crate::deform_points).

use crate::{ControlPointPairSet, DeformResult, LatticeBox, RbfKernel};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The deformation algorithm to use, with everything it needs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum DeformAlgorithm {
    /// Free-Form Deformation.
    ///
    /// Points inside the lattice box follow its Bernstein displacement field;
    /// points outside are untouched.
    Ffd(LatticeBox),

    /// Radial Basis Function interpolation.
    ///
    /// Every point is mapped by the interpolant through the control pairs,
    /// with no box restricting its reach.
    Rbf {
        /// Original and deformed control positions.
        controls: ControlPointPairSet,
        /// Radial kernel and its parameters.
        kernel: RbfKernel,
    },
}

impl Default for DeformAlgorithm {
    fn default() -> Self {
        Self::Ffd(LatticeBox::default())
    }
}

/// Parameters for a one-shot deformation.
///
/// # Examples
///
/// ## RBF with a multiquadric kernel
///
/// ```
/// use mesh_deform::{ControlPair, ControlPointPairSet, DeformParams, RbfKernel};
/// use nalgebra::Point3;
///
/// let controls = ControlPointPairSet::new().with_pair(ControlPair::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
/// ));
/// let params = DeformParams::rbf(controls, RbfKernel::Multiquadric { radius: 1.0 });
/// assert!(params.is_rbf());
/// ```
///
/// ## RBF from a kernel tag
///
/// ```
/// use mesh_deform::{ControlPointPairSet, DeformParams};
///
/// let params =
///     DeformParams::rbf_from_tag(ControlPointPairSet::new(), "thin_plate_spline", 2.0, None)
///         .unwrap();
/// assert!(params.is_rbf());
/// ```
///
/// ## FFD over a stretched box
///
/// ```
/// use mesh_deform::{DeformParams, LatticeBox};
/// use nalgebra::{Point3, Vector3};
///
/// let lattice =
///     LatticeBox::axis_aligned(Point3::origin(), Vector3::new(2.0, 1.0, 1.0), [4, 2, 2]).unwrap();
/// let params = DeformParams::ffd(lattice);
/// assert!(!params.is_rbf());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeformParams {
    /// The algorithm and its inputs.
    pub algorithm: DeformAlgorithm,
    /// Displacements at or below this length are not counted as moved.
    pub motion_tolerance: f64,
}

/// Default threshold for counting a point as moved.
pub const DEFAULT_MOTION_TOLERANCE: f64 = 1e-10;

impl Default for DeformParams {
    fn default() -> Self {
        Self::ffd(LatticeBox::default())
    }
}

impl DeformParams {
    /// Creates parameters for FFD with the given lattice.
    #[must_use]
    pub const fn ffd(lattice: LatticeBox) -> Self {
        Self {
            algorithm: DeformAlgorithm::Ffd(lattice),
            motion_tolerance: DEFAULT_MOTION_TOLERANCE,
        }
    }

    /// Creates parameters for RBF interpolation through `controls`.
    #[must_use]
    pub const fn rbf(controls: ControlPointPairSet, kernel: RbfKernel) -> Self {
        Self {
            algorithm: DeformAlgorithm::Rbf { controls, kernel },
            motion_tolerance: DEFAULT_MOTION_TOLERANCE,
        }
    }

    /// Creates parameters for RBF interpolation with a kernel named by tag.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::UnknownKernel`](crate::DeformError::UnknownKernel)
    /// for an unrecognized tag, or
    /// [`DeformError::InvalidParameter`](crate::DeformError::InvalidParameter)
    /// for a bad radius or degree.
    pub fn rbf_from_tag(
        controls: ControlPointPairSet,
        tag: &str,
        radius: f64,
        degree: Option<u32>,
    ) -> DeformResult<Self> {
        let kernel = RbfKernel::from_tag(tag, radius, degree)?;
        Ok(Self::rbf(controls, kernel))
    }

    /// Sets the threshold for counting a point as moved.
    #[must_use]
    pub fn with_motion_tolerance(mut self, tolerance: f64) -> Self {
        self.motion_tolerance = tolerance;
        self
    }

    /// Whether these parameters select RBF interpolation.
    #[must_use]
    pub const fn is_rbf(&self) -> bool {
        matches!(self.algorithm, DeformAlgorithm::Rbf { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{ControlPair, DeformError, KernelKind};
    use nalgebra::Point3;

    #[test]
    fn test_default_params_are_identity_lattice() {
        let params = DeformParams::default();
        assert_eq!(params.motion_tolerance, DEFAULT_MOTION_TOLERANCE);
        match params.algorithm {
            DeformAlgorithm::Ffd(lattice) => {
                assert_eq!(lattice.dims(), [2, 2, 2]);
                assert!(lattice.is_undeformed());
            }
            DeformAlgorithm::Rbf { .. } => panic!("expected FFD default"),
        }
    }

    #[test]
    fn test_rbf_builder_keeps_controls() {
        let controls = ControlPointPairSet::new()
            .with_pair(ControlPair::fixed(Point3::origin()))
            .with_pair(ControlPair::fixed(Point3::new(1.0, 0.0, 0.0)));
        let params = DeformParams::rbf(controls.clone(), RbfKernel::default());
        assert!(params.is_rbf());
        assert_eq!(params.motion_tolerance, DEFAULT_MOTION_TOLERANCE);
        match params.algorithm {
            DeformAlgorithm::Rbf { controls: c, kernel } => {
                assert_eq!(c, controls);
                assert_eq!(kernel.kind(), KernelKind::Gaussian);
            }
            DeformAlgorithm::Ffd(_) => panic!("expected RBF"),
        }
    }

    #[test]
    fn test_rbf_from_tag() {
        let params = DeformParams::rbf_from_tag(ControlPointPairSet::new(), "polyharmonic", 1.5, Some(3))
            .unwrap();
        assert!(matches!(
            params.algorithm,
            DeformAlgorithm::Rbf {
                kernel: RbfKernel::Polyharmonic { degree: 3, .. },
                ..
            }
        ));

        let unknown = DeformParams::rbf_from_tag(ControlPointPairSet::new(), "cubic", 1.0, None);
        assert!(matches!(unknown, Err(DeformError::UnknownKernel(tag)) if tag == "cubic"));
    }

    #[test]
    fn test_motion_tolerance_setter() {
        let params = DeformParams::ffd(LatticeBox::default()).with_motion_tolerance(1e-6);
        assert_eq!(params.motion_tolerance, 1e-6);
    }
}
