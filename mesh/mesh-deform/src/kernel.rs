//! Radial basis kernels.
//!
//! Each kernel is a function of a non-negative distance `d` and a positive
//! support radius `r` only. Kernels are pure and are evaluated element-wise
//! over the pairwise distances between control points and query points.
//!
//! | Kernel | φ(d) | Support |
//! |--------|------|---------|
//! | Gaussian | `exp(-(d/r)²)` | global, decaying |
//! | Multiquadric | `√(d² + r²)` | global, growing |
//! | Inverse multiquadric | `1/√(d² + r²)` | global, decaying |
//! | Thin-plate spline | `(d/r)² ln(d/r)` | global |
//! | Wendland C2 | `(1 - d/r)⁴₊ (4d/r + 1)` | compact, zero beyond `r` |
//! | Polyharmonic(k) | `(d/r)^k`, or `(d/r)^k ln(d/r)` for even `k` | global |

use crate::{DeformError, DeformResult};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Radius used when a kernel is requested without one.
pub const DEFAULT_RADIUS: f64 = 0.5;

/// Polyharmonic degree used when none is given.
pub const DEFAULT_POLYHARMONIC_DEGREE: u32 = 2;

/// Largest accepted polyharmonic degree.
pub const MAX_POLYHARMONIC_DEGREE: u32 = 64;

/// The kind of a radial kernel, without its parameters.
///
/// Parsed from the textual tag a parameter source supplies.
///
/// # Example
///
/// ```
/// use mesh_deform::KernelKind;
///
/// let kind: KernelKind = "thin_plate_spline".parse().unwrap();
/// assert_eq!(kind, KernelKind::ThinPlateSpline);
/// assert!("cubic_hermite".parse::<KernelKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KernelKind {
    /// Gaussian spline.
    Gaussian,
    /// Multiquadric biharmonic spline.
    Multiquadric,
    /// Inverse multiquadric biharmonic spline.
    InverseMultiquadric,
    /// Thin-plate spline.
    ThinPlateSpline,
    /// Beckert–Wendland C2 basis.
    WendlandC2,
    /// Polyharmonic spline of some degree.
    Polyharmonic,
}

impl KernelKind {
    /// All kernel kinds.
    pub const ALL: [Self; 6] = [
        Self::Gaussian,
        Self::Multiquadric,
        Self::InverseMultiquadric,
        Self::ThinPlateSpline,
        Self::WendlandC2,
        Self::Polyharmonic,
    ];

    /// Canonical tag for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Multiquadric => "multiquadric",
            Self::InverseMultiquadric => "inverse_multiquadric",
            Self::ThinPlateSpline => "thin_plate",
            Self::WendlandC2 => "wendland_c2",
            Self::Polyharmonic => "polyharmonic",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KernelKind {
    type Err = DeformError;

    /// Accepts the canonical tags, their hyphenated spellings and the long
    /// names used by FFD/RBF parameter files.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let normalized = tag.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "gaussian" | "gaussian_spline" => Ok(Self::Gaussian),
            "multiquadric" | "multi_quadratic_biharmonic_spline" => Ok(Self::Multiquadric),
            "inverse_multiquadric" | "inv_multi_quadratic_biharmonic_spline" => {
                Ok(Self::InverseMultiquadric)
            }
            "thin_plate" | "thin_plate_spline" => Ok(Self::ThinPlateSpline),
            "wendland_c2" | "beckert_wendland_c2_basis" => Ok(Self::WendlandC2),
            "polyharmonic" | "polyharmonic_spline" => Ok(Self::Polyharmonic),
            _ => Err(DeformError::UnknownKernel(tag.to_string())),
        }
    }
}

/// A radial kernel together with its parameters.
///
/// # Examples
///
/// ```
/// use mesh_deform::RbfKernel;
///
/// let gaussian = RbfKernel::Gaussian { radius: 1.0 };
/// assert!((gaussian.evaluate(0.0) - 1.0).abs() < 1e-12);
///
/// // Compact support: exactly zero past the radius.
/// let wendland = RbfKernel::WendlandC2 { radius: 2.0 };
/// assert_eq!(wendland.evaluate(3.0), 0.0);
///
/// let kernel = RbfKernel::from_tag("polyharmonic_spline", 1.0, Some(3)).unwrap();
/// assert_eq!(kernel, RbfKernel::Polyharmonic { radius: 1.0, degree: 3 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum RbfKernel {
    /// Gaussian: `exp(-(d/r)²)`.
    Gaussian {
        /// Support radius.
        radius: f64,
    },

    /// Multiquadric: `√(d² + r²)`.
    Multiquadric {
        /// Shape radius.
        radius: f64,
    },

    /// Inverse multiquadric: `1/√(d² + r²)`.
    InverseMultiquadric {
        /// Shape radius.
        radius: f64,
    },

    /// Thin-plate spline: `(d/r)² ln(d/r)`, zero at `d = 0`.
    ThinPlateSpline {
        /// Scaling radius.
        radius: f64,
    },

    /// Wendland C2: `(1 - d/r)⁴₊ (4d/r + 1)`.
    WendlandC2 {
        /// Support radius; the kernel vanishes for `d ≥ r`.
        radius: f64,
    },

    /// Polyharmonic spline of integer degree `k`.
    Polyharmonic {
        /// Scaling radius.
        radius: f64,
        /// Degree `k ≥ 1`.
        degree: u32,
    },
}

impl Default for RbfKernel {
    fn default() -> Self {
        Self::Gaussian {
            radius: DEFAULT_RADIUS,
        }
    }
}

impl RbfKernel {
    /// Builds a kernel of `kind`, validating its parameters.
    ///
    /// `degree` is only read for [`KernelKind::Polyharmonic`] and defaults to
    /// [`DEFAULT_POLYHARMONIC_DEGREE`].
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidParameter`] if the radius is not a
    /// positive finite number or the degree is out of range.
    pub fn new(kind: KernelKind, radius: f64, degree: Option<u32>) -> DeformResult<Self> {
        let kernel = match kind {
            KernelKind::Gaussian => Self::Gaussian { radius },
            KernelKind::Multiquadric => Self::Multiquadric { radius },
            KernelKind::InverseMultiquadric => Self::InverseMultiquadric { radius },
            KernelKind::ThinPlateSpline => Self::ThinPlateSpline { radius },
            KernelKind::WendlandC2 => Self::WendlandC2 { radius },
            KernelKind::Polyharmonic => Self::Polyharmonic {
                radius,
                degree: degree.unwrap_or(DEFAULT_POLYHARMONIC_DEGREE),
            },
        };
        kernel.validate()?;
        Ok(kernel)
    }

    /// Parses a textual kernel tag and builds the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::UnknownKernel`] for an unrecognised tag, before
    /// any parameter is looked at, and [`DeformError::InvalidParameter`] for
    /// bad parameters.
    pub fn from_tag(tag: &str, radius: f64, degree: Option<u32>) -> DeformResult<Self> {
        let kind: KernelKind = tag.parse()?;
        Self::new(kind, radius, degree)
    }

    /// The kind of this kernel.
    #[must_use]
    pub const fn kind(&self) -> KernelKind {
        match self {
            Self::Gaussian { .. } => KernelKind::Gaussian,
            Self::Multiquadric { .. } => KernelKind::Multiquadric,
            Self::InverseMultiquadric { .. } => KernelKind::InverseMultiquadric,
            Self::ThinPlateSpline { .. } => KernelKind::ThinPlateSpline,
            Self::WendlandC2 { .. } => KernelKind::WendlandC2,
            Self::Polyharmonic { .. } => KernelKind::Polyharmonic,
        }
    }

    /// The kernel's radius parameter.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        match *self {
            Self::Gaussian { radius }
            | Self::Multiquadric { radius }
            | Self::InverseMultiquadric { radius }
            | Self::ThinPlateSpline { radius }
            | Self::WendlandC2 { radius }
            | Self::Polyharmonic { radius, .. } => radius,
        }
    }

    /// Checks the kernel's parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidParameter`] describing the first bad
    /// parameter.
    pub fn validate(&self) -> DeformResult<()> {
        let radius = self.radius();
        if !radius.is_finite() || radius <= 0.0 {
            return Err(DeformError::InvalidParameter(format!(
                "{} kernel radius must be positive and finite, got {radius}",
                self.kind()
            )));
        }
        if let Self::Polyharmonic { degree, .. } = *self {
            if degree == 0 || degree > MAX_POLYHARMONIC_DEGREE {
                return Err(DeformError::InvalidParameter(format!(
                    "polyharmonic degree must be in 1..={MAX_POLYHARMONIC_DEGREE}, got {degree}"
                )));
            }
        }
        Ok(())
    }

    /// Evaluates the kernel at distance `d`.
    ///
    /// Removable singularities (the logarithm in the thin-plate and even
    /// polyharmonic kernels) evaluate to 0 at `d = 0`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn evaluate(&self, d: f64) -> f64 {
        match *self {
            Self::Gaussian { radius } => {
                let s = d / radius;
                (-s * s).exp()
            }
            Self::Multiquadric { radius } => d.mul_add(d, radius * radius).sqrt(),
            Self::InverseMultiquadric { radius } => 1.0 / d.mul_add(d, radius * radius).sqrt(),
            Self::ThinPlateSpline { radius } => {
                let s = d / radius;
                if s > 0.0 {
                    s * s * s.ln()
                } else {
                    0.0
                }
            }
            Self::WendlandC2 { radius } => {
                let s = d / radius;
                let falloff = (1.0 - s).max(0.0);
                falloff.powi(4) * 4.0f64.mul_add(s, 1.0)
            }
            Self::Polyharmonic { radius, degree } => {
                let s = d / radius;
                let k = degree as i32;
                if degree % 2 == 1 {
                    s.powi(k)
                } else if s <= 0.0 {
                    0.0
                } else if s < 1.0 {
                    // s^(k-1) · ln(s^s) keeps the log argument away from zero
                    s.powi(k - 1) * s.powf(s).ln()
                } else {
                    s.powi(k) * s.ln()
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian() {
        let kernel = RbfKernel::Gaussian { radius: 2.0 };
        assert_relative_eq!(kernel.evaluate(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(kernel.evaluate(2.0), (-1.0f64).exp(), epsilon = 1e-12);
        assert!(kernel.evaluate(20.0) < 1e-40);
    }

    #[test]
    fn test_multiquadric_pair() {
        let mq = RbfKernel::Multiquadric { radius: 1.0 };
        let imq = RbfKernel::InverseMultiquadric { radius: 1.0 };
        assert_relative_eq!(mq.evaluate(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(mq.evaluate(1.0), 2.0f64.sqrt(), epsilon = 1e-12);
        for d in [0.0, 0.3, 1.0, 5.0] {
            assert_relative_eq!(mq.evaluate(d) * imq.evaluate(d), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_thin_plate_guards_zero() {
        let kernel = RbfKernel::ThinPlateSpline { radius: 0.5 };
        assert_eq!(kernel.evaluate(0.0), 0.0);
        assert!(kernel.evaluate(1e-300).is_finite());
        // d/r = 1 → ln 1 = 0
        assert_relative_eq!(kernel.evaluate(0.5), 0.0, epsilon = 1e-15);
        let s: f64 = 4.0;
        assert_relative_eq!(kernel.evaluate(2.0), s * s * s.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_wendland_compact_support() {
        let kernel = RbfKernel::WendlandC2 { radius: 1.0 };
        assert_relative_eq!(kernel.evaluate(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(kernel.evaluate(0.5), 0.0625 * 3.0, epsilon = 1e-12);
        assert_eq!(kernel.evaluate(1.0), 0.0);
        assert_eq!(kernel.evaluate(1.5), 0.0);
        assert_eq!(kernel.evaluate(100.0), 0.0);
    }

    #[test]
    fn test_polyharmonic_odd() {
        let kernel = RbfKernel::Polyharmonic {
            radius: 2.0,
            degree: 3,
        };
        assert_eq!(kernel.evaluate(0.0), 0.0);
        assert_relative_eq!(kernel.evaluate(4.0), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_polyharmonic_even_branches_agree() {
        let kernel = RbfKernel::Polyharmonic {
            radius: 1.0,
            degree: 4,
        };
        assert_eq!(kernel.evaluate(0.0), 0.0);
        for s in [0.1f64, 0.5, 0.99, 1.0, 1.5, 3.0] {
            assert_relative_eq!(kernel.evaluate(s), s.powi(4) * s.ln(), epsilon = 1e-12);
        }
        // continuous across d/r = 1
        let below = kernel.evaluate(1.0 - 1e-9);
        let above = kernel.evaluate(1.0 + 1e-9);
        assert!((below - above).abs() < 1e-7);
    }

    #[test]
    fn test_polyharmonic_two_matches_thin_plate() {
        let poly = RbfKernel::Polyharmonic {
            radius: 0.7,
            degree: 2,
        };
        let tps = RbfKernel::ThinPlateSpline { radius: 0.7 };
        for d in [0.0, 0.2, 0.7, 1.9] {
            assert_relative_eq!(poly.evaluate(d), tps.evaluate(d), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            "gaussian_spline".parse::<KernelKind>().unwrap(),
            KernelKind::Gaussian
        );
        assert_eq!(
            "Inverse-Multiquadric".parse::<KernelKind>().unwrap(),
            KernelKind::InverseMultiquadric
        );
        assert_eq!(
            "beckert_wendland_c2_basis".parse::<KernelKind>().unwrap(),
            KernelKind::WendlandC2
        );
        for kind in KernelKind::ALL {
            assert_eq!(kind.name().parse::<KernelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_tag_rejected_before_parameters() {
        let result = RbfKernel::from_tag("bicubic", -1.0, None);
        assert!(matches!(result, Err(DeformError::UnknownKernel(tag)) if tag == "bicubic"));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            RbfKernel::new(KernelKind::Gaussian, 0.0, None),
            Err(DeformError::InvalidParameter(_))
        ));
        assert!(matches!(
            RbfKernel::new(KernelKind::Multiquadric, f64::NAN, None),
            Err(DeformError::InvalidParameter(_))
        ));
        assert!(matches!(
            RbfKernel::new(KernelKind::Polyharmonic, 1.0, Some(0)),
            Err(DeformError::InvalidParameter(_))
        ));
        let default_degree = RbfKernel::new(KernelKind::Polyharmonic, 1.0, None).unwrap();
        assert_eq!(
            default_degree,
            RbfKernel::Polyharmonic {
                radius: 1.0,
                degree: DEFAULT_POLYHARMONIC_DEGREE
            }
        );
    }
}
