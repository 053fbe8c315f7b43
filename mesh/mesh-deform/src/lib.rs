//! Point-set deformation via FFD and RBF.
//!
//! This crate moves an ordered set of 3D points with one of two parametric
//! deformations driven by a small number of control points:
//!
//! - **FFD (Free-Form Deformation)**: a tensor-product Bernstein displacement
//!   field over an oriented lattice box. Points outside the box do not move.
//! - **RBF (Radial Basis Functions)**: a scattered-data interpolant through
//!   `(original, deformed)` control pairs, not confined to any box.
//!
//! Both return a new [`PointSet`] of the same length and order as the input.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Quick Start
//!
//! ## FFD
//!
//! ```
//! use mesh_deform::{deform_points, DeformParams, LatticeBox, PointSet};
//! use nalgebra::{Point3, Vector3};
//!
//! // 3×3×3 lattice over a 2-unit cube; lift the centre node half a box height.
//! let lattice = LatticeBox::axis_aligned(Point3::origin(), Vector3::repeat(2.0), [3, 3, 3])
//!     .unwrap()
//!     .with_displacement(1, 1, 1, Vector3::new(0.0, 0.0, 0.5))
//!     .unwrap();
//!
//! let points = PointSet::from_points(vec![
//!     Point3::new(1.0, 1.0, 1.0),
//!     Point3::new(10.0, 0.0, 0.0),
//! ]);
//! let output = deform_points(&points, &DeformParams::ffd(lattice)).unwrap();
//!
//! assert!(output.points[0].z > 1.0);
//! assert_eq!(output.points[1], points[1]);
//! ```
//!
//! ## RBF
//!
//! ```
//! use mesh_deform::{ControlPair, ControlPointPairSet, PointSet, RbfDeformer, RbfKernel};
//! use nalgebra::{Point3, Vector3};
//!
//! let controls = ControlPointPairSet::new()
//!     .with_pair(ControlPair::fixed(Point3::new(0.0, 0.0, 0.0)))
//!     .with_pair(ControlPair::fixed(Point3::new(1.0, 0.0, 0.0)))
//!     .with_pair(ControlPair::fixed(Point3::new(0.0, 1.0, 0.0)))
//!     .with_pair(ControlPair::displaced(
//!         Point3::new(0.0, 0.0, 1.0),
//!         Vector3::new(0.0, 0.0, 0.5),
//!     ));
//!
//! let deformer = RbfDeformer::build(&controls, RbfKernel::Gaussian { radius: 1.0 }).unwrap();
//! let moved = deformer.perform(&PointSet::from_points(vec![Point3::new(0.0, 0.0, 1.0)]));
//! assert!((moved[0].z - 1.5).abs() < 1e-9);
//! ```
//!
//! # RBF Kernels
//!
//! | Kernel | Tag | Characteristic |
//! |--------|-----|----------------|
//! | Gaussian | `gaussian` | Smooth, decaying with distance |
//! | Multiquadric | `multiquadric` | Global, growing with distance |
//! | Inverse Multiquadric | `inverse_multiquadric` | Global, decaying |
//! | Thin-Plate Spline | `thin_plate` | Minimal bending energy |
//! | Wendland C2 | `wendland_c2` | Compact support |
//! | Polyharmonic(k) | `polyharmonic` | Generalizes thin-plate and cubic |
//!
//! # Errors
//!
//! Every fallible operation returns [`DeformResult`]; nothing is retried and no
//! partial result is produced.

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod affine;
mod deform;
mod error;
mod kernel;
mod lattice;
mod params;
mod points;
mod rbf;
mod result;

pub use affine::{AffineFrame, AffineFrameSolver, AffineMap, DEGENERACY_TOLERANCE};
pub use deform::deform_points;
pub use error::{DeformError, DeformResult};
pub use kernel::{
    DEFAULT_POLYHARMONIC_DEGREE, DEFAULT_RADIUS, KernelKind, MAX_POLYHARMONIC_DEGREE, RbfKernel,
};
pub use lattice::{FfdDeformer, LatticeBox, bernstein_basis, bernstein_vector, binomial};
pub use params::{DEFAULT_MOTION_TOLERANCE, DeformAlgorithm, DeformParams};
pub use points::PointSet;
pub use rbf::{
    COINCIDENCE_TOLERANCE, ControlPair, ControlPointPairSet, RESIDUAL_TOLERANCE, RbfDeformer,
    RbfWeights, SINGULAR_TOLERANCE,
};
pub use result::DeformOutput;
