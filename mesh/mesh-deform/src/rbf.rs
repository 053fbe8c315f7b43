//! Radial Basis Function (RBF) deformation.
//!
//! The deformation is the interpolant
//!
//! ```text
//! M(x) = c + Q·x + Σᵢ wᵢ φ(‖x − Xᵢ‖)
//! ```
//!
//! fitted so that `M(Xᵢ) = Yᵢ` for every control pair `(Xᵢ, Yᵢ)`. The weights
//! `wᵢ` and the affine part `(c, Q)` come from one augmented linear system of
//! size `N + 4`:
//!
//! ```text
//! ┌ Φ   1   X ┐ ┌ w  ┐   ┌ Y ┐
//! │ 1ᵀ  0   0 │ │ cᵀ │ = │ 0 │
//! └ Xᵀ  0   0 ┘ └ Qᵀ ┘   └ 0 ┘
//! ```
//!
//! The polynomial block makes the interpolant reproduce any affine motion of
//! the control points exactly; the kernel block adds the local correction.
//! `M(x)` is the new position itself, not an offset from `x`.
//!
//! Internally the system is solved for the displacement `Y − X`, with the
//! polynomial block in coordinates centred on the control bounding box and
//! scaled by its half-extent. Kernel distances stay in world units, so the
//! kernel radius keeps its meaning. The reported weights are folded back into
//! world coordinates.

use crate::points::map_points;
use crate::{DeformError, DeformResult, PointSet, RbfKernel};
use nalgebra::{DMatrix, Matrix3, Point3, Vector3, SVD};
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Control points closer than this fraction of the control-set extent are
/// considered coincident.
pub const COINCIDENCE_TOLERANCE: f64 = 1e-12;

/// Singular values below this fraction of the largest are treated as zero.
pub const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Largest accepted backward error of the solved system.
pub const RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Relative threshold for counting the affine dimensions spanned by the
/// control points.
const AFFINE_RANK_TOLERANCE: f64 = 1e-9;

/// An original control point and where it should end up.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlPair {
    /// Position before deformation.
    pub original: Point3<f64>,
    /// Position after deformation.
    pub deformed: Point3<f64>,
}

impl ControlPair {
    /// Creates a control pair.
    #[must_use]
    pub const fn new(original: Point3<f64>, deformed: Point3<f64>) -> Self {
        Self { original, deformed }
    }

    /// A control point that stays where it is.
    #[must_use]
    pub const fn fixed(point: Point3<f64>) -> Self {
        Self::new(point, point)
    }

    /// Creates a pair from an original point and its displacement.
    #[must_use]
    pub fn displaced(original: Point3<f64>, displacement: Vector3<f64>) -> Self {
        Self::new(original, original + displacement)
    }

    /// The displacement `deformed - original`.
    #[must_use]
    pub fn displacement(&self) -> Vector3<f64> {
        self.deformed - self.original
    }
}

/// An ordered set of control pairs.
///
/// # Example
///
/// ```
/// use mesh_deform::{ControlPair, ControlPointPairSet};
/// use nalgebra::{Point3, Vector3};
///
/// let controls = ControlPointPairSet::new()
///     .with_pair(ControlPair::fixed(Point3::new(0.0, 0.0, 0.0)))
///     .with_pair(ControlPair::displaced(
///         Point3::new(1.0, 0.0, 0.0),
///         Vector3::new(0.0, 0.0, 0.5),
///     ));
/// assert_eq!(controls.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlPointPairSet {
    pairs: Vec<ControlPair>,
}

impl ControlPointPairSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Wraps existing pairs.
    #[must_use]
    pub const fn from_pairs(pairs: Vec<ControlPair>) -> Self {
        Self { pairs }
    }

    /// Zips matching original and deformed positions into pairs.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::DimensionMismatch`] if the slices differ in length.
    pub fn from_slices(original: &[Point3<f64>], deformed: &[Point3<f64>]) -> DeformResult<Self> {
        if original.len() != deformed.len() {
            return Err(DeformError::DimensionMismatch {
                what: "deformed control points",
                expected: original.len(),
                actual: deformed.len(),
            });
        }
        Ok(Self {
            pairs: original
                .iter()
                .zip(deformed)
                .map(|(o, d)| ControlPair::new(*o, *d))
                .collect(),
        })
    }

    /// Adds a pair.
    #[must_use]
    pub fn with_pair(mut self, pair: ControlPair) -> Self {
        self.pairs.push(pair);
        self
    }

    /// Appends a pair in place.
    pub fn push(&mut self, pair: ControlPair) {
        self.pairs.push(pair);
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over the pairs in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ControlPair> {
        self.pairs.iter()
    }

    /// The pairs as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[ControlPair] {
        &self.pairs
    }

    /// Original positions, in order.
    #[must_use]
    pub fn originals(&self) -> Vec<Point3<f64>> {
        self.pairs.iter().map(|p| p.original).collect()
    }

    /// Deformed positions, in order.
    #[must_use]
    pub fn deformed(&self) -> Vec<Point3<f64>> {
        self.pairs.iter().map(|p| p.deformed).collect()
    }

    /// First pair of indices whose original points coincide, if any.
    fn coincident_originals(&self) -> Option<(usize, usize)> {
        let extent = extent(self.pairs.iter().map(|p| &p.original));
        let tolerance = COINCIDENCE_TOLERANCE * extent;
        for (i, a) in self.pairs.iter().enumerate() {
            for (j, b) in self.pairs.iter().enumerate().skip(i + 1) {
                if (a.original - b.original).norm() <= tolerance {
                    return Some((i, j));
                }
            }
        }
        None
    }
}

impl FromIterator<ControlPair> for ControlPointPairSet {
    fn from_iter<I: IntoIterator<Item = ControlPair>>(iter: I) -> Self {
        Self::from_pairs(iter.into_iter().collect())
    }
}

/// Solved coefficients of an RBF interpolant.
///
/// An `(N + 4) × 3` matrix: one row of kernel weights per control point, then
/// the constant term, then the three rows of the linear term. Column `j`
/// produces output coordinate `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct RbfWeights {
    matrix: DMatrix<f64>,
}

/// Maps control coordinates into the cube `[-1, 1]³` spanned by their
/// bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Normalization {
    center: Vector3<f64>,
    scale: Vector3<f64>,
}

impl Normalization {
    fn fit(points: &[Point3<f64>]) -> Self {
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for p in points {
            min = min.inf(&p.coords);
            max = max.sup(&p.coords);
        }
        let center = (min + max) / 2.0;
        // Flat axes keep unit scale.
        let scale = ((max - min) / 2.0).map(|h| if h > 0.0 && h.is_finite() { h } else { 1.0 });
        Self { center, scale }
    }

    fn apply(&self, p: &Point3<f64>) -> Vector3<f64> {
        (p.coords - self.center).component_div(&self.scale)
    }

    /// Rewrites displacement coefficients of the normalized frame as world
    /// coefficients of the position map `c + Q·x + Σ wᵢ φ`.
    fn to_world(&self, local: &DMatrix<f64>) -> DMatrix<f64> {
        let n = local.nrows() - 4;
        let mut world = local.clone();
        for j in 0..3 {
            let mut constant = local[(n, j)];
            for axis in 0..3 {
                let q = local[(n + 1 + axis, j)] / self.scale[axis];
                constant -= q * self.center[axis];
                world[(n + 1 + axis, j)] = q + if axis == j { 1.0 } else { 0.0 };
            }
            world[(n, j)] = constant;
        }
        world
    }
}

impl RbfWeights {
    /// The full `(N + 4) × 3` coefficient matrix.
    #[must_use]
    pub const fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Number of control points `N`.
    #[must_use]
    pub fn control_count(&self) -> usize {
        self.matrix.nrows() - 4
    }

    /// Kernel weight of control point `index`.
    #[must_use]
    pub fn kernel_weight(&self, index: usize) -> Vector3<f64> {
        self.row(index)
    }

    /// Constant term `c`.
    #[must_use]
    pub fn constant(&self) -> Vector3<f64> {
        self.row(self.control_count())
    }

    /// Linear term `Q`, so that the affine part is `c + Q·x`.
    #[must_use]
    pub fn linear(&self) -> Matrix3<f64> {
        let n = self.control_count();
        Matrix3::from_columns(&[self.row(n + 1), self.row(n + 2), self.row(n + 3)])
    }

    fn row(&self, index: usize) -> Vector3<f64> {
        Vector3::new(
            self.matrix[(index, 0)],
            self.matrix[(index, 1)],
            self.matrix[(index, 2)],
        )
    }
}

/// An RBF interpolant built from control pairs.
///
/// Weights are solved once in [`RbfDeformer::build`] and never change
/// afterwards, so a deformer can be shared freely between threads.
///
/// # Example
///
/// ```
/// use mesh_deform::{ControlPair, ControlPointPairSet, PointSet, RbfDeformer, RbfKernel};
/// use nalgebra::Point3;
///
/// let controls = ControlPointPairSet::from_pairs(vec![ControlPair::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
/// )]);
/// let deformer = RbfDeformer::build(&controls, RbfKernel::Multiquadric { radius: 1.0 }).unwrap();
///
/// let moved = deformer.perform(&PointSet::from_points(vec![Point3::origin()]));
/// assert!((moved[0] - Point3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct RbfDeformer {
    originals: Vec<Point3<f64>>,
    kernel: RbfKernel,
    normalization: Normalization,
    /// Displacement coefficients in the normalized frame.
    local: RbfWeights,
    weights: RbfWeights,
}

impl RbfDeformer {
    /// Solves the augmented system for `controls` under `kernel`.
    ///
    /// # Errors
    ///
    /// - [`DeformError::NoControlPoints`] if `controls` is empty
    /// - [`DeformError::InvalidParameter`] for a bad kernel parameter or a
    ///   non-finite control coordinate
    /// - [`DeformError::SingularSystem`] if two original control points
    ///   coincide or the system is numerically rank-deficient beyond what the
    ///   control geometry explains
    pub fn build(controls: &ControlPointPairSet, kernel: RbfKernel) -> DeformResult<Self> {
        kernel.validate()?;
        if controls.is_empty() {
            return Err(DeformError::NoControlPoints);
        }
        if let Some(bad) = controls
            .iter()
            .position(|p| !(is_finite(&p.original) && is_finite(&p.deformed)))
        {
            return Err(DeformError::InvalidParameter(format!(
                "control pair {bad} has a non-finite coordinate"
            )));
        }
        if let Some((i, j)) = controls.coincident_originals() {
            return Err(DeformError::SingularSystem {
                reason: format!(
                    "original control points {i} and {j} coincide at {:?}",
                    controls.as_slice()[i].original.coords.as_slice()
                ),
            });
        }

        let n = controls.len();
        let originals = controls.originals();
        let affine_rank = affine_rank(&originals);
        debug!(
            controls = n,
            kernel = %kernel.kind(),
            radius = kernel.radius(),
            affine_rank,
            "building RBF weights"
        );
        if affine_rank < 3 {
            warn!(
                affine_rank,
                "control points do not span 3D; linear term is underdetermined"
            );
        }

        let normalization = Normalization::fit(&originals);
        let (system, rhs) = assemble_system(controls, &normalization, &kernel);

        let svd = SVD::try_new(system.clone(), true, true, f64::EPSILON, 0).ok_or_else(|| {
            DeformError::SingularSystem {
                reason: "singular value decomposition did not converge".to_string(),
            }
        })?;
        let largest = svd.singular_values.max();
        let cutoff = SINGULAR_TOLERANCE * largest;

        // The polynomial block loses one rank per affine dimension the
        // controls fail to span; any further deficiency comes from the kernel.
        let rank = svd.rank(cutoff);
        let expected = n + 1 + affine_rank;
        if rank < expected {
            return Err(DeformError::SingularSystem {
                reason: format!(
                    "numerical rank {rank} below {expected} for {n} control points with kernel {}",
                    kernel.kind()
                ),
            });
        }

        let solution = svd
            .solve(&rhs, cutoff)
            .map_err(|e| DeformError::SingularSystem {
                reason: e.to_string(),
            })?;

        let residual = (&system * &solution - &rhs).norm();
        let scale = system.norm() * solution.norm() + rhs.norm();
        if !residual.is_finite() || residual > RESIDUAL_TOLERANCE * scale.max(f64::MIN_POSITIVE) {
            return Err(DeformError::SingularSystem {
                reason: format!("solution residual {residual:e} exceeds tolerance"),
            });
        }

        let weights = RbfWeights {
            matrix: normalization.to_world(&solution),
        };
        Ok(Self {
            originals,
            kernel,
            normalization,
            local: RbfWeights { matrix: solution },
            weights,
        })
    }

    /// Maps every point through the interpolant, preserving order.
    #[must_use]
    pub fn perform(&self, points: &PointSet) -> PointSet {
        debug!(
            points = points.len(),
            controls = self.originals.len(),
            "evaluating RBF interpolant"
        );
        PointSet::from_points(map_points(points.as_slice(), |p| self.evaluate(p)))
    }

    /// Evaluates the interpolant at a single point.
    ///
    /// This is the new position of `point`.
    #[must_use]
    pub fn evaluate(&self, point: &Point3<f64>) -> Point3<f64> {
        let local = &self.local;
        let affine = local.constant() + local.linear() * self.normalization.apply(point);
        let radial = self
            .originals
            .iter()
            .enumerate()
            .fold(Vector3::zeros(), |acc, (i, x)| {
                acc + local.kernel_weight(i) * self.kernel.evaluate((point - x).norm())
            });
        point + affine + radial
    }

    /// The solved weights.
    #[must_use]
    pub const fn weights(&self) -> &RbfWeights {
        &self.weights
    }

    /// The kernel the weights were solved for.
    #[must_use]
    pub const fn kernel(&self) -> &RbfKernel {
        &self.kernel
    }

    /// Original control positions the interpolant is anchored to.
    #[must_use]
    pub fn originals(&self) -> &[Point3<f64>] {
        &self.originals
    }
}

/// Builds the `(N + 4)²` system matrix and its `(N + 4) × 3` right-hand side
/// of control displacements.
fn assemble_system(
    controls: &ControlPointPairSet,
    normalization: &Normalization,
    kernel: &RbfKernel,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let pairs = controls.as_slice();
    let n = pairs.len();
    let size = n + 4;
    let mut system = DMatrix::<f64>::zeros(size, size);
    let mut rhs = DMatrix::<f64>::zeros(size, 3);

    for (i, pair) in pairs.iter().enumerate() {
        for (j, other) in pairs.iter().enumerate().skip(i) {
            let phi = kernel.evaluate((pair.original - other.original).norm());
            system[(i, j)] = phi;
            system[(j, i)] = phi;
        }

        let p = normalization.apply(&pair.original);
        let displacement = pair.displacement();
        system[(i, n)] = 1.0;
        system[(n, i)] = 1.0;
        for axis in 0..3 {
            system[(i, n + 1 + axis)] = p[axis];
            system[(n + 1 + axis, i)] = p[axis];
            rhs[(i, axis)] = displacement[axis];
        }
    }

    (system, rhs)
}

/// Number of independent directions spanned by `points` about their centroid.
fn affine_rank(points: &[Point3<f64>]) -> usize {
    if points.len() < 2 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss)]
    let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / points.len() as f64;
    let centered = DMatrix::from_fn(points.len(), 3, |i, j| points[i][j] - centroid[j]);
    let singular = centered.singular_values();
    let largest = singular.max();
    if largest <= f64::MIN_POSITIVE {
        return 0;
    }
    singular
        .iter()
        .filter(|s| **s > AFFINE_RANK_TOLERANCE * largest)
        .count()
}

/// Diagonal of the axis-aligned box around `points`.
fn extent<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> f64 {
    let mut min = Vector3::repeat(f64::INFINITY);
    let mut max = Vector3::repeat(f64::NEG_INFINITY);
    for p in points {
        min = min.inf(&p.coords);
        max = max.sup(&p.coords);
    }
    let diagonal = (max - min).norm();
    if diagonal.is_finite() {
        diagonal
    } else {
        0.0
    }
}

fn is_finite(p: &Point3<f64>) -> bool {
    p.coords.iter().all(|c| c.is_finite())
}
