//! Free-Form Deformation (FFD) over an oriented lattice box.
//!
//! FFD deforms points by displacing the control nodes of a regular lattice
//! laid over an oriented box. The displacement of a point inside the box is
//! the Bernstein-weighted blend of every control displacement.
//!
//! # Overview
//!
//! 1. Points are moved into box-local coordinates `(u, v, w)`, where the box
//!    becomes the unit cube
//! 2. Points with all three coordinates in `[0, 1]` are displaced by the
//!    tensor-product Bernstein field; all others are returned as-is
//! 3. Displaced points are mapped back to physical space

use crate::affine::AffineFrameSolver;
use crate::points::map_points;
use crate::{AffineFrame, DeformError, DeformResult, PointSet};
use nalgebra::{Point3, Rotation3, Vector3};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An oriented box carrying a grid of control displacements.
///
/// The grid has `L × M × N` nodes along the box's x, y and z edges. Node
/// `(l, m, n)` is stored at index `(l * M + m) * N + n`. Displacements are
/// expressed in box-local units, so a displacement of `(0, 0, 1)` moves a node
/// by one full z-edge.
///
/// # Example
///
/// ```
/// use mesh_deform::LatticeBox;
/// use nalgebra::{Point3, Vector3};
///
/// let lattice = LatticeBox::axis_aligned(Point3::origin(), Vector3::new(2.0, 2.0, 1.0), [3, 3, 2])
///     .unwrap()
///     .with_displacement(1, 1, 1, Vector3::new(0.0, 0.0, 0.25))
///     .unwrap();
/// assert_eq!(lattice.control_point_count(), 18);
/// assert_eq!(lattice.control_point_position(2, 2, 1), Point3::new(2.0, 2.0, 1.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatticeBox {
    origin: Point3<f64>,
    frame: AffineFrame,
    dims: [usize; 3],
    displacements: Vec<Vector3<f64>>,
}

impl Default for LatticeBox {
    /// Unit cube at the origin with a 2×2×2 grid of zero displacements.
    fn default() -> Self {
        Self {
            origin: Point3::origin(),
            frame: AffineFrame::unit(),
            dims: [2, 2, 2],
            displacements: vec![Vector3::zeros(); 8],
        }
    }
}

impl LatticeBox {
    /// Creates a box from its physical frame, with all displacements zero.
    ///
    /// The frame's origin vertex is used as the box origin.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidParameter`] if any grid dimension is 0.
    pub fn new(frame: AffineFrame, dims: [usize; 3]) -> DeformResult<Self> {
        validate_dims(dims)?;
        Ok(Self {
            origin: frame.origin(),
            frame,
            dims,
            displacements: vec![Vector3::zeros(); dims.iter().product()],
        })
    }

    /// Creates a box from its four frame vertices: origin, then the ends of
    /// the x, y and z edges.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidParameter`] if any grid dimension is 0.
    pub fn from_vertices(vertices: [Point3<f64>; 4], dims: [usize; 3]) -> DeformResult<Self> {
        Self::new(AffineFrame { vertices }, dims)
    }

    /// Creates an unrotated box with the given edge lengths.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidParameter`] if any grid dimension is 0.
    pub fn axis_aligned(
        origin: Point3<f64>,
        lengths: Vector3<f64>,
        dims: [usize; 3],
    ) -> DeformResult<Self> {
        Self::from_lengths_and_angles(origin, lengths, Vector3::zeros(), dims)
    }

    /// Creates a box from edge lengths and rotation angles in degrees.
    ///
    /// The edges start axis-aligned and are rotated about x, then y, then z.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidParameter`] if any grid dimension is 0.
    pub fn from_lengths_and_angles(
        origin: Point3<f64>,
        lengths: Vector3<f64>,
        angles_deg: Vector3<f64>,
        dims: [usize; 3],
    ) -> DeformResult<Self> {
        let rotation = Rotation3::from_euler_angles(
            angles_deg.x.to_radians(),
            angles_deg.y.to_radians(),
            angles_deg.z.to_radians(),
        );
        let frame = AffineFrame::from_edges(
            origin,
            rotation * Vector3::x() * lengths.x,
            rotation * Vector3::y() * lengths.y,
            rotation * Vector3::z() * lengths.z,
        );
        Self::new(frame, dims)
    }

    /// Overrides the translation applied before mapping into the unit cube.
    ///
    /// Normally this is the frame's origin vertex.
    #[must_use]
    pub fn with_origin(mut self, origin: Point3<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the displacement of control node `(l, m, n)`.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidParameter`] if the node is outside the grid.
    pub fn with_displacement(
        mut self,
        l: usize,
        m: usize,
        n: usize,
        displacement: Vector3<f64>,
    ) -> DeformResult<Self> {
        let index = self.checked_index(l, m, n)?;
        self.displacements[index] = displacement;
        Ok(self)
    }

    /// Replaces the whole displacement grid, in `(l, m, n)` row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::DimensionMismatch`] if the grid length is not
    /// `L * M * N`.
    pub fn with_displacements(mut self, displacements: Vec<Vector3<f64>>) -> DeformResult<Self> {
        let expected = self.control_point_count();
        if displacements.len() != expected {
            return Err(DeformError::DimensionMismatch {
                what: "lattice displacement grid",
                expected,
                actual: displacements.len(),
            });
        }
        self.displacements = displacements;
        Ok(self)
    }

    /// Translation removed before mapping into the unit cube.
    #[must_use]
    pub const fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// The box's physical frame.
    #[must_use]
    pub const fn frame(&self) -> &AffineFrame {
        &self.frame
    }

    /// Grid dimensions `[L, M, N]`.
    #[must_use]
    pub const fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Total number of control nodes.
    #[must_use]
    pub const fn control_point_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// The displacement grid, in `(l, m, n)` row-major order.
    #[must_use]
    pub fn displacements(&self) -> &[Vector3<f64>] {
        &self.displacements
    }

    /// Displacement of node `(l, m, n)`, if it exists.
    #[must_use]
    pub fn displacement(&self, l: usize, m: usize, n: usize) -> Option<Vector3<f64>> {
        self.checked_index(l, m, n)
            .ok()
            .map(|index| self.displacements[index])
    }

    /// Undeformed physical position of node `(l, m, n)`.
    ///
    /// Nodes are spaced evenly along each edge; an axis with a single node
    /// places it at the start of that edge.
    #[must_use]
    pub fn control_point_position(&self, l: usize, m: usize, n: usize) -> Point3<f64> {
        let edges = self.frame.edge_matrix();
        let local = Vector3::new(
            node_parameter(l, self.dims[0]),
            node_parameter(m, self.dims[1]),
            node_parameter(n, self.dims[2]),
        );
        self.frame.origin() + edges * local
    }

    /// Whether every displacement is zero.
    #[must_use]
    pub fn is_undeformed(&self) -> bool {
        self.displacements.iter().all(|d| d.iter().all(|c| *c == 0.0))
    }

    const fn index(&self, l: usize, m: usize, n: usize) -> usize {
        (l * self.dims[1] + m) * self.dims[2] + n
    }

    fn checked_index(&self, l: usize, m: usize, n: usize) -> DeformResult<usize> {
        let [dl, dm, dn] = self.dims;
        if l >= dl || m >= dm || n >= dn {
            return Err(DeformError::InvalidParameter(format!(
                "control node ({l}, {m}, {n}) outside {dl}x{dm}x{dn} lattice"
            )));
        }
        Ok(self.index(l, m, n))
    }

    /// Displacement field at box-local coordinates, as a fold over the
    /// separable per-axis Bernstein vectors.
    fn local_displacement(&self, local: &Point3<f64>) -> Vector3<f64> {
        let bu = bernstein_vector(self.dims[0], local.x);
        let bv = bernstein_vector(self.dims[1], local.y);
        let bw = bernstein_vector(self.dims[2], local.z);

        bu.iter().enumerate().fold(Vector3::zeros(), |acc, (l, wl)| {
            bv.iter().enumerate().fold(acc, |acc, (m, wm)| {
                let wlm = wl * wm;
                bw.iter().enumerate().fold(acc, |acc, (n, wn)| {
                    acc + self.displacements[self.index(l, m, n)] * (wlm * wn)
                })
            })
        })
    }
}

fn validate_dims(dims: [usize; 3]) -> DeformResult<()> {
    if dims.contains(&0) {
        return Err(DeformError::InvalidParameter(format!(
            "lattice dimensions must be at least 1, got {dims:?}"
        )));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn node_parameter(index: usize, dim: usize) -> f64 {
    if dim <= 1 {
        0.0
    } else {
        index as f64 / (dim - 1) as f64
    }
}

/// Applies a [`LatticeBox`] to point sets.
///
/// # Example
///
/// ```
/// use mesh_deform::{FfdDeformer, LatticeBox, PointSet};
/// use nalgebra::{Point3, Vector3};
///
/// let lattice = LatticeBox::default()
///     .with_displacement(1, 0, 0, Vector3::new(0.0, 0.0, 1.0))
///     .unwrap();
/// let points = PointSet::from_points(vec![Point3::new(1.0, 0.0, 0.0)]);
///
/// let moved = FfdDeformer::new(lattice).perform(&points).unwrap();
/// assert!((moved[0] - Point3::new(1.0, 0.0, 1.0)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct FfdDeformer {
    lattice: LatticeBox,
}

impl FfdDeformer {
    /// Creates a deformer for `lattice`.
    #[must_use]
    pub const fn new(lattice: LatticeBox) -> Self {
        Self { lattice }
    }

    /// The lattice being applied.
    #[must_use]
    pub const fn lattice(&self) -> &LatticeBox {
        &self.lattice
    }

    /// Deforms `points`, leaving any point outside the box untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::DegenerateFrame`] if the box is flat.
    pub fn perform(&self, points: &PointSet) -> DeformResult<PointSet> {
        let lattice = &self.lattice;
        let shift = -lattice.origin.coords;
        let solver = AffineFrameSolver::new(&lattice.frame.translated(&shift), &AffineFrame::unit())
            .map_err(|e| match e {
                DeformError::DegenerateFrame { volume, .. } => DeformError::DegenerateFrame {
                    frame: "lattice box",
                    volume,
                },
                other => other,
            })?;

        let to_local = |p: &Point3<f64>| solver.map(&(p + shift));
        let selected = points
            .iter()
            .filter(|&p| is_inside_unit_cube(&to_local(p)))
            .count();
        debug!(
            points = points.len(),
            selected,
            dims = ?lattice.dims,
            "applying FFD lattice"
        );

        Ok(PointSet::from_points(map_points(points.as_slice(), |p| {
            let local = to_local(p);
            if !is_inside_unit_cube(&local) {
                return *p;
            }
            let moved = local + lattice.local_displacement(&local);
            solver.unmap(&moved) - shift
        })))
    }
}

fn is_inside_unit_cube(local: &Point3<f64>) -> bool {
    local.iter().all(|c| (0.0..=1.0).contains(c))
}

/// The `dim` Bernstein basis values of degree `dim - 1` at `t`.
///
/// A single-node axis yields `[1.0]`. Built with the triangular recurrence
/// `B(i, k) = (1 - t) B(i, k - 1) + t B(i - 1, k - 1)`, which stays bounded
/// for any number of nodes.
#[must_use]
pub fn bernstein_vector(dim: usize, t: f64) -> Vec<f64> {
    if dim == 0 {
        return Vec::new();
    }
    let mut basis = vec![0.0; dim];
    basis[0] = 1.0;
    let s = 1.0 - t;
    for k in 1..dim {
        for i in (1..=k).rev() {
            basis[i] = s * basis[i] + t * basis[i - 1];
        }
        basis[0] *= s;
    }
    basis
}

/// Computes the Bernstein basis polynomial B_{i,n}(t).
///
/// # Arguments
///
/// * `n` - The degree of the polynomial
/// * `i` - The index (0 to n)
/// * `t` - The parameter (0 to 1)
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn bernstein_basis(n: usize, i: usize, t: f64) -> f64 {
    if i > n {
        return 0.0;
    }
    let coeff = binomial(n, i);
    #[allow(clippy::cast_possible_truncation)]
    let ti = t.powi(i as i32);
    #[allow(clippy::cast_possible_truncation)]
    let one_minus_t = (1.0 - t).powi((n - i) as i32);
    coeff * ti * one_minus_t
}

/// Computes the binomial coefficient C(n, k) in floating point.
///
/// Exact while the result fits in the 53-bit mantissa; larger coefficients
/// are rounded instead of overflowing.
#[must_use]
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);

    // Each partial product is itself a binomial coefficient.
    #[allow(clippy::cast_precision_loss)]
    (0..k).fold(1.0, |acc, idx| acc * (n - idx) as f64 / (idx + 1) as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn deform(lattice: LatticeBox, points: Vec<Point3<f64>>) -> PointSet {
        FfdDeformer::new(lattice)
            .perform(&PointSet::from_points(points))
            .unwrap()
    }

    #[test]
    fn test_binomial_coefficients() {
        assert_eq!(binomial(0, 0), 1.0);
        assert_eq!(binomial(4, 1), 4.0);
        assert_eq!(binomial(4, 2), 6.0);
        assert_eq!(binomial(5, 2), 10.0);
        assert_eq!(binomial(10, 5), 252.0);
        assert_eq!(binomial(3, 5), 0.0);
        assert_relative_eq!(binomial(69, 34), 5.609_313_890_833_142_6e19, max_relative = 1e-14);
    }

    #[test]
    fn test_bernstein_vector_matches_closed_form() {
        for dim in 1..=8 {
            for t in [0.0, 0.3, 0.5, 0.9, 1.0] {
                let vector = bernstein_vector(dim, t);
                for (i, value) in vector.iter().enumerate() {
                    assert_relative_eq!(*value, bernstein_basis(dim - 1, i, t), epsilon = 1e-14);
                }
            }
        }
    }

    #[test]
    fn test_long_axis_lattice() {
        let lattice = LatticeBox::axis_aligned(Point3::origin(), Vector3::repeat(1.0), [70, 2, 2])
            .unwrap()
            .with_displacements(vec![Vector3::new(0.0, 0.0, 0.25); 70 * 2 * 2])
            .unwrap();
        let moved = deform(lattice, vec![Point3::new(0.5, 0.5, 0.5)]);
        assert_relative_eq!(moved[0], Point3::new(0.5, 0.5, 0.75), epsilon = 1e-12);

        let sum: f64 = bernstein_vector(500, 0.37).iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bernstein_at_endpoints() {
        assert_relative_eq!(bernstein_basis(3, 0, 0.0), 1.0);
        assert_relative_eq!(bernstein_basis(3, 3, 0.0), 0.0);
        assert_relative_eq!(bernstein_basis(3, 0, 1.0), 0.0);
        assert_relative_eq!(bernstein_basis(3, 3, 1.0), 1.0);
    }

    #[test]
    fn test_bernstein_partition_of_unity() {
        for dim in 1..=6 {
            for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let sum: f64 = bernstein_vector(dim, t).iter().sum();
                assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_single_node_axis_is_constant() {
        assert_eq!(bernstein_vector(1, 0.0), vec![1.0]);
        assert_eq!(bernstein_vector(1, 0.7), vec![1.0]);
    }

    #[test]
    fn test_zero_displacement_is_identity() {
        let moved = deform(LatticeBox::default(), vec![Point3::new(0.5, 0.5, 0.5)]);
        assert_relative_eq!(moved[0], Point3::new(0.5, 0.5, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_corner_displacement_isolated() {
        let lattice = LatticeBox::default()
            .with_displacement(1, 0, 0, Vector3::new(0.0, 0.0, 1.0))
            .unwrap();
        let moved = deform(
            lattice,
            vec![Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)],
        );
        assert_relative_eq!(moved[0], Point3::new(1.0, 0.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(moved[1], Point3::origin(), epsilon = 1e-12);
    }

    #[test]
    fn test_outside_points_pass_through_bitwise() {
        let lattice = LatticeBox::default()
            .with_displacements(vec![Vector3::new(0.1, -0.2, 0.3); 8])
            .unwrap();
        let outside = vec![
            Point3::new(1.5, 0.5, 0.5),
            Point3::new(-0.0001, 0.5, 0.5),
            Point3::new(0.3, 0.3, 7.0),
        ];
        let moved = deform(lattice, outside.clone());
        assert_eq!(moved.as_slice(), outside.as_slice());
    }

    #[test]
    fn test_uniform_displacement_translates() {
        let shift = Vector3::new(0.1, 0.0, -0.05);
        let lattice = LatticeBox::axis_aligned(Point3::new(1.0, 1.0, 1.0), Vector3::new(2.0, 4.0, 1.0), [3, 4, 2])
            .unwrap();
        let count = lattice.control_point_count();
        let lattice = lattice.with_displacements(vec![shift; count]).unwrap();

        let moved = deform(lattice, vec![Point3::new(2.0, 3.0, 1.5)]);
        // Local units scale by the edge lengths.
        let expected = Point3::new(2.0 + 0.2, 3.0, 1.5 - 0.05);
        assert_relative_eq!(moved[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_single_node_axes() {
        let lattice = LatticeBox::axis_aligned(Point3::origin(), Vector3::new(1.0, 1.0, 1.0), [1, 1, 2])
            .unwrap()
            .with_displacement(0, 0, 1, Vector3::new(0.5, 0.0, 0.0))
            .unwrap();
        let moved = deform(lattice, vec![Point3::new(0.2, 0.9, 1.0)]);
        assert_relative_eq!(moved[0], Point3::new(0.7, 0.9, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_box() {
        let lattice = LatticeBox::from_lengths_and_angles(
            Point3::origin(),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 0.0, 90.0),
            [2, 2, 2],
        )
        .unwrap();
        // Rotating 90° about z turns the x edge into +y and the y edge into -x.
        assert_relative_eq!(lattice.frame().vertices[1], Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(lattice.frame().vertices[2], Point3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);

        let lattice = lattice
            .with_displacement(1, 0, 0, Vector3::new(0.0, 0.0, 1.0))
            .unwrap();
        // Local (0.5, 0.25, 0.5): weight of node (1, 0, 0) is 0.5 * 0.75 * 0.5.
        let moved = deform(
            lattice,
            vec![Point3::new(-0.25, 0.5, 0.5), Point3::new(1.0, 0.0, 0.0)],
        );
        assert_relative_eq!(moved[0], Point3::new(-0.25, 0.5, 0.6875), epsilon = 1e-12);
        assert_eq!(moved[1], Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_degenerate_box_errors() {
        let flat = LatticeBox::axis_aligned(Point3::origin(), Vector3::new(1.0, 1.0, 0.0), [2, 2, 2])
            .unwrap();
        let result = FfdDeformer::new(flat).perform(&PointSet::new());
        assert!(matches!(
            result,
            Err(DeformError::DegenerateFrame {
                frame: "lattice box",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result = LatticeBox::axis_aligned(Point3::origin(), Vector3::repeat(1.0), [2, 0, 2]);
        assert!(matches!(result, Err(DeformError::InvalidParameter(_))));
    }

    #[test]
    fn test_grid_length_checked() {
        let result = LatticeBox::default().with_displacements(vec![Vector3::zeros(); 7]);
        assert!(matches!(
            result,
            Err(DeformError::DimensionMismatch {
                expected: 8,
                actual: 7,
                ..
            })
        ));
    }

    #[test]
    fn test_grid_index_order() {
        let lattice = LatticeBox::axis_aligned(Point3::origin(), Vector3::repeat(1.0), [2, 3, 4])
            .unwrap()
            .with_displacement(1, 2, 3, Vector3::x())
            .unwrap();
        assert_eq!(lattice.displacements()[(3 + 2) * 4 + 3], Vector3::x());
        assert_eq!(lattice.displacement(1, 2, 3), Some(Vector3::x()));
        assert_eq!(lattice.displacement(2, 0, 0), None);
        assert!(!lattice.is_undeformed());
    }

    #[test]
    fn test_control_point_position() {
        let lattice = LatticeBox::axis_aligned(Point3::new(1.0, 0.0, 0.0), Vector3::new(2.0, 1.0, 1.0), [3, 2, 1])
            .unwrap();
        assert_eq!(lattice.control_point_position(1, 1, 0), Point3::new(2.0, 1.0, 0.0));
        assert_eq!(lattice.control_point_position(2, 0, 0), Point3::new(3.0, 0.0, 0.0));
    }
}
