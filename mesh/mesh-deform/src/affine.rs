//! Affine maps between tetrahedral frames.
//!
//! A frame is four points: an origin and the endpoints of three axes. Two
//! frames with affinely independent vertices determine exactly one affine map
//! `f(x) = A·x + b` carrying the first onto the second. The lattice deformer
//! uses this to move points into and out of the unit reference cube.

use crate::{DeformError, DeformResult};
use nalgebra::{Matrix3, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Frames whose normalized volume falls below this are treated as flat.
///
/// The normalized volume is `|det(E)| / (|e1| |e2| |e3|)`, which lies in
/// `[0, 1]` and is independent of the frame's scale.
pub const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// Four points defining an origin and three axis endpoints.
///
/// # Example
///
/// ```
/// use mesh_deform::AffineFrame;
/// use nalgebra::{Point3, Vector3};
///
/// let frame = AffineFrame::from_edges(
///     Point3::new(1.0, 1.0, 1.0),
///     Vector3::new(2.0, 0.0, 0.0),
///     Vector3::new(0.0, 2.0, 0.0),
///     Vector3::new(0.0, 0.0, 2.0),
/// );
/// assert_eq!(frame.vertices[1], Point3::new(3.0, 1.0, 1.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AffineFrame {
    /// Origin followed by the x, y and z axis endpoints.
    pub vertices: [Point3<f64>; 4],
}

impl AffineFrame {
    /// Creates a frame from its origin and three axis endpoints.
    #[must_use]
    pub const fn new(
        origin: Point3<f64>,
        x_end: Point3<f64>,
        y_end: Point3<f64>,
        z_end: Point3<f64>,
    ) -> Self {
        Self {
            vertices: [origin, x_end, y_end, z_end],
        }
    }

    /// Creates a frame from an origin and three edge vectors.
    #[must_use]
    pub fn from_edges(
        origin: Point3<f64>,
        edge_x: Vector3<f64>,
        edge_y: Vector3<f64>,
        edge_z: Vector3<f64>,
    ) -> Self {
        Self::new(origin, origin + edge_x, origin + edge_y, origin + edge_z)
    }

    /// The canonical reference frame `{(0,0,0), (1,0,0), (0,1,0), (0,0,1)}`.
    #[must_use]
    pub fn unit() -> Self {
        Self::new(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        )
    }

    /// The frame's origin vertex.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> Point3<f64> {
        self.vertices[0]
    }

    /// Returns the same frame shifted by `offset`.
    #[must_use]
    pub fn translated(&self, offset: &Vector3<f64>) -> Self {
        Self {
            vertices: self.vertices.map(|v| v + offset),
        }
    }

    /// Matrix whose columns are the three edge vectors `Vi - V0`.
    #[must_use]
    pub fn edge_matrix(&self) -> Matrix3<f64> {
        let [o, x, y, z] = self.vertices;
        Matrix3::from_columns(&[x - o, y - o, z - o])
    }

    /// Scale-free measure of how far the frame is from being flat.
    ///
    /// Returns 0 for coplanar frames or frames with a zero-length edge and 1
    /// for frames with mutually orthogonal edges.
    #[must_use]
    pub fn normalized_volume(&self) -> f64 {
        let edges = self.edge_matrix();
        let scale: f64 = edges.column_iter().map(|c| c.norm()).product();
        if !scale.is_finite() || scale <= f64::MIN_POSITIVE {
            return 0.0;
        }
        let volume = edges.determinant().abs() / scale;
        if volume.is_finite() {
            volume
        } else {
            0.0
        }
    }
}

impl Default for AffineFrame {
    fn default() -> Self {
        Self::unit()
    }
}

/// An affine map `x ↦ A·x + b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMap {
    linear: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl Default for AffineMap {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineMap {
    /// The identity map.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            linear: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Fits the unique affine map sending each source vertex to the
    /// corresponding target vertex.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::DegenerateFrame`] if the source frame is flat.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_deform::{AffineFrame, AffineMap};
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let source = AffineFrame::unit();
    /// let target = AffineFrame::from_edges(
    ///     Point3::new(5.0, 0.0, 0.0),
    ///     Vector3::new(0.0, 1.0, 0.0),
    ///     Vector3::new(-1.0, 0.0, 0.0),
    ///     Vector3::new(0.0, 0.0, 3.0),
    /// );
    ///
    /// let map = AffineMap::fit(&source, &target).unwrap();
    /// let p = map.apply(&Point3::new(1.0, 0.0, 1.0));
    /// assert!((p - Point3::new(5.0, 1.0, 3.0)).norm() < 1e-12);
    /// ```
    pub fn fit(source: &AffineFrame, target: &AffineFrame) -> DeformResult<Self> {
        fit_frames(source, target, "source")
    }

    /// Applies the map to a point.
    #[inline]
    #[must_use]
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.linear * point.coords + self.translation)
    }

    /// Applies the map to every point of a slice, preserving order.
    #[must_use]
    pub fn apply_all(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.apply(p)).collect()
    }

    /// The linear part `A`.
    #[inline]
    #[must_use]
    pub const fn linear(&self) -> &Matrix3<f64> {
        &self.linear
    }

    /// The translation part `b`.
    #[inline]
    #[must_use]
    pub const fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// Returns the map that applies `self` first and then `next`.
    #[must_use]
    pub fn then(&self, next: &Self) -> Self {
        Self {
            linear: next.linear * self.linear,
            translation: next.linear * self.translation + next.translation,
        }
    }
}

/// Forward and inverse affine maps between two frames.
///
/// The inverse is fitted independently with the frames swapped rather than
/// by inverting the forward matrix, so both directions carry only the
/// conditioning error of a single 3×3 solve.
///
/// # Example
///
/// ```
/// use mesh_deform::{AffineFrame, AffineFrameSolver};
/// use nalgebra::{Point3, Vector3};
///
/// let physical = AffineFrame::from_edges(
///     Point3::new(-2.0, 1.0, 0.5),
///     Vector3::new(3.0, 0.0, 0.0),
///     Vector3::new(0.0, 2.0, 0.0),
///     Vector3::new(0.0, 0.0, 4.0),
/// );
/// let solver = AffineFrameSolver::new(&physical, &AffineFrame::unit()).unwrap();
///
/// let p = Point3::new(0.3, -1.2, 7.0);
/// let back = solver.unmap(&solver.map(&p));
/// assert!((back - p).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineFrameSolver {
    forward: AffineMap,
    inverse: AffineMap,
}

impl AffineFrameSolver {
    /// Builds both directions of the map between `source` and `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::DegenerateFrame`] naming the frame that is flat.
    pub fn new(source: &AffineFrame, target: &AffineFrame) -> DeformResult<Self> {
        let forward = fit_frames(source, target, "source")?;
        let inverse = fit_frames(target, source, "target")?;
        Ok(Self { forward, inverse })
    }

    /// Map from the source frame to the target frame.
    #[inline]
    #[must_use]
    pub const fn forward(&self) -> &AffineMap {
        &self.forward
    }

    /// Map from the target frame back to the source frame.
    #[inline]
    #[must_use]
    pub const fn inverse(&self) -> &AffineMap {
        &self.inverse
    }

    /// Applies the forward map.
    #[inline]
    #[must_use]
    pub fn map(&self, point: &Point3<f64>) -> Point3<f64> {
        self.forward.apply(point)
    }

    /// Applies the inverse map.
    #[inline]
    #[must_use]
    pub fn unmap(&self, point: &Point3<f64>) -> Point3<f64> {
        self.inverse.apply(point)
    }
}

fn fit_frames(
    source: &AffineFrame,
    target: &AffineFrame,
    role: &'static str,
) -> DeformResult<AffineMap> {
    let volume = source.normalized_volume();
    if volume < DEGENERACY_TOLERANCE {
        return Err(DeformError::DegenerateFrame {
            frame: role,
            volume,
        });
    }

    // A·Es = Et  ⇔  Esᵀ·Aᵀ = Etᵀ
    let source_edges = source.edge_matrix();
    let target_edges = target.edge_matrix();
    let linear_t = source_edges
        .transpose()
        .lu()
        .solve(&target_edges.transpose())
        .ok_or(DeformError::DegenerateFrame {
            frame: role,
            volume,
        })?;
    let linear = linear_t.transpose();
    let translation = target.origin().coords - linear * source.origin().coords;

    Ok(AffineMap {
        linear,
        translation,
    })
}
