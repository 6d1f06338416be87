//! Supporting planes for faces.

use crate::{newell_normal, Point2, Point3, Transform, Vec3};

/// An infinite plane defined by an origin point and a unit normal.
///
/// A zero normal is allowed and means "no orientation convention"; such
/// planes are produced for degenerate point sets and by [`Plane::unset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// A point on the plane.
    pub origin: Point3,
    /// Unit normal, or zero when unset.
    pub normal: Vec3,
}

impl Plane {
    /// Create a plane from an origin and a normal. The normal is normalized;
    /// a (near) zero normal is kept as zero.
    pub fn new(origin: Point3, normal: Vec3) -> Self {
        let len = normal.norm();
        let normal = if len < 1e-12 { Vec3::zeros() } else { normal / len };
        Self { origin, normal }
    }

    /// A plane with no orientation, at the origin.
    pub fn unset() -> Self {
        Self {
            origin: Point3::origin(),
            normal: Vec3::zeros(),
        }
    }

    /// XY plane at the origin, normal +Z.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::z())
    }

    /// Best-fit plane through a closed polygon.
    ///
    /// The normal follows the right-hand rule around the point order and the
    /// origin is the centroid. Returns `None` for fewer than three points or
    /// a zero-area loop.
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let n = newell_normal(points);
        if n.norm() < 1e-12 {
            return None;
        }
        let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords);
        let centroid = Point3::from(sum / points.len() as f64);
        Some(Self::new(centroid, n))
    }

    /// True when the plane carries a usable normal.
    pub fn has_normal(&self) -> bool {
        self.normal.norm() > 0.5
    }

    /// In-plane unit directions `(x, y)` with `x × y = normal`.
    ///
    /// For an unset plane the XY axes are returned.
    pub fn basis(&self) -> (Vec3, Vec3) {
        if !self.has_normal() {
            return (Vec3::x(), Vec3::y());
        }
        let n = self.normal;
        let arbitrary = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
        let x = arbitrary.cross(&n).normalize();
        let y = n.cross(&x).normalize();
        (x, y)
    }

    /// Project a 3D point onto this plane's 2D coordinates.
    pub fn project(&self, p: &Point3) -> Point2 {
        let (x, y) = self.basis();
        let d = p - self.origin;
        Point2::new(d.dot(&x), d.dot(&y))
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(&self.normal)
    }

    /// The same plane with the normal flipped.
    pub fn reversed(&self) -> Self {
        Self {
            origin: self.origin,
            normal: -self.normal,
        }
    }

    /// Apply an affine transform; the normal uses the inverse transpose.
    pub fn transform(&self, t: &Transform) -> Self {
        if !self.has_normal() {
            return Self {
                origin: t.apply_point(&self.origin),
                normal: Vec3::zeros(),
            };
        }
        Self::new(t.apply_point(&self.origin), t.apply_normal(&self.normal))
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::unset()
    }
}
