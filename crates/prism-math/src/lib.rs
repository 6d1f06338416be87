#![warn(missing_docs)]

//! Math types for the prism object-tree kernel.
//!
//! nalgebra aliases plus the pieces the object tree needs on top of them:
//! affine transforms, supporting planes, arc and bezier evaluation and
//! comparison tolerances.

mod curve;
mod plane;

pub use curve::{bezier_segments, cubic_bezier, ArcGeom};
pub use plane::Plane;

use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit direction.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in a plane's 2D coordinates.
pub type Point2 = nalgebra::Point2<f64>;

/// An affine map `p -> linear * p + offset`.
///
/// Points get both parts, vectors only the linear part and normals the
/// inverse transpose of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Rotation, scale and mirror part.
    pub linear: Matrix3<f64>,
    /// Translation applied after `linear`.
    pub offset: Vec3,
}

impl Transform {
    /// The identity map.
    pub fn identity() -> Self {
        Self {
            linear: Matrix3::identity(),
            offset: Vec3::zeros(),
        }
    }

    /// Pure translation.
    pub fn translation(offset: Vec3) -> Self {
        Self {
            offset,
            ..Self::identity()
        }
    }

    /// Per-axis scale about the origin.
    pub fn scale(factors: &Vec3) -> Self {
        Self {
            linear: Matrix3::from_diagonal(factors),
            offset: Vec3::zeros(),
        }
    }

    /// Per-axis scale about `centre`; `centre` stays fixed.
    pub fn scale_about(centre: &Point3, factors: &Vec3) -> Self {
        let linear = Matrix3::from_diagonal(factors);
        Self {
            linear,
            offset: centre.coords - linear * centre.coords,
        }
    }

    /// Rotation by `angle` radians about `axis` through the origin.
    pub fn rotation(axis: &Dir3, angle: f64) -> Self {
        Self {
            linear: Rotation3::from_axis_angle(axis, angle).into_inner(),
            offset: Vec3::zeros(),
        }
    }

    /// `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            linear: self.linear * other.linear,
            offset: self.linear * other.offset + self.offset,
        }
    }

    /// Map a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        Point3::from(self.linear * p.coords + self.offset)
    }

    /// Map a free vector.
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        self.linear * v
    }

    /// Map a surface normal. Singular maps return `n` unchanged.
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        match self.linear.try_inverse() {
            Some(inv) => inv.transpose() * n,
            None => *n,
        }
    }

    /// True when only the offset differs from the identity.
    pub fn is_translation(&self) -> bool {
        self.linear == Matrix3::identity()
    }

    /// True when the map reverses orientation.
    pub fn mirrors(&self) -> bool {
        self.linear.determinant() < 0.0
    }

    /// The inverse map, if the linear part is invertible.
    pub fn inverse(&self) -> Option<Self> {
        let linear = self.linear.try_inverse()?;
        Some(Self {
            linear,
            offset: -(linear * self.offset),
        })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Comparison tolerances, configurable per model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Distances below this are zero.
    pub linear: f64,
    /// Angles below this (radians) are zero.
    pub angular: f64,
}

impl Tolerance {
    /// 1e-6 linear, 1e-9 angular.
    pub const DEFAULT: Self = Self {
        linear: 1e-6,
        angular: 1e-9,
    };

    /// Coincidence test.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        self.is_zero((a - b).norm())
    }

    /// Whether a distance counts as zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Newell normal of a closed polygon (not normalized).
///
/// The length is twice the polygon's area and the direction follows the
/// right-hand rule around the vertex order. Robust for non-convex and
/// slightly non-planar loops.
pub fn newell_normal(points: &[Point3]) -> Vec3 {
    let mut n = Vec3::zeros();
    let count = points.len();
    for i in 0..count {
        let a = &points[i];
        let b = &points[(i + 1) % count];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_translation_moves_points_not_vectors() {
        let t = Transform::translation(Vec3::new(10.0, 20.0, 30.0));
        assert_eq!(t.apply_point(&Point3::new(1.0, 2.0, 3.0)), Point3::new(11.0, 22.0, 33.0));
        assert_eq!(t.apply_vec(&Vec3::x()), Vec3::x());
        assert!(t.is_translation());
        assert!(!t.mirrors());
    }

    #[test]
    fn test_scale_about_centre() {
        let centre = Point3::new(1.0, 1.0, 1.0);
        let t = Transform::scale_about(&centre, &Vec3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(t.apply_point(&Point3::new(2.0, 1.0, 0.0)), Point3::new(3.0, 1.0, -1.0));
        assert_relative_eq!(t.apply_point(&centre), centre);
        assert!(!t.is_translation());
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let t = Transform::rotation(&Vec3::z_axis(), FRAC_PI_2);
        assert_relative_eq!(
            t.apply_point(&Point3::new(1.0, 0.0, 0.0)),
            Point3::new(0.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_normal_under_nonuniform_scale() {
        // Stretching y tilts a 45 degree normal towards x.
        let t = Transform::scale(&Vec3::new(1.0, 2.0, 1.0));
        let n = t.apply_normal(&Vec3::new(1.0, 1.0, 0.0)).normalize();
        assert!(n.x > n.y);
    }

    #[test]
    fn test_mirror_and_inverse() {
        let mirror = Transform::scale(&Vec3::new(-1.0, 1.0, 1.0));
        assert!(mirror.mirrors());

        let t = Transform::translation(Vec3::new(1.0, 2.0, 3.0))
            .then(&Transform::rotation(&Vec3::x_axis(), 0.3));
        let round = t.then(&t.inverse().unwrap());
        let p = Point3::new(5.0, 6.0, 7.0);
        assert_relative_eq!(round.apply_point(&p), p, epsilon = 1e-12);
        assert!(Transform::scale(&Vec3::new(0.0, 1.0, 1.0)).inverse().is_none());
    }

    #[test]
    fn test_tolerance() {
        let tol = Tolerance::DEFAULT;
        let a = Point3::new(1.0, 2.0, 3.0);
        assert!(tol.points_equal(&a, &Point3::new(1.0 + 1e-7, 2.0, 3.0)));
        assert!(!tol.points_equal(&a, &Point3::new(1.001, 2.0, 3.0)));
        assert!(tol.is_zero(-5e-7));
    }

    #[test]
    fn test_newell_normal_ccw_square() {
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert_relative_eq!(newell_normal(&square), Vec3::new(0.0, 0.0, 2.0));

        let mut reversed = square;
        reversed.reverse();
        assert!(newell_normal(&reversed).z < 0.0);
    }
}
