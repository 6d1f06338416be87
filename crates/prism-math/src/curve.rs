//! Circular-arc and cubic-bezier evaluation.

use std::f64::consts::PI;

use crate::{Point3, Vec3};

/// Resolved geometry of a circular arc between two endpoints.
///
/// Parameterization: `P(f) = centre + r(f) * (cos(f * sweep) * x + sin(f * sweep) * y)`
/// for `f ∈ [0, 1]`, where `x` points from the centre to the start point,
/// `y = normal × x`, and `r(f)` blends the start and end radii (they differ
/// only when the endpoints were edited independently).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeom {
    /// Arc centre.
    pub centre: Point3,
    /// Unit in-plane direction towards the start point.
    pub x_dir: Vec3,
    /// Unit in-plane direction, `normal × x_dir`.
    pub y_dir: Vec3,
    /// Distance from the centre to the start point.
    pub start_radius: f64,
    /// Distance from the centre to the end point.
    pub end_radius: f64,
    /// Signed sweep in radians: positive counter-clockwise about the normal.
    pub sweep: f64,
}

impl ArcGeom {
    /// Resolve an arc from its endpoints, centre, plane normal and winding.
    ///
    /// Coincident endpoints describe a full circle. Returns `None` when the
    /// start point sits on the centre or the normal is zero.
    pub fn new(
        start: &Point3,
        end: &Point3,
        centre: &Point3,
        normal: &Vec3,
        clockwise: bool,
    ) -> Option<Self> {
        let n_len = normal.norm();
        if n_len < 1e-12 {
            return None;
        }
        let n = normal / n_len;

        let u = start - centre;
        let u_plane = u - n * u.dot(&n);
        let start_radius = u_plane.norm();
        if start_radius < 1e-12 {
            return None;
        }
        let x_dir = u_plane / start_radius;
        let y_dir = n.cross(&x_dir);

        let v = end - centre;
        let v_plane = v - n * v.dot(&n);
        let end_radius = v_plane.norm();

        let mut ccw = v_plane.dot(&y_dir).atan2(v_plane.dot(&x_dir));
        if ccw <= 1e-9 {
            ccw += 2.0 * PI;
        }
        let sweep = if clockwise {
            let cw = 2.0 * PI - ccw;
            if cw < 1e-9 {
                -2.0 * PI
            } else {
                -cw
            }
        } else {
            ccw
        };

        Some(Self {
            centre: *centre,
            x_dir,
            y_dir,
            start_radius,
            end_radius,
            sweep,
        })
    }

    /// Nominal radius (distance to the start point).
    pub fn radius(&self) -> f64 {
        self.start_radius
    }

    /// True when the arc closes on itself.
    pub fn is_full_circle(&self) -> bool {
        (self.sweep.abs() - 2.0 * PI).abs() < 1e-9
    }

    /// Point at `fraction ∈ [0, 1]` of the sweep.
    pub fn point_at(&self, fraction: f64) -> Point3 {
        let (s, c) = (fraction * self.sweep).sin_cos();
        let r = self.start_radius + (self.end_radius - self.start_radius) * fraction;
        self.centre + r * (c * self.x_dir + s * self.y_dir)
    }

    /// Point halfway along the sweep.
    pub fn midpoint(&self) -> Point3 {
        self.point_at(0.5)
    }

    /// Segment count keeping chord deviation below `flatness`.
    ///
    /// A chord spanning angle `θ` deviates `r * (1 - cos(θ / 2))` from the arc.
    pub fn segments_for_flatness(&self, flatness: f64, max_segments: u32) -> u32 {
        let r = self.start_radius.max(self.end_radius);
        let step = if flatness <= 0.0 {
            0.0
        } else if flatness >= r {
            PI / 2.0
        } else {
            2.0 * (1.0 - flatness / r).acos()
        };
        self.segments_for_step(step, max_segments)
    }

    /// Segment count for a fixed angular step in radians.
    pub fn segments_for_step(&self, step: f64, max_segments: u32) -> u32 {
        let max_segments = max_segments.max(1);
        if step <= 1e-12 {
            return max_segments;
        }
        let n = (self.sweep.abs() / step).ceil();
        (n as u32).clamp(1, max_segments)
    }
}

/// Evaluate a cubic bezier at parameter `t ∈ [0, 1]`.
pub fn cubic_bezier(p0: &Point3, c0: &Point3, c1: &Point3, p1: &Point3, t: f64) -> Point3 {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    Point3::from(a * p0.coords + b * c0.coords + c * c1.coords + d * p1.coords)
}

/// Segment count keeping a cubic bezier within `flatness` of its polyline.
///
/// Wang's bound for degree 3: `n = sqrt(3 * 2 / 8 * M / flatness)` where `M`
/// is the largest second difference of the control polygon.
pub fn bezier_segments(
    p0: &Point3,
    c0: &Point3,
    c1: &Point3,
    p1: &Point3,
    flatness: f64,
    max_segments: u32,
) -> u32 {
    let max_segments = max_segments.max(1);
    if flatness <= 0.0 {
        return max_segments;
    }
    let d0 = (p0.coords - 2.0 * c0.coords + c1.coords).norm();
    let d1 = (c0.coords - 2.0 * c1.coords + p1.coords).norm();
    let m = d0.max(d1);
    let n = (0.75 * m / flatness).sqrt().ceil();
    (n as u32).clamp(1, max_segments)
}
