//! Object variants stored in the tree arenas.

use prism_math::{Plane, Point3, Vec3};

use crate::ids::{EdgeId, FaceId, PointId, VolumeId};
use crate::lock::LockLevel;

/// Bookkeeping shared by every object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// Identity assigned by the serializer; 0 until first written.
    pub ident: u32,
    /// Last save pass that wrote this object.
    pub save_count: u32,
    /// Lock level, only meaningful on top-level objects.
    pub lock: LockLevel,
}

/// A point in space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Point {
    /// Common header.
    pub header: Header,
    /// Position.
    pub pos: Point3,
}

/// Geometry of an edge between its two endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeKind {
    /// Straight segment.
    Straight,
    /// Circular arc about `centre` in the plane with `normal`.
    Arc {
        /// Centre point (shared).
        centre: PointId,
        /// Supporting plane normal.
        normal: Vec3,
        /// Winding about `normal`.
        clockwise: bool,
    },
    /// Cubic bezier with two control points.
    Bezier {
        /// Control points (shared), in curve order.
        ctrl: [PointId; 2],
    },
}

impl EdgeKind {
    /// True for arcs and beziers.
    pub fn is_curved(&self) -> bool {
        !matches!(self, EdgeKind::Straight)
    }
}

/// Cached display polyline of an edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeView {
    /// Interior points; the endpoints are never repeated here.
    pub interior: Vec<Point3>,
    /// False once geometry changed since the last generation.
    pub valid: bool,
}

/// An edge bounded by two shared points.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Common header.
    pub header: Header,
    /// Curve variant.
    pub kind: EdgeKind,
    /// Reference-only geometry, not part of a solid.
    pub construction: bool,
    /// Start and end points.
    pub endpoints: [PointId; 2],
    /// Explicit step overriding adaptive subdivision: radians for arcs, a
    /// parameter fraction for beziers.
    pub step: Option<f64>,
    /// Cached polyline.
    pub view: EdgeView,
}

impl Edge {
    /// Every point this edge depends on, endpoints first.
    pub fn points(&self) -> Vec<PointId> {
        let mut out = self.endpoints.to_vec();
        match self.kind {
            EdgeKind::Straight => {}
            EdgeKind::Arc { centre, .. } => out.push(centre),
            EdgeKind::Bezier { ctrl } => out.extend(ctrl),
        }
        out
    }

    /// The other endpoint, if `p` is one of them.
    pub fn other_end(&self, p: PointId) -> Option<PointId> {
        if self.endpoints[0] == p {
            Some(self.endpoints[1])
        } else if self.endpoints[1] == p {
            Some(self.endpoints[0])
        } else {
            None
        }
    }

    /// True when both endpoints are the same point.
    pub fn is_closed(&self) -> bool {
        self.endpoints[0] == self.endpoints[1]
    }
}

/// Face variants. The kind constrains the edge list, see [`FaceKind::edge_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceKind {
    /// Planar rectangle with four straight edges.
    Rect,
    /// Planar disc bounded by one closed arc.
    Circle,
    /// Planar polygon of any edges.
    Flat,
    /// Ruled cylindrical patch between two curved edges.
    Cylinder,
    /// Ruled patch between two arbitrary curves.
    General,
}

impl FaceKind {
    /// Minimum and (optional) maximum number of edges.
    pub fn edge_bounds(self) -> (usize, Option<usize>) {
        match self {
            FaceKind::Rect => (4, Some(4)),
            FaceKind::Circle => (1, Some(1)),
            FaceKind::Flat => (1, None),
            FaceKind::Cylinder | FaceKind::General => (4, Some(4)),
        }
    }

    /// True for the planar kinds.
    pub fn is_planar(self) -> bool {
        matches!(self, FaceKind::Rect | FaceKind::Circle | FaceKind::Flat)
    }

    /// Human-readable edge-count requirement.
    pub fn edge_requirement(self) -> &'static str {
        match self {
            FaceKind::Rect => "exactly 4 straight",
            FaceKind::Circle => "exactly 1 closed arc",
            FaceKind::Flat => "at least 1",
            FaceKind::Cylinder => "exactly 4 (curved, straight, curved, straight)",
            FaceKind::General => "exactly 4",
        }
    }
}

/// Cached display data of a face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceView {
    /// Closed line loop in traversal order (first point not repeated).
    pub outline: Vec<Point3>,
    /// Vertices referenced by `triangles`.
    pub fill_points: Vec<Point3>,
    /// Fill triangles, counter-clockwise about the face normal.
    pub triangles: Vec<[u32; 3]>,
    /// False once geometry changed since the last generation.
    pub valid: bool,
}

/// A face bounded by an ordered list of (possibly shared) edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Common header.
    pub header: Header,
    /// Face variant.
    pub kind: FaceKind,
    /// Bounding edges in array order. An edge may appear twice (a seam).
    pub edges: Vec<EdgeId>,
    /// Supporting plane; for cylinders the axis.
    pub plane: Plane,
    /// Owning volume.
    pub volume: Option<VolumeId>,
    /// Opposite face of an extruded prism.
    pub pair: Option<FaceId>,
    /// Start of the loop traversal.
    pub initial_point: Option<PointId>,
    /// Cached display data.
    pub view: FaceView,
}

/// A closed solid made of faces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Volume {
    /// Common header.
    pub header: Header,
    /// Faces in list order.
    pub faces: Vec<FaceId>,
    /// Face this volume was built on.
    pub attached_to: Option<FaceId>,
}
