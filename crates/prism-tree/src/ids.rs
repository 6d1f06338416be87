//! Typed handles for tree objects.

use std::fmt;

slotmap::new_key_type! {
    /// Handle of a point in the tree's point arena.
    pub struct PointId;
    /// Handle of an edge in the tree's edge arena.
    pub struct EdgeId;
    /// Handle of a face in the tree's face arena.
    pub struct FaceId;
    /// Handle of a volume in the tree's volume arena.
    pub struct VolumeId;
}

/// The variant of a tree object (for messages and match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjKind {
    /// A point.
    Point,
    /// An edge (straight, arc or bezier).
    Edge,
    /// A face.
    Face,
    /// A volume.
    Volume,
}

impl fmt::Display for ObjKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjKind::Point => "point",
            ObjKind::Edge => "edge",
            ObjKind::Face => "face",
            ObjKind::Volume => "volume",
        };
        f.write_str(name)
    }
}

/// A handle to any tree object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjId {
    /// A point handle.
    Point(PointId),
    /// An edge handle.
    Edge(EdgeId),
    /// A face handle.
    Face(FaceId),
    /// A volume handle.
    Volume(VolumeId),
}

impl ObjId {
    /// The variant this handle refers to.
    pub fn kind(&self) -> ObjKind {
        match self {
            ObjId::Point(_) => ObjKind::Point,
            ObjId::Edge(_) => ObjKind::Edge,
            ObjId::Face(_) => ObjKind::Face,
            ObjId::Volume(_) => ObjKind::Volume,
        }
    }
}

impl From<PointId> for ObjId {
    fn from(id: PointId) -> Self {
        ObjId::Point(id)
    }
}

impl From<EdgeId> for ObjId {
    fn from(id: EdgeId) -> Self {
        ObjId::Edge(id)
    }
}

impl From<FaceId> for ObjId {
    fn from(id: FaceId) -> Self {
        ObjId::Face(id)
    }
}

impl From<VolumeId> for ObjId {
    fn from(id: VolumeId) -> Self {
        ObjId::Volume(id)
    }
}
