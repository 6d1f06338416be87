//! Error types for tree operations.

use thiserror::Error;

use crate::ids::ObjKind;
use crate::lock::{Granularity, LockLevel};
use crate::object::FaceKind;

/// Errors from structural tree operations.
///
/// Objects are identified by kind and identity; an identity of 0 means the
/// object has not been serialized yet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// A handle does not resolve to a live object.
    #[error("{kind} not found in tree")]
    Missing {
        /// Kind of the missing object.
        kind: ObjKind,
    },

    /// Deletion refused because other objects still reference the target.
    #[error("{kind} #{ident} is still referenced by {holders} object(s)")]
    StillReferenced {
        /// Kind of the target.
        kind: ObjKind,
        /// Identity of the target.
        ident: u32,
        /// Number of referencing objects.
        holders: usize,
    },

    /// A lock on the top-level parent forbids the operation.
    #[error("{kind} #{ident} is locked ({lock:?}); {granularity:?} access denied")]
    Locked {
        /// Kind of the target.
        kind: ObjKind,
        /// Identity of the target.
        ident: u32,
        /// Lock level of the top-level parent.
        lock: LockLevel,
        /// Requested granularity.
        granularity: Granularity,
    },

    /// The target is not part of the addressed subtree.
    #[error("{kind} #{ident} is not reachable from {parent} #{parent_ident}")]
    NotReachable {
        /// Kind of the target.
        kind: ObjKind,
        /// Identity of the target.
        ident: u32,
        /// Kind of the parent.
        parent: ObjKind,
        /// Identity of the parent.
        parent_ident: u32,
    },

    /// The operation needs a top-level object.
    #[error("{kind} #{ident} is not a top-level object")]
    NotTopLevel {
        /// Kind of the target.
        kind: ObjKind,
        /// Identity of the target.
        ident: u32,
    },

    /// The object already sits in a list.
    #[error("{kind} #{ident} is already linked")]
    AlreadyLinked {
        /// Kind of the target.
        kind: ObjKind,
        /// Identity of the target.
        ident: u32,
    },

    /// The list cannot hold objects of this kind.
    #[error("a {list} list cannot hold a {kind}")]
    WrongList {
        /// Kind of the rejected object.
        kind: ObjKind,
        /// Name of the list.
        list: &'static str,
    },

    /// Edge list inconsistent with the face kind.
    #[error("{face:?} face needs {expected} edges, found {found}")]
    EdgeCount {
        /// Face kind.
        face: FaceKind,
        /// Requirement description.
        expected: &'static str,
        /// Actual count.
        found: usize,
    },

    /// The face boundary does not chain into a closed loop.
    #[error("face #{ident} boundary is not a closed loop")]
    OpenLoop {
        /// Identity of the face.
        ident: u32,
    },

    /// Only planar, loose faces can be extruded.
    #[error("face #{ident} ({face:?}) cannot be extruded")]
    NotFlat {
        /// Identity of the face.
        ident: u32,
        /// Face kind.
        face: FaceKind,
    },

    /// Extrusion distance is zero.
    #[error("extrusion distance is zero")]
    ZeroExtrusion,

    /// A copy map was reused with a different offset.
    #[error("copy map built with offset {expected:?} reused with offset {found:?}")]
    OffsetMismatch {
        /// Offset recorded by the map.
        expected: [f64; 3],
        /// Offset of the new call.
        found: [f64; 3],
    },

    /// Every 32-bit identity has been handed out.
    #[error("object identities exhausted")]
    IdentsExhausted,

    /// Geometry that cannot be resolved (zero arc normal, centre on the arc).
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// Result alias for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
