#![warn(missing_docs)]

//! Shared object tree for the prism kernel.
//!
//! A [`Tree`] owns every point, edge, face and volume in per-kind arenas.
//! Objects reference each other by typed handle, so points and edges can be
//! shared between several edges and faces while faces and volumes keep a
//! single parent. On top of the graph this crate provides:
//!
//! - list maintenance (`link`, `link_tail`, `delink`) and reachability
//!   queries (`find_obj`, `find_top_level_parent`, `holders`);
//! - reference-checked deletion;
//! - the hierarchical lock policy ([`lock`]);
//! - sharing-preserving copy, move and scale ([`CopyMap`], [`MoveSet`]);
//! - view-list invalidation ([`Invalidation`]);
//! - face boundary traversal ([`LoopEdge`]);
//! - construction helpers and extrusion.

mod boundary;
mod build;
mod copy;
mod error;
mod ids;
pub mod lock;
mod motion;
mod object;
mod tree;
mod view;

pub use boundary::LoopEdge;
pub use copy::CopyMap;
pub use error::{Result, TreeError};
pub use ids::{EdgeId, FaceId, ObjId, ObjKind, PointId, VolumeId};
pub use lock::{allows, Granularity, LockLevel};
pub use motion::MoveSet;
pub use object::{Edge, EdgeKind, EdgeView, Face, FaceKind, FaceView, Header, Point, Volume};
pub use tree::{List, Tree};
pub use view::Invalidation;
