//! Move and scale preserving sharing.
//!
//! A [`MoveSet`] records which objects one operation has already
//! transformed, so a point reached through several edges and faces moves
//! exactly once. Volumes attached to a moved face follow it. A paired face
//! moves alone: its prism stretches and the side faces are invalidated
//! through the shared points.

use std::collections::HashSet;

use prism_math::{Plane, Point3, Transform, Vec3};
use tracing::debug;

use crate::error::{Result, TreeError};
use crate::ids::{EdgeId, FaceId, ObjId, ObjKind, PointId, VolumeId};
use crate::lock::{allows, Granularity};
use crate::object::EdgeKind;
use crate::tree::Tree;
use crate::view::Invalidation;

/// Objects already transformed by one operation.
#[derive(Debug, Default)]
pub struct MoveSet {
    points: HashSet<PointId>,
    edges: HashSet<EdgeId>,
    faces: HashSet<FaceId>,
    volumes: HashSet<VolumeId>,
}

impl MoveSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `point` has been moved by this operation.
    pub fn moved(&self, point: PointId) -> bool {
        self.points.contains(&point)
    }

    /// Number of points moved.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when nothing has moved.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Forget everything moved so far.
    pub fn clear_move_copy_flags(&mut self) {
        self.points.clear();
        self.edges.clear();
        self.faces.clear();
        self.volumes.clear();
    }
}

impl Tree {
    /// Translate every point reachable from `root` by `offset`, each once.
    ///
    /// Returns the view lists invalidated anywhere in the tree.
    pub fn move_obj(&mut self, root: ObjId, offset: Vec3) -> Result<Invalidation> {
        let mut set = MoveSet::new();
        let inv = self.move_obj_in(&mut set, root, offset)?;
        debug!(kind = %root.kind(), points = set.len(), "moved subtree");
        set.clear_move_copy_flags();
        Ok(inv)
    }

    /// Move `root` through a caller-held set, so several roots moved
    /// together never move a shared point twice.
    pub fn move_obj_in(&mut self, set: &mut MoveSet, root: ObjId, offset: Vec3) -> Result<Invalidation> {
        self.transform_in(set, root, &Transform::translation(offset))
    }

    /// Scale everything reachable from `root` about `centre`.
    ///
    /// Plane and arc normals follow the inverse transpose; a negative factor
    /// mirrors and flips the arc winding.
    pub fn scale_obj(&mut self, root: ObjId, centre: Point3, factors: Vec3) -> Result<Invalidation> {
        if factors.iter().any(|f| f.abs() < 1e-12) {
            return Err(TreeError::Degenerate(format!(
                "scale factors {:?} collapse the geometry",
                <[f64; 3]>::from(factors)
            )));
        }
        let mut set = MoveSet::new();
        let inv = self.transform_in(&mut set, root, &Transform::scale_about(&centre, &factors))?;
        debug!(kind = %root.kind(), points = set.len(), "scaled subtree");
        set.clear_move_copy_flags();
        Ok(inv)
    }

    /// Check every lock a move or scale of `root` would cross.
    ///
    /// The top-level parent of `root` is checked at `granularity`. Every
    /// other top-level object whose points the transform reaches is checked
    /// as well: at volume granularity when all of its points move with it
    /// (an attached volume), at point granularity when only some do (a
    /// loose edge sharing a corner).
    pub fn check_transform_access(&self, root: ObjId, granularity: Granularity) -> Result<()> {
        self.check_access(root, granularity)?;
        let own = self.find_top_level_parent(root);
        let reached = self.transform_reach(root);
        for &top in self.top() {
            if Some(top) == own {
                continue;
            }
            let points = self.reachable_points(top);
            if points.is_disjoint(&reached) {
                continue;
            }
            let needed = if points.is_subset(&reached) {
                Granularity::Volume
            } else {
                Granularity::Point
            };
            let lock = self.lock_of(top);
            if !allows(lock, needed) {
                return Err(TreeError::Locked {
                    kind: top.kind(),
                    ident: self.ident(top),
                    lock,
                    granularity: needed,
                });
            }
        }
        Ok(())
    }

    /// Points a transform of `root` moves, following attached volumes.
    fn transform_reach(&self, root: ObjId) -> HashSet<PointId> {
        let mut points = HashSet::new();
        let mut faces = HashSet::new();
        let mut stack = vec![root];
        while let Some(obj) = stack.pop() {
            for reached in self.subtree(obj) {
                match reached {
                    ObjId::Point(p) => {
                        points.insert(p);
                    }
                    ObjId::Face(f) if faces.insert(f) => {
                        stack.extend(
                            self.volumes
                                .iter()
                                .filter(|(_, v)| v.attached_to == Some(f))
                                .map(|(id, _)| ObjId::Volume(id)),
                        );
                    }
                    _ => {}
                }
            }
        }
        points
    }

    /// Record that `volume` was built on `face`.
    pub fn attach(&mut self, volume: VolumeId, face: FaceId) -> Result<()> {
        let owner = self.face(face)?.volume;
        let ident = self.ident(ObjId::Face(face));
        let vol = self.volumes.get_mut(volume).ok_or(TreeError::Missing {
            kind: ObjKind::Volume,
        })?;
        if owner == Some(volume) {
            return Err(TreeError::AlreadyLinked {
                kind: ObjKind::Face,
                ident,
            });
        }
        vol.attached_to = Some(face);
        Ok(())
    }

    fn transform_in(&mut self, set: &mut MoveSet, root: ObjId, t: &Transform) -> Result<Invalidation> {
        if !self.contains(root) {
            return Err(TreeError::Missing { kind: root.kind() });
        }
        let mut moved = HashSet::new();
        self.apply(set, root, t, &mut moved)?;
        let inv = self.invalidate_dependents(&moved);
        self.refresh_planes(&inv.faces, set);
        Ok(inv)
    }

    fn apply(
        &mut self,
        set: &mut MoveSet,
        obj: ObjId,
        t: &Transform,
        moved: &mut HashSet<PointId>,
    ) -> Result<()> {
        match obj {
            ObjId::Point(p) => {
                if set.points.insert(p) {
                    let point = self.points.get_mut(p).ok_or(TreeError::Missing {
                        kind: ObjKind::Point,
                    })?;
                    point.pos = t.apply_point(&point.pos);
                    moved.insert(p);
                }
            }
            ObjId::Edge(e) => {
                if !set.edges.insert(e) {
                    return Ok(());
                }
                let edge = self.edges.get_mut(e).ok_or(TreeError::Missing {
                    kind: ObjKind::Edge,
                })?;
                if let EdgeKind::Arc {
                    normal, clockwise, ..
                } = &mut edge.kind
                {
                    if !t.is_translation() {
                        let n = t.apply_normal(normal);
                        if n.norm() > 1e-12 {
                            *normal = n.normalize();
                        }
                        if t.mirrors() {
                            *clockwise = !*clockwise;
                        }
                    }
                }
                for p in edge.points() {
                    self.apply(set, ObjId::Point(p), t, moved)?;
                }
            }
            ObjId::Face(f) => {
                if !set.faces.insert(f) {
                    return Ok(());
                }
                let face = self.faces.get_mut(f).ok_or(TreeError::Missing {
                    kind: ObjKind::Face,
                })?;
                face.plane = face.plane.transform(t);
                let edges = face.edges.clone();
                let initial = face.initial_point;
                for e in edges {
                    self.apply(set, ObjId::Edge(e), t, moved)?;
                }
                if let Some(p) = initial {
                    self.apply(set, ObjId::Point(p), t, moved)?;
                }
                let attached: Vec<VolumeId> = self
                    .volumes
                    .iter()
                    .filter(|(_, v)| v.attached_to == Some(f))
                    .map(|(id, _)| id)
                    .collect();
                for v in attached {
                    self.apply(set, ObjId::Volume(v), t, moved)?;
                }
            }
            ObjId::Volume(v) => {
                if !set.volumes.insert(v) {
                    return Ok(());
                }
                let faces = self.volume(v)?.faces.clone();
                for f in faces {
                    self.apply(set, ObjId::Face(f), t, moved)?;
                }
            }
        }
        Ok(())
    }

    /// Refit the planes of planar faces deformed by a partial move.
    fn refresh_planes(&mut self, faces: &[FaceId], set: &MoveSet) {
        for &f in faces {
            if set.faces.contains(&f) {
                continue;
            }
            let Some(face) = self.faces.get(f) else {
                continue;
            };
            if !face.kind.is_planar() || !face.plane.has_normal() {
                continue;
            }
            let fitted = self
                .face_loop(f)
                .and_then(|order| self.loop_samples(&order))
                .ok()
                .and_then(|samples| Plane::from_points(&samples));
            if let Some(plane) = fitted {
                self.faces[f].plane = plane;
            }
        }
    }
}
