//! Deep copy preserving sharing.
//!
//! A [`CopyMap`] records, per kind, the duplicate made for each original.
//! Every original reached again during the same copy resolves to its
//! recorded duplicate, so objects shared inside the copied subtree stay
//! shared in the copy. The map lives for one operation (or one group of
//! roots copied with [`Tree::copy_obj_in`]) and never touches object headers.

use std::collections::{HashMap, HashSet};

use prism_math::Vec3;
use tracing::debug;

use crate::error::{Result, TreeError};
use crate::ids::{EdgeId, FaceId, ObjId, ObjKind, PointId, VolumeId};
use crate::object::{Edge, EdgeKind, EdgeView, Face, FaceView, Header, Volume};
use crate::tree::Tree;

/// Original → duplicate tables for one copy operation.
#[derive(Debug, Default)]
pub struct CopyMap {
    offset: Option<Vec3>,
    points: HashMap<PointId, PointId>,
    edges: HashMap<EdgeId, EdgeId>,
    faces: HashMap<FaceId, FaceId>,
    volumes: HashMap<VolumeId, VolumeId>,
}

impl CopyMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Duplicate recorded for `original`, if any.
    pub fn forward(&self, original: ObjId) -> Option<ObjId> {
        match original {
            ObjId::Point(p) => self.points.get(&p).map(|&d| ObjId::Point(d)),
            ObjId::Edge(e) => self.edges.get(&e).map(|&d| ObjId::Edge(d)),
            ObjId::Face(f) => self.faces.get(&f).map(|&d| ObjId::Face(d)),
            ObjId::Volume(v) => self.volumes.get(&v).map(|&d| ObjId::Volume(d)),
        }
    }

    /// Duplicate of a point.
    pub fn point(&self, original: PointId) -> Option<PointId> {
        self.points.get(&original).copied()
    }

    /// Duplicate of an edge.
    pub fn edge(&self, original: EdgeId) -> Option<EdgeId> {
        self.edges.get(&original).copied()
    }

    /// Duplicate of a face.
    pub fn face(&self, original: FaceId) -> Option<FaceId> {
        self.faces.get(&original).copied()
    }

    /// Number of recorded duplicates.
    pub fn len(&self) -> usize {
        self.points.len() + self.edges.len() + self.faces.len() + self.volumes.len()
    }

    /// True when nothing has been copied through this map.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every forwarding entry and the recorded offset.
    pub fn clear_move_copy_flags(&mut self) {
        self.offset = None;
        self.points.clear();
        self.edges.clear();
        self.faces.clear();
        self.volumes.clear();
    }

    fn bind_offset(&mut self, offset: Vec3) -> Result<()> {
        match self.offset {
            Some(expected) if (expected - offset).norm() > 1e-12 => Err(TreeError::OffsetMismatch {
                expected: expected.into(),
                found: offset.into(),
            }),
            Some(_) => Ok(()),
            None => {
                self.offset = Some(offset);
                Ok(())
            }
        }
    }
}

impl Tree {
    /// Deep-copy `root`, translating every point by `offset`.
    ///
    /// The copy is unlinked and its view lists are invalid. Pairs between
    /// copied faces are carried over; pairs leading outside the copy and
    /// volume attachments are not.
    pub fn copy_obj(&mut self, root: ObjId, offset: Vec3) -> Result<ObjId> {
        let mut map = CopyMap::new();
        let copy = self.copy_obj_in(&mut map, root, offset)?;
        debug!(kind = %root.kind(), objects = map.len(), "copied subtree");
        map.clear_move_copy_flags();
        Ok(copy)
    }

    /// Copy `root` through a caller-held map, so several roots copied with
    /// the same map share their common sub-objects.
    ///
    /// The map records the first offset and refuses a different one.
    pub fn copy_obj_in(&mut self, map: &mut CopyMap, root: ObjId, offset: Vec3) -> Result<ObjId> {
        if !self.contains(root) {
            return Err(TreeError::Missing { kind: root.kind() });
        }
        map.bind_offset(offset)?;
        let copy = match root {
            ObjId::Point(p) => ObjId::Point(self.copy_point(map, p, &offset)?),
            ObjId::Edge(e) => ObjId::Edge(self.copy_edge(map, e, &offset)?),
            ObjId::Face(f) => ObjId::Face(self.copy_face(map, f, &offset, false)?),
            ObjId::Volume(v) => ObjId::Volume(self.copy_volume(map, v, &offset)?),
        };
        self.remap_pairs(map);
        Ok(copy)
    }

    /// Duplicate a face with reversed winding and negated normal.
    ///
    /// Shared points and edges resolve through `map`, so a reversed clone of
    /// a face and clones of its neighbours stay connected.
    pub fn clone_face_reverse(
        &mut self,
        map: &mut CopyMap,
        face: FaceId,
        offset: Vec3,
    ) -> Result<FaceId> {
        map.bind_offset(offset)?;
        let copy = self.copy_face(map, face, &offset, true)?;
        self.remap_pairs(map);
        Ok(copy)
    }

    /// Reverse a face's winding in place.
    pub fn flip_face(&mut self, face: FaceId) -> Result<()> {
        let f = self.faces.get_mut(face).ok_or(TreeError::Missing {
            kind: ObjKind::Face,
        })?;
        f.edges.reverse();
        f.plane = f.plane.reversed();
        f.view.valid = false;
        Ok(())
    }

    fn copy_point(&mut self, map: &mut CopyMap, p: PointId, offset: &Vec3) -> Result<PointId> {
        if let Some(dup) = map.point(p) {
            return Ok(dup);
        }
        let pos = self.pos(p)? + offset;
        let dup = self.add_point(pos);
        map.points.insert(p, dup);
        Ok(dup)
    }

    fn copy_edge(&mut self, map: &mut CopyMap, e: EdgeId, offset: &Vec3) -> Result<EdgeId> {
        if let Some(dup) = map.edge(e) {
            return Ok(dup);
        }
        let original = self.edge(e)?.clone();
        let endpoints = [
            self.copy_point(map, original.endpoints[0], offset)?,
            self.copy_point(map, original.endpoints[1], offset)?,
        ];
        let kind = match original.kind {
            EdgeKind::Straight => EdgeKind::Straight,
            EdgeKind::Arc {
                centre,
                normal,
                clockwise,
            } => EdgeKind::Arc {
                centre: self.copy_point(map, centre, offset)?,
                normal,
                clockwise,
            },
            EdgeKind::Bezier { ctrl } => EdgeKind::Bezier {
                ctrl: [
                    self.copy_point(map, ctrl[0], offset)?,
                    self.copy_point(map, ctrl[1], offset)?,
                ],
            },
        };
        let dup = self.edges.insert(Edge {
            header: Header::default(),
            kind,
            construction: original.construction,
            endpoints,
            step: original.step,
            view: EdgeView::default(),
        });
        map.edges.insert(e, dup);
        Ok(dup)
    }

    fn copy_face(
        &mut self,
        map: &mut CopyMap,
        f: FaceId,
        offset: &Vec3,
        reverse: bool,
    ) -> Result<FaceId> {
        if let Some(dup) = map.face(f) {
            return Ok(dup);
        }
        let original = self.face(f)?.clone();
        let mut edges = original
            .edges
            .iter()
            .map(|&e| self.copy_edge(map, e, offset))
            .collect::<Result<Vec<_>>>()?;
        let initial_point = original
            .initial_point
            .map(|p| self.copy_point(map, p, offset))
            .transpose()?;
        let mut plane = original.plane;
        plane.origin += offset;
        if reverse {
            edges.reverse();
            plane = plane.reversed();
        }
        let dup = self.faces.insert(Face {
            header: Header::default(),
            kind: original.kind,
            edges,
            plane,
            volume: None,
            pair: original.pair,
            initial_point,
            view: FaceView::default(),
        });
        map.faces.insert(f, dup);
        Ok(dup)
    }

    fn copy_volume(&mut self, map: &mut CopyMap, v: VolumeId, offset: &Vec3) -> Result<VolumeId> {
        if let Some(&dup) = map.volumes.get(&v) {
            return Ok(dup);
        }
        let faces = self.volume(v)?.faces.clone();
        let dup = self.volumes.insert(Volume::default());
        map.volumes.insert(v, dup);
        for f in faces {
            let face = self.copy_face(map, f, offset, false)?;
            self.faces[face].volume = Some(dup);
            self.volumes[dup].faces.push(face);
        }
        Ok(dup)
    }

    /// Point copied faces' pairs at the copied partners, or drop them.
    fn remap_pairs(&mut self, map: &CopyMap) {
        let dups: HashSet<FaceId> = map.faces.values().copied().collect();
        let mut backlinks = Vec::new();
        for &dup in &dups {
            let Some(face) = self.faces.get_mut(dup) else {
                continue;
            };
            match face.pair {
                Some(pair) if dups.contains(&pair) => {}
                Some(pair) => {
                    face.pair = map.faces.get(&pair).copied();
                    if let Some(partner) = face.pair {
                        backlinks.push((partner, dup));
                    }
                }
                None => {}
            }
        }
        // A partner copied before this face dropped its pair; restore it.
        for (face, partner) in backlinks {
            if let Some(f) = self.faces.get_mut(face) {
                if f.pair.is_none() {
                    f.pair = Some(partner);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FaceKind;
    use crate::tree::List;
    use prism_math::{Plane, Point3};

    #[test]
    fn test_copy_point_translates() {
        let mut tree = Tree::new();
        let p = tree.add_point(Point3::new(1.0, 2.0, 3.0));
        let ObjId::Point(c) = tree.copy_obj(p.into(), Vec3::new(1.0, 0.0, 0.0)).unwrap() else {
            panic!("expected a point");
        };
        assert_ne!(c, p);
        assert_eq!(tree.pos(c).unwrap(), Point3::new(2.0, 2.0, 3.0));
        assert_eq!(tree.pos(p).unwrap(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_two_faces_sharing_an_edge_stay_connected() {
        let mut tree = Tree::new();
        let a = tree.add_point(Point3::new(0.0, 0.0, 0.0));
        let b = tree.add_point(Point3::new(1.0, 0.0, 0.0));
        let c = tree.add_point(Point3::new(0.0, 1.0, 0.0));
        let d = tree.add_point(Point3::new(1.0, -1.0, 0.0));
        let ab = tree.add_straight_edge(a, b).unwrap();
        let bc = tree.add_straight_edge(b, c).unwrap();
        let ca = tree.add_straight_edge(c, a).unwrap();
        let bd = tree.add_straight_edge(b, d).unwrap();
        let da = tree.add_straight_edge(d, a).unwrap();
        let f1 = tree.add_face(FaceKind::Flat, vec![ab, bc, ca], Plane::xy()).unwrap();
        let f2 = tree.add_face(FaceKind::Flat, vec![bd, da, ab], Plane::xy()).unwrap();
        let v = tree.add_volume();
        tree.link_tail(f1.into(), List::Volume(v)).unwrap();
        tree.link_tail(f2.into(), List::Volume(v)).unwrap();

        let before = (tree.points.len(), tree.edges.len());
        let ObjId::Volume(cv) = tree.copy_obj(v.into(), Vec3::zeros()).unwrap() else {
            panic!("expected a volume");
        };
        assert_eq!(tree.points.len() - before.0, 4);
        assert_eq!(tree.edges.len() - before.1, 5);

        let faces = &tree.volume(cv).unwrap().faces;
        let g1 = tree.face(faces[0]).unwrap();
        let g2 = tree.face(faces[1]).unwrap();
        // The shared edge is one duplicate referenced by both copied faces.
        assert_eq!(g1.edges[0], g2.edges[2]);
        assert_ne!(g1.edges[0], ab);
        assert_eq!(g1.volume, Some(cv));
    }

    #[test]
    fn test_multi_root_copy_shares_through_map() {
        let mut tree = Tree::new();
        let a = tree.add_point(Point3::origin());
        let b = tree.add_point(Point3::new(1.0, 0.0, 0.0));
        let c = tree.add_point(Point3::new(2.0, 0.0, 0.0));
        let ab = tree.add_straight_edge(a, b).unwrap();
        let bc = tree.add_straight_edge(b, c).unwrap();

        let mut map = CopyMap::new();
        let offset = Vec3::new(0.0, 1.0, 0.0);
        let ObjId::Edge(ab2) = tree.copy_obj_in(&mut map, ab.into(), offset).unwrap() else {
            panic!()
        };
        let ObjId::Edge(bc2) = tree.copy_obj_in(&mut map, bc.into(), offset).unwrap() else {
            panic!()
        };
        assert_eq!(tree.edges[ab2].endpoints[1], tree.edges[bc2].endpoints[0]);

        let err = tree
            .copy_obj_in(&mut map, bc.into(), Vec3::new(5.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, TreeError::OffsetMismatch { .. }));

        map.clear_move_copy_flags();
        assert!(map.is_empty());
        assert_eq!(map.forward(b.into()), None);
    }

    #[test]
    fn test_separate_copies_do_not_reuse_duplicates() {
        let mut tree = Tree::new();
        let p = tree.add_point(Point3::origin());
        let first = tree.copy_obj(p.into(), Vec3::zeros()).unwrap();
        let second = tree.copy_obj(p.into(), Vec3::zeros()).unwrap();
        assert_ne!(first, second);
        let distinct: HashSet<_> = [ObjId::Point(p), first, second].into_iter().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_clone_face_reverse() {
        let mut tree = Tree::new();
        let p: Vec<PointId> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]
            .iter()
            .map(|&(x, y)| tree.add_point(Point3::new(x, y, 0.0)))
            .collect();
        let e = [
            tree.add_straight_edge(p[0], p[1]).unwrap(),
            tree.add_straight_edge(p[1], p[2]).unwrap(),
            tree.add_straight_edge(p[2], p[0]).unwrap(),
        ];
        let f = tree.add_face(FaceKind::Flat, e.to_vec(), Plane::xy()).unwrap();

        let mut map = CopyMap::new();
        let offset = Vec3::new(0.0, 0.0, 2.0);
        let r = tree.clone_face_reverse(&mut map, f, offset).unwrap();
        let rf = tree.face(r).unwrap();
        assert_eq!(rf.plane.normal, -Vec3::z());
        assert_eq!(rf.plane.origin.z, 2.0);
        let expected: Vec<EdgeId> = e.iter().rev().map(|&x| map.edge(x).unwrap()).collect();
        assert_eq!(rf.edges, expected);
        assert_eq!(rf.initial_point, map.point(p[0]));
    }

    #[test]
    fn test_pairs_inside_copy_are_remapped() {
        let mut tree = Tree::new();
        let mk = |tree: &mut Tree, z: f64| {
            let a = tree.add_point(Point3::new(0.0, 0.0, z));
            let b = tree.add_point(Point3::new(1.0, 0.0, z));
            let c = tree.add_point(Point3::new(0.0, 1.0, z));
            let edges = vec![
                tree.add_straight_edge(a, b).unwrap(),
                tree.add_straight_edge(b, c).unwrap(),
                tree.add_straight_edge(c, a).unwrap(),
            ];
            tree.add_face(FaceKind::Flat, edges, Plane::xy()).unwrap()
        };
        let bottom = mk(&mut tree, 0.0);
        let top = mk(&mut tree, 1.0);
        tree.faces[bottom].pair = Some(top);
        tree.faces[top].pair = Some(bottom);
        let v = tree.add_volume();
        tree.link_tail(bottom.into(), List::Volume(v)).unwrap();
        tree.link_tail(top.into(), List::Volume(v)).unwrap();

        let ObjId::Volume(cv) = tree.copy_obj(v.into(), Vec3::zeros()).unwrap() else {
            panic!()
        };
        let faces = tree.volume(cv).unwrap().faces.clone();
        assert_eq!(tree.faces[faces[0]].pair, Some(faces[1]));
        assert_eq!(tree.faces[faces[1]].pair, Some(faces[0]));

        // Copying one face alone drops its pair.
        let ObjId::Face(lone) = tree.copy_obj(bottom.into(), Vec3::zeros()).unwrap() else {
            panic!()
        };
        assert_eq!(tree.faces[lone].pair, None);
    }
}
