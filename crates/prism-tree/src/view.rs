//! View-list cache invalidation.
//!
//! Each edge and face carries a cached display list with a validity flag.
//! Edits clear the flag on every edge and face whose geometry depends on a
//! changed point; regeneration happens lazily in the tessellator.

use std::collections::HashSet;

use slotmap::SlotMap;

use crate::ids::{EdgeId, FaceId, ObjId, PointId};
use crate::object::Edge;
use crate::tree::Tree;

/// Edges and faces whose view lists were invalidated by one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Invalidated edges, in walk order.
    pub edges: Vec<EdgeId>,
    /// Invalidated faces, in walk order.
    pub faces: Vec<FaceId>,
}

impl Invalidation {
    /// True when nothing was invalidated.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.faces.is_empty()
    }

    /// Total number of invalidated objects.
    pub fn len(&self) -> usize {
        self.edges.len() + self.faces.len()
    }
}

fn edge_depends(edges: &SlotMap<EdgeId, Edge>, edge: EdgeId, points: &HashSet<PointId>) -> bool {
    edges
        .get(edge)
        .is_some_and(|e| e.points().iter().any(|p| points.contains(p)))
}

impl Tree {
    /// Invalidate every edge and face under `parent` whose geometry depends
    /// on a point reachable from `changed`.
    ///
    /// Dependency is by point, not by path: a shared point invalidates every
    /// edge and face referencing it, whichever route reached it.
    pub fn invalidate_all_view_lists(&mut self, parent: ObjId, changed: ObjId) -> Invalidation {
        let points = self.reachable_points(changed);
        let scope = self.subtree(parent);
        self.invalidate_in(&scope, &points)
    }

    /// Invalidate dependents of `points` anywhere in the tree, including
    /// unlinked objects.
    pub fn invalidate_dependents(&mut self, points: &HashSet<PointId>) -> Invalidation {
        let scope: Vec<ObjId> = self
            .edges
            .keys()
            .map(ObjId::Edge)
            .chain(self.faces.keys().map(ObjId::Face))
            .collect();
        self.invalidate_in(&scope, points)
    }

    fn invalidate_in(&mut self, scope: &[ObjId], points: &HashSet<PointId>) -> Invalidation {
        let mut out = Invalidation::default();
        if points.is_empty() {
            return out;
        }
        for &obj in scope {
            if let ObjId::Edge(e) = obj {
                if edge_depends(&self.edges, e, points) {
                    self.edges[e].view.valid = false;
                    out.edges.push(e);
                }
            }
        }
        let edges = &self.edges;
        for &obj in scope {
            let ObjId::Face(f) = obj else {
                continue;
            };
            let Some(face) = self.faces.get_mut(f) else {
                continue;
            };
            let depends = face.initial_point.is_some_and(|p| points.contains(&p))
                || face.edges.iter().any(|&e| edge_depends(edges, e, points));
            if depends {
                face.view.valid = false;
                out.faces.push(f);
            }
        }
        out
    }

    /// Mark one face's view list stale.
    pub fn invalidate_face(&mut self, face: FaceId) {
        if let Some(f) = self.faces.get_mut(face) {
            f.view.valid = false;
        }
    }

    /// Whether the cached view of an edge or face is current. Points and
    /// volumes have no view of their own.
    pub fn view_valid(&self, obj: ObjId) -> bool {
        match obj {
            ObjId::Edge(e) => self.edges.get(e).is_some_and(|e| e.view.valid),
            ObjId::Face(f) => self.faces.get(f).is_some_and(|f| f.view.valid),
            ObjId::Point(_) | ObjId::Volume(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FaceKind;
    use crate::tree::List;
    use prism_math::{Plane, Point3};

    /// Two squares sharing the edge p1-p2, inside one volume.
    fn domino(tree: &mut Tree) -> (ObjId, [FaceId; 2], Vec<PointId>, Vec<EdgeId>) {
        let p: Vec<PointId> = [
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (2.0, 0.0),
            (2.0, 1.0),
        ]
        .iter()
        .map(|&(x, y)| tree.add_point(Point3::new(x, y, 0.0)))
        .collect();
        let pairs = [(0, 1), (1, 2), (2, 3), (3, 0), (1, 4), (4, 5), (5, 2)];
        let e: Vec<EdgeId> = pairs
            .iter()
            .map(|&(a, b)| tree.add_straight_edge(p[a], p[b]).unwrap())
            .collect();
        let left = tree
            .add_face(FaceKind::Rect, vec![e[0], e[1], e[2], e[3]], Plane::xy())
            .unwrap();
        let right = tree
            .add_face(FaceKind::Rect, vec![e[4], e[5], e[6], e[1]], Plane::xy())
            .unwrap();
        let v = tree.add_volume();
        tree.link_tail(left.into(), List::Volume(v)).unwrap();
        tree.link_tail(right.into(), List::Volume(v)).unwrap();
        tree.link_tail(v.into(), List::Top).unwrap();
        for (_, edge) in tree.edges.iter_mut() {
            edge.view.valid = true;
        }
        for (_, face) in tree.faces.iter_mut() {
            face.view.valid = true;
        }
        (v.into(), [left, right], p, e)
    }

    #[test]
    fn test_shared_point_invalidates_every_holder() {
        let mut tree = Tree::new();
        let (v, [left, right], p, e) = domino(&mut tree);
        // Reached through the left face only, but shared with the right.
        let inv = tree.invalidate_all_view_lists(v, p[2].into());
        let edges: HashSet<_> = inv.edges.iter().copied().collect();
        assert_eq!(edges, HashSet::from([e[1], e[2], e[6]]));
        assert_eq!(inv.faces.len(), 2);
        assert!(!tree.view_valid(left.into()));
        assert!(!tree.view_valid(right.into()));
        assert!(tree.view_valid(e[0].into()));
        assert!(tree.view_valid(e[5].into()));
    }

    #[test]
    fn test_unrelated_objects_stay_valid() {
        let mut tree = Tree::new();
        let (v, [left, right], p, e) = domino(&mut tree);
        let inv = tree.invalidate_all_view_lists(v, p[4].into());
        assert_eq!(inv.faces, vec![right]);
        assert!(tree.view_valid(left.into()));
        let edges: HashSet<_> = inv.edges.iter().copied().collect();
        assert_eq!(edges, HashSet::from([e[4], e[5]]));
    }

    #[test]
    fn test_scope_limits_invalidation() {
        let mut tree = Tree::new();
        let (_, [left, right], p, _) = domino(&mut tree);
        // Only the right face is walked.
        let inv = tree.invalidate_all_view_lists(right.into(), p[1].into());
        assert_eq!(inv.faces, vec![right]);
        assert!(tree.view_valid(left.into()));
    }

    #[test]
    fn test_changed_edge_invalidates_through_its_points() {
        let mut tree = Tree::new();
        let (v, _, _, e) = domino(&mut tree);
        let inv = tree.invalidate_all_view_lists(v, e[1].into());
        // The shared edge's endpoints touch five of the seven edges.
        assert_eq!(inv.faces.len(), 2);
        assert_eq!(inv.edges.len(), 5);
    }
}
