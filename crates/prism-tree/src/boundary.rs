//! Ordered traversal of face boundaries.
//!
//! The traversal starts at the face's initial point and chains edges by
//! shared endpoints, preferring the next edge in array order when several
//! continue the chain. For planar faces with a normal, the direction then
//! follows the right-hand rule about the plane normal: if the chained loop
//! winds clockwise seen from the normal side, it is reversed. Faces without
//! a normal, and ruled faces, keep the chained direction.

use prism_math::{newell_normal, Point3};

use crate::error::{Result, TreeError};
use crate::ids::{EdgeId, FaceId, PointId};
use crate::object::Edge;
use crate::tree::Tree;

/// One step of a boundary traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopEdge {
    /// The edge.
    pub edge: EdgeId,
    /// True when the edge is walked from its second endpoint to its first.
    pub reversed: bool,
}

impl LoopEdge {
    /// Point where this step begins.
    pub fn start(&self, edge: &Edge) -> PointId {
        edge.endpoints[usize::from(self.reversed)]
    }

    /// Point where this step ends.
    pub fn end(&self, edge: &Edge) -> PointId {
        edge.endpoints[usize::from(!self.reversed)]
    }

    /// Edge parameter at traversal fraction `t`.
    pub fn param(&self, t: f64) -> f64 {
        if self.reversed {
            1.0 - t
        } else {
            t
        }
    }
}

impl Tree {
    /// Ordered, closed traversal of a face's boundary.
    pub fn face_loop(&self, face: FaceId) -> Result<Vec<LoopEdge>> {
        let f = self.face(face)?;
        let open = || TreeError::OpenLoop {
            ident: f.header.ident,
        };
        let start = match f.initial_point {
            Some(p) => p,
            None => self.default_start(&f.edges).ok_or_else(open)?,
        };

        let n = f.edges.len();
        let mut used = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut cur = start;
        let mut next = 0;
        for _ in 0..n {
            let mut found = None;
            for k in 0..n {
                let j = (next + k) % n;
                if used[j] {
                    continue;
                }
                let edge = self.edge(f.edges[j])?;
                if edge.endpoints[0] == cur {
                    found = Some((j, false, edge.endpoints[1]));
                    break;
                }
                if edge.endpoints[1] == cur {
                    found = Some((j, true, edge.endpoints[0]));
                    break;
                }
            }
            let (j, reversed, end) = found.ok_or_else(open)?;
            used[j] = true;
            order.push(LoopEdge {
                edge: f.edges[j],
                reversed,
            });
            cur = end;
            next = j + 1;
        }
        if cur != start {
            return Err(open());
        }

        if f.kind.is_planar() && f.plane.has_normal() {
            let winding = newell_normal(&self.loop_samples(&order)?);
            if winding.dot(&f.plane.normal) < 0.0 {
                reverse_loop(&mut order);
            }
        }
        Ok(order)
    }

    /// Sample points along a traversal: every step's start point plus the
    /// quarter points of curved edges. Enough to fix the winding of any
    /// loop, including a single full circle.
    pub fn loop_samples(&self, order: &[LoopEdge]) -> Result<Vec<Point3>> {
        let mut out = Vec::with_capacity(order.len() * 2);
        for step in order {
            let edge = self.edge(step.edge)?;
            out.push(self.pos(step.start(edge))?);
            if edge.kind.is_curved() {
                for t in [0.25, 0.5, 0.75] {
                    out.push(self.edge_point_at(edge, step.param(t))?);
                }
            }
        }
        Ok(out)
    }

    /// Loop vertices in traversal order (the start point of each step).
    pub fn loop_points(&self, order: &[LoopEdge]) -> Result<Vec<PointId>> {
        order
            .iter()
            .map(|step| Ok(step.start(self.edge(step.edge)?)))
            .collect()
    }
}

fn reverse_loop(order: &mut [LoopEdge]) {
    order.reverse();
    for step in order.iter_mut() {
        step.reversed = !step.reversed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FaceKind;
    use prism_math::{Plane, Vec3};

    /// Unit square with edges stored in a scrambled order and directions.
    fn scrambled_square(tree: &mut Tree, normal: Vec3) -> (FaceId, [PointId; 4]) {
        let p = [
            tree.add_point(Point3::new(0.0, 0.0, 0.0)),
            tree.add_point(Point3::new(1.0, 0.0, 0.0)),
            tree.add_point(Point3::new(1.0, 1.0, 0.0)),
            tree.add_point(Point3::new(0.0, 1.0, 0.0)),
        ];
        let e01 = tree.add_straight_edge(p[0], p[1]).unwrap();
        let e21 = tree.add_straight_edge(p[2], p[1]).unwrap();
        let e30 = tree.add_straight_edge(p[3], p[0]).unwrap();
        let e23 = tree.add_straight_edge(p[2], p[3]).unwrap();
        let f = tree
            .add_face(
                FaceKind::Flat,
                vec![e01, e30, e21, e23],
                Plane::new(Point3::origin(), normal),
            )
            .unwrap();
        tree.faces[f].initial_point = Some(p[0]);
        (f, p)
    }

    #[test]
    fn test_loop_follows_normal_counter_clockwise() {
        let mut tree = Tree::new();
        let (f, p) = scrambled_square(&mut tree, Vec3::z());
        let order = tree.face_loop(f).unwrap();
        assert_eq!(tree.loop_points(&order).unwrap(), vec![p[0], p[1], p[2], p[3]]);
    }

    #[test]
    fn test_loop_reverses_for_opposite_normal() {
        let mut tree = Tree::new();
        let (f, p) = scrambled_square(&mut tree, -Vec3::z());
        let order = tree.face_loop(f).unwrap();
        // Same start, clockwise seen from +Z.
        assert_eq!(tree.loop_points(&order).unwrap(), vec![p[0], p[3], p[2], p[1]]);
    }

    #[test]
    fn test_loop_without_normal_keeps_array_preference() {
        let mut tree = Tree::new();
        let (f, p) = scrambled_square(&mut tree, Vec3::zeros());
        let order = tree.face_loop(f).unwrap();
        // Edge 0 (p0 → p1) is the first edge touching the start point.
        assert!(!order[0].reversed);
        assert_eq!(tree.loop_points(&order).unwrap(), vec![p[0], p[1], p[2], p[3]]);
    }

    #[test]
    fn test_loop_is_stable_across_edge_reordering() {
        let mut tree = Tree::new();
        let (f, _) = scrambled_square(&mut tree, Vec3::z());
        let before = tree.loop_points(&tree.face_loop(f).unwrap()).unwrap();
        tree.faces[f].edges.rotate_left(2);
        let after = tree.loop_points(&tree.face_loop(f).unwrap()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_open_loop_is_reported() {
        let mut tree = Tree::new();
        let a = tree.add_point(Point3::origin());
        let b = tree.add_point(Point3::new(1.0, 0.0, 0.0));
        let c = tree.add_point(Point3::new(1.0, 1.0, 0.0));
        let ab = tree.add_straight_edge(a, b).unwrap();
        let bc = tree.add_straight_edge(b, c).unwrap();
        let f = tree
            .add_face(FaceKind::Flat, vec![ab, bc], Plane::xy())
            .unwrap();
        assert!(matches!(tree.face_loop(f), Err(TreeError::OpenLoop { .. })));
    }

    #[test]
    fn test_full_circle_winding() {
        let mut tree = Tree::new();
        let centre = tree.add_point(Point3::origin());
        let start = tree.add_point(Point3::new(1.0, 0.0, 0.0));
        // Clockwise about +Z, on a face whose normal is +Z.
        let arc = tree
            .add_arc_edge(start, start, centre, Vec3::z(), true)
            .unwrap();
        let f = tree
            .add_face(FaceKind::Circle, vec![arc], Plane::xy())
            .unwrap();
        let order = tree.face_loop(f).unwrap();
        assert_eq!(order.len(), 1);
        assert!(order[0].reversed);
        let samples = tree.loop_samples(&order).unwrap();
        assert!(newell_normal(&samples).z > 0.0);
    }
}
