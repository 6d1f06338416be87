//! Construction of faces and extruded volumes.

use std::collections::HashMap;

use prism_math::{Plane, Point3, Vec3};
use tracing::info;

use crate::copy::CopyMap;
use crate::error::{Result, TreeError};
use crate::ids::{EdgeId, FaceId, ObjId, ObjKind, PointId, VolumeId};
use crate::object::{EdgeKind, FaceKind};
use crate::tree::{List, Tree};

impl Tree {
    /// Draw a rectangle with corners `origin`, `origin + u`, `origin + u + v`
    /// and `origin + v`, facing `u × v`, and link it at the top-level tail.
    pub fn make_rect(&mut self, origin: Point3, u: Vec3, v: Vec3) -> Result<FaceId> {
        let normal = u.cross(&v);
        if normal.norm() < 1e-12 {
            return Err(TreeError::Degenerate("rectangle sides are parallel".into()));
        }
        let corners = [origin, origin + u, origin + u + v, origin + v];
        let points: Vec<PointId> = corners.iter().map(|&c| self.add_point(c)).collect();
        let edges = (0..4)
            .map(|i| self.add_straight_edge(points[i], points[(i + 1) % 4]))
            .collect::<Result<Vec<_>>>()?;
        let centre = origin + (u + v) * 0.5;
        let face = self.add_face(FaceKind::Rect, edges, Plane::new(centre, normal))?;
        self.link_tail(ObjId::Face(face), List::Top)?;
        Ok(face)
    }

    /// Draw a full circle about `centre` facing `normal` and link it at the
    /// top-level tail.
    pub fn make_circle(&mut self, centre: Point3, radius: f64, normal: Vec3) -> Result<FaceId> {
        if radius <= 0.0 || normal.norm() < 1e-12 {
            return Err(TreeError::Degenerate(format!("circle of radius {radius}")));
        }
        let plane = Plane::new(centre, normal);
        let (x, _) = plane.basis();
        let c = self.add_point(centre);
        let start = self.add_point(centre + x * radius);
        let arc = self.add_arc_edge(start, start, c, plane.normal, false)?;
        let face = self.add_face(FaceKind::Circle, vec![arc], plane)?;
        self.link_tail(ObjId::Face(face), List::Top)?;
        Ok(face)
    }

    /// Draw a closed polygon through `corners` and link it at the top-level
    /// tail. The plane follows the corner order.
    pub fn make_polygon(&mut self, corners: &[Point3]) -> Result<FaceId> {
        let plane = Plane::from_points(corners)
            .ok_or_else(|| TreeError::Degenerate("polygon has no area".into()))?;
        let n = corners.len();
        let points: Vec<PointId> = corners.iter().map(|&c| self.add_point(c)).collect();
        let edges = (0..n)
            .map(|i| self.add_straight_edge(points[i], points[(i + 1) % n]))
            .collect::<Result<Vec<_>>>()?;
        let face = self.add_face(FaceKind::Flat, edges, plane)?;
        self.link_tail(ObjId::Face(face), List::Top)?;
        Ok(face)
    }

    /// Extrude a loose planar face along its normal into a volume.
    ///
    /// The face becomes one cap; the other cap is its reversed clone moved
    /// by `normal * distance`. One side face is built per boundary edge
    /// (`Rect` for straight edges, `Cylinder` for arcs, `General` for
    /// beziers) and neighbouring sides share their connecting edge. Both caps
    /// face outwards and are paired. The volume takes the face's place in
    /// the top-level list.
    pub fn extrude_face(&mut self, face: FaceId, distance: f64) -> Result<VolumeId> {
        let f = self.face(face)?;
        let ident = f.header.ident;
        if !f.kind.is_planar() || f.volume.is_some() {
            return Err(TreeError::NotFlat {
                ident,
                face: f.kind,
            });
        }
        if !f.plane.has_normal() {
            return Err(TreeError::Degenerate(format!("face #{ident} has no normal")));
        }
        if distance.abs() < 1e-12 {
            return Err(TreeError::ZeroExtrusion);
        }
        let offset = f.plane.normal * distance;
        // Nothing is touched until the boundary is known to close.
        self.face_loop(face)?;

        // The base must face away from the solid.
        if distance > 0.0 {
            self.flip_face(face)?;
        }
        let mut map = CopyMap::new();
        let top = self.clone_face_reverse(&mut map, face, offset)?;
        let base_loop = self.face_loop(face)?;

        let mut risers: HashMap<PointId, EdgeId> = HashMap::new();
        let mut sides = Vec::with_capacity(base_loop.len());
        for step in &base_loop {
            let edge = self.edge(step.edge)?.clone();
            let (a, b) = (step.start(&edge), step.end(&edge));
            let riser_a = self.riser(&mut risers, &map, a)?;
            let riser_b = self.riser(&mut risers, &map, b)?;
            let copied = map.edge(step.edge).ok_or(TreeError::Missing {
                kind: ObjKind::Edge,
            })?;

            let corners = [
                self.pos(b)?,
                self.pos(a)?,
                self.pos(a)? + offset,
                self.pos(b)? + offset,
            ];
            let (kind, plane) = match edge.kind {
                EdgeKind::Straight => (
                    FaceKind::Rect,
                    Plane::from_points(&corners).unwrap_or_default(),
                ),
                EdgeKind::Arc { centre, normal, .. } => {
                    (FaceKind::Cylinder, Plane::new(self.pos(centre)?, normal))
                }
                EdgeKind::Bezier { .. } => (
                    FaceKind::General,
                    Plane::from_points(&corners).unwrap_or_default(),
                ),
            };
            // Walked b → a → a' → b', opposite to the base.
            let side = self.add_face(kind, vec![step.edge, riser_a, copied, riser_b], plane)?;
            self.faces[side].initial_point = Some(b);
            sides.push(side);
        }

        let volume = self.add_volume();
        if !self.replace_top(ObjId::Face(face), ObjId::Volume(volume)) {
            self.link_tail(ObjId::Volume(volume), List::Top)?;
        }
        for f in [face, top].into_iter().chain(sides) {
            self.link_tail(ObjId::Face(f), List::Volume(volume))?;
        }
        self.faces[face].pair = Some(top);
        self.faces[top].pair = Some(face);

        info!(
            faces = self.volume(volume)?.faces.len(),
            edges = risers.len() + 2 * base_loop.len(),
            distance,
            "extruded face"
        );
        Ok(volume)
    }

    /// The vertical edge from `base` to its copy, created on first use.
    fn riser(
        &mut self,
        risers: &mut HashMap<PointId, EdgeId>,
        map: &CopyMap,
        base: PointId,
    ) -> Result<EdgeId> {
        if let Some(&e) = risers.get(&base) {
            return Ok(e);
        }
        let lifted = map.point(base).ok_or(TreeError::Missing {
            kind: ObjKind::Point,
        })?;
        let e = self.add_straight_edge(base, lifted)?;
        risers.insert(base, e);
        Ok(e)
    }
}
