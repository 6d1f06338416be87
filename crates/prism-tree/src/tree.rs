//! The object tree: arenas, the top-level list and structural operations.

use std::collections::HashSet;

use prism_math::{cubic_bezier, ArcGeom, Plane, Point3, Vec3};
use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::error::{Result, TreeError};
use crate::ids::{EdgeId, FaceId, ObjId, ObjKind, PointId, VolumeId};
use crate::lock::{allows, Granularity, LockLevel};
use crate::object::{Edge, EdgeKind, EdgeView, Face, FaceKind, FaceView, Header, Point, Volume};

/// A list an object can be linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum List {
    /// The tree's top-level list.
    Top,
    /// A volume's face list.
    Volume(VolumeId),
    /// A face's edge list.
    Face(FaceId),
}

impl List {
    fn name(self) -> &'static str {
        match self {
            List::Top => "top-level",
            List::Volume(_) => "volume",
            List::Face(_) => "face",
        }
    }
}

/// The object tree.
///
/// Objects live in per-kind arenas and reference each other by handle.
/// Points and edges may be shared; faces belong to at most one volume.
/// Ownership is expressed by the ordered lists: the top-level list, each
/// volume's faces and each face's edges.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Point arena.
    pub points: SlotMap<PointId, Point>,
    /// Edge arena.
    pub edges: SlotMap<EdgeId, Edge>,
    /// Face arena.
    pub faces: SlotMap<FaceId, Face>,
    /// Volume arena.
    pub volumes: SlotMap<VolumeId, Volume>,
    top: Vec<ObjId>,
    /// Current save pass; objects written in this pass carry the same value.
    pub save_count: u32,
    /// Next identity handed out by [`Tree::assign_ident`].
    pub next_ident: u32,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty tree.
    pub fn new() -> Self {
        Self {
            points: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            faces: SlotMap::with_key(),
            volumes: SlotMap::with_key(),
            top: Vec::new(),
            save_count: 1,
            next_ident: 1,
        }
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// The top-level list in order.
    pub fn top(&self) -> &[ObjId] {
        &self.top
    }

    /// True when `obj` is a member of the top-level list.
    pub fn is_top_level(&self, obj: ObjId) -> bool {
        self.top.contains(&obj)
    }

    /// True when `obj` resolves to a live object.
    pub fn contains(&self, obj: ObjId) -> bool {
        match obj {
            ObjId::Point(id) => self.points.contains_key(id),
            ObjId::Edge(id) => self.edges.contains_key(id),
            ObjId::Face(id) => self.faces.contains_key(id),
            ObjId::Volume(id) => self.volumes.contains_key(id),
        }
    }

    /// Number of live objects of every kind.
    pub fn len(&self) -> usize {
        self.points.len() + self.edges.len() + self.faces.len() + self.volumes.len()
    }

    /// True when the tree holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Header of any object.
    pub fn header(&self, obj: ObjId) -> Option<&Header> {
        match obj {
            ObjId::Point(id) => self.points.get(id).map(|o| &o.header),
            ObjId::Edge(id) => self.edges.get(id).map(|o| &o.header),
            ObjId::Face(id) => self.faces.get(id).map(|o| &o.header),
            ObjId::Volume(id) => self.volumes.get(id).map(|o| &o.header),
        }
    }

    /// Mutable header of any object.
    pub fn header_mut(&mut self, obj: ObjId) -> Option<&mut Header> {
        match obj {
            ObjId::Point(id) => self.points.get_mut(id).map(|o| &mut o.header),
            ObjId::Edge(id) => self.edges.get_mut(id).map(|o| &mut o.header),
            ObjId::Face(id) => self.faces.get_mut(id).map(|o| &mut o.header),
            ObjId::Volume(id) => self.volumes.get_mut(id).map(|o| &mut o.header),
        }
    }

    /// Identity of an object, 0 when unassigned or missing.
    pub fn ident(&self, obj: ObjId) -> u32 {
        self.header(obj).map_or(0, |h| h.ident)
    }

    /// Give `obj` a fresh identity unless it already has one.
    pub fn assign_ident(&mut self, obj: ObjId) -> Result<u32> {
        let next = self.next_ident;
        let after = next.checked_add(1);
        let header = self
            .header_mut(obj)
            .ok_or(TreeError::Missing { kind: obj.kind() })?;
        if header.ident != 0 {
            return Ok(header.ident);
        }
        let after = after.ok_or(TreeError::IdentsExhausted)?;
        header.ident = next;
        self.next_ident = after;
        Ok(next)
    }

    /// Look up a point.
    pub fn point(&self, id: PointId) -> Result<&Point> {
        self.points.get(id).ok_or(TreeError::Missing {
            kind: ObjKind::Point,
        })
    }

    /// Look up an edge.
    pub fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges.get(id).ok_or(TreeError::Missing {
            kind: ObjKind::Edge,
        })
    }

    /// Look up a face.
    pub fn face(&self, id: FaceId) -> Result<&Face> {
        self.faces.get(id).ok_or(TreeError::Missing {
            kind: ObjKind::Face,
        })
    }

    /// Look up a volume.
    pub fn volume(&self, id: VolumeId) -> Result<&Volume> {
        self.volumes.get(id).ok_or(TreeError::Missing {
            kind: ObjKind::Volume,
        })
    }

    /// Position of a point.
    pub fn pos(&self, id: PointId) -> Result<Point3> {
        Ok(self.point(id)?.pos)
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create an unlinked point.
    pub fn add_point(&mut self, pos: Point3) -> PointId {
        self.points.insert(Point {
            header: Header::default(),
            pos,
        })
    }

    fn insert_edge(&mut self, kind: EdgeKind, endpoints: [PointId; 2]) -> EdgeId {
        self.edges.insert(Edge {
            header: Header::default(),
            kind,
            construction: false,
            endpoints,
            step: None,
            view: EdgeView::default(),
        })
    }

    /// Create an unlinked straight edge.
    pub fn add_straight_edge(&mut self, p0: PointId, p1: PointId) -> Result<EdgeId> {
        self.point(p0)?;
        self.point(p1)?;
        Ok(self.insert_edge(EdgeKind::Straight, [p0, p1]))
    }

    /// Create an unlinked arc edge. Coincident endpoints make a full circle.
    pub fn add_arc_edge(
        &mut self,
        p0: PointId,
        p1: PointId,
        centre: PointId,
        normal: Vec3,
        clockwise: bool,
    ) -> Result<EdgeId> {
        let geom = ArcGeom::new(&self.pos(p0)?, &self.pos(p1)?, &self.pos(centre)?, &normal, clockwise);
        if geom.is_none() {
            return Err(TreeError::Degenerate(
                "arc start coincides with its centre or normal is zero".into(),
            ));
        }
        let kind = EdgeKind::Arc {
            centre,
            normal: normal.normalize(),
            clockwise,
        };
        Ok(self.insert_edge(kind, [p0, p1]))
    }

    /// Create an unlinked cubic bezier edge.
    pub fn add_bezier_edge(
        &mut self,
        p0: PointId,
        c0: PointId,
        c1: PointId,
        p1: PointId,
    ) -> Result<EdgeId> {
        for p in [p0, c0, c1, p1] {
            self.point(p)?;
        }
        Ok(self.insert_edge(EdgeKind::Bezier { ctrl: [c0, c1] }, [p0, p1]))
    }

    /// Create an unlinked face.
    ///
    /// A non-empty edge list must satisfy the kind's constraints; an empty
    /// one is allowed so a face can be filled edge by edge with
    /// [`Tree::link_tail`]. The initial point defaults to the start of the
    /// chain formed by the first two edges.
    pub fn add_face(&mut self, kind: FaceKind, edges: Vec<EdgeId>, plane: Plane) -> Result<FaceId> {
        if !edges.is_empty() {
            self.check_face_edges(kind, &edges)?;
        }
        let initial_point = self.default_start(&edges);
        Ok(self.faces.insert(Face {
            header: Header::default(),
            kind,
            edges,
            plane,
            volume: None,
            pair: None,
            initial_point,
            view: FaceView::default(),
        }))
    }

    /// Create an empty, unlinked volume.
    pub fn add_volume(&mut self) -> VolumeId {
        self.volumes.insert(Volume::default())
    }

    /// Validate an edge list against a face kind.
    pub fn check_face_edges(&self, kind: FaceKind, edges: &[EdgeId]) -> Result<()> {
        let count_error = || TreeError::EdgeCount {
            face: kind,
            expected: kind.edge_requirement(),
            found: edges.len(),
        };
        let (min, max) = kind.edge_bounds();
        if edges.len() < min || max.is_some_and(|m| edges.len() > m) {
            return Err(count_error());
        }
        let resolved = edges
            .iter()
            .map(|&e| self.edge(e))
            .collect::<Result<Vec<_>>>()?;
        let shape_ok = resolved
            .iter()
            .enumerate()
            .all(|(i, e)| edge_fits(kind, i, e));
        if shape_ok {
            Ok(())
        } else {
            Err(count_error())
        }
    }

    /// Start of the chain formed by the first two edges: the endpoint of the
    /// first edge not shared with the second.
    pub(crate) fn default_start(&self, edges: &[EdgeId]) -> Option<PointId> {
        let first = self.edges.get(*edges.first()?)?;
        let Some(second) = edges.get(1).and_then(|&e| self.edges.get(e)) else {
            return Some(first.endpoints[0]);
        };
        first
            .endpoints
            .iter()
            .copied()
            .find(|p| !second.endpoints.contains(p))
            .or(Some(first.endpoints[0]))
    }

    // =========================================================================
    // Geometry helpers
    // =========================================================================

    /// Resolved arc geometry of an arc edge.
    pub fn arc_geom(&self, edge: &Edge) -> Result<ArcGeom> {
        let EdgeKind::Arc {
            centre,
            normal,
            clockwise,
        } = edge.kind
        else {
            return Err(TreeError::Degenerate(format!(
                "edge #{} is not an arc",
                edge.header.ident
            )));
        };
        let start = self.pos(edge.endpoints[0])?;
        let end = self.pos(edge.endpoints[1])?;
        let centre = self.pos(centre)?;
        ArcGeom::new(&start, &end, &centre, &normal, clockwise).ok_or_else(|| {
            TreeError::Degenerate(format!("arc edge #{} has no resolvable plane", edge.header.ident))
        })
    }

    /// Point at parameter `t ∈ [0, 1]` along an edge.
    pub fn edge_point_at(&self, edge: &Edge, t: f64) -> Result<Point3> {
        let p0 = self.pos(edge.endpoints[0])?;
        let p1 = self.pos(edge.endpoints[1])?;
        match edge.kind {
            EdgeKind::Straight => Ok(p0 + (p1 - p0) * t),
            EdgeKind::Arc { .. } => Ok(self.arc_geom(edge)?.point_at(t)),
            EdgeKind::Bezier { ctrl } => {
                let c0 = self.pos(ctrl[0])?;
                let c1 = self.pos(ctrl[1])?;
                Ok(cubic_bezier(&p0, &c0, &c1, &p1, t))
            }
        }
    }

    // =========================================================================
    // Lists
    // =========================================================================

    /// Insert `obj` at the head of `list`.
    pub fn link(&mut self, obj: ObjId, list: List) -> Result<()> {
        self.insert(obj, list, true)
    }

    /// Insert `obj` at the tail of `list`.
    pub fn link_tail(&mut self, obj: ObjId, list: List) -> Result<()> {
        self.insert(obj, list, false)
    }

    fn insert(&mut self, obj: ObjId, list: List, head: bool) -> Result<()> {
        if !self.contains(obj) {
            return Err(TreeError::Missing { kind: obj.kind() });
        }
        let ident = self.ident(obj);
        let already = TreeError::AlreadyLinked {
            kind: obj.kind(),
            ident,
        };
        let wrong = TreeError::WrongList {
            kind: obj.kind(),
            list: list.name(),
        };
        match list {
            List::Top => {
                let in_volume = match obj {
                    ObjId::Face(f) => self.faces[f].volume.is_some(),
                    _ => false,
                };
                if in_volume || self.top.contains(&obj) {
                    return Err(already);
                }
                place(&mut self.top, obj, head);
            }
            List::Volume(v) => {
                let ObjId::Face(f) = obj else {
                    return Err(wrong);
                };
                if !self.volumes.contains_key(v) {
                    return Err(TreeError::Missing {
                        kind: ObjKind::Volume,
                    });
                }
                if self.faces[f].volume.is_some() || self.top.contains(&obj) {
                    return Err(already);
                }
                self.faces[f].volume = Some(v);
                place(&mut self.volumes[v].faces, f, head);
            }
            List::Face(f) => {
                let ObjId::Edge(e) = obj else {
                    return Err(wrong);
                };
                let face = self.face(f)?;
                let kind = face.kind;
                let mut edges = face.edges.clone();
                place(&mut edges, e, head);
                let (_, max) = kind.edge_bounds();
                let mut fits = !max.is_some_and(|m| edges.len() > m);
                for (i, &id) in edges.iter().enumerate() {
                    fits &= edge_fits(kind, i, self.edge(id)?);
                }
                if !fits {
                    return Err(TreeError::EdgeCount {
                        face: kind,
                        expected: kind.edge_requirement(),
                        found: edges.len(),
                    });
                }
                let face = &mut self.faces[f];
                face.edges = edges;
                face.view.valid = false;
            }
        }
        Ok(())
    }

    /// Remove `obj` from `list`.
    pub fn delink(&mut self, obj: ObjId, list: List) -> Result<()> {
        let kind = obj.kind();
        let ident = self.ident(obj);
        let not_in = |parent: ObjId, tree: &Tree| TreeError::NotReachable {
            kind,
            ident,
            parent: parent.kind(),
            parent_ident: tree.ident(parent),
        };
        let wrong = TreeError::WrongList {
            kind,
            list: list.name(),
        };
        match list {
            List::Top => {
                let pos = self
                    .top
                    .iter()
                    .position(|&o| o == obj)
                    .ok_or(TreeError::NotTopLevel { kind, ident })?;
                self.top.remove(pos);
            }
            List::Volume(v) => {
                let ObjId::Face(f) = obj else {
                    return Err(wrong);
                };
                let err = not_in(ObjId::Volume(v), self);
                let volume = self.volumes.get_mut(v).ok_or(TreeError::Missing {
                    kind: ObjKind::Volume,
                })?;
                let pos = volume.faces.iter().position(|&x| x == f).ok_or(err)?;
                volume.faces.remove(pos);
                if let Some(face) = self.faces.get_mut(f) {
                    face.volume = None;
                }
            }
            List::Face(f) => {
                let ObjId::Edge(e) = obj else {
                    return Err(wrong);
                };
                let err = not_in(ObjId::Face(f), self);
                let face = self.faces.get_mut(f).ok_or(TreeError::Missing {
                    kind: ObjKind::Face,
                })?;
                let pos = face.edges.iter().position(|&x| x == e).ok_or(err)?;
                face.edges.remove(pos);
                face.view.valid = false;
            }
        }
        Ok(())
    }

    /// Put `new` in `old`'s place in the top-level list. False when `old`
    /// is not top-level or `new` already is.
    pub(crate) fn replace_top(&mut self, old: ObjId, new: ObjId) -> bool {
        if self.top.contains(&new) {
            return false;
        }
        match self.top.iter().position(|&o| o == old) {
            Some(at) => {
                self.top[at] = new;
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Reachability
    // =========================================================================

    /// Direct children: volume → faces, face → edges and initial point,
    /// edge → endpoints, arc centre and bezier controls.
    pub fn children(&self, obj: ObjId) -> Vec<ObjId> {
        match obj {
            ObjId::Point(_) => Vec::new(),
            ObjId::Edge(e) => self
                .edges
                .get(e)
                .map(|edge| edge.points().into_iter().map(ObjId::Point).collect())
                .unwrap_or_default(),
            ObjId::Face(f) => self
                .faces
                .get(f)
                .map(|face| {
                    let mut out: Vec<ObjId> = face.edges.iter().map(|&e| ObjId::Edge(e)).collect();
                    out.extend(face.initial_point.map(ObjId::Point));
                    out
                })
                .unwrap_or_default(),
            ObjId::Volume(v) => self
                .volumes
                .get(v)
                .map(|vol| vol.faces.iter().map(|&f| ObjId::Face(f)).collect())
                .unwrap_or_default(),
        }
    }

    /// Every object reachable from `root` (including it), each once, in
    /// depth-first order.
    pub fn subtree(&self, root: ObjId) -> Vec<ObjId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(obj) = stack.pop() {
            if !self.contains(obj) || !seen.insert(obj) {
                continue;
            }
            out.push(obj);
            let mut children = self.children(obj);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Every point reachable from `root`.
    pub fn reachable_points(&self, root: ObjId) -> HashSet<PointId> {
        self.subtree(root)
            .into_iter()
            .filter_map(|obj| match obj {
                ObjId::Point(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// True when `target` is reachable from `parent`.
    pub fn find_obj(&self, parent: ObjId, target: ObjId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![parent];
        while let Some(obj) = stack.pop() {
            if obj == target {
                return self.contains(obj);
            }
            if target.kind() == ObjKind::Volume || !seen.insert(obj) {
                continue;
            }
            stack.extend(self.children(obj));
        }
        false
    }

    /// Like [`Tree::find_obj`] but reports the failure.
    pub fn ensure_reachable(&self, parent: ObjId, target: ObjId) -> Result<()> {
        if self.find_obj(parent, target) {
            Ok(())
        } else {
            Err(TreeError::NotReachable {
                kind: target.kind(),
                ident: self.ident(target),
                parent: parent.kind(),
                parent_ident: self.ident(parent),
            })
        }
    }

    /// First top-level object containing `obj`: volumes are scanned first,
    /// then loose faces, edges and points in list order.
    pub fn find_top_level_parent(&self, obj: ObjId) -> Option<ObjId> {
        let volumes = self.top.iter().filter(|o| matches!(o, ObjId::Volume(_)));
        let loose = self.top.iter().filter(|o| !matches!(o, ObjId::Volume(_)));
        volumes.chain(loose).copied().find(|&root| self.find_obj(root, obj))
    }

    /// Objects structurally holding `obj`: edges and faces for a point,
    /// faces for an edge, the owning volume for a face.
    ///
    /// Pairing and volume attachment are dependencies, not holders.
    pub fn holders(&self, obj: ObjId) -> Vec<ObjId> {
        match obj {
            ObjId::Point(p) => {
                let edges = self
                    .edges
                    .iter()
                    .filter(|(_, e)| e.points().contains(&p))
                    .map(|(id, _)| ObjId::Edge(id));
                let faces = self
                    .faces
                    .iter()
                    .filter(|(_, f)| f.initial_point == Some(p))
                    .map(|(id, _)| ObjId::Face(id));
                edges.chain(faces).collect()
            }
            ObjId::Edge(e) => self
                .faces
                .iter()
                .filter(|(_, f)| f.edges.contains(&e))
                .map(|(id, _)| ObjId::Face(id))
                .collect(),
            ObjId::Face(f) => self
                .volumes
                .iter()
                .filter(|(_, v)| v.faces.contains(&f))
                .map(|(id, _)| ObjId::Volume(id))
                .collect(),
            ObjId::Volume(_) => Vec::new(),
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Delete `obj` and release every sub-object nothing else references.
    ///
    /// Refused with [`TreeError::StillReferenced`] while another object holds
    /// `obj`. Top-level objects are unlinked first.
    pub fn delete_obj(&mut self, obj: ObjId) -> Result<()> {
        if !self.contains(obj) {
            return Err(TreeError::Missing { kind: obj.kind() });
        }
        let holders = self.holders(obj);
        if !holders.is_empty() {
            return Err(TreeError::StillReferenced {
                kind: obj.kind(),
                ident: self.ident(obj),
                holders: holders.len(),
            });
        }
        self.top.retain(|&o| o != obj);
        let released = self.release(obj);
        debug!(kind = %obj.kind(), released, "deleted object");
        Ok(())
    }

    fn release(&mut self, obj: ObjId) -> usize {
        let children = self.children(obj);
        match obj {
            ObjId::Point(p) => {
                self.points.remove(p);
            }
            ObjId::Edge(e) => {
                self.edges.remove(e);
            }
            ObjId::Face(f) => {
                self.detach_face(f);
                self.faces.remove(f);
            }
            ObjId::Volume(v) => {
                self.volumes.remove(v);
            }
        }
        let mut released = 1;
        let mut seen = HashSet::new();
        for child in children {
            if !seen.insert(child) || !self.contains(child) || self.top.contains(&child) {
                continue;
            }
            if self.holders(child).is_empty() {
                released += self.release(child);
            }
        }
        released
    }

    /// Clear pairing and attachments that point at a face about to go.
    fn detach_face(&mut self, face: FaceId) {
        for (_, other) in self.faces.iter_mut() {
            if other.pair == Some(face) {
                other.pair = None;
            }
        }
        for (id, vol) in self.volumes.iter_mut() {
            if vol.attached_to == Some(face) {
                warn!(volume = ?id, "attachment face deleted, volume detached");
                vol.attached_to = None;
            }
        }
    }

    // =========================================================================
    // Locks
    // =========================================================================

    /// Set the lock level of a top-level object.
    pub fn set_lock(&mut self, obj: ObjId, level: LockLevel) -> Result<()> {
        if !self.top.contains(&obj) {
            return Err(TreeError::NotTopLevel {
                kind: obj.kind(),
                ident: self.ident(obj),
            });
        }
        let header = self
            .header_mut(obj)
            .ok_or(TreeError::Missing { kind: obj.kind() })?;
        header.lock = level;
        Ok(())
    }

    /// Lock level stored on `obj`.
    pub fn lock_of(&self, obj: ObjId) -> LockLevel {
        self.header(obj).map_or(LockLevel::None, |h| h.lock)
    }

    /// Check the lock of `obj`'s top-level parent against `granularity`.
    ///
    /// Objects outside the top-level list are never locked.
    pub fn check_access(&self, obj: ObjId, granularity: Granularity) -> Result<()> {
        let Some(parent) = self.find_top_level_parent(obj) else {
            return Ok(());
        };
        let lock = self.lock_of(parent);
        if allows(lock, granularity) {
            Ok(())
        } else {
            Err(TreeError::Locked {
                kind: obj.kind(),
                ident: self.ident(obj),
                lock,
                granularity,
            })
        }
    }
}

/// Whether `edge` may sit at `position` in the edge list of a `kind` face.
fn edge_fits(kind: FaceKind, position: usize, edge: &Edge) -> bool {
    match kind {
        FaceKind::Rect => edge.kind == EdgeKind::Straight,
        FaceKind::Circle => matches!(edge.kind, EdgeKind::Arc { .. }) && edge.is_closed(),
        FaceKind::Cylinder => edge.kind.is_curved() == (position % 2 == 0),
        FaceKind::Flat | FaceKind::General => true,
    }
}

fn place<T>(list: &mut Vec<T>, item: T, head: bool) {
    if head {
        list.insert(0, item);
    } else {
        list.push(item);
    }
}
