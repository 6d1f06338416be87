//! Record stream → tree.
//!
//! Loading runs in two phases. The whole stream is parsed into records
//! first, so syntax errors and truncation are reported before anything is
//! built. Objects are then materialised on demand, a reference building its
//! target first; face pairs and volume attachments may point forward or form
//! cycles, so they go through a patch list applied once every object
//! exists.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use prism_math::{Plane, Point3, Vec3};
use prism_tree::{
    EdgeId, EdgeKind, FaceId, FaceKind, List, LockLevel, ObjId, ObjKind, PointId, Tree, VolumeId,
};
use tracing::{debug, info};

use crate::{face_kind, lock_level, Result, SerialError, FORMAT_VERSION};

/// Load a tree from `path` into `tree`.
///
/// `tree` is replaced only when the whole file loads; on any error it is
/// left as it was.
pub fn deserialise_tree(tree: &mut Tree, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let loaded = from_records(&text)?;
    info!(
        path = %path.display(),
        objects = loaded.len(),
        top = loaded.top().len(),
        "loaded tree"
    );
    *tree = loaded;
    Ok(())
}

/// Decode a record stream into a fresh tree.
pub fn from_records(text: &str) -> Result<Tree> {
    let stream = parse(text)?;
    Loader::new(stream).run()
}

#[derive(Debug, Clone)]
enum Record {
    Point(Point3),
    Edge {
        kind: RawEdge,
        construction: bool,
        ends: [u32; 2],
        step: Option<f64>,
    },
    Face {
        kind: FaceKind,
        plane: Plane,
        initial: u32,
        pair: u32,
        edges: Vec<u32>,
    },
    Volume {
        attached: u32,
        faces: Vec<u32>,
    },
}

#[derive(Debug, Clone, Copy)]
enum RawEdge {
    Straight,
    Arc {
        centre: u32,
        normal: Vec3,
        clockwise: bool,
    },
    Bezier {
        ctrl: [u32; 2],
    },
}

impl Record {
    fn kind(&self) -> ObjKind {
        match self {
            Record::Point(_) => ObjKind::Point,
            Record::Edge { .. } => ObjKind::Edge,
            Record::Face { .. } => ObjKind::Face,
            Record::Volume { .. } => ObjKind::Volume,
        }
    }
}

struct Entry {
    line: usize,
    ident: u32,
    record: Record,
}

struct Stream {
    pass: u32,
    next_ident: u32,
    entries: Vec<Entry>,
    roots: Vec<(usize, u32, LockLevel)>,
}

/// Whitespace-separated fields of one record.
struct Fields<'a> {
    parts: Vec<&'a str>,
    at: usize,
    line: usize,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self {
            parts: text.split_whitespace().collect(),
            at: 1,
            line,
        }
    }

    fn tag(&self) -> &'a str {
        self.parts[0]
    }

    fn error(&self, message: impl Into<String>) -> SerialError {
        SerialError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Result<&'a str> {
        let field = self.parts.get(self.at).copied().ok_or_else(|| {
            self.error(format!(
                "{} record ends after {} fields",
                self.tag(),
                self.parts.len() - 1
            ))
        })?;
        self.at += 1;
        Ok(field)
    }

    fn f64(&mut self) -> Result<f64> {
        let s = self.next()?;
        s.parse()
            .map_err(|_| self.error(format!("invalid number: {s}")))
    }

    fn u32(&mut self) -> Result<u32> {
        let s = self.next()?;
        s.parse()
            .map_err(|_| self.error(format!("invalid integer: {s}")))
    }

    fn flag(&mut self) -> Result<bool> {
        match self.next()? {
            "0" => Ok(false),
            "1" => Ok(true),
            s => Err(self.error(format!("invalid flag: {s}"))),
        }
    }

    fn point3(&mut self) -> Result<Point3> {
        Ok(Point3::new(self.f64()?, self.f64()?, self.f64()?))
    }

    fn vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.f64()?, self.f64()?, self.f64()?))
    }

    fn step(&mut self) -> Result<Option<f64>> {
        match self.next()? {
            "-" => Ok(None),
            s => s
                .parse()
                .map(Some)
                .map_err(|_| self.error(format!("invalid step: {s}"))),
        }
    }

    fn list(&mut self) -> Result<Vec<u32>> {
        let n = self.u32()? as usize;
        (0..n).map(|_| self.u32()).collect()
    }

    fn finish(&self) -> Result<()> {
        if self.at == self.parts.len() {
            Ok(())
        } else {
            Err(self.error(format!(
                "{} record has {} trailing fields",
                self.tag(),
                self.parts.len() - self.at
            )))
        }
    }
}

fn parse(text: &str) -> Result<Stream> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));
    let header = lines.next().map(|(_, l)| l).unwrap_or_default();
    let version = header
        .strip_prefix("# prism")
        .map(str::trim)
        .ok_or_else(|| SerialError::Parse {
            line: 1,
            message: "missing `# prism` header".into(),
        })?;
    if version != FORMAT_VERSION.to_string() {
        return Err(SerialError::Version {
            found: version.to_string(),
        });
    }

    let mut stream = Stream {
        pass: 0,
        next_ident: 1,
        entries: Vec::new(),
        roots: Vec::new(),
    };
    let mut seen: HashMap<u32, usize> = HashMap::new();
    let mut end = None;
    for (line, text) in lines {
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let mut f = Fields::new(text, line);
        if end.is_some() {
            return Err(f.error("record after END"));
        }
        match f.tag() {
            "TREE" => {
                stream.pass = f.u32()?;
                if stream.pass == u32::MAX {
                    return Err(f.error("pass counter out of range"));
                }
                stream.next_ident = f.u32()?;
                f.finish()?;
                continue;
            }
            "END" => {
                end = Some(f.u32()? as usize);
                f.finish()?;
                continue;
            }
            "ROOT" => {
                let ident = f.u32()?;
                let tag = f.next()?;
                let lock = lock_level(tag).ok_or_else(|| f.error(format!("invalid lock: {tag}")))?;
                f.finish()?;
                stream.roots.push((line, ident, lock));
                continue;
            }
            "P" | "E" | "F" | "V" => {}
            tag => {
                return Err(SerialError::UnknownTag {
                    line,
                    tag: tag.to_string(),
                })
            }
        };
        let ident = f.u32()?;
        if ident == 0 {
            return Err(f.error("identity 0 is reserved"));
        }
        if ident == u32::MAX {
            return Err(f.error("identity out of range"));
        }
        let record = match f.tag() {
            "P" => Record::Point(f.point3()?),
            "E" => read_edge(&mut f)?,
            "F" => read_face(&mut f)?,
            _ => Record::Volume {
                attached: f.u32()?,
                faces: f.list()?,
            },
        };
        f.finish()?;
        if seen.insert(ident, line).is_some() {
            return Err(SerialError::DuplicateIdent { line, ident });
        }
        stream.entries.push(Entry {
            line,
            ident,
            record,
        });
    }

    let records = stream.entries.len() + stream.roots.len();
    match end {
        None => Err(SerialError::Truncated(format!(
            "no END record after {records} records"
        ))),
        Some(n) if n != records => Err(SerialError::Truncated(format!(
            "END announces {n} records, found {records}"
        ))),
        Some(_) => Ok(stream),
    }
}

fn read_edge(f: &mut Fields) -> Result<Record> {
    let tag = f.next()?;
    let construction = f.flag()?;
    let ends = [f.u32()?, f.u32()?];
    let (kind, step) = match tag {
        "S" => (RawEdge::Straight, None),
        "A" => {
            let centre = f.u32()?;
            let normal = f.vec3()?;
            let clockwise = f.flag()?;
            (
                RawEdge::Arc {
                    centre,
                    normal,
                    clockwise,
                },
                f.step()?,
            )
        }
        "B" => {
            let ctrl = [f.u32()?, f.u32()?];
            (RawEdge::Bezier { ctrl }, f.step()?)
        }
        other => return Err(f.error(format!("unknown edge kind: {other}"))),
    };
    Ok(Record::Edge {
        kind,
        construction,
        ends,
        step,
    })
}

fn read_face(f: &mut Fields) -> Result<Record> {
    let tag = f.next()?;
    let kind = face_kind(tag).ok_or_else(|| f.error(format!("unknown face kind: {tag}")))?;
    let origin = f.point3()?;
    let normal = f.vec3()?;
    Ok(Record::Face {
        kind,
        plane: Plane { origin, normal },
        initial: f.u32()?,
        pair: f.u32()?,
        edges: f.list()?,
    })
}

fn mismatch(line: usize, ident: u32, expected: ObjKind, found: ObjId) -> SerialError {
    SerialError::KindMismatch {
        line,
        ident,
        expected,
        found: found.kind(),
    }
}

enum Patch {
    Pair { face: FaceId, target: u32, line: usize },
    Attached { volume: VolumeId, target: u32, line: usize },
}

struct Loader {
    tree: Tree,
    pass: u32,
    entries: Vec<Entry>,
    by_ident: HashMap<u32, usize>,
    built: HashMap<u32, ObjId>,
    roots: Vec<(usize, u32, LockLevel)>,
    patches: Vec<Patch>,
}

impl Loader {
    fn new(stream: Stream) -> Self {
        let by_ident = stream
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.ident, i))
            .collect();
        Self {
            tree: Tree::new(),
            pass: stream.pass,
            entries: stream.entries,
            by_ident,
            built: HashMap::new(),
            roots: stream.roots,
            patches: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Tree> {
        for i in 0..self.entries.len() {
            let (ident, line, kind) = {
                let e = &self.entries[i];
                (e.ident, e.line, e.record.kind())
            };
            self.resolve(ident, kind, line)?;
        }
        for (line, ident, lock) in std::mem::take(&mut self.roots) {
            let obj = self.lookup(ident, line)?;
            self.tree.link_tail(obj, List::Top)?;
            self.tree.set_lock(obj, lock)?;
        }
        for patch in std::mem::take(&mut self.patches) {
            match patch {
                Patch::Pair { face, target, line } => {
                    let partner = self.built_face(target, line)?;
                    self.tree.faces[face].pair = Some(partner);
                }
                Patch::Attached {
                    volume,
                    target,
                    line,
                } => {
                    let face = self.built_face(target, line)?;
                    self.tree.volumes[volume].attached_to = Some(face);
                }
            }
        }

        let max_ident = self.built.keys().copied().max().unwrap_or(0);
        self.tree.next_ident = self.tree.next_ident.max(max_ident + 1);
        self.tree.save_count = self.pass + 1;
        debug!(
            objects = self.built.len(),
            pass = self.pass,
            "decoded record stream"
        );
        Ok(self.tree)
    }

    /// An already-built object.
    fn lookup(&self, ident: u32, line: usize) -> Result<ObjId> {
        self.built
            .get(&ident)
            .copied()
            .ok_or(SerialError::Dangling { line, ident })
    }

    fn built_of_kind(&self, ident: u32, expected: ObjKind, line: usize) -> Result<ObjId> {
        let obj = self.lookup(ident, line)?;
        if obj.kind() != expected {
            return Err(mismatch(line, ident, expected, obj));
        }
        Ok(obj)
    }

    /// Build `ident` (and what it references) unless already built.
    fn resolve(&mut self, ident: u32, expected: ObjKind, line: usize) -> Result<ObjId> {
        if self.built.contains_key(&ident) {
            return self.built_of_kind(ident, expected, line);
        }
        let &index = self
            .by_ident
            .get(&ident)
            .ok_or(SerialError::Dangling { line, ident })?;
        let found = self.entries[index].record.kind();
        if found != expected {
            return Err(SerialError::KindMismatch {
                line,
                ident,
                expected,
                found,
            });
        }
        let record = self.entries[index].record.clone();
        let at = self.entries[index].line;
        let obj = self.build(record, at)?;
        if let Some(header) = self.tree.header_mut(obj) {
            header.ident = ident;
            header.save_count = self.pass;
        }
        self.built.insert(ident, obj);
        Ok(obj)
    }

    fn point(&mut self, ident: u32, line: usize) -> Result<PointId> {
        match self.resolve(ident, ObjKind::Point, line)? {
            ObjId::Point(p) => Ok(p),
            other => Err(mismatch(line, ident, ObjKind::Point, other)),
        }
    }

    fn edge(&mut self, ident: u32, line: usize) -> Result<EdgeId> {
        match self.resolve(ident, ObjKind::Edge, line)? {
            ObjId::Edge(e) => Ok(e),
            other => Err(mismatch(line, ident, ObjKind::Edge, other)),
        }
    }

    /// A face that must already be built (pairs and attachments).
    fn built_face(&self, ident: u32, line: usize) -> Result<FaceId> {
        match self.lookup(ident, line)? {
            ObjId::Face(f) => Ok(f),
            other => Err(mismatch(line, ident, ObjKind::Face, other)),
        }
    }

    fn build(&mut self, record: Record, line: usize) -> Result<ObjId> {
        let obj = match record {
            Record::Point(pos) => ObjId::Point(self.tree.add_point(pos)),
            Record::Edge {
                kind,
                construction,
                ends,
                step,
            } => {
                let p0 = self.point(ends[0], line)?;
                let p1 = self.point(ends[1], line)?;
                let e = match kind {
                    RawEdge::Straight => self.tree.add_straight_edge(p0, p1)?,
                    RawEdge::Arc {
                        centre,
                        normal,
                        clockwise,
                    } => {
                        let c = self.point(centre, line)?;
                        let e = self.tree.add_arc_edge(p0, p1, c, normal, clockwise)?;
                        // Keep the stored normal bit-exact.
                        self.tree.edges[e].kind = EdgeKind::Arc {
                            centre: c,
                            normal,
                            clockwise,
                        };
                        e
                    }
                    RawEdge::Bezier { ctrl } => {
                        let c0 = self.point(ctrl[0], line)?;
                        let c1 = self.point(ctrl[1], line)?;
                        self.tree.add_bezier_edge(p0, c0, c1, p1)?
                    }
                };
                let edge = &mut self.tree.edges[e];
                edge.construction = construction;
                edge.step = step;
                ObjId::Edge(e)
            }
            Record::Face {
                kind,
                plane,
                initial,
                pair,
                edges,
            } => {
                let edges = edges
                    .into_iter()
                    .map(|e| self.edge(e, line))
                    .collect::<Result<Vec<_>>>()?;
                let initial = match initial {
                    0 => None,
                    p => Some(self.point(p, line)?),
                };
                let f = self.tree.add_face(kind, edges, plane)?;
                self.tree.faces[f].initial_point = initial;
                if pair != 0 {
                    self.patches.push(Patch::Pair {
                        face: f,
                        target: pair,
                        line,
                    });
                }
                ObjId::Face(f)
            }
            Record::Volume { attached, faces } => {
                let v = self.tree.add_volume();
                for face in faces {
                    let f = self.resolve(face, ObjKind::Face, line)?;
                    self.tree.link_tail(f, List::Volume(v))?;
                }
                if attached != 0 {
                    self.patches.push(Patch::Attached {
                        volume: v,
                        target: attached,
                        line,
                    });
                }
                ObjId::Volume(v)
            }
        };
        Ok(obj)
    }
}
