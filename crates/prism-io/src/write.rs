//! Tree → record stream.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use prism_tree::{EdgeId, EdgeKind, FaceId, ObjId, PointId, Tree, VolumeId};
use tracing::{info, warn};

use crate::{face_tag, lock_tag, Result, SerialError, FORMAT_VERSION};

/// Encode every object reachable from the top-level list.
///
/// Objects without an identity get the next free one. An object whose save
/// count already equals the current pass is not written again, so each
/// shared point and edge appears once. The pass counter is bumped when the
/// walk ends, successfully or not, so the next save starts a fresh epoch.
pub fn to_records(tree: &mut Tree) -> Result<String> {
    let pass = tree.save_count;
    let next_pass = pass.checked_add(1).ok_or(SerialError::PassesExhausted)?;
    let reachable: HashSet<ObjId> = tree
        .top()
        .iter()
        .flat_map(|&obj| tree.subtree(obj))
        .collect();
    let mut writer = RecordWriter {
        lines: Vec::new(),
        pass,
        reachable,
    };
    let walked = writer.walk(tree);
    tree.save_count = next_pass;
    walked?;

    let records = writer.lines.len();
    let mut out = String::new();
    out.push_str(&format!("# prism {FORMAT_VERSION}\n"));
    out.push_str(&format!("TREE {pass} {}\n", tree.next_ident));
    for line in &writer.lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!("END {records}\n"));
    Ok(out)
}

/// Write the tree to `path`.
pub fn serialise_tree(tree: &mut Tree, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = to_records(tree)?;
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(text.as_bytes())?;
    file.flush()?;
    info!(
        path = %path.display(),
        objects = tree.len(),
        pass = tree.save_count - 1,
        "saved tree"
    );
    Ok(())
}

struct RecordWriter {
    lines: Vec<String>,
    pass: u32,
    reachable: HashSet<ObjId>,
}

impl RecordWriter {
    fn walk(&mut self, tree: &mut Tree) -> Result<()> {
        let top = tree.top().to_vec();
        for &obj in &top {
            self.object(tree, obj)?;
        }
        for obj in top {
            let ident = tree.ident(obj);
            let lock = lock_tag(tree.lock_of(obj));
            self.lines.push(format!("ROOT {ident} {lock}"));
        }
        Ok(())
    }

    /// Claim `obj` for this pass. Returns its identity, or `None` when it
    /// was already written.
    fn claim(&mut self, tree: &mut Tree, obj: ObjId) -> Result<Option<u32>> {
        let ident = tree.assign_ident(obj)?;
        match tree.header_mut(obj) {
            Some(header) if header.save_count != self.pass => {
                header.save_count = self.pass;
                Ok(Some(ident))
            }
            _ => Ok(None),
        }
    }

    /// Identity of an optional cross-reference that is not a dependency.
    /// Targets outside the saved graph are written as none.
    fn reference(&mut self, tree: &mut Tree, obj: Option<ObjId>) -> Result<u32> {
        match obj {
            Some(target) if self.reachable.contains(&target) => Ok(tree.assign_ident(target)?),
            Some(target) => {
                warn!(kind = %target.kind(), "dropping reference to an unsaved object");
                Ok(0)
            }
            None => Ok(0),
        }
    }

    fn object(&mut self, tree: &mut Tree, obj: ObjId) -> Result<u32> {
        match obj {
            ObjId::Point(p) => self.point(tree, p),
            ObjId::Edge(e) => self.edge(tree, e),
            ObjId::Face(f) => self.face(tree, f),
            ObjId::Volume(v) => self.volume(tree, v),
        }
    }

    fn point(&mut self, tree: &mut Tree, p: PointId) -> Result<u32> {
        let Some(ident) = self.claim(tree, p.into())? else {
            return Ok(tree.ident(p.into()));
        };
        let pos = tree.pos(p)?;
        self.lines
            .push(format!("P {ident} {} {} {}", pos.x, pos.y, pos.z));
        Ok(ident)
    }

    fn edge(&mut self, tree: &mut Tree, e: EdgeId) -> Result<u32> {
        if tree.header(e.into()).is_some_and(|h| h.save_count == self.pass) {
            return Ok(tree.ident(e.into()));
        }
        let edge = tree.edge(e)?.clone();
        let p0 = self.point(tree, edge.endpoints[0])?;
        let p1 = self.point(tree, edge.endpoints[1])?;
        let cons = u8::from(edge.construction);
        let step = edge
            .step
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let body = match edge.kind {
            EdgeKind::Straight => format!("S {cons} {p0} {p1}"),
            EdgeKind::Arc {
                centre,
                normal,
                clockwise,
            } => {
                let c = self.point(tree, centre)?;
                format!(
                    "A {cons} {p0} {p1} {c} {} {} {} {} {step}",
                    normal.x,
                    normal.y,
                    normal.z,
                    u8::from(clockwise)
                )
            }
            EdgeKind::Bezier { ctrl } => {
                let c0 = self.point(tree, ctrl[0])?;
                let c1 = self.point(tree, ctrl[1])?;
                format!("B {cons} {p0} {p1} {c0} {c1} {step}")
            }
        };
        let Some(ident) = self.claim(tree, e.into())? else {
            return Ok(tree.ident(e.into()));
        };
        self.lines.push(format!("E {ident} {body}"));
        Ok(ident)
    }

    fn face(&mut self, tree: &mut Tree, f: FaceId) -> Result<u32> {
        if tree.header(f.into()).is_some_and(|h| h.save_count == self.pass) {
            return Ok(tree.ident(f.into()));
        }
        let face = tree.face(f)?.clone();
        let edges = face
            .edges
            .iter()
            .map(|&e| self.edge(tree, e))
            .collect::<Result<Vec<_>>>()?;
        let initial = match face.initial_point {
            Some(p) => self.point(tree, p)?,
            None => 0,
        };
        let pair = self.reference(tree, face.pair.map(ObjId::Face))?;
        let Some(ident) = self.claim(tree, f.into())? else {
            return Ok(tree.ident(f.into()));
        };

        let (o, n) = (face.plane.origin, face.plane.normal);
        let mut line = format!(
            "F {ident} {} {} {} {} {} {} {} {initial} {pair} {}",
            face_tag(face.kind),
            o.x,
            o.y,
            o.z,
            n.x,
            n.y,
            n.z,
            edges.len()
        );
        for e in edges {
            line.push_str(&format!(" {e}"));
        }
        self.lines.push(line);
        Ok(ident)
    }

    fn volume(&mut self, tree: &mut Tree, v: VolumeId) -> Result<u32> {
        if tree.header(v.into()).is_some_and(|h| h.save_count == self.pass) {
            return Ok(tree.ident(v.into()));
        }
        let volume = tree.volume(v)?.clone();
        let faces = volume
            .faces
            .iter()
            .map(|&f| self.face(tree, f))
            .collect::<Result<Vec<_>>>()?;
        let attached = self.reference(tree, volume.attached_to.map(ObjId::Face))?;
        let Some(ident) = self.claim(tree, v.into())? else {
            return Ok(tree.ident(v.into()));
        };
        let mut line = format!("V {ident} {attached} {}", faces.len());
        for f in faces {
            line.push_str(&format!(" {f}"));
        }
        self.lines.push(line);
        Ok(ident)
    }
}
