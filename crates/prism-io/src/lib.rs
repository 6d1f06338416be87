#![warn(missing_docs)]

//! Record-stream persistence for the prism object tree.
//!
//! A saved tree is a sequence of line records. Each record carries a type
//! tag, the object's identity, its scalar fields and the identities of the
//! objects it references. Shared points and edges are written once per save
//! pass and referenced by identity afterwards.
//!
//! # Format v1
//!
//! ```text
//! # prism 1
//! TREE pass next_ident
//! P id x y z
//! E id S cons p0 p1                                # Straight edge
//! E id A cons p0 p1 centre nx ny nz cw step|-      # Arc
//! E id B cons p0 p1 c0 c1 step|-                   # Cubic bezier
//! F id R|C|P|Y|G ox oy oz nx ny nz initial pair n e...
//! V id attached n f...
//! ROOT id N|P|E|F|V                                # Top-level member and lock
//! END count
//! ```
//!
//! A `0` identity stands for "none". Lines starting with `#` are comments.
//! `END` carries the number of records between the header and itself, so a
//! truncated file is detected even when it ends on a line boundary.

mod read;
mod write;

pub use read::{deserialise_tree, from_records};
pub use write::{serialise_tree, to_records};

use prism_tree::{FaceKind, LockLevel, ObjKind, TreeError};
use thiserror::Error;

/// Current record format version.
pub const FORMAT_VERSION: u32 = 1;

/// Errors from saving or loading a tree.
#[derive(Error, Debug)]
pub enum SerialError {
    /// The file could not be read or written.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A record is malformed.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A record starts with a tag this version does not know.
    #[error("line {line}: unknown record tag `{tag}`")]
    UnknownTag {
        /// 1-based line number.
        line: usize,
        /// The offending tag.
        tag: String,
    },

    /// A reference resolves to an object of the wrong kind.
    #[error("line {line}: #{ident} is a {found}, expected a {expected}")]
    KindMismatch {
        /// 1-based line number of the referencing record.
        line: usize,
        /// Referenced identity.
        ident: u32,
        /// Kind the record needs.
        expected: ObjKind,
        /// Kind found in the file.
        found: ObjKind,
    },

    /// Two records claim the same identity.
    #[error("line {line}: identity #{ident} defined twice")]
    DuplicateIdent {
        /// 1-based line number of the second definition.
        line: usize,
        /// The identity.
        ident: u32,
    },

    /// A reference never resolves to a record.
    #[error("line {line}: reference to undefined #{ident}")]
    Dangling {
        /// 1-based line number of the referencing record.
        line: usize,
        /// The missing identity.
        ident: u32,
    },

    /// The stream ends early or its record count is off.
    #[error("truncated record stream: {0}")]
    Truncated(String),

    /// The header names an unsupported format.
    #[error("unsupported format version {found} (expected {FORMAT_VERSION})")]
    Version {
        /// Version found in the header.
        found: String,
    },

    /// The tree has used up its save counter.
    #[error("save counter exhausted")]
    PassesExhausted,

    /// The decoded objects violate a tree invariant.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Result alias for persistence.
pub type Result<T> = std::result::Result<T, SerialError>;

fn face_tag(kind: FaceKind) -> char {
    match kind {
        FaceKind::Rect => 'R',
        FaceKind::Circle => 'C',
        FaceKind::Flat => 'P',
        FaceKind::Cylinder => 'Y',
        FaceKind::General => 'G',
    }
}

fn face_kind(tag: &str) -> Option<FaceKind> {
    match tag {
        "R" => Some(FaceKind::Rect),
        "C" => Some(FaceKind::Circle),
        "P" => Some(FaceKind::Flat),
        "Y" => Some(FaceKind::Cylinder),
        "G" => Some(FaceKind::General),
        _ => None,
    }
}

fn lock_tag(lock: LockLevel) -> char {
    match lock {
        LockLevel::None => 'N',
        LockLevel::Points => 'P',
        LockLevel::Edges => 'E',
        LockLevel::Faces => 'F',
        LockLevel::Volume => 'V',
    }
}

fn lock_level(tag: &str) -> Option<LockLevel> {
    match tag {
        "N" => Some(LockLevel::None),
        "P" => Some(LockLevel::Points),
        "E" => Some(LockLevel::Edges),
        "F" => Some(LockLevel::Faces),
        "V" => Some(LockLevel::Volume),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use prism_math::{Point3, Vec3};
    use prism_tree::{ObjId, Tree};
    use std::collections::HashSet;

    fn cube_and_cylinder() -> Tree {
        let mut tree = Tree::new();
        let base = tree
            .make_rect(Point3::origin(), Vec3::x(), Vec3::y())
            .unwrap();
        tree.extrude_face(base, 1.0).unwrap();
        let disc = tree
            .make_circle(Point3::new(4.0, 0.0, 0.0), 0.5, Vec3::z())
            .unwrap();
        let cyl = tree.extrude_face(disc, 2.0).unwrap();
        tree.set_lock(cyl.into(), LockLevel::Faces).unwrap();
        tree
    }

    #[test]
    fn test_file_round_trip_preserves_topology() {
        let mut tree = cube_and_cylinder();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.prism");
        serialise_tree(&mut tree, &path).unwrap();

        let mut loaded = Tree::new();
        deserialise_tree(&mut loaded, &path).unwrap();
        assert_eq!(loaded.points.len(), tree.points.len());
        assert_eq!(loaded.edges.len(), tree.edges.len());
        assert_eq!(loaded.faces.len(), tree.faces.len());
        assert_eq!(loaded.volumes.len(), tree.volumes.len());
        assert_eq!(loaded.top().len(), 2);

        let ObjId::Volume(cube) = loaded.top()[0] else {
            panic!("expected a volume");
        };
        let faces = loaded.volume(cube).unwrap().faces.clone();
        assert_eq!(faces.len(), 6);
        // Every cube edge is still shared by exactly two faces.
        let edges: HashSet<_> = faces
            .iter()
            .flat_map(|&f| loaded.face(f).unwrap().edges.clone())
            .collect();
        assert_eq!(edges.len(), 12);
        for e in edges {
            let users = faces
                .iter()
                .filter(|&&f| loaded.face(f).unwrap().edges.contains(&e))
                .count();
            assert_eq!(users, 2);
        }
        // Caps stay paired.
        let base = loaded.face(faces[0]).unwrap();
        assert_eq!(base.pair, Some(faces[1]));
        assert_eq!(loaded.face(faces[1]).unwrap().pair, Some(faces[0]));
        assert_eq!(loaded.lock_of(loaded.top()[1]), LockLevel::Faces);
    }

    #[test]
    fn test_round_trip_keeps_geometry_and_identities() {
        let mut tree = cube_and_cylinder();
        let text = to_records(&mut tree).unwrap();
        let loaded = from_records(&text).unwrap();

        for (_, p) in &tree.points {
            let twin = loaded
                .points
                .values()
                .find(|q| q.header.ident == p.header.ident)
                .unwrap();
            assert_relative_eq!(twin.pos, p.pos, epsilon = 1e-15);
        }
        assert_eq!(loaded.next_ident, tree.next_ident);
        // Written again from the loaded tree, the stream is identical.
        let mut again = loaded.clone();
        let text_again = to_records(&mut again).unwrap();
        let body = |s: &str| s.lines().skip(2).map(str::to_owned).collect::<Vec<_>>();
        assert_eq!(body(&text), body(&text_again));
    }

    #[test]
    fn test_shared_objects_written_once_per_pass() {
        let mut tree = cube_and_cylinder();
        let text = to_records(&mut tree).unwrap();
        let count = |tag: &str| text.lines().filter(|l| l.starts_with(tag)).count();
        assert_eq!(count("P "), tree.points.len());
        assert_eq!(count("E "), tree.edges.len());
        assert_eq!(count("F "), tree.faces.len());
        assert_eq!(count("V "), tree.volumes.len());

        // The next pass is a fresh epoch: everything is written again.
        let pass = tree.save_count;
        let second = to_records(&mut tree).unwrap();
        assert_eq!(tree.save_count, pass + 1);
        assert_eq!(second.lines().filter(|l| l.starts_with("P ")).count(), tree.points.len());
    }

    #[test]
    fn test_failed_load_leaves_tree_untouched() {
        let mut tree = cube_and_cylinder();
        let before = (tree.points.len(), tree.top().to_vec());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.prism");
        std::fs::write(&path, "# prism 1\nTREE 1 3\nP 1 0 0 0\nE 2 S 0 1 9\nEND 2\n").unwrap();

        let err = deserialise_tree(&mut tree, &path).unwrap_err();
        assert!(matches!(err, SerialError::Dangling { ident: 9, .. }));
        assert_eq!((tree.points.len(), tree.top().to_vec()), before);
    }
}
