//! The editing facade over one object tree.

use std::path::Path;

use prism_math::{Point3, Vec3};
use prism_mesh::{boolean_volumes, export_volume, import_volume, BooleanOp, MeshBoolean, MeshExport};
use prism_tessellate::{edge_view, face_view, tessellate_tree, tessellate_volume, TriangleMesh};
use prism_tree::{
    EdgeId, EdgeView, FaceId, FaceView, Granularity, Invalidation, List, LockLevel, ObjId, ObjKind,
    Tree, VolumeId,
};
use serde::Serialize;
use tracing::info;

use crate::{Config, Result};

/// Object counts of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Live points.
    pub points: usize,
    /// Live edges.
    pub edges: usize,
    /// Live faces.
    pub faces: usize,
    /// Live volumes.
    pub volumes: usize,
    /// Members of the top-level list.
    pub top_level: usize,
    /// Identity the next save hands out first.
    pub next_ident: u32,
}

/// An object tree with its configuration.
///
/// Every editing call checks the lock of the target's top-level parent at
/// the target's own granularity before touching the tree. The underlying
/// [`Tree`] stays reachable for construction and queries.
#[derive(Debug, Clone, Default)]
pub struct Model {
    tree: Tree,
    config: Config,
}

fn granularity(kind: ObjKind) -> Granularity {
    match kind {
        ObjKind::Point => Granularity::Point,
        ObjKind::Edge => Granularity::Edge,
        ObjKind::Face => Granularity::Face,
        ObjKind::Volume => Granularity::Volume,
    }
}

impl Model {
    /// An empty model.
    pub fn new(config: Config) -> Self {
        Self {
            tree: Tree::new(),
            config,
        }
    }

    /// Load a saved model.
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let mut model = Self::new(config);
        model.load(path)?;
        Ok(model)
    }

    /// The object tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutable access to the tree, bypassing lock checks.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Object counts.
    pub fn stats(&self) -> Stats {
        Stats {
            points: self.tree.points.len(),
            edges: self.tree.edges.len(),
            faces: self.tree.faces.len(),
            volumes: self.tree.volumes.len(),
            top_level: self.tree.top().len(),
            next_ident: self.tree.next_ident,
        }
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Check that `obj` may be selected, returning its top-level parent.
    pub fn select(&self, obj: ObjId) -> Result<Option<ObjId>> {
        self.tree.check_access(obj, granularity(obj.kind()))?;
        Ok(self.tree.find_top_level_parent(obj))
    }

    /// Translate `obj` and everything it reaches. Offsets within the linear
    /// tolerance are ignored.
    ///
    /// Besides the lock of `obj`'s top-level parent, the locks of attached
    /// volumes and of other top-level objects sharing moved points are
    /// checked before anything changes.
    pub fn move_obj(&mut self, obj: ObjId, offset: Vec3) -> Result<Invalidation> {
        self.tree
            .check_transform_access(obj, granularity(obj.kind()))?;
        if self.config.tolerance.is_zero(offset.norm()) {
            return Ok(Invalidation::default());
        }
        let inv = self.tree.move_obj(obj, offset)?;
        info!(kind = %obj.kind(), invalidated = inv.len(), "moved object");
        Ok(inv)
    }

    /// Scale `obj` about `centre`.
    pub fn scale(&mut self, obj: ObjId, centre: Point3, factors: Vec3) -> Result<Invalidation> {
        self.tree
            .check_transform_access(obj, granularity(obj.kind()))?;
        let inv = self.tree.scale_obj(obj, centre, factors)?;
        info!(kind = %obj.kind(), invalidated = inv.len(), "scaled object");
        Ok(inv)
    }

    /// Copy `obj` by `offset` and append the copy to the top-level list.
    pub fn copy(&mut self, obj: ObjId, offset: Vec3) -> Result<ObjId> {
        self.select(obj)?;
        let copy = self.tree.copy_obj(obj, offset)?;
        self.tree.link_tail(copy, List::Top)?;
        info!(kind = %obj.kind(), "copied object");
        Ok(copy)
    }

    /// Delete `obj` and the sub-objects only it used.
    pub fn delete(&mut self, obj: ObjId) -> Result<()> {
        self.select(obj)?;
        self.tree.delete_obj(obj)?;
        info!(kind = %obj.kind(), "deleted object");
        Ok(())
    }

    /// Set the lock of a top-level object. Locks never block this call.
    pub fn set_lock(&mut self, obj: ObjId, level: LockLevel) -> Result<()> {
        self.tree.set_lock(obj, level)?;
        Ok(())
    }

    /// Extrude a loose planar face into a volume.
    pub fn extrude(&mut self, face: FaceId, distance: f64) -> Result<VolumeId> {
        self.select(face.into())?;
        let volume = self.tree.extrude_face(face, distance)?;
        info!(distance, "extruded face");
        Ok(volume)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Save the tree.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        prism_io::serialise_tree(&mut self.tree, path)?;
        Ok(())
    }

    /// Replace the tree with a saved one. On failure the current tree is
    /// kept.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        prism_io::deserialise_tree(&mut self.tree, path)?;
        Ok(())
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Display points of an edge, regenerated when stale.
    pub fn edge_view(&mut self, edge: EdgeId) -> Result<&EdgeView> {
        Ok(edge_view(&mut self.tree, edge, &self.config.tessellation)?)
    }

    /// Outline and fill of a face, regenerated when stale.
    pub fn face_view(&mut self, face: FaceId) -> Result<&FaceView> {
        Ok(face_view(&mut self.tree, face, &self.config.tessellation)?)
    }

    /// Render mesh of one volume.
    pub fn volume_mesh(&mut self, volume: VolumeId) -> Result<TriangleMesh> {
        Ok(tessellate_volume(
            &mut self.tree,
            volume,
            &self.config.tessellation,
        )?)
    }

    /// Render mesh of the whole model.
    pub fn mesh(&mut self) -> Result<TriangleMesh> {
        Ok(tessellate_tree(&mut self.tree, &self.config.tessellation)?)
    }

    // =========================================================================
    // Mesh boundary
    // =========================================================================

    /// Export a volume for an external mesh engine.
    pub fn export_mesh(&mut self, volume: VolumeId) -> Result<MeshExport> {
        Ok(export_volume(
            &mut self.tree,
            volume,
            &self.config.tessellation,
        )?)
    }

    /// Import a mesh as a new top-level volume.
    pub fn import_mesh(&mut self, mesh: &MeshExport) -> Result<VolumeId> {
        Ok(import_volume(&mut self.tree, mesh)?)
    }

    /// Combine two volumes through `engine`. Both operands must be
    /// selectable as whole volumes; they stay in the model.
    pub fn boolean(
        &mut self,
        a: VolumeId,
        b: VolumeId,
        op: BooleanOp,
        engine: &dyn MeshBoolean,
    ) -> Result<VolumeId> {
        self.select(a.into())?;
        self.select(b.into())?;
        Ok(boolean_volumes(
            &mut self.tree,
            a,
            b,
            op,
            engine,
            &self.config.tessellation,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelError;
    use approx::assert_relative_eq;
    use prism_tree::{PointId, TreeError};

    fn cube_model() -> (Model, VolumeId) {
        let mut model = Model::default();
        let base = model
            .tree_mut()
            .make_rect(Point3::origin(), Vec3::x(), Vec3::y())
            .unwrap();
        let cube = model.extrude(base, 1.0).unwrap();
        (model, cube)
    }

    fn corner(model: &Model, at: Point3) -> PointId {
        let (id, _) = model
            .tree()
            .points
            .iter()
            .find(|(_, p)| (p.pos - at).norm() < 1e-12)
            .unwrap();
        id
    }

    #[test]
    fn test_unit_cube_counts() {
        let (model, _) = cube_model();
        let stats = model.stats();
        assert_eq!(
            (stats.points, stats.edges, stats.faces, stats.volumes),
            (8, 12, 6, 1)
        );
        assert_eq!(stats.top_level, 1);
    }

    #[test]
    fn test_face_lock_gates_finer_edits() {
        let (mut model, cube) = cube_model();
        model.set_lock(cube.into(), LockLevel::Faces).unwrap();
        let p = corner(&model, Point3::new(1.0, 1.0, 1.0));

        let err = model.move_obj(p.into(), Vec3::x()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Tree(TreeError::Locked {
                lock: LockLevel::Faces,
                granularity: Granularity::Point,
                ..
            })
        ));
        let face = model.tree().volume(cube).unwrap().faces[2];
        assert!(model.delete(face.into()).is_err());
        // The whole volume is still free to move.
        model.move_obj(cube.into(), Vec3::z()).unwrap();
        assert_relative_eq!(
            model.tree().pos(p).unwrap(),
            Point3::new(1.0, 1.0, 2.0)
        );

        model.set_lock(cube.into(), LockLevel::Volume).unwrap();
        assert!(model.copy(cube.into(), Vec3::x()).is_err());
        model.set_lock(cube.into(), LockLevel::None).unwrap();
        assert!(model.select(p.into()).unwrap() == Some(cube.into()));
    }

    #[test]
    fn test_locks_of_other_objects_gate_moves() {
        let (mut model, cube) = cube_model();
        let top = model.tree().volume(cube).unwrap().faces[1];
        let lid = model
            .tree_mut()
            .make_rect(Point3::new(0.0, 0.0, 1.0), Vec3::x(), Vec3::y())
            .unwrap();
        let slab = model.extrude(lid, 0.5).unwrap();
        model.tree_mut().attach(slab, top).unwrap();
        model.set_lock(slab.into(), LockLevel::Volume).unwrap();

        let err = model.move_obj(top.into(), Vec3::z()).unwrap_err();
        assert!(matches!(err, ModelError::Tree(TreeError::Locked { .. })));
        assert!(model
            .scale(cube.into(), Point3::origin(), Vec3::repeat(2.0))
            .is_err());
        let slab_corner = corner(&model, Point3::new(0.0, 0.0, 1.5));
        assert_relative_eq!(
            model.tree().pos(slab_corner).unwrap(),
            Point3::new(0.0, 0.0, 1.5)
        );

        // A loose edge from a locked corner cannot drag it along.
        model.set_lock(slab.into(), LockLevel::None).unwrap();
        model.set_lock(cube.into(), LockLevel::Points).unwrap();
        let origin = corner(&model, Point3::origin());
        let far = model.tree_mut().add_point(Point3::new(-1.0, 0.0, 0.0));
        let spoke = model.tree_mut().add_straight_edge(origin, far).unwrap();
        model.tree_mut().link_tail(spoke.into(), List::Top).unwrap();
        assert!(model.move_obj(spoke.into(), Vec3::y()).is_err());
        assert_eq!(model.tree().pos(origin).unwrap(), Point3::origin());
        model.move_obj(far.into(), Vec3::y()).unwrap();
    }

    #[test]
    fn test_copy_is_appended_and_independent() {
        let (mut model, cube) = cube_model();
        let copy = model.copy(cube.into(), Vec3::new(3.0, 0.0, 0.0)).unwrap();
        assert_eq!(model.tree().top(), &[ObjId::Volume(cube), copy]);
        assert_eq!(model.stats().points, 16);

        let before = model.tree().pos(corner(&model, Point3::origin())).unwrap();
        model.move_obj(copy, Vec3::y()).unwrap();
        let after = model.tree().pos(corner(&model, Point3::origin())).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_tiny_move_is_ignored() {
        let (mut model, cube) = cube_model();
        let inv = model.move_obj(cube.into(), Vec3::new(1e-9, 0.0, 0.0)).unwrap();
        assert!(inv.is_empty());
        assert_eq!(
            model.tree().pos(corner(&model, Point3::origin())).unwrap(),
            Point3::origin()
        );
    }

    #[test]
    fn test_save_and_open() {
        let (mut model, _) = cube_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.prism");
        model.save(&path).unwrap();

        let mut loaded = Model::open(&path, Config::default()).unwrap();
        let mut stats = model.stats();
        stats.next_ident = loaded.stats().next_ident;
        assert_eq!(loaded.stats(), stats);
        assert_relative_eq!(loaded.mesh().unwrap().area(), 6.0, epsilon = 1e-5);

        // A broken file leaves the loaded model as it was.
        std::fs::write(&path, "# prism 1\nTREE 1 2\nP 1 0 0 0\n").unwrap();
        assert!(matches!(loaded.load(&path), Err(ModelError::Serial(_))));
        assert_eq!(loaded.stats().faces, 6);
    }

    #[test]
    fn test_views_follow_edits() {
        let (mut model, cube) = cube_model();
        let top = model.tree().volume(cube).unwrap().faces[1];
        let z = |v: &FaceView| v.outline.iter().map(|p| p.z).fold(f64::MIN, f64::max);
        assert_relative_eq!(z(model.face_view(top).unwrap()), 1.0);
        model.move_obj(top.into(), Vec3::z()).unwrap();
        assert!(!model.tree().view_valid(top.into()));
        assert_relative_eq!(z(model.face_view(top).unwrap()), 2.0);
        assert_relative_eq!(model.volume_mesh(cube).unwrap().area(), 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_mesh_round_trip_through_model() {
        let (mut model, cube) = cube_model();
        let mesh = model.export_mesh(cube).unwrap();
        let imported = model.import_mesh(&mesh).unwrap();
        let again = model.export_mesh(imported).unwrap();
        assert_eq!(again.vertices.len(), mesh.vertices.len());
        assert_eq!(again.num_triangles(), mesh.num_triangles());
        assert_eq!(model.tree().top().last(), Some(&ObjId::Volume(imported)));
    }

    struct KeepFirst;

    impl MeshBoolean for KeepFirst {
        fn apply(&self, _: BooleanOp, a: &MeshExport, _: &MeshExport) -> prism_mesh::Result<MeshExport> {
            Ok(a.clone())
        }
    }

    #[test]
    fn test_boolean_needs_unlocked_operands() {
        let (mut model, cube) = cube_model();
        let other = model.copy(cube.into(), Vec3::x()).unwrap();
        let ObjId::Volume(other) = other else {
            panic!("expected a volume");
        };
        model.set_lock(other.into(), LockLevel::Volume).unwrap();
        let err = model
            .boolean(cube, other, BooleanOp::Intersection, &KeepFirst)
            .unwrap_err();
        assert!(matches!(err, ModelError::Tree(TreeError::Locked { .. })));
        assert_eq!(model.stats().volumes, 2);

        model.set_lock(other.into(), LockLevel::Faces).unwrap();
        let result = model
            .boolean(cube, other, BooleanOp::Intersection, &KeepFirst)
            .unwrap();
        assert_eq!(model.tree().volume(result).unwrap().faces.len(), 12);
    }
}
