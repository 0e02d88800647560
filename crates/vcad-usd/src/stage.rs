//! The output scene graph and its builder.
//!
//! A [`Stage`] owns every prim in a slotmap arena; prims refer to their
//! parent and children by [`PrimId`]. Serializing a stage yields a nested
//! tree with USD-style attribute names, ready for an external writer.

use crate::error::BuildError;
use crate::naming::{child_path, NameRegistry};
use crate::options::{NameSource, UpAxis};
use crate::traverse::TraversalNode;
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use vcad_ir::{DocumentObject, ObjectId, ObjectKind};
use vcad_kernel_math::Transform;
use vcad_kernel_tessellate::MeshBuffer;

new_key_type! {
    /// Handle of a prim in a [`Stage`].
    pub struct PrimId;
}

/// USD prim type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimKind {
    /// Transform-only node.
    Xform,
    /// Node carrying a mesh.
    Mesh,
    /// Grouping node (group or link objects).
    Group,
}

/// A node of the scene graph.
#[derive(Debug, Clone)]
pub struct ScenePrim {
    /// Sanitized name, unique among siblings.
    pub name: String,
    /// Absolute path, e.g. `/Scene/Body`.
    pub path: String,
    /// Prim type.
    pub kind: PrimKind,
    /// Transform relative to the parent prim.
    pub local: Transform,
    /// Transform relative to the stage.
    pub world: Transform,
    /// Geometry, for mesh prims.
    pub mesh: Option<MeshBuffer>,
    /// Parent prim.
    pub parent: Option<PrimId>,
    /// Child prims in insertion order.
    pub children: Vec<PrimId>,
    /// Document object the prim was made from (`None` for the wrapping root).
    pub source: Option<ObjectId>,
}

/// Stage-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMetadata {
    /// Up axis.
    pub up_axis: UpAxis,
    /// Linear unit in meters.
    pub meters_per_unit: f64,
    /// Name of the prim a consumer should open by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_prim: Option<String>,
}

impl Default for StageMetadata {
    fn default() -> Self {
        Self {
            up_axis: UpAxis::Z,
            meters_per_unit: 0.001,
            default_prim: None,
        }
    }
}

/// A tree of prims plus metadata.
#[derive(Debug, Clone, Default)]
pub struct Stage {
    prims: SlotMap<PrimId, ScenePrim>,
    roots: Vec<PrimId>,
    paths: HashMap<String, PrimId>,
    /// Stage metadata.
    pub metadata: StageMetadata,
}

impl Stage {
    /// An empty stage.
    pub fn new(metadata: StageMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    /// Add a prim named `name` under `parent` (or at the top level).
    #[allow(clippy::too_many_arguments)]
    pub fn add_prim(
        &mut self,
        parent: Option<PrimId>,
        name: &str,
        kind: PrimKind,
        local: Transform,
        world: Transform,
        mesh: Option<MeshBuffer>,
        source: Option<ObjectId>,
    ) -> Result<PrimId, BuildError> {
        let parent_path = match parent {
            Some(p) => {
                let prim = self
                    .prims
                    .get(p)
                    .ok_or_else(|| BuildError::UnknownParent(name.to_string()))?;
                prim.path.as_str()
            }
            None => "",
        };
        let path = child_path(parent_path, name);
        if self.paths.contains_key(&path) {
            return Err(BuildError::PathCollision(path));
        }

        let id = self.prims.insert(ScenePrim {
            name: name.to_string(),
            path: path.clone(),
            kind,
            local,
            world,
            mesh,
            parent,
            children: Vec::new(),
            source,
        });
        match parent.and_then(|p| self.prims.get_mut(p)) {
            Some(p) => p.children.push(id),
            None => self.roots.push(id),
        }
        self.paths.insert(path, id);
        Ok(id)
    }

    /// Look up a prim.
    pub fn get(&self, id: PrimId) -> Option<&ScenePrim> {
        self.prims.get(id)
    }

    /// Look up a prim by absolute path.
    pub fn prim_at(&self, path: &str) -> Option<&ScenePrim> {
        self.paths.get(path).and_then(|id| self.prims.get(*id))
    }

    /// Top-level prims in insertion order.
    pub fn roots(&self) -> &[PrimId] {
        &self.roots
    }

    /// Number of prims.
    pub fn len(&self) -> usize {
        self.prims.len()
    }

    /// True when the stage has no prims.
    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    /// All prims, depth first, parents before children.
    pub fn walk(&self) -> Vec<&ScenePrim> {
        let mut out = Vec::with_capacity(self.prims.len());
        let mut stack: Vec<PrimId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(prim) = self.prims.get(id) {
                out.push(prim);
                stack.extend(prim.children.iter().rev().copied());
            }
        }
        out
    }

    /// Every prim path, depth first.
    pub fn paths(&self) -> Vec<&str> {
        self.walk().into_iter().map(|p| p.path.as_str()).collect()
    }

    /// Number of mesh prims.
    pub fn num_meshes(&self) -> usize {
        self.prims.values().filter(|p| p.mesh.is_some()).count()
    }

    /// Total triangle count over all meshes.
    pub fn num_triangles(&self) -> usize {
        self.prims
            .values()
            .filter_map(|p| p.mesh.as_ref())
            .map(MeshBuffer::num_triangles)
            .sum()
    }

    /// Serialize to a pretty-printed JSON prim tree.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Stage", 2)?;
        s.serialize_field("metadata", &self.metadata)?;
        s.serialize_field(
            "prims",
            &PrimList {
                stage: self,
                ids: &self.roots,
            },
        )?;
        s.end()
    }
}

struct PrimList<'a> {
    stage: &'a Stage,
    ids: &'a [PrimId],
}

impl Serialize for PrimList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.ids.len()))?;
        for id in self.ids {
            if let Some(prim) = self.stage.prims.get(*id) {
                seq.serialize_element(&PrimTree {
                    stage: self.stage,
                    prim,
                })?;
            }
        }
        seq.end()
    }
}

struct PrimTree<'a> {
    stage: &'a Stage,
    prim: &'a ScenePrim,
}

impl Serialize for PrimTree<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let prim = self.prim;
        let mut s = serializer.serialize_struct("Prim", 7)?;
        s.serialize_field("name", &prim.name)?;
        s.serialize_field("path", &prim.path)?;
        s.serialize_field("type", &prim.kind)?;
        if !prim.local.is_identity(0.0) {
            s.serialize_field("xformOp:transform", &prim.local.to_row_vector_rows())?;
        }
        if let Some(source) = &prim.source {
            s.serialize_field("source", source)?;
        }
        if let Some(mesh) = &prim.mesh {
            s.serialize_field("mesh", &MeshAttributes::new(mesh))?;
        }
        s.serialize_field(
            "children",
            &PrimList {
                stage: self.stage,
                ids: &prim.children,
            },
        )?;
        s.end()
    }
}

/// `UsdGeomMesh` attributes; normals are per face (`uniform`).
#[derive(Serialize)]
struct MeshAttributes {
    points: Vec<[f64; 3]>,
    #[serde(rename = "faceVertexCounts")]
    face_vertex_counts: Vec<u32>,
    #[serde(rename = "faceVertexIndices")]
    face_vertex_indices: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    normals: Vec<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extent: Option<[[f64; 3]; 2]>,
}

impl MeshAttributes {
    fn new(mesh: &MeshBuffer) -> Self {
        let normals = if mesh.faces.iter().all(|f| f.normal.is_some()) {
            mesh.faces
                .iter()
                .filter_map(|f| f.normal)
                .map(|n| [n.x, n.y, n.z])
                .collect()
        } else {
            Vec::new()
        };
        Self {
            points: mesh.points.iter().map(|p| [p.x, p.y, p.z]).collect(),
            face_vertex_counts: mesh.face_vertex_counts(),
            face_vertex_indices: mesh.face_vertex_indices(),
            normals,
            extent: mesh
                .extent()
                .map(|(lo, hi)| [[lo.x, lo.y, lo.z], [hi.x, hi.y, hi.z]]),
        }
    }
}

/// Inserts traversal nodes into a stage in traversal order.
///
/// Owns the run's [`NameRegistry`], so names depend only on insertion order.
#[derive(Debug)]
pub struct SceneGraphBuilder {
    stage: Stage,
    registry: NameRegistry,
    name_source: NameSource,
    root: Option<PrimId>,
    node_prims: HashMap<usize, PrimId>,
}

impl SceneGraphBuilder {
    /// A builder for an empty stage, optionally wrapping everything under a
    /// top-level `root_prim`.
    pub fn new(
        metadata: StageMetadata,
        name_source: NameSource,
        root_prim: Option<&str>,
    ) -> Result<Self, BuildError> {
        let mut builder = Self {
            stage: Stage::new(metadata),
            registry: NameRegistry::new(),
            name_source,
            root: None,
            node_prims: HashMap::new(),
        };
        if let Some(raw) = root_prim {
            let name = builder.registry.allocate("", raw);
            let id = builder.stage.add_prim(
                None,
                &name,
                PrimKind::Xform,
                Transform::identity(),
                Transform::identity(),
                None,
                None,
            )?;
            builder.root = Some(id);
        }
        Ok(builder)
    }

    /// Insert the prim for traversal node `node_index`.
    ///
    /// The node's parent must already be inserted. The kind is `Mesh` when a
    /// mesh is given, `Group` for group and link objects, `Xform` otherwise.
    pub fn insert(
        &mut self,
        node_index: usize,
        node: &TraversalNode,
        object: &DocumentObject,
        mesh: Option<MeshBuffer>,
    ) -> Result<PrimId, BuildError> {
        let parent = match node.parent {
            Some(p) => Some(
                *self
                    .node_prims
                    .get(&p)
                    .ok_or_else(|| BuildError::UnknownParent(object.id.to_string()))?,
            ),
            None => self.root,
        };
        let parent_path = match parent.and_then(|p| self.stage.get(p)) {
            Some(prim) => prim.path.clone(),
            None => String::new(),
        };

        let raw = match self.name_source {
            NameSource::Label if !object.label.trim().is_empty() => object.label.as_str(),
            _ => object.id.as_str(),
        };
        let name = self.registry.allocate(&parent_path, raw);

        let kind = match (&mesh, &object.kind) {
            (Some(_), _) => PrimKind::Mesh,
            (None, ObjectKind::Group { .. } | ObjectKind::Link { .. }) => PrimKind::Group,
            (None, ObjectKind::Shape { .. }) => PrimKind::Xform,
        };

        let id = self.stage.add_prim(
            parent,
            &name,
            kind,
            node.local.clone(),
            node.world.clone(),
            mesh,
            Some(object.id.clone()),
        )?;
        self.node_prims.insert(node_index, id);
        Ok(id)
    }

    /// Prim made for a traversal node.
    pub fn prim_for(&self, node_index: usize) -> Option<PrimId> {
        self.node_prims.get(&node_index).copied()
    }

    /// Path of the prim made for a traversal node.
    pub fn path_for(&self, node_index: usize) -> Option<&str> {
        self.prim_for(node_index)
            .and_then(|id| self.stage.get(id))
            .map(|p| p.path.as_str())
    }

    /// Path of the wrapping root prim, if any.
    pub fn root_path(&self) -> Option<&str> {
        self.root
            .and_then(|id| self.stage.get(id))
            .map(|p| p.path.as_str())
    }

    /// The stage built so far.
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Finish building: fills in `default_prim`.
    pub fn finish(mut self) -> Stage {
        let default_prim = match self.stage.roots.as_slice() {
            [only] => self.stage.get(*only).map(|p| p.name.clone()),
            _ => None,
        };
        self.stage.metadata.default_prim = default_prim;
        self.stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traverse::NodeRole;
    use vcad_kernel_math::Point3;
    use vcad_kernel_tessellate::MeshFace;
    use vcad_kernel_topo::primitives::cuboid;

    fn node(parent: Option<usize>, role: NodeRole) -> TraversalNode {
        TraversalNode {
            object: ObjectId::from("x"),
            parent,
            local: Transform::translation(1.0, 0.0, 0.0),
            world: Transform::translation(1.0, 0.0, 0.0),
            depth: parent.map_or(0, |_| 1),
            role,
        }
    }

    fn triangle() -> MeshBuffer {
        let mut mesh = MeshBuffer::new();
        mesh.push_point(Point3::new(0.0, 0.0, 0.0));
        mesh.push_point(Point3::new(1.0, 0.0, 0.0));
        mesh.push_point(Point3::new(0.0, 1.0, 0.0));
        mesh.faces.push(MeshFace::triangle(0, 1, 2));
        mesh.compute_face_normals();
        mesh
    }

    #[test]
    fn test_path_collision() {
        let mut stage = Stage::default();
        let id = || Transform::identity();
        stage
            .add_prim(None, "A", PrimKind::Xform, id(), id(), None, None)
            .unwrap();
        assert_eq!(
            stage.add_prim(None, "A", PrimKind::Xform, id(), id(), None, None),
            Err(BuildError::PathCollision("/A".into()))
        );
    }

    #[test]
    fn test_builder_kinds_and_paths() {
        let group = DocumentObject::group("G", "Box 1", &["S"]);
        let shape = DocumentObject::shape("S", "Box 1", cuboid(1.0, 1.0, 1.0));
        let link = DocumentObject::link("L", "Box 1", "S");

        let mut b =
            SceneGraphBuilder::new(StageMetadata::default(), NameSource::Label, None).unwrap();
        b.insert(0, &node(None, NodeRole::Selected), &group, None).unwrap();
        b.insert(1, &node(Some(0), NodeRole::Selected), &shape, Some(triangle())).unwrap();
        b.insert(2, &node(Some(0), NodeRole::Selected), &shape, None).unwrap();
        b.insert(3, &node(Some(0), NodeRole::Selected), &link, None).unwrap();
        let stage = b.finish();

        assert_eq!(
            stage.paths(),
            vec!["/Box_1", "/Box_1/Box_1_1", "/Box_1/Box_1_2", "/Box_1/Box_1_3"]
        );
        let kinds: Vec<PrimKind> = stage.walk().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PrimKind::Group,
                PrimKind::Mesh,
                PrimKind::Xform,
                PrimKind::Group
            ]
        );
        assert_eq!(stage.metadata.default_prim.as_deref(), Some("Box_1"));
        assert_eq!(stage.num_meshes(), 1);
        assert_eq!(stage.num_triangles(), 1);
    }

    #[test]
    fn test_builder_root_prim_and_name_source() {
        let shape = DocumentObject::shape("Pad001", "", cuboid(1.0, 1.0, 1.0));
        let mut b =
            SceneGraphBuilder::new(StageMetadata::default(), NameSource::Id, Some("Scene"))
                .unwrap();
        b.insert(0, &node(None, NodeRole::Selected), &shape, None).unwrap();
        assert_eq!(b.path_for(0), Some("/Scene/Pad001"));
        assert_eq!(b.root_path(), Some("/Scene"));
        let stage = b.finish();
        assert_eq!(stage.metadata.default_prim.as_deref(), Some("Scene"));
        assert_eq!(stage.roots().len(), 1);
    }

    #[test]
    fn test_unknown_parent() {
        let shape = DocumentObject::shape("S", "S", cuboid(1.0, 1.0, 1.0));
        let mut b =
            SceneGraphBuilder::new(StageMetadata::default(), NameSource::Label, None).unwrap();
        assert!(matches!(
            b.insert(1, &node(Some(0), NodeRole::Selected), &shape, None),
            Err(BuildError::UnknownParent(_))
        ));
    }

    #[test]
    fn test_serialized_tree() {
        let shape = DocumentObject::shape("S", "Part", cuboid(1.0, 1.0, 1.0));
        let mut b =
            SceneGraphBuilder::new(StageMetadata::default(), NameSource::Label, Some("Scene"))
                .unwrap();
        b.insert(0, &node(None, NodeRole::Selected), &shape, Some(triangle())).unwrap();
        let stage = b.finish();

        let value: serde_json::Value = serde_json::from_str(&stage.to_json().unwrap()).unwrap();
        assert_eq!(value["metadata"]["upAxis"], "Z");
        assert_eq!(value["metadata"]["metersPerUnit"], 0.001);
        assert_eq!(value["metadata"]["defaultPrim"], "Scene");

        let root = &value["prims"][0];
        assert_eq!(root["path"], "/Scene");
        assert!(root.get("xformOp:transform").is_none());
        let part = &root["children"][0];
        assert_eq!(part["type"], "Mesh");
        assert_eq!(part["source"], "S");
        assert_eq!(part["xformOp:transform"][3][0], 1.0);
        assert_eq!(part["mesh"]["faceVertexCounts"], serde_json::json!([3]));
        assert_eq!(part["mesh"]["faceVertexIndices"], serde_json::json!([0, 1, 2]));
        assert_eq!(part["mesh"]["normals"][0][2], 1.0);
        assert_eq!(part["mesh"]["extent"][1], serde_json::json!([1.0, 1.0, 0.0]));
    }
}
