//! Document snapshot for the vcad export pipeline.
//!
//! A [`Document`] is a read-only copy of the host application's object tree:
//! groups, shape-carrying objects, and links to shared sub-trees, each with an
//! optional local placement. Shapes arrive already evaluated as B-rep
//! snapshots, so nothing here re-runs parametric modeling.
//!
//! The document is plain data and round-trips through JSON.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use vcad_kernel_topo::Shape;

/// Stable identifier of an object (the host's internal name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Create an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 3D vector with f64 components (conventionally millimeters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Rotation quaternion `(x, y, z, w)`. Expected to be unit length; a
/// non-unit value is normalized on use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
    /// Scalar component.
    pub w: f64,
}

impl Quat {
    /// No rotation.
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Rotation of `angle` radians about `axis` (normalized here).
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let len = (axis.x * axis.x + axis.y * axis.y + axis.z * axis.z).sqrt();
        let (s, c) = (angle * 0.5).sin_cos();
        let k = if len > 0.0 { s / len } else { 0.0 };
        Self {
            x: axis.x * k,
            y: axis.y * k,
            z: axis.z * k,
            w: c,
        }
    }
}

/// Local placement of an object relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Placement {
    /// Rotation followed by translation.
    Rigid {
        /// Translation.
        base: Vec3,
        /// Rotation.
        rotation: Quat,
    },
    /// Raw 4x4 matrix, row-major, column-vector convention (translation in
    /// the last column).
    Matrix {
        /// Matrix rows.
        rows: [[f64; 4]; 4],
    },
}

impl Placement {
    /// A pure translation.
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Placement::Rigid {
            base: Vec3::new(x, y, z),
            rotation: Quat::IDENTITY,
        }
    }

    /// A rotation about `axis` through the origin, then a translation.
    pub fn rigid(base: Vec3, axis: Vec3, angle: f64) -> Self {
        Placement::Rigid {
            base,
            rotation: Quat::from_axis_angle(axis, angle),
        }
    }
}

/// What an object is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectKind {
    /// Grouping node (assembly, folder) with ordered children.
    Group {
        /// Child references, in declared order.
        #[serde(default)]
        children: Vec<ObjectId>,
    },
    /// Object carrying a boundary representation; may own children too.
    Shape {
        /// Evaluated geometry.
        shape: Shape,
        /// Child references, in declared order.
        #[serde(default)]
        children: Vec<ObjectId>,
    },
    /// Reference to a shared sub-tree.
    Link {
        /// Linked object.
        target: ObjectId,
    },
}

fn default_visible() -> bool {
    true
}

/// An object of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentObject {
    /// Stable identifier.
    pub id: ObjectId,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Local placement; `None` is identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    /// Visibility in the host.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Object kind.
    pub kind: ObjectKind,
}

impl DocumentObject {
    fn with_kind(id: impl Into<ObjectId>, label: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            placement: None,
            visible: true,
            kind,
        }
    }

    /// A group with the given children.
    pub fn group(id: impl Into<ObjectId>, label: impl Into<String>, children: &[&str]) -> Self {
        Self::with_kind(
            id,
            label,
            ObjectKind::Group {
                children: children.iter().map(|c| ObjectId::from(*c)).collect(),
            },
        )
    }

    /// A shape-carrying object without children.
    pub fn shape(id: impl Into<ObjectId>, label: impl Into<String>, shape: Shape) -> Self {
        Self::with_kind(
            id,
            label,
            ObjectKind::Shape {
                shape,
                children: Vec::new(),
            },
        )
    }

    /// A link to `target`.
    pub fn link(id: impl Into<ObjectId>, label: impl Into<String>, target: &str) -> Self {
        Self::with_kind(
            id,
            label,
            ObjectKind::Link {
                target: target.into(),
            },
        )
    }

    /// Set the local placement.
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }

    /// Replace the children of a group or shape object. Links are unchanged.
    pub fn with_children(mut self, ids: &[&str]) -> Self {
        match &mut self.kind {
            ObjectKind::Group { children } | ObjectKind::Shape { children, .. } => {
                *children = ids.iter().map(|c| ObjectId::from(*c)).collect();
            }
            ObjectKind::Link { .. } => {}
        }
        self
    }

    /// Mark the object hidden.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Objects visited below this one: declared children, or a link's target.
    pub fn children(&self) -> &[ObjectId] {
        match &self.kind {
            ObjectKind::Group { children } | ObjectKind::Shape { children, .. } => children,
            ObjectKind::Link { target } => std::slice::from_ref(target),
        }
    }

    /// The carried geometry, if any.
    pub fn shape_data(&self) -> Option<&Shape> {
        match &self.kind {
            ObjectKind::Shape { shape, .. } => Some(shape),
            _ => None,
        }
    }

    /// True for links.
    pub fn is_link(&self) -> bool {
        matches!(self.kind, ObjectKind::Link { .. })
    }
}

/// A document snapshot, the export input format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Format version string (e.g. "0.1").
    pub version: String,
    /// All objects, in document order.
    #[serde(default)]
    pub objects: Vec<DocumentObject>,
    /// Explicit top-level objects. When empty, see [`Document::root_ids`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<ObjectId>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            objects: Vec::new(),
            roots: Vec::new(),
        }
    }
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object (builder style).
    pub fn with(mut self, object: DocumentObject) -> Self {
        self.objects.push(object);
        self
    }

    /// Look up an object by id.
    pub fn get(&self, id: &str) -> Option<&DocumentObject> {
        self.objects.iter().find(|o| o.id.as_str() == id)
    }

    /// Id → object map for repeated lookups. The first object wins on
    /// duplicate ids.
    pub fn index(&self) -> HashMap<&str, &DocumentObject> {
        let mut map = HashMap::with_capacity(self.objects.len());
        for obj in &self.objects {
            map.entry(obj.id.as_str()).or_insert(obj);
        }
        map
    }

    /// Top-level objects: the explicit root list, or else inferred in
    /// document order.
    ///
    /// Inferred roots are the objects no other object references
    /// (self-references do not count). Objects still unreachable after that
    /// sit on a closed cycle; the first of each such cycle becomes a root too.
    pub fn root_ids(&self) -> Vec<ObjectId> {
        if !self.roots.is_empty() {
            return self.roots.clone();
        }
        let referenced: HashSet<&ObjectId> = self
            .objects
            .iter()
            .flat_map(|o| o.children().iter().filter(move |c| **c != o.id))
            .collect();
        let mut roots: Vec<&ObjectId> = self
            .objects
            .iter()
            .filter(|o| !referenced.contains(&o.id))
            .map(|o| &o.id)
            .collect();

        let index = self.index();
        let mut reached = HashSet::new();
        for root in &roots {
            mark_reachable(&index, root.as_str(), &mut reached);
        }
        for obj in &self.objects {
            if !reached.contains(obj.id.as_str()) {
                mark_reachable(&index, obj.id.as_str(), &mut reached);
                roots.push(&obj.id);
            }
        }
        roots.into_iter().cloned().collect()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn mark_reachable<'d>(
    index: &HashMap<&'d str, &'d DocumentObject>,
    start: &'d str,
    reached: &mut HashSet<&'d str>,
) {
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        let Some(obj) = index.get(id).copied() else {
            continue;
        };
        if reached.insert(obj.id.as_str()) {
            stack.extend(obj.children().iter().map(ObjectId::as_str));
        }
    }
}
