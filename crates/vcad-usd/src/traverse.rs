//! Depth-first walk of the document's object graph.
//!
//! The walk is pre-order with an explicit stack, so deep assemblies cannot
//! overflow the call stack. Every reachable path produces its own node:
//! an object shared by two parents is visited twice.

use crate::cancel::{self, CancelToken, Cancelled};
use crate::error::WarningKind;
use crate::xform;
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use vcad_ir::{Document, ObjectId};
use vcad_kernel_math::Transform;

/// Why a node is part of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Exported with its geometry.
    Selected,
    /// Only on the way to a selected object; transform only.
    Ancestor,
}

/// One visit of an object along one root path.
#[derive(Debug, Clone)]
pub struct TraversalNode {
    /// Visited object.
    pub object: ObjectId,
    /// Index of the parent node in [`Traversal::nodes`].
    pub parent: Option<usize>,
    /// The object's own placement.
    pub local: Transform,
    /// Product of every ancestor's local transform and this one.
    pub world: Transform,
    /// Distance from the root (roots are 0).
    pub depth: usize,
    /// Selection role.
    pub role: NodeRole,
}

/// A non-fatal problem found while walking.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalWarning {
    /// Node the warning attaches to: the object's own node, or for pruned
    /// branches the parent node (`None` at root level).
    pub node: Option<usize>,
    /// Object concerned.
    pub object: ObjectId,
    /// Warning category.
    pub kind: WarningKind,
    /// Human-readable detail.
    pub detail: String,
}

/// Result of a walk: nodes in pre-order plus warnings.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    /// Visited nodes, parents before children, siblings in declared order.
    pub nodes: Vec<TraversalNode>,
    /// Problems found along the way.
    pub warnings: Vec<TraversalWarning>,
}

/// Walk settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraverseOptions {
    /// Branches at this depth or below are pruned.
    pub max_depth: usize,
    /// Skip hidden objects and their subtrees.
    pub skip_hidden: bool,
    /// Include whole subtrees of selected objects.
    pub select_descendants: bool,
}

impl Default for TraverseOptions {
    fn default() -> Self {
        Self {
            max_depth: 256,
            skip_hidden: false,
            select_descendants: false,
        }
    }
}

struct Pending<'a> {
    id: &'a ObjectId,
    parent: Option<usize>,
    depth: usize,
    under_selected: bool,
}

/// Walk `roots` depth first.
///
/// With a `selection`, only selected objects and the objects leading to them
/// are visited; the latter get [`NodeRole::Ancestor`].
pub fn traverse(
    doc: &Document,
    roots: &[ObjectId],
    selection: Option<&HashSet<ObjectId>>,
    options: &TraverseOptions,
    cancel: Option<&CancelToken>,
) -> Result<Traversal, Cancelled> {
    let index = doc.index();
    let leads_to_selection = selection.map(|sel| ancestors_of(doc, sel));

    let mut out = Traversal::default();
    let mut stack: Vec<Pending<'_>> = roots
        .iter()
        .rev()
        .map(|id| Pending {
            id,
            parent: None,
            depth: 0,
            under_selected: false,
        })
        .collect();

    while let Some(item) = stack.pop() {
        cancel::check(cancel)?;

        let role = match (selection, &leads_to_selection) {
            (Some(sel), Some(relevant)) => {
                if sel.contains(item.id) || (item.under_selected && options.select_descendants) {
                    NodeRole::Selected
                } else if relevant.contains(item.id) {
                    NodeRole::Ancestor
                } else {
                    continue;
                }
            }
            _ => NodeRole::Selected,
        };

        let Some(object) = index.get(item.id.as_str()).copied() else {
            out.warnings.push(TraversalWarning {
                node: item.parent,
                object: item.id.clone(),
                kind: WarningKind::MissingObject,
                detail: "referenced object is not in the document".into(),
            });
            continue;
        };

        if on_path(&out.nodes, item.parent, item.id) {
            out.warnings.push(TraversalWarning {
                node: item.parent,
                object: item.id.clone(),
                kind: WarningKind::CyclicReference,
                detail: "object contains itself; branch pruned".into(),
            });
            continue;
        }

        if item.depth >= options.max_depth {
            out.warnings.push(TraversalWarning {
                node: item.parent,
                object: item.id.clone(),
                kind: WarningKind::DepthLimitExceeded,
                detail: format!("nesting exceeds {} levels; branch pruned", options.max_depth),
            });
            continue;
        }

        if options.skip_hidden && !object.visible {
            debug!("skipping hidden object {}", object.id);
            continue;
        }

        let node_index = out.nodes.len();
        let parent_world = item
            .parent
            .map_or_else(Transform::identity, |p| out.nodes[p].world.clone());
        let (local, world) = match xform::compose(&parent_world, object.placement.as_ref()) {
            Ok(composed) => composed,
            Err(e) => {
                out.warnings.push(TraversalWarning {
                    node: Some(node_index),
                    object: object.id.clone(),
                    kind: WarningKind::InvalidTransform,
                    detail: format!("{e}; using identity"),
                });
                (Transform::identity(), parent_world)
            }
        };
        trace!("visit {} at depth {}", object.id, item.depth);

        out.nodes.push(TraversalNode {
            object: object.id.clone(),
            parent: item.parent,
            local,
            world,
            depth: item.depth,
            role,
        });

        let under_selected = item.under_selected || role == NodeRole::Selected;
        stack.extend(object.children().iter().rev().map(|id| Pending {
            id,
            parent: Some(node_index),
            depth: item.depth + 1,
            under_selected,
        }));
    }

    debug!(
        "traversal visited {} node(s) with {} warning(s)",
        out.nodes.len(),
        out.warnings.len()
    );
    Ok(out)
}

/// True when `id` is already on the path from the root to `parent`.
fn on_path(nodes: &[TraversalNode], mut parent: Option<usize>, id: &ObjectId) -> bool {
    while let Some(p) = parent {
        if &nodes[p].object == id {
            return true;
        }
        parent = nodes[p].parent;
    }
    false
}

/// Every object from which some selected object is reachable, including the
/// selected objects themselves.
fn ancestors_of(doc: &Document, selection: &HashSet<ObjectId>) -> HashSet<ObjectId> {
    let mut parents: HashMap<&ObjectId, Vec<&ObjectId>> = HashMap::new();
    for obj in &doc.objects {
        for child in obj.children() {
            parents.entry(child).or_default().push(&obj.id);
        }
    }

    let mut seen: HashSet<ObjectId> = selection.clone();
    let mut queue: Vec<&ObjectId> = selection.iter().collect();
    while let Some(id) = queue.pop() {
        for &p in parents.get(id).into_iter().flatten() {
            if seen.insert(p.clone()) {
                queue.push(p);
            }
        }
    }
    seen
}
