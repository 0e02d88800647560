//! The export driver: traversal, tessellation, and stage assembly.

use crate::cancel::{self, CancelToken, Cancelled};
use crate::error::{BuildError, ExportError, ExportWarning, Result, WarningKind};
use crate::options::ExportOptions;
use crate::stage::{SceneGraphBuilder, Stage, StageMetadata};
use crate::traverse::{traverse, NodeRole, Traversal, TraversalWarning, TraverseOptions};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use vcad_ir::{Document, ObjectId};
use vcad_kernel_tessellate::{tessellate, MeshBuffer, TessellateError, TessellationParams};
use vcad_kernel_topo::Shape;

/// Lifecycle of an [`Exporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    /// Not started.
    Idle,
    /// Walking the document.
    Traversing,
    /// Tessellating and inserting prims.
    Building,
    /// Finished with a stage.
    Done,
    /// Stopped by a fatal error.
    Failed,
    /// Stopped by cancellation.
    Cancelled,
}

/// What became of one visited object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectOutcome {
    /// Exported with a mesh.
    Mesh {
        /// Triangle count of the mesh.
        triangles: usize,
    },
    /// Exported as a transform/group prim without geometry.
    TransformOnly,
    /// Left out together with its subtree.
    Pruned,
}

/// Per-object line of an [`ExportReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectReport {
    /// Object visited.
    pub object: ObjectId,
    /// Prim path, unless pruned.
    pub path: Option<String>,
    /// Outcome.
    pub outcome: ObjectOutcome,
}

/// Everything non-fatal that happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    /// Warnings, traversal problems first, then geometry problems.
    pub warnings: Vec<ExportWarning>,
    /// One entry per visited or pruned object path.
    pub objects: Vec<ObjectReport>,
    /// Prims in the stage.
    pub prims: usize,
    /// Mesh prims in the stage.
    pub meshes: usize,
    /// Triangles over all meshes.
    pub triangles: usize,
}

impl ExportReport {
    /// Warnings of one kind.
    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &ExportWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

/// A finished stage and its report.
#[derive(Debug, Clone)]
pub struct SceneExport {
    /// The scene graph.
    pub stage: Stage,
    /// Warnings and statistics.
    pub report: ExportReport,
}

/// Result of a run that did not fail.
#[derive(Debug, Clone)]
pub enum ExportOutcome {
    /// The run completed.
    Finished(SceneExport),
    /// The run was cancelled; no partial stage is kept.
    Cancelled,
}

impl ExportOutcome {
    /// The export, if the run completed.
    pub fn finished(self) -> Option<SceneExport> {
        match self {
            ExportOutcome::Finished(export) => Some(export),
            ExportOutcome::Cancelled => None,
        }
    }

    /// True when the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportOutcome::Cancelled)
    }
}

enum Abort {
    Cancelled,
    Fatal(ExportError),
}

impl From<Cancelled> for Abort {
    fn from(_: Cancelled) -> Self {
        Abort::Cancelled
    }
}

impl From<ExportError> for Abort {
    fn from(e: ExportError) -> Self {
        Abort::Fatal(e)
    }
}

impl From<BuildError> for Abort {
    fn from(e: BuildError) -> Self {
        Abort::Fatal(e.into())
    }
}

type Tessellations = HashMap<ObjectId, std::result::Result<MeshBuffer, TessellateError>>;

/// Drives one export of a document snapshot.
///
/// ```no_run
/// # use vcad_usd::{ExportOptions, Exporter};
/// # let doc = vcad_ir::Document::new();
/// let outcome = Exporter::new(&doc, ExportOptions::default())
///     .with_selection(["Body"])
///     .run()?;
/// # Ok::<(), vcad_usd::ExportError>(())
/// ```
#[derive(Debug)]
pub struct Exporter<'a> {
    document: &'a Document,
    options: ExportOptions,
    selection: Option<HashSet<ObjectId>>,
    cancel: Option<CancelToken>,
    state: ExportState,
}

impl<'a> Exporter<'a> {
    /// An idle exporter over `document`.
    pub fn new(document: &'a Document, options: ExportOptions) -> Self {
        Self {
            document,
            options,
            selection: None,
            cancel: None,
            state: ExportState::Idle,
        }
    }

    /// Restrict the export to these objects (and the objects above them).
    pub fn with_selection<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ObjectId>,
    {
        self.selection = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Check this token between steps.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Current state.
    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Run the export.
    ///
    /// Fatal errors (invalid parameters, path collisions) return `Err` and
    /// leave the exporter `Failed`; cancellation returns
    /// [`ExportOutcome::Cancelled`].
    pub fn run(&mut self) -> Result<ExportOutcome> {
        match self.execute() {
            Ok(export) => {
                self.state = ExportState::Done;
                info!(
                    "exported {} prim(s), {} mesh(es), {} triangle(s), {} warning(s)",
                    export.report.prims,
                    export.report.meshes,
                    export.report.triangles,
                    export.report.warnings.len()
                );
                Ok(ExportOutcome::Finished(export))
            }
            Err(Abort::Cancelled) => {
                self.state = ExportState::Cancelled;
                info!("export cancelled");
                Ok(ExportOutcome::Cancelled)
            }
            Err(Abort::Fatal(e)) => {
                self.state = ExportState::Failed;
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> std::result::Result<SceneExport, Abort> {
        self.options.validate()?;
        let params = self.options.tessellation_params();
        let cancel = self.cancel.clone();

        self.state = ExportState::Traversing;
        let roots = self.document.root_ids();
        let walk = TraverseOptions {
            max_depth: self.options.max_depth,
            skip_hidden: self.options.skip_hidden,
            select_descendants: self.options.select_descendants,
        };
        let traversal = traverse(
            self.document,
            &roots,
            self.selection.as_ref(),
            &walk,
            cancel.as_ref(),
        )?;

        self.state = ExportState::Building;
        let meshes = self.tessellate_all(&traversal, &params, cancel.as_ref())?;
        self.build(&traversal, &meshes, cancel.as_ref())
    }

    /// Tessellate every distinct shape object once.
    fn tessellate_all(
        &self,
        traversal: &Traversal,
        params: &TessellationParams,
        cancel: Option<&CancelToken>,
    ) -> std::result::Result<Tessellations, Abort> {
        let index = self.document.index();
        let mut seen = HashSet::new();
        let jobs: Vec<(&ObjectId, &Shape)> = traversal
            .nodes
            .iter()
            .filter(|n| n.role == NodeRole::Selected)
            .filter_map(|n| {
                let object = index.get(n.object.as_str()).copied()?;
                Some((&object.id, object.shape_data()?))
            })
            .filter(|(id, _)| seen.insert(*id))
            .collect();
        debug!(
            "tessellating {} shape(s){}",
            jobs.len(),
            if self.options.parallel { " in parallel" } else { "" }
        );

        let run = |(id, shape): &(&ObjectId, &Shape)| {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            Some(((*id).clone(), tessellate(shape, params)))
        };
        let results: Vec<_> = if self.options.parallel {
            jobs.par_iter().filter_map(run).collect()
        } else {
            jobs.iter().filter_map(run).collect()
        };
        cancel::check(cancel)?;

        for (_, result) in &results {
            if let Err(e @ TessellateError::InvalidParameter(_)) = result {
                return Err(ExportError::from(e.clone()).into());
            }
        }
        Ok(results.into_iter().collect())
    }

    /// Insert prims in traversal order and assemble the report.
    fn build(
        &self,
        traversal: &Traversal,
        meshes: &Tessellations,
        cancel: Option<&CancelToken>,
    ) -> std::result::Result<SceneExport, Abort> {
        let index = self.document.index();
        let metadata = StageMetadata {
            up_axis: self.options.up_axis,
            meters_per_unit: self.options.meters_per_unit,
            default_prim: None,
        };
        let mut builder = SceneGraphBuilder::new(
            metadata,
            self.options.name_source,
            self.options.root_prim.as_deref(),
        )?;

        let mut report = ExportReport::default();
        let mut geometry_warnings = Vec::new();

        for (i, node) in traversal.nodes.iter().enumerate() {
            cancel::check(cancel)?;
            let Some(object) = index.get(node.object.as_str()).copied() else {
                continue;
            };

            let tessellated = match node.role {
                NodeRole::Selected => meshes.get(&node.object),
                NodeRole::Ancestor => None,
            };
            let mesh = match tessellated {
                Some(Ok(mesh)) => Some(mesh.clone()),
                _ => None,
            };
            let triangles = mesh.as_ref().map(MeshBuffer::num_triangles);

            builder.insert(i, node, object, mesh)?;
            let path = builder.path_for(i).map(str::to_string);

            if let Some(Err(e)) = tessellated {
                let kind = match e {
                    TessellateError::EmptyGeometry => WarningKind::EmptyGeometry,
                    _ => WarningKind::TessellationFailure,
                };
                geometry_warnings.push(ExportWarning {
                    object: node.object.clone(),
                    kind,
                    path: path.clone(),
                    detail: e.to_string(),
                });
            }

            report.objects.push(ObjectReport {
                object: node.object.clone(),
                path,
                outcome: match triangles {
                    Some(triangles) => ObjectOutcome::Mesh { triangles },
                    None => ObjectOutcome::TransformOnly,
                },
            });
        }

        for w in &traversal.warnings {
            if is_pruning(w) {
                report.objects.push(ObjectReport {
                    object: w.object.clone(),
                    path: None,
                    outcome: ObjectOutcome::Pruned,
                });
            }
            let path = match w.node {
                Some(n) => builder.path_for(n),
                None => builder.root_path(),
            };
            report.warnings.push(ExportWarning {
                object: w.object.clone(),
                kind: w.kind,
                path: path.map(str::to_string),
                detail: w.detail.clone(),
            });
        }
        report.warnings.extend(geometry_warnings);
        for w in &report.warnings {
            warn!("{w}");
        }

        let stage = builder.finish();
        report.prims = stage.len();
        report.meshes = stage.num_meshes();
        report.triangles = stage.num_triangles();
        Ok(SceneExport { stage, report })
    }
}

fn is_pruning(w: &TraversalWarning) -> bool {
    matches!(
        w.kind,
        WarningKind::CyclicReference | WarningKind::DepthLimitExceeded | WarningKind::MissingObject
    )
}

/// Export `document` with `options`, no selection and no cancellation.
pub fn export(document: &Document, options: ExportOptions) -> Result<ExportOutcome> {
    Exporter::new(document, options).run()
}
