#![warn(missing_docs)]

//! Translate vcad documents into USD-style scene graphs.
//!
//! A run walks the document hierarchy from its roots, composes placements
//! into world transforms, tessellates the shapes of exported objects, and
//! assembles a [`Stage`] of uniquely named prims. Recoverable problems
//! (cycles, missing references, empty geometry) become [`ExportWarning`]s;
//! only invalid options abort a run.
//!
//! ```
//! use vcad_ir::{Document, DocumentObject};
//! use vcad_kernel_topo::primitives::cuboid;
//! use vcad_usd::{export, ExportOptions};
//!
//! let doc = Document::new()
//!     .with(DocumentObject::group("asm", "Assembly", &["box"]))
//!     .with(DocumentObject::shape("box", "Box 1", cuboid(10.0, 10.0, 10.0)));
//!
//! let scene = export(&doc, ExportOptions::default())?.finished().unwrap();
//! assert!(scene.stage.prim_at("/Assembly/Box_1").is_some());
//! # Ok::<(), vcad_usd::ExportError>(())
//! ```

pub mod cancel;
pub mod error;
pub mod export;
pub mod naming;
pub mod options;
pub mod stage;
pub mod traverse;
pub mod xform;

pub use cancel::{CancelToken, Cancelled};
pub use error::{BuildError, ExportError, ExportWarning, Result, TransformError, WarningKind};
pub use export::{
    export, ExportOutcome, ExportReport, ExportState, Exporter, ObjectOutcome, ObjectReport,
    SceneExport,
};
pub use naming::{sanitize, sanitize_identifier, NameRegistry};
pub use options::{ExportOptions, NameSource, UpAxis};
pub use stage::{PrimId, PrimKind, SceneGraphBuilder, ScenePrim, Stage, StageMetadata};
pub use traverse::{traverse, NodeRole, Traversal, TraversalNode, TraverseOptions};
