//! Error and warning types for scene export.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use vcad_ir::ObjectId;
use vcad_kernel_math::MathError;
use vcad_kernel_tessellate::TessellateError;

/// A placement that cannot be turned into a matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Non-finite component or zero-length rotation.
    #[error("invalid transform: {0}")]
    InvalidTransform(#[from] MathError),
}

/// Errors from inserting prims into a stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// A prim already exists at the path.
    #[error("prim path already exists: {0}")]
    PathCollision(String),

    /// The parent prim of an insertion is not in the stage.
    #[error("parent prim of {0} is not in the stage")]
    UnknownParent(String),
}

/// Fatal errors: the run is aborted and no stage is returned.
#[derive(Error, Debug)]
pub enum ExportError {
    /// An export option or tessellation parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Options could not be parsed.
    #[error("invalid options file: {0}")]
    Config(#[from] toml::de::Error),

    /// The scene graph builder hit an internal invariant violation.
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl From<TessellateError> for ExportError {
    fn from(e: TessellateError) -> Self {
        ExportError::InvalidParameter(e.to_string())
    }
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Category of a non-fatal problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    /// The object's shape has no faces.
    EmptyGeometry,
    /// Tessellation produced no valid polygons.
    TessellationFailure,
    /// The object is already on the current path; the branch was pruned.
    CyclicReference,
    /// The placement is malformed; identity was used instead.
    InvalidTransform,
    /// A child or link target does not exist in the document.
    MissingObject,
    /// Nesting exceeded the configured depth; the branch was pruned.
    DepthLimitExceeded,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::EmptyGeometry => "empty geometry",
            WarningKind::TessellationFailure => "tessellation failure",
            WarningKind::CyclicReference => "cyclic reference",
            WarningKind::InvalidTransform => "invalid transform",
            WarningKind::MissingObject => "missing object",
            WarningKind::DepthLimitExceeded => "depth limit exceeded",
        };
        f.write_str(s)
    }
}

/// A non-fatal problem recorded during export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportWarning {
    /// Object the warning is about.
    pub object: ObjectId,
    /// Warning category.
    pub kind: WarningKind,
    /// Prim path, when the object got one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Human-readable detail.
    pub detail: String,
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.kind, self.object)?;
        if let Some(path) = &self.path {
            write!(f, " at {path}")?;
        }
        write!(f, "): {}", self.detail)
    }
}
