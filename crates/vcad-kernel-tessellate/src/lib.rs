#![warn(missing_docs)]

//! B-rep to polygon mesh tessellation for the vcad kernel.
//!
//! Converts the faces of a [`Shape`] into one indexed [`MeshBuffer`] by:
//! 1. Sampling face boundaries within the chord-height deflection
//! 2. Ear-clipping planar faces in their plane frame (holes bridged in)
//! 3. Laying a `(u, v)` grid over curved faces
//! 4. Welding coincident vertices and dropping degenerate polygons

mod mesh;
mod parametric;
mod planar;

pub use mesh::{MeshBuffer, MeshFace};

use log::{debug, trace};
use thiserror::Error;
use vcad_kernel_geom::{Deflection, SurfaceKind};
use vcad_kernel_topo::{Face, Shape};

/// Errors from tessellation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TessellateError {
    /// The shape has no faces.
    #[error("shape has no faces")]
    EmptyGeometry,

    /// No face produced a valid polygon.
    #[error("tessellation produced no valid polygons from {faces} face(s)")]
    TessellationFailure {
        /// Number of faces attempted.
        faces: usize,
    },

    /// A tessellation parameter is out of range.
    #[error("invalid tessellation parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for tessellation.
pub type Result<T> = std::result::Result<T, TessellateError>;

/// Tessellation parameters controlling mesh quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessellationParams {
    /// Maximum chord-to-surface distance, in model units.
    pub linear_deflection: f64,
    /// Maximum angle subtended by one segment, in radians.
    pub angular_deflection: f64,
    /// Vertices closer than this are merged.
    pub weld_tolerance: f64,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            linear_deflection: 0.1,
            angular_deflection: 0.5,
            weld_tolerance: 1e-6,
        }
    }
}

impl TessellationParams {
    /// Default parameters with the given linear deflection.
    pub fn from_deflection(linear_deflection: f64) -> Self {
        Self {
            linear_deflection,
            ..Self::default()
        }
    }

    /// Check that every parameter is finite and in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.linear_deflection.is_finite() && self.linear_deflection > 0.0) {
            return Err(TessellateError::InvalidParameter(format!(
                "linear_deflection must be positive, got {}",
                self.linear_deflection
            )));
        }
        if !(self.angular_deflection.is_finite() && self.angular_deflection > 0.0) {
            return Err(TessellateError::InvalidParameter(format!(
                "angular_deflection must be positive, got {}",
                self.angular_deflection
            )));
        }
        if !(self.weld_tolerance.is_finite() && self.weld_tolerance >= 0.0) {
            return Err(TessellateError::InvalidParameter(format!(
                "weld_tolerance must be non-negative, got {}",
                self.weld_tolerance
            )));
        }
        Ok(())
    }

    /// The curve discretization limits.
    pub fn deflection(&self) -> Deflection {
        Deflection {
            linear: self.linear_deflection,
            angular: self.angular_deflection,
        }
    }

    /// Polygons with an area at or below this are dropped.
    fn min_area(&self) -> f64 {
        (self.weld_tolerance * self.weld_tolerance).max(1e-24)
    }
}

/// Tessellate every face of a shape into one welded mesh.
///
/// Faces that produce nothing (invalid surface, empty boundary) are skipped;
/// the call only fails when no face produces a valid polygon.
pub fn tessellate(shape: &Shape, params: &TessellationParams) -> Result<MeshBuffer> {
    params.validate()?;
    let num_faces = shape.num_faces();
    if num_faces == 0 {
        return Err(TessellateError::EmptyGeometry);
    }

    let mut mesh = MeshBuffer::new();
    for face in shape.faces() {
        mesh.merge(&tessellate_face(face, params));
    }

    let welded = mesh.weld(params.weld_tolerance);
    let dropped = mesh.retain_valid(params.min_area());
    mesh.compute_face_normals();
    debug!(
        "tessellated {} face(s): {} points, {} polygons ({} welded, {} degenerate dropped)",
        num_faces,
        mesh.num_points(),
        mesh.num_faces(),
        welded,
        dropped
    );

    if mesh.is_empty() {
        return Err(TessellateError::TessellationFailure { faces: num_faces });
    }
    Ok(mesh)
}

/// Tessellate a single face, unwelded.
fn tessellate_face(face: &Face, params: &TessellationParams) -> MeshBuffer {
    if !face.surface.is_valid() {
        debug!("skipping {:?} face with invalid surface", face.surface.kind());
        return MeshBuffer::new();
    }
    let mesh = match face.surface.kind() {
        SurfaceKind::Plane => planar::tessellate_planar_face(face, params),
        SurfaceKind::Cylinder | SurfaceKind::Cone | SurfaceKind::Sphere | SurfaceKind::Torus => {
            parametric::tessellate_curved_face(face, params)
        }
    };
    trace!(
        "{:?} face -> {} triangles",
        face.surface.kind(),
        mesh.num_faces()
    );
    mesh
}
