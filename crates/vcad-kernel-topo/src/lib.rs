#![warn(missing_docs)]

//! Boundary-representation topology for the vcad kernel.
//!
//! A [`Shape`] is an immutable snapshot of an already-evaluated B-rep:
//! shells of faces, each face lying on an analytic [`Surface`] and bounded
//! by wires of [`Curve`]s. Values are owned and serde-friendly so a host
//! application can hand a resolved shape across a process boundary.

pub mod primitives;

use serde::{Deserialize, Serialize};
use vcad_kernel_geom::{Curve, Deflection, Surface};
use vcad_kernel_math::Point3;

/// Face orientation relative to its surface's natural normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Material lies behind the surface normal.
    #[default]
    Forward,
    /// The face normal is the opposite of the surface normal.
    Reversed,
}

/// A closed loop of boundary curves, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    /// Edges in traversal order; each edge starts where the previous ends.
    pub edges: Vec<Curve>,
}

impl Wire {
    /// Create a wire from its edges.
    pub fn new(edges: Vec<Curve>) -> Self {
        Self { edges }
    }

    /// A closed polygon through `points`.
    pub fn polygon(points: &[Point3]) -> Self {
        let n = points.len();
        let edges = (0..n)
            .map(|i| Curve::Line {
                start: points[i],
                end: points[(i + 1) % n],
            })
            .collect();
        Self { edges }
    }

    /// True when the wire has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Sample the wire into a closed polygon (first point not repeated).
    ///
    /// Consecutive samples closer than `merge` are collapsed.
    pub fn sample(&self, deflection: &Deflection, merge: f64) -> Vec<Point3> {
        let mut out: Vec<Point3> = Vec::new();
        for edge in &self.edges {
            for p in edge.sample(deflection) {
                if out.last().is_some_and(|q| (p - q).norm() <= merge) {
                    continue;
                }
                out.push(p);
            }
        }
        while out.len() > 1 && (out[0] - out[out.len() - 1]).norm() <= merge {
            out.pop();
        }
        out
    }
}

/// Explicit parametric trimming for a face on a curved surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvBounds {
    /// `(start, end)` in `u`; `end` may exceed `2π` for ranges crossing the seam.
    pub u: (f64, f64),
    /// `(min, max)` in `v`.
    pub v: (f64, f64),
}

/// A bounded region of a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Carrier surface.
    pub surface: Surface,
    /// Outer boundary; `None` for faces covering a closed surface entirely.
    #[serde(default)]
    pub outer: Option<Wire>,
    /// Inner boundaries (holes).
    #[serde(default)]
    pub inner: Vec<Wire>,
    /// Orientation relative to the surface normal.
    #[serde(default)]
    pub orientation: Orientation,
    /// Explicit parametric bounds, overriding what the boundary implies.
    #[serde(default)]
    pub bounds: Option<UvBounds>,
}

impl Face {
    /// A face bounded by `outer`, forward-oriented, without holes.
    pub fn new(surface: Surface, outer: Wire) -> Self {
        Self {
            surface,
            outer: Some(outer),
            inner: Vec::new(),
            orientation: Orientation::Forward,
            bounds: None,
        }
    }

    /// A face covering its (closed) surface entirely.
    pub fn unbounded(surface: Surface) -> Self {
        Self {
            surface,
            outer: None,
            inner: Vec::new(),
            orientation: Orientation::Forward,
            bounds: None,
        }
    }

    /// Add a hole.
    pub fn with_hole(mut self, hole: Wire) -> Self {
        self.inner.push(hole);
        self
    }

    /// Flip the orientation.
    pub fn reversed(mut self) -> Self {
        self.orientation = match self.orientation {
            Orientation::Forward => Orientation::Reversed,
            Orientation::Reversed => Orientation::Forward,
        };
        self
    }

    /// True when the face normal is the opposite of the surface normal.
    pub fn is_reversed(&self) -> bool {
        self.orientation == Orientation::Reversed
    }
}

/// A connected set of faces. Closed shells bound a solid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shell {
    /// Faces of the shell.
    pub faces: Vec<Face>,
    /// True when the shell encloses a volume.
    #[serde(default)]
    pub closed: bool,
}

/// A resolved boundary representation: zero or more shells.
///
/// Several closed shells model several solids carried by one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Shells of the shape.
    #[serde(default)]
    pub shells: Vec<Shell>,
}

impl Shape {
    /// A shape with no geometry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A shape made of a single shell.
    pub fn from_shell(shell: Shell) -> Self {
        Self {
            shells: vec![shell],
        }
    }

    /// Combine the shells of several shapes.
    pub fn compound(shapes: impl IntoIterator<Item = Shape>) -> Self {
        Self {
            shells: shapes.into_iter().flat_map(|s| s.shells).collect(),
        }
    }

    /// All faces across all shells.
    pub fn faces(&self) -> impl Iterator<Item = &Face> {
        self.shells.iter().flat_map(|s| s.faces.iter())
    }

    /// Total face count.
    pub fn num_faces(&self) -> usize {
        self.shells.iter().map(|s| s.faces.len()).sum()
    }

    /// True when the shape has no faces.
    pub fn is_empty(&self) -> bool {
        self.num_faces() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcad_kernel_math::Vec3;

    #[test]
    fn wire_sample_drops_closing_duplicate() {
        let wire = Wire::new(vec![
            Curve::Line {
                start: Point3::origin(),
                end: Point3::new(1.0, 0.0, 0.0),
            },
            Curve::Line {
                start: Point3::new(1.0, 0.0, 0.0),
                end: Point3::new(1.0, 0.0, 0.0),
            },
            Curve::Line {
                start: Point3::new(1.0, 0.0, 0.0),
                end: Point3::new(0.0, 1.0, 0.0),
            },
            Curve::Polyline {
                points: vec![Point3::new(0.0, 1.0, 0.0), Point3::origin()],
            },
        ]);
        let d = Deflection {
            linear: 0.1,
            angular: 0.5,
        };
        let pts = wire.sample(&d, 1e-9);
        assert_eq!(pts.len(), 3);
    }

    #[test]
    fn shape_counts_faces_across_shells() {
        let a = primitives::cuboid(1.0, 1.0, 1.0);
        let b = primitives::cuboid(2.0, 2.0, 2.0);
        let both = Shape::compound([a, b]);
        assert_eq!(both.shells.len(), 2);
        assert_eq!(both.num_faces(), 12);
        assert!(Shape::empty().is_empty());
    }

    #[test]
    fn face_json_defaults() {
        let json = r#"{
            "surface": {"type": "Sphere",
                        "frame": {"origin": [0, 0, 0], "axis": [0, 0, 1], "ref_dir": [1, 0, 0]},
                        "radius": 2.0}
        }"#;
        let face: Face = serde_json::from_str(json).expect("deserialize");
        assert!(face.outer.is_none());
        assert!(face.inner.is_empty());
        assert_eq!(face.orientation, Orientation::Forward);
        assert_eq!(face.surface.frame().axis, Vec3::z());
        assert!(face.reversed().is_reversed());
    }
}
