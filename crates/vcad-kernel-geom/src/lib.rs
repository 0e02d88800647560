#![warn(missing_docs)]

//! Analytic surface and curve types for the vcad kernel.
//!
//! Surfaces and curves are closed enums so a B-rep snapshot can be carried
//! through serde unchanged. Every surface is parameterized over `(u, v)`
//! with `u` the angular coordinate around the frame axis (except planes,
//! where `(u, v)` are the in-plane coordinates), and the natural normal
//! `∂P/∂u × ∂P/∂v` points away from the material.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};
use vcad_kernel_math::{Dir3, Point2, Point3, Transform, Vec3};

// =============================================================================
// Frames and deflection
// =============================================================================

/// A local coordinate frame: origin, main axis, and reference direction.
///
/// The reference direction does not need to be perpendicular to the axis;
/// it is orthogonalized on use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame origin.
    pub origin: Point3,
    /// Main axis (local Z).
    pub axis: Vec3,
    /// Reference direction (local X before orthogonalization).
    pub ref_dir: Vec3,
}

/// Orthonormal axes of a [`Frame`].
#[derive(Debug, Clone, Copy)]
pub struct Axes {
    /// Local X.
    pub x: Vec3,
    /// Local Y.
    pub y: Vec3,
    /// Local Z.
    pub z: Vec3,
}

impl Frame {
    /// Create a frame from an origin, axis, and reference direction.
    pub fn new(origin: Point3, axis: Vec3, ref_dir: Vec3) -> Self {
        Self {
            origin,
            axis,
            ref_dir,
        }
    }

    /// The world frame (origin, +Z axis, +X reference).
    pub fn world() -> Self {
        Self::new(Point3::origin(), Vec3::z(), Vec3::x())
    }

    /// A frame at `origin` with its axis along `axis` and an arbitrary
    /// perpendicular reference direction.
    pub fn from_axis(origin: Point3, axis: Vec3) -> Self {
        let arbitrary = if axis.x.abs() < 0.9 * axis.norm() {
            Vec3::x()
        } else {
            Vec3::y()
        };
        Self::new(origin, axis, arbitrary)
    }

    /// True when the axis is non-zero, the reference direction is not
    /// parallel to it, and every component is finite.
    pub fn is_valid(&self) -> bool {
        let finite = self.origin.iter().all(|c| c.is_finite())
            && self.axis.iter().all(|c| c.is_finite())
            && self.ref_dir.iter().all(|c| c.is_finite());
        finite && self.axis.norm() > 1e-12 && self.axis.cross(&self.ref_dir).norm() > 1e-12
    }

    /// Orthonormal axes. Only meaningful when [`Frame::is_valid`] holds.
    pub fn axes(&self) -> Axes {
        let z = self.axis.normalize();
        let x = (self.ref_dir - self.ref_dir.dot(&z) * z).normalize();
        let y = z.cross(&x);
        Axes { x, y, z }
    }

    /// Coordinates of `p` in this frame.
    pub fn to_local(&self, p: &Point3) -> Vec3 {
        let a = self.axes();
        let d = p - self.origin;
        Vec3::new(d.dot(&a.x), d.dot(&a.y), d.dot(&a.z))
    }
}

/// Chord-height and angular limits for discretizing curved geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deflection {
    /// Maximum distance between a true curve and its chord.
    pub linear: f64,
    /// Maximum angle subtended by one segment, in radians.
    pub angular: f64,
}

impl Deflection {
    /// Largest angular step on a circle of `radius` that respects both limits.
    ///
    /// Never exceeds a quarter turn, so a full circle has at least 4 segments.
    pub fn step_angle(&self, radius: f64) -> f64 {
        let mut step = self.angular.min(FRAC_PI_2);
        if radius > self.linear {
            step = step.min(2.0 * (1.0 - self.linear / radius).acos());
        }
        step.max(1e-4)
    }

    /// Number of segments needed to cover `sweep` radians on a circle of `radius`.
    pub fn segments(&self, radius: f64, sweep: f64) -> usize {
        ((sweep.abs() / self.step_angle(radius)).ceil() as usize).max(1)
    }
}

// =============================================================================
// Surfaces
// =============================================================================

/// The kind of a surface (for logging and dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylindrical surface.
    Cylinder,
    /// Conical surface.
    Cone,
    /// Spherical surface.
    Sphere,
    /// Toroidal surface.
    Torus,
}

/// An analytic surface carrying a face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Surface {
    /// `P(u, v) = o + u·x + v·y`.
    Plane {
        /// Plane frame; the axis is the normal.
        frame: Frame,
    },
    /// `P(u, v) = o + r·(cos u·x + sin u·y) + v·z`.
    Cylinder {
        /// Axis frame.
        frame: Frame,
        /// Radius.
        radius: f64,
    },
    /// `P(u, v) = o + (r + v·tan α)·(cos u·x + sin u·y) + v·z`.
    Cone {
        /// Axis frame; the origin lies on the reference circle.
        frame: Frame,
        /// Radius of the reference circle at `v = 0`.
        radius: f64,
        /// Half-angle α in radians (positive widens along +axis).
        half_angle: f64,
    },
    /// `P(u, v) = o + r·(cos v·(cos u·x + sin u·y) + sin v·z)`, `v` is latitude.
    Sphere {
        /// Center frame; the axis points at the north pole.
        frame: Frame,
        /// Radius.
        radius: f64,
    },
    /// `P(u, v) = o + (R + ρ cos v)·(cos u·x + sin u·y) + ρ sin v·z`.
    Torus {
        /// Center frame; the axis is the axis of revolution.
        frame: Frame,
        /// Distance from the axis to the tube center (R).
        major_radius: f64,
        /// Tube radius (ρ).
        minor_radius: f64,
    },
}

impl Surface {
    /// A plane through `origin` with the given normal.
    pub fn plane(origin: Point3, normal: Vec3) -> Self {
        Surface::Plane {
            frame: Frame::from_axis(origin, normal),
        }
    }

    /// The kind of this surface.
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Surface::Plane { .. } => SurfaceKind::Plane,
            Surface::Cylinder { .. } => SurfaceKind::Cylinder,
            Surface::Cone { .. } => SurfaceKind::Cone,
            Surface::Sphere { .. } => SurfaceKind::Sphere,
            Surface::Torus { .. } => SurfaceKind::Torus,
        }
    }

    /// The surface's local frame.
    pub fn frame(&self) -> &Frame {
        match self {
            Surface::Plane { frame }
            | Surface::Cylinder { frame, .. }
            | Surface::Cone { frame, .. }
            | Surface::Sphere { frame, .. }
            | Surface::Torus { frame, .. } => frame,
        }
    }

    /// True when the frame is valid and all radii are positive and finite.
    pub fn is_valid(&self) -> bool {
        let positive = |r: f64| r.is_finite() && r > 0.0;
        self.frame().is_valid()
            && match *self {
                Surface::Plane { .. } => true,
                Surface::Cylinder { radius, .. } | Surface::Sphere { radius, .. } => {
                    positive(radius)
                }
                Surface::Cone {
                    radius, half_angle, ..
                } => radius.is_finite() && radius >= 0.0 && half_angle.abs() < FRAC_PI_2,
                Surface::Torus {
                    major_radius,
                    minor_radius,
                    ..
                } => positive(major_radius) && positive(minor_radius),
            }
    }

    /// Evaluate the surface at `(u, v)`.
    pub fn evaluate(&self, uv: Point2) -> Point3 {
        let a = self.frame().axes();
        let o = self.frame().origin;
        let (sin_u, cos_u) = uv.x.sin_cos();
        let radial = cos_u * a.x + sin_u * a.y;
        match *self {
            Surface::Plane { .. } => o + uv.x * a.x + uv.y * a.y,
            Surface::Cylinder { radius, .. } => o + radius * radial + uv.y * a.z,
            Surface::Cone {
                radius, half_angle, ..
            } => o + (radius + uv.y * half_angle.tan()) * radial + uv.y * a.z,
            Surface::Sphere { radius, .. } => {
                let (sin_v, cos_v) = uv.y.sin_cos();
                o + radius * (cos_v * radial + sin_v * a.z)
            }
            Surface::Torus {
                major_radius,
                minor_radius,
                ..
            } => {
                let (sin_v, cos_v) = uv.y.sin_cos();
                o + (major_radius + minor_radius * cos_v) * radial + minor_radius * sin_v * a.z
            }
        }
    }

    /// Project a point (assumed on or near the surface) to `(u, v)`.
    ///
    /// Angular coordinates are returned in `[0, 2π)`, latitude in `[-π/2, π/2]`.
    pub fn parameters(&self, p: &Point3) -> Point2 {
        let l = self.frame().to_local(p);
        let u = normalize_angle(l.y.atan2(l.x));
        match *self {
            Surface::Plane { .. } => Point2::new(l.x, l.y),
            Surface::Cylinder { .. } | Surface::Cone { .. } => Point2::new(u, l.z),
            Surface::Sphere { .. } => Point2::new(u, l.z.atan2(l.x.hypot(l.y))),
            Surface::Torus { major_radius, .. } => {
                let rr = l.x.hypot(l.y) - major_radius;
                Point2::new(u, normalize_angle(l.z.atan2(rr)))
            }
        }
    }

    /// The full `v` range for surfaces that are closed in `v`.
    pub fn natural_v_range(&self) -> Option<(f64, f64)> {
        match self {
            Surface::Sphere { .. } => Some((-FRAC_PI_2, FRAC_PI_2)),
            Surface::Torus { .. } => Some((0.0, TAU)),
            _ => None,
        }
    }

    /// Largest circle radius swept by `u` within the given `v` range.
    pub fn u_radius(&self, v_range: (f64, f64)) -> f64 {
        match *self {
            Surface::Plane { .. } => 0.0,
            Surface::Cylinder { radius, .. } | Surface::Sphere { radius, .. } => radius,
            Surface::Cone {
                radius, half_angle, ..
            } => {
                let t = half_angle.tan();
                (radius + v_range.0 * t).abs().max((radius + v_range.1 * t).abs())
            }
            Surface::Torus {
                major_radius,
                minor_radius,
                ..
            } => major_radius + minor_radius,
        }
    }

    /// Curvature radius along `v`, or `None` where `v` lines are straight.
    pub fn v_radius(&self) -> Option<f64> {
        match *self {
            Surface::Sphere { radius, .. } => Some(radius),
            Surface::Torus { minor_radius, .. } => Some(minor_radius),
            _ => None,
        }
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(a: f64) -> f64 {
    let r = a.rem_euclid(TAU);
    if r >= TAU {
        0.0
    } else {
        r
    }
}

// =============================================================================
// Curves
// =============================================================================

/// A boundary curve of a face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Curve {
    /// Straight segment from `start` to `end`.
    Line {
        /// Start point.
        start: Point3,
        /// End point.
        end: Point3,
    },
    /// Circular arc: `start` rotated about `axis` through `center` by `angle`
    /// radians (right-hand rule). `angle = 2π` is a full circle.
    Arc {
        /// Circle center.
        center: Point3,
        /// Rotation axis.
        axis: Vec3,
        /// Start point.
        start: Point3,
        /// Signed sweep angle in radians.
        angle: f64,
    },
    /// Free-form curve already sampled by the host (e.g. a B-spline edge).
    Polyline {
        /// Ordered sample points, at least two.
        points: Vec<Point3>,
    },
}

impl Curve {
    /// A full circle of `radius` around `axis`, starting along `ref_dir`.
    pub fn circle(center: Point3, axis: Vec3, ref_dir: Vec3, radius: f64) -> Self {
        let a = Frame::new(center, axis, ref_dir).axes();
        Curve::Arc {
            center,
            axis,
            start: center + radius * a.x,
            angle: TAU,
        }
    }

    /// Sample the curve within `deflection`.
    ///
    /// The start point is included and the end point is not, so the samples
    /// of consecutive edges in a wire concatenate into a closed polygon.
    pub fn sample(&self, deflection: &Deflection) -> Vec<Point3> {
        match self {
            Curve::Line { start, .. } => vec![*start],
            Curve::Arc {
                center,
                axis,
                start,
                angle,
            } => {
                let radius = (start - center).norm();
                if axis.norm() < 1e-12 || radius < 1e-12 {
                    return vec![*start];
                }
                let n = deflection.segments(radius, *angle);
                (0..n)
                    .map(|i| rotate_about(center, axis, start, angle * i as f64 / n as f64))
                    .collect()
            }
            Curve::Polyline { points } => match points.split_last() {
                Some((_, rest)) if !rest.is_empty() => rest.to_vec(),
                _ => points.clone(),
            },
        }
    }
}

fn rotate_about(center: &Point3, axis: &Vec3, p: &Point3, angle: f64) -> Point3 {
    if axis.norm() < 1e-12 {
        return *p;
    }
    let rot = Transform::rotation_about_axis(&Dir3::new_normalize(*axis), angle);
    center + rot.apply_vec(&(p - center))
}

/// Angular span `(start, span)` covered by a set of angles, found as the
/// complement of the largest gap between them. `start + span` may exceed
/// `2π` when the covered range crosses the seam.
pub fn angular_span(angles: &[f64]) -> (f64, f64) {
    if angles.is_empty() {
        return (0.0, 0.0);
    }
    let mut sorted: Vec<f64> = angles.iter().map(|a| normalize_angle(*a)).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut gap = sorted[0] + TAU - sorted[sorted.len() - 1];
    let mut gap_end = 0;
    for i in 1..sorted.len() {
        let g = sorted[i] - sorted[i - 1];
        if g > gap {
            gap = g;
            gap_end = i;
        }
    }
    (sorted[gap_end], TAU - gap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn deflection() -> Deflection {
        Deflection {
            linear: 0.01,
            angular: 0.5,
        }
    }

    #[test]
    fn test_cylinder_evaluate_and_invert() {
        let s = Surface::Cylinder {
            frame: Frame::new(Point3::new(1.0, 2.0, 3.0), Vec3::z(), Vec3::x()),
            radius: 5.0,
        };
        let p = s.evaluate(Point2::new(PI / 2.0, 4.0));
        assert!((p - Point3::new(1.0, 7.0, 7.0)).norm() < 1e-12);
        let uv = s.parameters(&p);
        assert!((uv.x - PI / 2.0).abs() < 1e-12);
        assert!((uv.y - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_sphere_parameters_round_trip() {
        let s = Surface::Sphere {
            frame: Frame::world(),
            radius: 2.0,
        };
        for &(u, v) in &[(0.3, 0.2), (2.0, -1.0), (5.0, 1.2)] {
            let uv = Point2::new(u, v);
            let p = s.evaluate(uv);
            assert!(((p - Point3::origin()).norm() - 2.0).abs() < 1e-12);
            let back = s.parameters(&p);
            assert!((back.x - u).abs() < 1e-9 && (back.y - v).abs() < 1e-9);
        }
    }

    #[test]
    fn test_torus_and_cone_parameters() {
        let torus = Surface::Torus {
            frame: Frame::world(),
            major_radius: 10.0,
            minor_radius: 2.0,
        };
        let uv = Point2::new(1.0, 4.0);
        let back = torus.parameters(&torus.evaluate(uv));
        assert!((back.x - 1.0).abs() < 1e-9 && (back.y - 4.0).abs() < 1e-9);

        let cone = Surface::Cone {
            frame: Frame::world(),
            radius: 3.0,
            half_angle: -0.3,
        };
        let uv = Point2::new(4.0, 2.0);
        let back = cone.parameters(&cone.evaluate(uv));
        assert!((back.x - 4.0).abs() < 1e-9 && (back.y - 2.0).abs() < 1e-9);
        assert!(cone.is_valid());
    }

    #[test]
    fn test_invalid_surfaces() {
        let bad_frame = Surface::Plane {
            frame: Frame::new(Point3::origin(), Vec3::zeros(), Vec3::x()),
        };
        assert!(!bad_frame.is_valid());
        let bad_radius = Surface::Sphere {
            frame: Frame::world(),
            radius: -1.0,
        };
        assert!(!bad_radius.is_valid());
    }

    #[test]
    fn test_step_angle_respects_chord_height() {
        let d = deflection();
        let r = 10.0;
        let step = d.step_angle(r);
        let sagitta = r * (1.0 - (step / 2.0).cos());
        assert!(sagitta <= d.linear + 1e-12);
        // Coarse tolerance still caps the step at a quarter turn.
        let coarse = Deflection {
            linear: 100.0,
            angular: 10.0,
        };
        assert_eq!(coarse.segments(1.0, TAU), 4);
    }

    #[test]
    fn test_full_circle_samples() {
        let c = Curve::circle(Point3::origin(), Vec3::z(), Vec3::x(), 3.0);
        let pts = c.sample(&deflection());
        assert!(pts.len() >= 4);
        assert!((pts[0] - Point3::new(3.0, 0.0, 0.0)).norm() < 1e-12);
        let last = pts[pts.len() - 1];
        assert!((last - pts[0]).norm() < 3.0 * deflection().angular);
        for p in &pts {
            assert!(((p - Point3::origin()).norm() - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_polyline_and_line_samples_exclude_end() {
        let line = Curve::Line {
            start: Point3::origin(),
            end: Point3::new(1.0, 0.0, 0.0),
        };
        assert_eq!(line.sample(&deflection()), vec![Point3::origin()]);
        let poly = Curve::Polyline {
            points: vec![
                Point3::origin(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
        };
        let pts = poly.sample(&deflection());
        assert_eq!(pts, vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
    }

    #[test]
    fn test_angular_span() {
        // Quarter arc sampled densely
        let angles: Vec<f64> = (0..=10).map(|i| FRAC_PI_2 * i as f64 / 10.0).collect();
        let (start, span) = angular_span(&angles);
        assert!(start.abs() < 1e-12);
        assert!((span - FRAC_PI_2).abs() < 1e-12);

        // Arc crossing the seam: 350° → 10°
        let angles = [350f64.to_radians(), 0.0, 10f64.to_radians()];
        let (start, span) = angular_span(&angles);
        assert!((start - 350f64.to_radians()).abs() < 1e-12);
        assert!((span - 20f64.to_radians()).abs() < 1e-9);

        // A single repeated angle covers nothing
        assert_eq!(angular_span(&[1.0, 1.0]).1, 0.0);
    }
}
