//! Curved faces: a regular `(u, v)` grid over the face's parametric domain.

use crate::mesh::{MeshBuffer, MeshFace};
use crate::TessellationParams;
use log::debug;
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use vcad_kernel_geom::{angular_span, Curve, Deflection, Surface};
use vcad_kernel_math::Point2;
use vcad_kernel_topo::{Face, UvBounds, Wire};

const MIN_SPAN: f64 = 1e-9;

/// Tessellate a face lying on a cylinder, cone, sphere, or torus.
///
/// Inner wires are not trimmed out of curved faces.
pub(crate) fn tessellate_curved_face(face: &Face, params: &TessellationParams) -> MeshBuffer {
    let surface = &face.surface;
    let deflection = params.deflection();
    let Some(domain) = face_domain(face, &deflection, params.weld_tolerance) else {
        debug!("{:?} face has an empty parametric domain", surface.kind());
        return MeshBuffer::new();
    };
    if !face.inner.is_empty() {
        debug!(
            "{:?} face: {} inner wire(s) not trimmed",
            surface.kind(),
            face.inner.len()
        );
    }

    let (u0, u1) = domain.u;
    let (v0, v1) = domain.v;
    let nu = deflection.segments(surface.u_radius(domain.v), u1 - u0);
    let nv = match surface.v_radius() {
        Some(r) => deflection.segments(r, v1 - v0),
        None => 1,
    };

    let mut mesh = MeshBuffer::new();
    for j in 0..=nv {
        let v = v0 + (v1 - v0) * j as f64 / nv as f64;
        for i in 0..=nu {
            let u = u0 + (u1 - u0) * i as f64 / nu as f64;
            mesh.push_point(surface.evaluate(Point2::new(u, v)));
        }
    }

    let reversed = face.is_reversed();
    let row = (nu + 1) as u32;
    for j in 0..nv as u32 {
        for i in 0..nu as u32 {
            let bl = j * row + i;
            let br = bl + 1;
            let tl = bl + row;
            let tr = tl + 1;
            if reversed {
                mesh.faces.push(MeshFace::triangle(bl, tl, br));
                mesh.faces.push(MeshFace::triangle(br, tl, tr));
            } else {
                mesh.faces.push(MeshFace::triangle(bl, br, tl));
                mesh.faces.push(MeshFace::triangle(br, tr, tl));
            }
        }
    }
    mesh
}

/// The parametric rectangle a curved face covers.
///
/// Explicit bounds win. Otherwise the outer wire is projected onto the
/// surface: `u` is a full turn when the wire carries a closed circle around
/// the axis and the covered arc otherwise. A face without a wire covers the
/// surface's natural domain, which only closed surfaces have.
fn face_domain(face: &Face, deflection: &Deflection, merge: f64) -> Option<UvBounds> {
    let surface = &face.surface;
    let bounds = match (face.bounds, face.outer.as_ref()) {
        (Some(b), _) => b,
        (None, Some(wire)) if !wire.is_empty() => {
            let samples = wire.sample(deflection, merge);
            if samples.is_empty() {
                return None;
            }
            let uv: Vec<Point2> = samples.iter().map(|p| surface.parameters(p)).collect();
            inferred_bounds(surface, wire, &uv)?
        }
        _ => UvBounds {
            u: (0.0, TAU),
            v: surface.natural_v_range()?,
        },
    };

    let finite = [bounds.u.0, bounds.u.1, bounds.v.0, bounds.v.1]
        .iter()
        .all(|x| x.is_finite());
    if !finite {
        return None;
    }
    let bounds = clamp_to_surface(surface, bounds);
    (bounds.u.1 - bounds.u.0 > MIN_SPAN && bounds.v.1 - bounds.v.0 > MIN_SPAN).then_some(bounds)
}

/// Limit `u` to one turn, sphere latitude to the poles, and torus `v` to one
/// turn.
fn clamp_to_surface(surface: &Surface, mut bounds: UvBounds) -> UvBounds {
    bounds.u.1 = bounds.u.1.min(bounds.u.0 + TAU);
    match surface {
        Surface::Sphere { .. } => {
            bounds.v = (bounds.v.0.max(-FRAC_PI_2), bounds.v.1.min(FRAC_PI_2));
        }
        Surface::Torus { .. } => bounds.v.1 = bounds.v.1.min(bounds.v.0 + TAU),
        _ => {}
    }
    bounds
}

fn inferred_bounds(surface: &Surface, wire: &Wire, uv: &[Point2]) -> Option<UvBounds> {
    let u = if wraps_around_axis(surface, wire) {
        (0.0, TAU)
    } else {
        let us: Vec<f64> = uv.iter().map(|p| p.x).collect();
        let (start, span) = angular_span(&us);
        (start, start + span)
    };

    let v = match surface {
        Surface::Torus { .. } => {
            let vs: Vec<f64> = uv.iter().map(|p| p.y).collect();
            let (start, span) = angular_span(&vs);
            if span < MIN_SPAN {
                (0.0, TAU)
            } else {
                (start, start + span)
            }
        }
        _ => {
            let lo = uv.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
            let hi = uv.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
            if hi - lo < MIN_SPAN && matches!(surface, Surface::Sphere { .. }) {
                // A single latitude loop bounds a cap; its winding picks the pole.
                if u_winding(uv) > 0.0 {
                    (lo, FRAC_PI_2)
                } else {
                    (-FRAC_PI_2, lo)
                }
            } else {
                (lo, hi)
            }
        }
    };
    Some(UvBounds { u, v })
}

/// True when the wire carries a closed loop around the surface axis: a
/// full-turn arc coaxial with the surface, or a closed polyline.
fn wraps_around_axis(surface: &Surface, wire: &Wire) -> bool {
    let axis = surface.frame().axes().z;
    wire.edges.iter().any(|edge| match edge {
        Curve::Arc {
            axis: arc_axis,
            angle,
            ..
        } => {
            angle.abs() >= TAU - 1e-9
                && arc_axis.norm() > 1e-12
                && arc_axis.normalize().cross(&axis).norm() < 1e-6
        }
        Curve::Polyline { points } => match (points.first(), points.last()) {
            (Some(a), Some(b)) => points.len() > 3 && (a - b).norm() < 1e-9,
            _ => false,
        },
        Curve::Line { .. } => false,
    })
}

/// Net `u` sweep of a closed parametric loop.
fn u_winding(uv: &[Point2]) -> f64 {
    let n = uv.len();
    (0..n)
        .map(|i| {
            let d = uv[(i + 1) % n].x - uv[i].x;
            (d + PI).rem_euclid(TAU) - PI
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcad_kernel_geom::Frame;
    use vcad_kernel_math::{Point3, Vec3};

    fn params() -> TessellationParams {
        TessellationParams::default()
    }

    fn cylinder(radius: f64) -> Surface {
        Surface::Cylinder {
            frame: Frame::world(),
            radius,
        }
    }

    fn sphere(radius: f64) -> Surface {
        Surface::Sphere {
            frame: Frame::world(),
            radius,
        }
    }

    #[test]
    fn test_full_cylinder_domain() {
        let face = vcad_kernel_topo::primitives::cylinder(5.0, 10.0).shells[0].faces[0].clone();
        let domain = face_domain(&face, &params().deflection(), 1e-9).unwrap();
        assert_eq!(domain.u, (0.0, TAU));
        assert!(domain.v.0.abs() < 1e-9);
        assert!((domain.v.1 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_cylinder_domain() {
        // Quarter of a cylinder, bounded by two quarter arcs and two lines
        let r = 2.0;
        let wire = Wire::new(vec![
            Curve::Arc {
                center: Point3::origin(),
                axis: Vec3::z(),
                start: Point3::new(r, 0.0, 0.0),
                angle: FRAC_PI_2,
            },
            Curve::Line {
                start: Point3::new(0.0, r, 0.0),
                end: Point3::new(0.0, r, 3.0),
            },
            Curve::Arc {
                center: Point3::new(0.0, 0.0, 3.0),
                axis: Vec3::z(),
                start: Point3::new(0.0, r, 3.0),
                angle: -FRAC_PI_2,
            },
            Curve::Line {
                start: Point3::new(r, 0.0, 3.0),
                end: Point3::new(r, 0.0, 0.0),
            },
        ]);
        let face = Face::new(cylinder(r), wire);
        let domain = face_domain(&face, &params().deflection(), 1e-9).unwrap();
        assert!(domain.u.0.abs() < 1e-9);
        assert!((domain.u.1 - FRAC_PI_2).abs() < 1e-9);

        let mesh = tessellate_curved_face(&face, &params());
        let expected = FRAC_PI_2 * r * 3.0;
        let area = mesh.surface_area();
        assert!(area < expected && area > expected * 0.95, "got {area}");
    }

    #[test]
    fn test_unbounded_cylinder_is_empty() {
        let face = Face::unbounded(cylinder(1.0));
        assert!(face_domain(&face, &params().deflection(), 1e-9).is_none());
        assert!(tessellate_curved_face(&face, &params()).is_empty());
    }

    #[test]
    fn test_explicit_bounds_win() {
        let mut face = Face::unbounded(sphere(1.0));
        face.bounds = Some(UvBounds {
            u: (0.0, PI),
            v: (0.0, FRAC_PI_2),
        });
        let domain = face_domain(&face, &params().deflection(), 1e-9).unwrap();
        assert_eq!(domain.u, (0.0, PI));
        assert_eq!(domain.v, (0.0, FRAC_PI_2));
    }

    #[test]
    fn test_oversized_bounds_are_clamped() {
        let mut face = Face::unbounded(sphere(1.0));
        face.bounds = Some(UvBounds {
            u: (1.0, 1e12),
            v: (-1e9, 1e9),
        });
        let domain = face_domain(&face, &params().deflection(), 1e-9).unwrap();
        assert_eq!(domain.u, (1.0, 1.0 + TAU));
        assert_eq!(domain.v, (-FRAC_PI_2, FRAC_PI_2));

        let mut ring = Face::unbounded(Surface::Torus {
            frame: Frame::world(),
            major_radius: 5.0,
            minor_radius: 1.0,
        });
        ring.bounds = Some(UvBounds {
            u: (0.0, 1e15),
            v: (-PI, 1e15),
        });
        let domain = face_domain(&ring, &params().deflection(), 1e-9).unwrap();
        assert_eq!(domain.u, (0.0, TAU));
        assert_eq!(domain.v, (-PI, -PI + TAU));
        assert!(!tessellate_curved_face(&ring, &params()).is_empty());
    }

    #[test]
    fn test_sphere_cap_from_latitude_loop() {
        let loop_at = |z: f64, axis: Vec3| {
            let r = (1.0 - z * z).sqrt();
            Wire::new(vec![Curve::circle(
                Point3::new(0.0, 0.0, z),
                axis,
                Vec3::x(),
                r,
            )])
        };

        // Counter-clockwise seen from +Z: northern cap
        let north = Face::new(sphere(1.0), loop_at(0.5, Vec3::z()));
        let d = face_domain(&north, &params().deflection(), 1e-9).unwrap();
        assert!((d.v.0 - 0.5f64.asin()).abs() < 1e-9);
        assert_eq!(d.v.1, FRAC_PI_2);

        // Clockwise: southern part
        let south = Face::new(sphere(1.0), loop_at(0.5, -Vec3::z()));
        let d = face_domain(&south, &params().deflection(), 1e-9).unwrap();
        assert_eq!(d.v.0, -FRAC_PI_2);
        assert!((d.v.1 - 0.5f64.asin()).abs() < 1e-9);
    }

    #[test]
    fn test_grid_faces_outward() {
        let face = Face::unbounded(sphere(3.0));
        let mut mesh = tessellate_curved_face(&face, &params());
        mesh.weld(1e-9);
        mesh.retain_valid(1e-12);
        mesh.compute_face_normals();
        for f in &mesh.faces {
            let c = f
                .indices
                .iter()
                .fold(Vec3::zeros(), |acc, &i| acc + mesh.points[i as usize].coords)
                / 3.0;
            assert!(f.normal.unwrap().dot(&c) > 0.0);
        }
    }
}
