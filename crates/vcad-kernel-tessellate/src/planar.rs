//! Planar faces: boundary sampling and ear-clipping with hole bridging.

use crate::mesh::{MeshBuffer, MeshFace};
use crate::TessellationParams;
use log::debug;
use vcad_kernel_math::Point3;
use vcad_kernel_topo::Face;

/// Tessellate a face lying on a plane.
///
/// The outer loop is made counter-clockwise and holes clockwise in the
/// plane frame, so emitted triangles face along the plane normal before the
/// face orientation is applied.
pub(crate) fn tessellate_planar_face(face: &Face, params: &TessellationParams) -> MeshBuffer {
    let Some(outer) = face.outer.as_ref() else {
        debug!("planar face without an outer wire skipped");
        return MeshBuffer::new();
    };

    let deflection = params.deflection();
    let frame = face.surface.frame();
    let axes = frame.axes();
    let project = |p: &Point3| {
        let d = p - frame.origin;
        (d.dot(&axes.x), d.dot(&axes.y))
    };

    let mut outer_3d = outer.sample(&deflection, params.weld_tolerance);
    if outer_3d.len() < 3 {
        debug!("planar face outer wire has {} samples", outer_3d.len());
        return MeshBuffer::new();
    }
    let mut outer_2d: Vec<(f64, f64)> = outer_3d.iter().map(project).collect();
    if polygon_area_2d(&outer_2d) < 0.0 {
        outer_2d.reverse();
        outer_3d.reverse();
    }

    let mut inner_2d = Vec::new();
    let mut inner_3d = Vec::new();
    for hole in &face.inner {
        let mut hole_3d = hole.sample(&deflection, params.weld_tolerance);
        if hole_3d.len() < 3 {
            continue;
        }
        let mut hole_2d: Vec<(f64, f64)> = hole_3d.iter().map(project).collect();
        if polygon_area_2d(&hole_2d) > 0.0 {
            hole_2d.reverse();
            hole_3d.reverse();
        }
        inner_2d.push(hole_2d);
        inner_3d.push(hole_3d);
    }

    let mut mesh = triangulate_polygon_with_holes(&outer_2d, &inner_2d, &outer_3d, &inner_3d);
    if face.is_reversed() {
        mesh.flip();
    }
    mesh
}

/// Signed area of a 2D polygon; positive when counter-clockwise.
pub(crate) fn polygon_area_2d(pts: &[(f64, f64)]) -> f64 {
    let n = pts.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += pts[i].0 * pts[j].1 - pts[j].0 * pts[i].1;
    }
    area * 0.5
}

/// Triangulate a CCW outer loop with CW holes.
///
/// Each hole is spliced into the outer loop through a bridge between its
/// closest vertex pair, giving one weakly simple polygon for ear clipping.
fn triangulate_polygon_with_holes(
    outer_2d: &[(f64, f64)],
    inner_2d: &[Vec<(f64, f64)>],
    outer_3d: &[Point3],
    inner_3d: &[Vec<Point3>],
) -> MeshBuffer {
    let mut all_2d: Vec<(f64, f64)> = outer_2d.to_vec();
    let mut mesh = MeshBuffer::new();
    for p in outer_3d {
        mesh.push_point(*p);
    }

    let mut poly: Vec<usize> = (0..outer_2d.len()).collect();
    let mut bridged: Vec<usize> = Vec::new();

    for (hole_2d, hole_3d) in inner_2d.iter().zip(inner_3d) {
        let start = all_2d.len();
        all_2d.extend_from_slice(hole_2d);
        for p in hole_3d {
            mesh.push_point(*p);
        }

        // Closest (hole vertex, polygon position), preferring outer vertices
        // not already used by an earlier bridge.
        let mut best: Option<(bool, f64, usize, usize)> = None;
        for (i, h) in hole_2d.iter().enumerate() {
            for (j, &v) in poly.iter().enumerate() {
                let o = all_2d[v];
                let dist = (o.0 - h.0).powi(2) + (o.1 - h.1).powi(2);
                let reused = bridged.contains(&v);
                let better = match best {
                    None => true,
                    Some((r, d, _, _)) => (reused, dist) < (r, d),
                };
                if better {
                    best = Some((reused, dist, i, j));
                }
            }
        }
        let Some((_, _, hole_at, poly_at)) = best else {
            continue;
        };

        let n = hole_2d.len();
        let bridge_outer = poly[poly_at];
        bridged.push(bridge_outer);
        let hole_loop = (0..n).map(|k| start + (hole_at + k) % n);

        let mut merged = Vec::with_capacity(poly.len() + n + 2);
        merged.extend_from_slice(&poly[..=poly_at]);
        merged.extend(hole_loop);
        merged.push(start + hole_at);
        merged.push(bridge_outer);
        merged.extend_from_slice(&poly[poly_at + 1..]);
        poly = merged;
    }

    for [a, b, c] in ear_clip_triangulate(&all_2d, &poly) {
        mesh.faces
            .push(MeshFace::triangle(a as u32, b as u32, c as u32));
    }
    mesh
}

/// Ear clipping of a counter-clockwise polygon given as indices into `verts`.
///
/// If no ear can be found (self-intersecting input) the remainder is fanned.
fn ear_clip_triangulate(verts: &[(f64, f64)], indices: &[usize]) -> Vec<[usize; 3]> {
    let mut out = Vec::new();
    if indices.len() < 3 {
        return out;
    }

    let mut remaining: Vec<usize> = indices.to_vec();
    while remaining.len() > 3 {
        let n = remaining.len();
        let mut ear = None;

        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let a = verts[remaining[prev]];
            let b = verts[remaining[i]];
            let c = verts[remaining[next]];

            let cross = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
            if cross <= 0.0 {
                continue;
            }

            let blocked = (0..n)
                .filter(|&j| j != prev && j != i && j != next)
                .any(|j| point_in_triangle_2d(verts[remaining[j]], a, b, c));
            if !blocked {
                ear = Some((prev, i, next));
                break;
            }
        }

        match ear {
            Some((prev, i, next)) => {
                out.push([remaining[prev], remaining[i], remaining[next]]);
                remaining.remove(i);
            }
            None => {
                // Degenerate or self-intersecting loop: stop clipping.
                debug!("ear clipping stalled with {n} vertices left, remainder dropped");
                return out;
            }
        }
    }

    out.push([remaining[0], remaining[1], remaining[2]]);
    out
}

/// Check if a point is strictly inside a triangle using barycentric coordinates.
fn point_in_triangle_2d(p: (f64, f64), a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    let v0 = (c.0 - a.0, c.1 - a.1);
    let v1 = (b.0 - a.0, b.1 - a.1);
    let v2 = (p.0 - a.0, p.1 - a.1);

    let dot00 = v0.0 * v0.0 + v0.1 * v0.1;
    let dot01 = v0.0 * v1.0 + v0.1 * v1.1;
    let dot02 = v0.0 * v2.0 + v0.1 * v2.1;
    let dot11 = v1.0 * v1.0 + v1.1 * v1.1;
    let dot12 = v1.0 * v2.0 + v1.1 * v2.1;

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < 1e-300 {
        return false;
    }
    let u = (dot11 * dot02 - dot01 * dot12) / denom;
    let v = (dot00 * dot12 - dot01 * dot02) / denom;

    let eps = 1e-10;
    u > eps && v > eps && (u + v) < 1.0 - eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{PI, TAU};
    use vcad_kernel_geom::Surface;
    use vcad_kernel_math::Vec3;
    use vcad_kernel_topo::Wire;

    fn square(size: f64) -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(size, 0.0, 0.0),
            Point3::new(size, size, 0.0),
            Point3::new(0.0, size, 0.0),
        ]
    }

    #[test]
    fn test_ear_clip_concave() {
        // L-shape, CCW
        let verts = [
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ];
        let tris = ear_clip_triangulate(&verts, &[0, 1, 2, 3, 4, 5]);
        assert_eq!(tris.len(), 4);
        let area: f64 = tris
            .iter()
            .map(|t| polygon_area_2d(&[verts[t[0]], verts[t[1]], verts[t[2]]]))
            .sum();
        assert!((area - 3.0).abs() < 1e-12);
        // Every triangle keeps the CCW winding
        for t in &tris {
            assert!(polygon_area_2d(&[verts[t[0]], verts[t[1]], verts[t[2]]]) > 0.0);
        }
    }

    #[test]
    fn test_ear_clip_stall_emits_nothing_outside() {
        // No vertex is convex, so no ear exists
        let verts = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
        assert!(ear_clip_triangulate(&verts, &[0, 1, 2, 3]).is_empty());
    }

    #[test]
    fn test_clockwise_boundary_is_normalized() {
        let mut pts = square(2.0);
        pts.reverse();
        let face = Face::new(Surface::plane(Point3::origin(), Vec3::z()), Wire::polygon(&pts));
        let mut mesh = tessellate_planar_face(&face, &TessellationParams::default());
        mesh.compute_face_normals();
        assert_eq!(mesh.num_faces(), 2);
        for f in &mesh.faces {
            assert!(f.normal.unwrap().z > 0.999);
        }
    }

    #[test]
    fn test_reversed_face_flips_winding() {
        let face = Face::new(
            Surface::plane(Point3::origin(), Vec3::z()),
            Wire::polygon(&square(1.0)),
        )
        .reversed();
        let mut mesh = tessellate_planar_face(&face, &TessellationParams::default());
        mesh.compute_face_normals();
        for f in &mesh.faces {
            assert!(f.normal.unwrap().z < -0.999);
        }
    }

    #[test]
    fn test_triangulate_square_with_circular_hole() {
        // 10x10 square with a radius-2 hole in the middle
        let n_seg = 16;
        let hole: Vec<Point3> = (0..n_seg)
            .map(|i| {
                let theta = TAU * i as f64 / n_seg as f64;
                Point3::new(5.0 + 2.0 * theta.cos(), 5.0 + 2.0 * theta.sin(), 0.0)
            })
            .collect();
        let face = Face::new(
            Surface::plane(Point3::origin(), Vec3::z()),
            Wire::polygon(&square(10.0)),
        )
        .with_hole(Wire::polygon(&hole));

        let mesh = tessellate_planar_face(&face, &TessellationParams::default());
        assert!(mesh.num_faces() > 0, "should produce triangles");

        // Polygonal hole area: n/2 · r² · sin(2π/n)
        let hole_area = 0.5 * n_seg as f64 * 4.0 * (TAU / n_seg as f64).sin();
        let area = mesh.surface_area();
        assert!(
            (area - (100.0 - hole_area)).abs() < 1e-6,
            "expected {}, got {area}",
            100.0 - hole_area
        );
        assert!((area - (100.0 - PI * 4.0)).abs() < 1.0);
    }

    #[test]
    fn test_face_without_outer_wire_is_skipped() {
        let face = Face::unbounded(Surface::plane(Point3::origin(), Vec3::z()));
        assert!(tessellate_planar_face(&face, &TessellationParams::default()).is_empty());
    }
}
