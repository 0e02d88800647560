//! Primitive solids as B-rep snapshots.
//!
//! Convention: outward normals. Planar faces carry their outward normal as
//! the plane axis; curved faces use the surface's natural normal.

use crate::{Face, Shape, Shell, Wire};
use std::f64::consts::TAU;
use vcad_kernel_geom::{Curve, Frame, Surface};
use vcad_kernel_math::{Point3, Vec3};

/// Box with one corner at the origin and dimensions `(sx, sy, sz)`.
pub fn cuboid(sx: f64, sy: f64, sz: f64) -> Shape {
    cuboid_at(Point3::origin(), sx, sy, sz)
}

/// Axis-aligned box with its minimum corner at `corner`.
pub fn cuboid_at(corner: Point3, sx: f64, sy: f64, sz: f64) -> Shape {
    let v = [
        corner,
        corner + Vec3::new(sx, 0.0, 0.0),
        corner + Vec3::new(sx, sy, 0.0),
        corner + Vec3::new(0.0, sy, 0.0),
        corner + Vec3::new(0.0, 0.0, sz),
        corner + Vec3::new(sx, 0.0, sz),
        corner + Vec3::new(sx, sy, sz),
        corner + Vec3::new(0.0, sy, sz),
    ];

    // (loop, normal), loops counter-clockwise seen from outside
    let face_defs: [([usize; 4], Vec3); 6] = [
        ([0, 3, 2, 1], -Vec3::z()),
        ([4, 5, 6, 7], Vec3::z()),
        ([0, 1, 5, 4], -Vec3::y()),
        ([2, 3, 7, 6], Vec3::y()),
        ([0, 4, 7, 3], -Vec3::x()),
        ([1, 2, 6, 5], Vec3::x()),
    ];

    let faces = face_defs
        .iter()
        .map(|(idx, normal)| {
            let pts: Vec<Point3> = idx.iter().map(|&i| v[i]).collect();
            Face::new(Surface::plane(pts[0], *normal), Wire::polygon(&pts))
        })
        .collect();

    Shape::from_shell(Shell {
        faces,
        closed: true,
    })
}

/// Cylinder along +Z with its base centered at the origin.
pub fn cylinder(radius: f64, height: f64) -> Shape {
    cone(radius, radius, height)
}

/// Cone frustum along +Z with its base centered at the origin.
///
/// A zero `radius_top` gives a pointed cone.
pub fn cone(radius_bottom: f64, radius_top: f64, height: f64) -> Shape {
    let bottom_seam = Point3::new(radius_bottom, 0.0, 0.0);
    let top_seam = Point3::new(radius_top, 0.0, height);
    let top_center = Point3::new(0.0, 0.0, height);

    let mut edges = vec![
        Curve::Arc {
            center: Point3::origin(),
            axis: Vec3::z(),
            start: bottom_seam,
            angle: TAU,
        },
        Curve::Line {
            start: bottom_seam,
            end: top_seam,
        },
    ];
    if radius_top > 0.0 {
        edges.push(Curve::Arc {
            center: top_center,
            axis: Vec3::z(),
            start: top_seam,
            angle: -TAU,
        });
    }
    edges.push(Curve::Line {
        start: top_seam,
        end: bottom_seam,
    });

    let lateral_surface = if (radius_top - radius_bottom).abs() < 1e-12 {
        Surface::Cylinder {
            frame: Frame::world(),
            radius: radius_bottom,
        }
    } else {
        Surface::Cone {
            frame: Frame::world(),
            radius: radius_bottom,
            half_angle: ((radius_top - radius_bottom) / height).atan(),
        }
    };

    let mut faces = vec![Face::new(lateral_surface, Wire::new(edges))];
    if radius_bottom > 0.0 {
        faces.push(disk(Point3::origin(), -Vec3::z(), radius_bottom));
    }
    if radius_top > 0.0 {
        faces.push(disk(top_center, Vec3::z(), radius_top));
    }

    Shape::from_shell(Shell {
        faces,
        closed: true,
    })
}

/// Sphere centered at the origin.
pub fn sphere(radius: f64) -> Shape {
    Shape::from_shell(Shell {
        faces: vec![Face::unbounded(Surface::Sphere {
            frame: Frame::world(),
            radius,
        })],
        closed: true,
    })
}

/// Torus around +Z centered at the origin.
pub fn torus(major_radius: f64, minor_radius: f64) -> Shape {
    Shape::from_shell(Shell {
        faces: vec![Face::unbounded(Surface::Torus {
            frame: Frame::world(),
            major_radius,
            minor_radius,
        })],
        closed: true,
    })
}

/// Planar disk face with outward normal `normal`.
fn disk(center: Point3, normal: Vec3, radius: f64) -> Face {
    Face::new(
        Surface::Plane {
            frame: Frame::new(center, normal, Vec3::x()),
        },
        Wire::new(vec![Curve::circle(center, normal, Vec3::x(), radius)]),
    )
}
