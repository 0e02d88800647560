//! Indexed polygon mesh output.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vcad_kernel_math::{Point3, Vec3};

/// One polygon of a [`MeshBuffer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshFace {
    /// Indices into [`MeshBuffer::points`], counter-clockwise around the normal.
    pub indices: Vec<u32>,
    /// Unit face normal, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<Vec3>,
}

impl MeshFace {
    /// A triangle without a normal.
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self {
            indices: vec![a, b, c],
            normal: None,
        }
    }
}

/// Indexed polygon mesh for scene export.
///
/// Every index is in range and every face has at least three distinct
/// vertices once the buffer leaves [`crate::tessellate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffer {
    /// Vertex positions.
    pub points: Vec<Point3>,
    /// Polygons over `points`.
    pub faces: Vec<MeshFace>,
}

impl MeshBuffer {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of polygons.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of triangles the polygons fan into.
    pub fn num_triangles(&self) -> usize {
        self.faces
            .iter()
            .map(|f| f.indices.len().saturating_sub(2))
            .sum()
    }

    /// True when the mesh has no polygons.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Add a vertex and return its index.
    pub fn push_point(&mut self, p: Point3) -> u32 {
        self.points.push(p);
        (self.points.len() - 1) as u32
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &MeshBuffer) {
        let offset = self.points.len() as u32;
        self.points.extend_from_slice(&other.points);
        self.faces.extend(other.faces.iter().map(|f| MeshFace {
            indices: f.indices.iter().map(|&i| i + offset).collect(),
            normal: f.normal,
        }));
    }

    /// Vertex count of every polygon, in order.
    pub fn face_vertex_counts(&self) -> Vec<u32> {
        self.faces.iter().map(|f| f.indices.len() as u32).collect()
    }

    /// All polygon indices, flattened in order.
    pub fn face_vertex_indices(&self) -> Vec<u32> {
        self.faces
            .iter()
            .flat_map(|f| f.indices.iter().copied())
            .collect()
    }

    /// Axis-aligned bounds `(min, max)`, or `None` for a mesh without points.
    pub fn extent(&self) -> Option<(Point3, Point3)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (
                Point3::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Point3::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        }))
    }

    /// Total polygon area.
    pub fn surface_area(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| newell_normal(&self.points, &f.indices).norm())
            .sum()
    }

    /// True when every index is in range and every face has three or more
    /// distinct vertices.
    pub fn validate(&self) -> bool {
        let n = self.points.len();
        self.faces.iter().all(|f| {
            f.indices.iter().all(|&i| (i as usize) < n) && distinct_count(&f.indices) >= 3
        })
    }

    /// Merge vertices closer than `tolerance` and remap face indices.
    ///
    /// The first vertex of each cluster wins, so the result is deterministic.
    /// Returns the number of vertices removed.
    pub fn weld(&mut self, tolerance: f64) -> usize {
        // Keep cell indices well inside i64 for large models.
        let reach = self
            .points
            .iter()
            .map(|p| p.coords.amax())
            .filter(|m| m.is_finite())
            .fold(0.0, f64::max);
        let cell = tolerance.max(reach * 1e-12).max(1e-12);
        let key = |p: &Point3| {
            [
                (p.x / cell).floor() as i64,
                (p.y / cell).floor() as i64,
                (p.z / cell).floor() as i64,
            ]
        };

        let mut grid: HashMap<[i64; 3], Vec<u32>> = HashMap::new();
        let mut welded: Vec<Point3> = Vec::with_capacity(self.points.len());
        let mut remap: Vec<u32> = Vec::with_capacity(self.points.len());

        for p in &self.points {
            let k = key(p);
            let mut found = None;
            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(bucket) = grid.get(&[
                            k[0].saturating_add(dx),
                            k[1].saturating_add(dy),
                            k[2].saturating_add(dz),
                        ]) else {
                            continue;
                        };
                        if let Some(&i) = bucket
                            .iter()
                            .find(|&&i| (welded[i as usize] - p).norm() <= tolerance)
                        {
                            found = Some(i);
                            break 'search;
                        }
                    }
                }
            }
            let index = match found {
                Some(i) => i,
                None => {
                    let i = welded.len() as u32;
                    welded.push(*p);
                    grid.entry(k).or_default().push(i);
                    i
                }
            };
            remap.push(index);
        }

        for face in &mut self.faces {
            for i in &mut face.indices {
                *i = remap[*i as usize];
            }
        }
        let removed = self.points.len() - welded.len();
        self.points = welded;
        removed
    }

    /// Drop faces with out-of-range indices, fewer than three distinct
    /// vertices, or an area not above `min_area`. Unreferenced points are
    /// removed afterwards. Returns the number of faces dropped.
    pub fn retain_valid(&mut self, min_area: f64) -> usize {
        let n = self.points.len();
        let points = &self.points;
        let before = self.faces.len();
        self.faces.retain_mut(|f| {
            if f.indices.iter().any(|&i| i as usize >= n) {
                return false;
            }
            f.indices.dedup();
            while f.indices.len() > 1 && f.indices.first() == f.indices.last() {
                f.indices.pop();
            }
            distinct_count(&f.indices) >= 3 && newell_normal(points, &f.indices).norm() > min_area
        });
        self.compact();
        before - self.faces.len()
    }

    /// Set every face normal from its vertex winding.
    pub fn compute_face_normals(&mut self) {
        for face in &mut self.faces {
            let n = newell_normal(&self.points, &face.indices);
            let len = n.norm();
            face.normal = (len > 0.0).then(|| n / len);
        }
    }

    /// Reverse the winding of every face.
    pub fn flip(&mut self) {
        for face in &mut self.faces {
            face.indices.reverse();
            face.normal = face.normal.map(|n| -n);
        }
    }

    fn compact(&mut self) {
        let mut used = vec![false; self.points.len()];
        for i in self.faces.iter().flat_map(|f| f.indices.iter()) {
            used[*i as usize] = true;
        }
        if used.iter().all(|u| *u) {
            return;
        }
        let mut remap = vec![0u32; self.points.len()];
        let mut kept = Vec::with_capacity(self.points.len());
        for (i, p) in self.points.iter().enumerate() {
            if used[i] {
                remap[i] = kept.len() as u32;
                kept.push(*p);
            }
        }
        for face in &mut self.faces {
            for i in &mut face.indices {
                *i = remap[*i as usize];
            }
        }
        self.points = kept;
    }
}

/// Half the Newell normal: its length is the polygon area.
fn newell_normal(points: &[Point3], indices: &[u32]) -> Vec3 {
    let n = indices.len();
    let mut sum = Vec3::zeros();
    for k in 0..n {
        let a = points[indices[k] as usize].coords;
        let b = points[indices[(k + 1) % n] as usize].coords;
        sum += a.cross(&b);
    }
    sum * 0.5
}

fn distinct_count(indices: &[u32]) -> usize {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> MeshBuffer {
        let mut mesh = MeshBuffer::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            mesh.push_point(Point3::new(x, y, 0.0));
        }
        mesh.faces.push(MeshFace::triangle(0, 1, 2));
        mesh.faces.push(MeshFace::triangle(0, 2, 3));
        mesh
    }

    #[test]
    fn test_counts_and_flattening() {
        let mesh = unit_square();
        assert_eq!(mesh.face_vertex_counts(), vec![3, 3]);
        assert_eq!(mesh.face_vertex_indices(), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.num_triangles(), 2);
        assert!((mesh.surface_area() - 1.0).abs() < 1e-12);
        assert!(mesh.validate());
    }

    #[test]
    fn test_extent() {
        assert_eq!(MeshBuffer::new().extent(), None);
        let (lo, hi) = unit_square().extent().unwrap();
        assert_eq!(lo, Point3::origin());
        assert_eq!(hi, Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = unit_square();
        a.merge(&unit_square());
        assert_eq!(a.num_points(), 8);
        assert_eq!(a.faces[2].indices, vec![4, 5, 6]);
    }

    #[test]
    fn test_weld_merges_duplicates() {
        let mut a = unit_square();
        a.merge(&unit_square());
        let removed = a.weld(1e-9);
        assert_eq!(removed, 4);
        assert_eq!(a.num_points(), 4);
        assert_eq!(a.faces[2].indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_weld_across_cell_boundary() {
        let mut mesh = MeshBuffer::new();
        mesh.push_point(Point3::new(0.999_999_9, 0.0, 0.0));
        mesh.push_point(Point3::new(1.000_000_1, 0.0, 0.0));
        assert_eq!(mesh.weld(1e-6), 1);
    }

    #[test]
    fn test_weld_zero_tolerance_on_large_coordinates() {
        let mut mesh = MeshBuffer::new();
        for _ in 0..2 {
            mesh.push_point(Point3::new(1e7, 1e7, 1e7));
            mesh.push_point(Point3::new(-1e7, 0.0, 1e7));
        }
        mesh.push_point(Point3::new(1e7, 1e7, 1e7 - 1.0));
        assert_eq!(mesh.weld(0.0), 2);
        assert_eq!(mesh.num_points(), 3);
    }

    #[test]
    fn test_retain_valid_drops_degenerates() {
        let mut mesh = unit_square();
        // Collapsed and zero-area triangles
        mesh.faces.push(MeshFace::triangle(0, 0, 1));
        mesh.push_point(Point3::new(2.0, 0.0, 0.0));
        mesh.faces.push(MeshFace::triangle(0, 1, 4));
        mesh.faces.push(MeshFace::triangle(0, 1, 99));

        let dropped = mesh.retain_valid(1e-12);
        assert_eq!(dropped, 3);
        assert_eq!(mesh.num_faces(), 2);
        // The point only used by the zero-area triangle is gone
        assert_eq!(mesh.num_points(), 4);
        assert!(mesh.validate());
    }

    #[test]
    fn test_face_normals_follow_winding() {
        let mut mesh = unit_square();
        mesh.compute_face_normals();
        assert_eq!(mesh.faces[0].normal, Some(Vec3::z()));
        mesh.flip();
        assert_eq!(mesh.faces[0].normal, Some(-Vec3::z()));
        assert_eq!(mesh.faces[0].indices, vec![2, 1, 0]);
    }
}
