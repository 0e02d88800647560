#![warn(missing_docs)]

//! Math types for the vcad kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types
//! for 3D CAD geometry: points, vectors, directions and transforms.
//!
//! # Matrix convention
//!
//! Transforms use column vectors: a point is mapped as `p' = M · p` and the
//! translation lives in the last column. Composition reads parent to child,
//! so `parent.then(&local)` is `parent × local` and applies `local` first.
//! USD stores matrices in the row-vector layout; use
//! [`Transform::to_row_vector_rows`] when handing a matrix to a writer.

use nalgebra::{Matrix4, Quaternion, Unit, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// Errors raised while building a transform from raw components.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// A component was NaN or infinite.
    #[error("non-finite component in {0}")]
    NonFinite(&'static str),

    /// A rotation quaternion had zero length and cannot be normalized.
    #[error("rotation quaternion has zero length")]
    ZeroQuaternion,
}

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Rotation about an arbitrary axis through the origin by `angle` radians.
    ///
    /// Uses Rodrigues' rotation formula.
    pub fn rotation_about_axis(axis: &Dir3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let (x, y, z) = (axis.as_ref().x, axis.as_ref().y, axis.as_ref().z);
        let mut m = Matrix4::identity();
        m[(0, 0)] = t * x * x + c;
        m[(0, 1)] = t * x * y - s * z;
        m[(0, 2)] = t * x * z + s * y;
        m[(1, 0)] = t * x * y + s * z;
        m[(1, 1)] = t * y * y + c;
        m[(1, 2)] = t * y * z - s * x;
        m[(2, 0)] = t * x * z - s * y;
        m[(2, 1)] = t * y * z + s * x;
        m[(2, 2)] = t * z * z + c;
        Self { matrix: m }
    }

    /// Rigid motion: rotate by the quaternion `(x, y, z, w)`, then translate.
    ///
    /// The quaternion is normalized first; it must be finite and non-zero.
    pub fn from_rotation_translation(
        quat: [f64; 4],
        translation: [f64; 3],
    ) -> Result<Self, MathError> {
        if quat.iter().any(|c| !c.is_finite()) {
            return Err(MathError::NonFinite("rotation"));
        }
        if translation.iter().any(|c| !c.is_finite()) {
            return Err(MathError::NonFinite("translation"));
        }
        let [x, y, z, w] = quat;
        let q = Quaternion::new(w, x, y, z);
        if q.norm() < 1e-12 {
            return Err(MathError::ZeroQuaternion);
        }
        let rot = UnitQuaternion::from_quaternion(q).to_homogeneous();
        let mut m = rot;
        m[(0, 3)] = translation[0];
        m[(1, 3)] = translation[1];
        m[(2, 3)] = translation[2];
        Ok(Self { matrix: m })
    }

    /// Build from a row-major array in the column-vector convention
    /// (`rows[r][3]` holds the translation).
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Result<Self, MathError> {
        if rows.iter().flatten().any(|c| !c.is_finite()) {
            return Err(MathError::NonFinite("matrix"));
        }
        let mut m = Matrix4::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                m[(r, c)] = *v;
            }
        }
        Ok(Self { matrix: m })
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation, applies rotation/scale).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// True when this is the identity within `eps`.
    pub fn is_identity(&self, eps: f64) -> bool {
        self.approx_eq(&Self::identity(), eps)
    }

    /// Entry-wise comparison within `eps`.
    pub fn approx_eq(&self, other: &Transform, eps: f64) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Rows in the row-vector convention used by USD (`p' = p · M`),
    /// i.e. the transpose, with the translation in the last row.
    pub fn to_row_vector_rows(&self) -> [[f64; 4]; 4] {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.matrix[(c, r)];
            }
        }
        out
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result.x - 11.0).abs() < 1e-12);
        assert!((result.y - 22.0).abs() < 1e-12);
        assert!((result.z - 33.0).abs() < 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let t1 = Transform::translation(1.0, 0.0, 0.0);
        let t2 = Transform::rotation_z(PI / 2.0);
        // (t2 * t1) * p = t2 * (t1 * p): translate, then rotate
        let composed = t2.then(&t1);
        let result = composed.apply_point(&Point3::origin());
        assert!(result.x.abs() < 1e-12);
        assert!((result.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_quaternion_rotation() {
        // 90 degrees about Z: (0, 0, sin 45, cos 45)
        let h = (PI / 4.0).sin();
        let t = Transform::from_rotation_translation([0.0, 0.0, h, h], [0.0, 0.0, 5.0]).unwrap();
        let r = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(r.x.abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
        assert!((r.z - 5.0).abs() < 1e-12);
        assert!(t.approx_eq(
            &Transform::translation(0.0, 0.0, 5.0).then(&Transform::rotation_z(PI / 2.0)),
            1e-12
        ));
    }

    #[test]
    fn test_quaternion_is_normalized() {
        let t = Transform::from_rotation_translation([0.0, 0.0, 0.0, 3.0], [0.0; 3]).unwrap();
        assert!(t.is_identity(1e-12));
    }

    #[test]
    fn test_rejects_malformed_components() {
        assert_eq!(
            Transform::from_rotation_translation([0.0; 4], [0.0; 3]),
            Err(MathError::ZeroQuaternion)
        );
        assert_eq!(
            Transform::from_rotation_translation([0.0, 0.0, 0.0, 1.0], [f64::NAN, 0.0, 0.0]),
            Err(MathError::NonFinite("translation"))
        );
        let mut rows = [[0.0; 4]; 4];
        rows[2][1] = f64::INFINITY;
        assert_eq!(Transform::from_rows(rows), Err(MathError::NonFinite("matrix")));
    }

    #[test]
    fn test_from_rows_and_row_vector_layout() {
        let rows = [
            [1.0, 0.0, 0.0, 4.0],
            [0.0, 1.0, 0.0, 5.0],
            [0.0, 0.0, 1.0, 6.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let t = Transform::from_rows(rows).unwrap();
        assert_eq!(t, Transform::translation(4.0, 5.0, 6.0));
        let usd = t.to_row_vector_rows();
        assert_eq!(usd[3], [4.0, 5.0, 6.0, 1.0]);
        assert_eq!(usd[0][3], 0.0);
    }

    #[test]
    fn test_rotation_about_axis() {
        let axis = Dir3::new_normalize(Vec3::z());
        let t = Transform::rotation_about_axis(&axis, PI / 2.0);
        let result = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert!((result.y - 1.0).abs() < 1e-12);
        assert!(result.z.abs() < 1e-12);
    }
}
