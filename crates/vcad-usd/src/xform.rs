//! Local and accumulated transforms from document placements.
//!
//! Column vectors throughout: `p' = M · p`, translation in the last column,
//! and a child's world matrix is `parent × local`.

use crate::error::TransformError;
use vcad_ir::Placement;
use vcad_kernel_math::Transform;

/// The matrix of a placement; `None` is identity.
pub fn local_transform(placement: Option<&Placement>) -> Result<Transform, TransformError> {
    let Some(placement) = placement else {
        return Ok(Transform::identity());
    };
    let t = match *placement {
        Placement::Rigid { base, rotation } => Transform::from_rotation_translation(
            [rotation.x, rotation.y, rotation.z, rotation.w],
            [base.x, base.y, base.z],
        )?,
        Placement::Matrix { rows } => Transform::from_rows(rows)?,
    };
    Ok(t)
}

/// The placement's local matrix and the accumulated `parent × local`.
pub fn compose(
    parent: &Transform,
    placement: Option<&Placement>,
) -> Result<(Transform, Transform), TransformError> {
    let local = local_transform(placement)?;
    let world = parent.then(&local);
    Ok((local, world))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    use vcad_ir::{Quat, Vec3};
    use vcad_kernel_math::{MathError, Point3};

    #[test]
    fn test_absent_placement_is_identity() {
        assert!(local_transform(None).unwrap().is_identity(0.0));
        let parent = Transform::translation(1.0, 2.0, 3.0);
        let (local, world) = compose(&parent, None).unwrap();
        assert!(local.is_identity(0.0));
        assert_eq!(world, parent);
    }

    #[test]
    fn test_nested_composition() {
        let p1 = Placement::translation(10.0, 0.0, 0.0);
        let p2 = Placement::rigid(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2);
        let p3 = Placement::Matrix {
            rows: [
                [2.0, 0.0, 0.0, 1.0],
                [0.0, 2.0, 0.0, 0.0],
                [0.0, 0.0, 2.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        };

        let (_, m1) = compose(&Transform::identity(), Some(&p1)).unwrap();
        let (_, m2) = compose(&m1, Some(&p2)).unwrap();
        let (l3, m3) = compose(&m2, Some(&p3)).unwrap();
        assert_eq!(l3, local_transform(Some(&p3)).unwrap());

        let expected = local_transform(Some(&p1))
            .unwrap()
            .then(&local_transform(Some(&p2)).unwrap())
            .then(&local_transform(Some(&p3)).unwrap());
        assert!(m3.approx_eq(&expected, 1e-12));

        // Child origin: scale/offset, rotate 90° about Z, then shift
        let p = m3.apply_point(&Point3::origin());
        assert!((p - Point3::new(10.0, 6.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_non_finite_placement_rejected() {
        let bad = Placement::translation(f64::NAN, 0.0, 0.0);
        assert_eq!(
            local_transform(Some(&bad)),
            Err(TransformError::InvalidTransform(MathError::NonFinite("translation")))
        );
        let bad = Placement::Matrix {
            rows: [[f64::INFINITY; 4]; 4],
        };
        assert!(local_transform(Some(&bad)).is_err());
    }

    #[test]
    fn test_zero_quaternion_rejected() {
        let bad = Placement::Rigid {
            base: Vec3::new(0.0, 0.0, 0.0),
            rotation: Quat {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                w: 0.0,
            },
        };
        assert_eq!(
            compose(&Transform::identity(), Some(&bad)),
            Err(TransformError::InvalidTransform(MathError::ZeroQuaternion))
        );
    }

    #[test]
    fn test_non_unit_quaternion_normalized() {
        let scaled = Placement::Rigid {
            base: Vec3::new(0.0, 0.0, 0.0),
            rotation: Quat {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                w: 3.0,
            },
        };
        assert!(local_transform(Some(&scaled)).unwrap().is_identity(1e-12));
    }
}
