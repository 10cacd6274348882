use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use nalgebra::Point3;
use proptest::prelude::*;
use realign_core::volume::tensor_to_f64;
use realign_core::RigidTransform;
use std::f64::consts::FRAC_PI_2;

type B = NdArray<f32>;

fn rigid() -> impl Strategy<Value = RigidTransform> {
    (
        prop::array::uniform3(-20.0f64..20.0),
        // Keep ry away from +-90 deg where Euler extraction is degenerate
        (-3.0f64..3.0, -1.4f64..1.4, -3.0f64..3.0),
        prop::array::uniform3(-30.0f64..30.0),
    )
        .prop_map(|(t, (rx, ry, rz), c)| RigidTransform::new(t, [rx, ry, rz], c))
}

fn point() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-50.0f64..50.0).prop_map(Point3::from)
}

proptest! {
    #[test]
    fn test_compose_with_inverse_is_identity(t in rigid()) {
        prop_assert!(t.compose(&t.invert()).is_identity(1e-9));
        prop_assert!(t.invert().compose(&t).is_identity(1e-9));
    }

    #[test]
    fn test_composition_is_associative(a in rigid(), b in rigid(), c in rigid()) {
        let left = a.compose(&b).compose(&c);
        let right = a.compose(&b.compose(&c));
        prop_assert!(left.approx_eq(&right, 1e-9));
    }

    #[test]
    fn test_apply_matches_matrix(t in rigid(), p in point()) {
        let direct = t.apply(&p);
        let via_matrix = t.matrix().transform_point(&p);
        prop_assert!((direct - via_matrix).norm() < 1e-9);
    }

    #[test]
    fn test_compose_applies_right_operand_first(a in rigid(), b in rigid(), p in point()) {
        let composed = a.compose(&b).apply(&p);
        let sequential = a.apply(&b.apply(&p));
        prop_assert!((composed - sequential).norm() < 1e-8);
    }

    #[test]
    fn test_parameters_survive_matrix_roundtrip(t in rigid()) {
        let center = t.center();
        let back = RigidTransform::from_matrix(&t.matrix(), [center.x, center.y, center.z]).unwrap();
        for (a, b) in t.parameters().iter().zip(back.parameters()) {
            prop_assert!((a - b).abs() < 1e-8, "{:?} vs {:?}", t.parameters(), back.parameters());
        }
    }
}

#[test]
fn test_rigid_transform_3d_tensor() {
    let device = Default::default();

    // Rotate 90 degrees around Z, then translate by (1, 2, 3):
    // (1, 0, 0) -> (0, 1, 0) -> (1, 3, 3)
    let transform = RigidTransform::new([1.0, 2.0, 3.0], [0.0, 0.0, FRAC_PI_2], [0.0; 3]);
    let points = Tensor::<B, 2>::from_floats([[1.0, 0.0, 0.0]], &device);
    let actual = tensor_to_f64(transform.transform_points(points));

    let expected = [1.0, 3.0, 3.0];
    for axis in 0..3 {
        assert!(
            (actual[axis] - expected[axis]).abs() < 1e-5,
            "axis {axis} mismatch: got {}, expected {}",
            actual[axis],
            expected[axis]
        );
    }
}

#[test]
fn test_serde_roundtrip_keeps_center() {
    let transform = RigidTransform::new([1.0, -2.0, 0.5], [0.01, 0.02, 0.03], [15.5, 15.5, 15.5]);
    let json = serde_json::to_string(&transform).unwrap();
    let back: RigidTransform = serde_json::from_str(&json).unwrap();
    assert_eq!(transform, back);
}
