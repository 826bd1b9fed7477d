//! 雅可比与有限差分一致性测试

use nalgebra::{Isometry3, Vector3};
use nmpc_kinematics::{ChainJoint, JointKind, KinematicModel, SerialChain, origin_from_xyz_rpy};
use proptest::prelude::*;

/// 六轴空间机械臂（类 UR 结构）+ 一个移动关节
fn spatial_arm(planar_base: bool) -> SerialChain {
    let joints = vec![
        ChainJoint::revolute_z("joint_1", origin_from_xyz_rpy([0.0, 0.0, 0.15], [0.0; 3])),
        ChainJoint::new(
            "joint_2",
            origin_from_xyz_rpy([0.0, 0.1, 0.0], [0.0, std::f64::consts::FRAC_PI_2, 0.0]),
            Vector3::new(0.0, 1.0, 0.0),
            JointKind::Revolute,
        )
        .unwrap(),
        ChainJoint::revolute_z("joint_3", origin_from_xyz_rpy([0.0, -0.1, 0.4], [0.0; 3])),
        ChainJoint::new(
            "joint_4",
            origin_from_xyz_rpy([0.0, 0.0, 0.4], [0.3, 0.0, 0.0]),
            Vector3::new(1.0, 0.0, 1.0),
            JointKind::Revolute,
        )
        .unwrap(),
        ChainJoint::new(
            "slide",
            origin_from_xyz_rpy([0.05, 0.0, 0.0], [0.0; 3]),
            Vector3::new(0.0, 0.0, 1.0),
            JointKind::Prismatic,
        )
        .unwrap(),
        ChainJoint::revolute_z("joint_6", origin_from_xyz_rpy([0.0, 0.0, 0.1], [0.0, 0.2, 0.0])),
    ];
    SerialChain::new(joints)
        .unwrap()
        .with_tip_offset(origin_from_xyz_rpy([0.0, 0.0, 0.08], [0.0, 0.0, 0.5]))
        .with_planar_base(planar_base)
}

fn finite_difference_column(model: &dyn KinematicModel, q: &[f64], col: usize) -> [f64; 6] {
    let eps = 1e-6;
    let mut plus = q.to_vec();
    let mut minus = q.to_vec();
    plus[col] += eps;
    minus[col] -= eps;
    let p: Isometry3<f64> = model.forward_kinematics(&plus).unwrap();
    let m: Isometry3<f64> = model.forward_kinematics(&minus).unwrap();
    let linear = (p.translation.vector - m.translation.vector) / (2.0 * eps);
    let angular = (p.rotation * m.rotation.inverse()).scaled_axis() / (2.0 * eps);
    [linear.x, linear.y, linear.z, angular.x, angular.y, angular.z]
}

fn assert_matches_finite_difference(model: &dyn KinematicModel, q: &[f64]) {
    let pj = model.pose_and_jacobian(q).unwrap();
    for col in 0..model.dof() {
        let fd = finite_difference_column(model, q, col);
        for (row, expected) in fd.iter().enumerate() {
            let actual = pj.jacobian[(row, col)];
            assert!(
                (actual - expected).abs() < 1e-5,
                "J[{}, {}] = {} but finite difference gives {}",
                row,
                col,
                actual,
                expected
            );
        }
    }
}

#[test]
fn test_jacobian_matches_finite_difference_fixed_base() {
    let arm = spatial_arm(false);
    assert_eq!(arm.dof(), 6);
    assert_matches_finite_difference(&arm, &[0.1, -0.4, 0.7, 0.2, 0.05, -1.0]);
}

#[test]
fn test_jacobian_matches_finite_difference_mobile_base() {
    let arm = spatial_arm(true);
    assert_eq!(arm.dof(), 9);
    assert_matches_finite_difference(&arm, &[0.3, -0.2, 0.8, 0.1, -0.4, 0.7, 0.2, 0.05, -1.0]);
}

proptest! {
    #[test]
    fn jacobian_matches_finite_difference_random(
        q in prop::collection::vec(-1.5..1.5f64, 9)
    ) {
        let arm = spatial_arm(true);
        let pj = arm.pose_and_jacobian(&q).unwrap();
        for col in 0..arm.dof() {
            let fd = finite_difference_column(&arm, &q, col);
            for (row, expected) in fd.iter().enumerate() {
                prop_assert!((pj.jacobian[(row, col)] - expected).abs() < 1e-5);
            }
        }
    }
}
