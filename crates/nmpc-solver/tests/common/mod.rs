//! 求解器测试共用夹具

#![allow(dead_code)]

use nmpc_kinematics::{ChainJoint, JointKind, KinematicModel, SerialChain, origin_from_xyz_rpy};
use nmpc_model::{ChainConfig, ConstraintBounds, ConstraintSet, HorizonConfig};
use nmpc_solver::{NmpcProblem, ProblemBuilder};
use nalgebra::Vector3;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

pub const JOINTS: [&str; 6] = ["joint_1", "joint_2", "joint_3", "joint_4", "joint_5", "joint_6"];

/// 六轴机械臂（肩-肘-腕结构）
pub fn six_dof_arm() -> SerialChain {
    let y_axis = |name: &str, xyz: [f64; 3]| {
        ChainJoint::new(
            name,
            origin_from_xyz_rpy(xyz, [0.0; 3]),
            Vector3::y(),
            JointKind::Revolute,
        )
        .unwrap()
    };
    SerialChain::new(vec![
        ChainJoint::revolute_z("joint_1", origin_from_xyz_rpy([0.0, 0.0, 0.12], [0.0; 3])),
        y_axis("joint_2", [0.0, 0.0, 0.08]),
        y_axis("joint_3", [0.0, 0.0, 0.35]),
        ChainJoint::revolute_z("joint_4", origin_from_xyz_rpy([0.0, 0.0, 0.3], [0.0; 3])),
        y_axis("joint_5", [0.0, 0.0, 0.05]),
        ChainJoint::revolute_z("joint_6", origin_from_xyz_rpy([0.0, 0.0, 0.05], [0.0, 0.0, FRAC_PI_2])),
    ])
    .unwrap()
    .with_tip_offset(origin_from_xyz_rpy([0.0, 0.0, 0.06], [0.0; 3]))
}

pub fn chain_config() -> ChainConfig {
    ChainConfig::new(
        JOINTS.iter().map(|s| s.to_string()).collect(),
        "base_link",
        "tool0",
        "target_frame",
        false,
    )
    .unwrap()
}

pub fn box_constraints(dim: usize, state_limit: f64, input_limit: f64) -> ConstraintSet {
    ConstraintSet::new(
        dim,
        dim,
        ConstraintBounds {
            path_state_min: vec![-state_limit; dim],
            path_state_max: vec![state_limit; dim],
            terminal_state_min: vec![-state_limit; dim],
            terminal_state_max: vec![state_limit; dim],
            input_min: vec![-input_limit; dim],
            input_max: vec![input_limit; dim],
        },
    )
    .unwrap()
}

pub fn arm_problem(shooting_nodes: usize, time_horizon: f64) -> NmpcProblem {
    let model: Arc<dyn KinematicModel> = Arc::new(six_dof_arm());
    ProblemBuilder::velocity_controlled(
        HorizonConfig::new(shooting_nodes, time_horizon).unwrap(),
        chain_config(),
        box_constraints(6, 3.0, 0.5),
        model,
    )
    .build()
    .unwrap()
}

pub const Q0: [f64; 6] = [0.1, -0.5, 0.8, 0.2, 0.4, -0.3];
