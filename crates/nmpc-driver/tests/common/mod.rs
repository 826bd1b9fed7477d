//! 控制循环测试共用夹具

#![allow(dead_code)]

use nalgebra::DVector;
use nmpc_kinematics::{ChainJoint, JointKind, KinematicModel, SerialChain, origin_from_xyz_rpy};
use nmpc_model::{ChainConfig, ConstraintBounds, ConstraintSet, HorizonConfig};
use nmpc_solver::{
    BackendOutcome, NlpBackend, NmpcProblem, ProblemBuilder, ProblemParameters, SolveBudget,
    TerminationCode,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn box_constraints(dim: usize, state_limit: f64, input_limit: f64) -> ConstraintSet {
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

fn names(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{}_{}", prefix, i)).collect()
}

/// 平面两连杆问题（用于脚本化后端，求解器本身不会被调用）
pub fn planar_problem(shooting_nodes: usize) -> NmpcProblem {
    let model: Arc<dyn KinematicModel> = Arc::new(
        SerialChain::new(vec![
            ChainJoint::revolute_z("j_1", origin_from_xyz_rpy([0.0; 3], [0.0; 3])),
            ChainJoint::revolute_z("j_2", origin_from_xyz_rpy([0.5, 0.0, 0.0], [0.0; 3])),
        ])
        .unwrap()
        .with_tip_offset(origin_from_xyz_rpy([0.4, 0.0, 0.0], [0.0; 3])),
    );
    ProblemBuilder::velocity_controlled(
        HorizonConfig::new(shooting_nodes, 0.1 * shooting_nodes as f64).unwrap(),
        ChainConfig::new(names("j", 2), "base_link", "tip", "target", false).unwrap(),
        box_constraints(2, 3.0, 1.0),
        model,
    )
    .build()
    .unwrap()
}

/// 六轴机械臂问题
pub fn arm_problem(shooting_nodes: usize, time_horizon: f64) -> NmpcProblem {
    let y_axis = |name: &str, xyz: [f64; 3]| {
        ChainJoint::new(
            name,
            origin_from_xyz_rpy(xyz, [0.0; 3]),
            nalgebra::Vector3::y(),
            JointKind::Revolute,
        )
        .unwrap()
    };
    let model: Arc<dyn KinematicModel> = Arc::new(
        SerialChain::new(vec![
            ChainJoint::revolute_z("joint_1", origin_from_xyz_rpy([0.0, 0.0, 0.12], [0.0; 3])),
            y_axis("joint_2", [0.0, 0.0, 0.08]),
            y_axis("joint_3", [0.0, 0.0, 0.35]),
            ChainJoint::revolute_z("joint_4", origin_from_xyz_rpy([0.0, 0.0, 0.3], [0.0; 3])),
            y_axis("joint_5", [0.0, 0.0, 0.05]),
            ChainJoint::revolute_z(
                "joint_6",
                origin_from_xyz_rpy([0.0, 0.0, 0.05], [0.0, 0.0, FRAC_PI_2]),
            ),
        ])
        .unwrap()
        .with_tip_offset(origin_from_xyz_rpy([0.0, 0.0, 0.06], [0.0; 3])),
    );
    ProblemBuilder::velocity_controlled(
        HorizonConfig::new(shooting_nodes, time_horizon).unwrap(),
        ChainConfig::new(names("joint", 6), "base_link", "tool0", "target_frame", false).unwrap(),
        box_constraints(6, 3.0, 0.5),
        model,
    )
    .build()
    .unwrap()
}

pub const Q0: [f64; 6] = [0.1, -0.5, 0.8, 0.2, 0.4, -0.3];

/// 脚本化后端的一步
#[derive(Debug, Clone)]
pub enum Step {
    /// 收敛；第 k 个控制量的每个分量为 `base + 0.01·k`
    Converge(f64),
    /// 达到迭代上限（迭代点有限）
    MaxIterations(f64),
    Infeasible,
    /// 迭代点发散（NaN）
    Diverge,
    /// 阻塞 `stall` 后收敛；`honor_deadline` 时提前以超时返回
    Stall {
        stall: Duration,
        honor_deadline: bool,
    },
}

/// 后端收到的初值与返回的迭代点
#[derive(Debug, Default)]
pub struct Recording {
    pub seen: Vec<DVector<f64>>,
    pub returned: Vec<DVector<f64>>,
}

/// 按脚本逐次返回结果的后端；脚本耗尽后一直收敛
pub struct ScriptedBackend {
    script: VecDeque<Step>,
    recording: Arc<Mutex<Recording>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Step>) -> (Self, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        (
            Self {
                script: script.into(),
                recording: Arc::clone(&recording),
            },
            recording,
        )
    }
}

fn fill_controls(problem: &NmpcProblem, z: &mut DVector<f64>, base: f64) {
    let layout = problem.layout();
    for k in 0..layout.shooting_nodes {
        let offset = layout.control_offset(k);
        for i in 0..layout.control_dim {
            z[offset + i] = base + 0.01 * k as f64;
        }
    }
}

impl NlpBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn solve(
        &mut self,
        problem: &NmpcProblem,
        _params: &ProblemParameters,
        z0: DVector<f64>,
        budget: &SolveBudget,
    ) -> BackendOutcome {
        self.recording.lock().seen.push(z0.clone());
        let step = self.script.pop_front().unwrap_or(Step::Converge(0.0));

        let mut z = z0;
        let code = match step {
            Step::Converge(base) => {
                fill_controls(problem, &mut z, base);
                TerminationCode::Converged
            },
            Step::MaxIterations(base) => {
                fill_controls(problem, &mut z, base);
                TerminationCode::MaxIterations
            },
            Step::Infeasible => TerminationCode::Infeasible,
            Step::Diverge => {
                z.fill(f64::NAN);
                TerminationCode::MaxIterations
            },
            Step::Stall {
                stall,
                honor_deadline,
            } => {
                let start = Instant::now();
                let mut timed_out = false;
                while start.elapsed() < stall {
                    if honor_deadline && budget.expired() {
                        timed_out = true;
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                if timed_out {
                    TerminationCode::Timeout
                } else {
                    TerminationCode::Converged
                }
            },
        };

        self.recording.lock().returned.push(z.clone());
        let objective = if z.iter().all(|v| v.is_finite()) { 1.0 } else { f64::NAN };
        BackendOutcome {
            code,
            z,
            iterations: 2,
            objective,
            longest_iteration: Duration::ZERO,
        }
    }
}
