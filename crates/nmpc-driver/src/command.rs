//! 控制指令

use nmpc_model::BASE_DOFS;
use std::time::Instant;

/// 发布到控制槽的速度指令
///
/// 移动底盘启用时前三个分量为底盘速度 `(vx, vy, ωz)`，其余为关节速度。
#[derive(Debug, Clone, PartialEq)]
pub struct ControlCommand {
    /// 产生该指令的周期序号
    pub cycle: u64,
    pub velocities: Vec<f64>,
    /// 来自 `MaxIterationsReached` 的非最优解
    pub degraded: bool,
    pub stamp: Instant,
    base_active: bool,
}

impl ControlCommand {
    pub fn new(cycle: u64, velocities: Vec<f64>, degraded: bool, base_active: bool) -> Self {
        Self {
            cycle,
            velocities,
            degraded,
            stamp: Instant::now(),
            base_active,
        }
    }

    pub fn base_active(&self) -> bool {
        self.base_active
    }

    /// 底盘速度 `(vx, vy, ωz)`；底盘未启用时为 `None`
    pub fn base_twist(&self) -> Option<[f64; 3]> {
        if !self.base_active || self.velocities.len() < BASE_DOFS {
            return None;
        }
        Some([self.velocities[0], self.velocities[1], self.velocities[2]])
    }

    /// 关节速度
    pub fn joint_velocities(&self) -> &[f64] {
        if self.base_active && self.velocities.len() >= BASE_DOFS {
            &self.velocities[BASE_DOFS..]
        } else {
            &self.velocities
        }
    }

    /// 最大速度分量（绝对值）
    pub fn max_abs(&self) -> f64 {
        self.velocities.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }
}
