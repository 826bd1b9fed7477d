//! 机器人状态与目标位姿快照
//!
//! 两者均为不可分割的快照：写入方整体发布，读取方整体读取，
//! 不存在"只更新了一半"的中间值。

use crate::error::ModelError;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::time::Instant;

/// 机器人状态快照
///
/// `positions` 为完整状态向量（底盘启用时底盘位姿在前）。
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    positions: Vec<f64>,
    velocities: Vec<f64>,
    stamp: Instant,
}

impl RobotState {
    /// 创建状态快照（时间戳为当前时刻）
    ///
    /// # 错误
    /// - `ModelError::InvalidDimensions`: 位置与速度长度不一致，或包含非有限值
    pub fn new(positions: Vec<f64>, velocities: Vec<f64>) -> Result<Self, ModelError> {
        Self::with_stamp(positions, velocities, Instant::now())
    }

    /// 使用指定时间戳创建状态快照
    pub fn with_stamp(
        positions: Vec<f64>,
        velocities: Vec<f64>,
        stamp: Instant,
    ) -> Result<Self, ModelError> {
        if positions.len() != velocities.len() {
            return Err(ModelError::InvalidDimensions(format!(
                "positions has {} entries but velocities has {}",
                positions.len(),
                velocities.len()
            )));
        }
        if positions.iter().chain(velocities.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidDimensions(
                "robot state contains non-finite values".to_string(),
            ));
        }
        Ok(Self {
            positions,
            velocities,
            stamp,
        })
    }

    /// 静止状态（速度为零）
    pub fn at_rest(positions: Vec<f64>) -> Result<Self, ModelError> {
        let velocities = vec![0.0; positions.len()];
        Self::new(positions, velocities)
    }

    /// 零位静止状态
    pub fn zeros(state_dim: usize) -> Self {
        Self {
            positions: vec![0.0; state_dim],
            velocities: vec![0.0; state_dim],
            stamp: Instant::now(),
        }
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn velocities(&self) -> &[f64] {
        &self.velocities
    }

    pub fn stamp(&self) -> Instant {
        self.stamp
    }

    pub fn dim(&self) -> usize {
        self.positions.len()
    }
}

/// 目标位姿快照
///
/// `tracking_frame` 在 `chain_base_link` 下的期望位姿。
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPose {
    pose: Isometry3<f64>,
    stamp: Instant,
}

impl TargetPose {
    pub fn new(pose: Isometry3<f64>) -> Self {
        Self {
            pose,
            stamp: Instant::now(),
        }
    }

    pub fn with_stamp(pose: Isometry3<f64>, stamp: Instant) -> Self {
        Self { pose, stamp }
    }

    /// 由位置和四元数 `(w, x, y, z)` 构造（四元数自动归一化）
    pub fn from_position_quaternion(position: [f64; 3], quaternion: [f64; 4]) -> Self {
        let [w, x, y, z] = quaternion;
        let rotation = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, x, y, z));
        Self::new(Isometry3::from_parts(
            Translation3::new(position[0], position[1], position[2]),
            rotation,
        ))
    }

    pub fn pose(&self) -> &Isometry3<f64> {
        &self.pose
    }

    pub fn position(&self) -> Vector3<f64> {
        self.pose.translation.vector
    }

    pub fn orientation(&self) -> &UnitQuaternion<f64> {
        &self.pose.rotation
    }

    pub fn stamp(&self) -> Instant {
        self.stamp
    }
}
