//! 运动学模型 trait

use crate::error::KinematicsError;
use nalgebra::{Isometry3, Matrix6xX};

/// 末端位姿与几何雅可比
///
/// 雅可比行序：`[v_x, v_y, v_z, ω_x, ω_y, ω_z]`，均在基座坐标系下表示。
#[derive(Debug, Clone, PartialEq)]
pub struct PoseJacobian {
    pub pose: Isometry3<f64>,
    pub jacobian: Matrix6xX<f64>,
}

/// 运动学模型
///
/// 实现必须是纯函数且线程安全：求解器在控制线程内反复调用。
pub trait KinematicModel: Send + Sync {
    /// 自由度（等于状态维度，含底盘）
    fn dof(&self) -> usize;

    /// 计算末端位姿与 6×dof 雅可比
    fn pose_and_jacobian(&self, q: &[f64]) -> Result<PoseJacobian, KinematicsError>;

    /// 仅计算末端位姿
    fn forward_kinematics(&self, q: &[f64]) -> Result<Isometry3<f64>, KinematicsError> {
        self.pose_and_jacobian(q).map(|pj| pj.pose)
    }
}

impl<M: KinematicModel + ?Sized> KinematicModel for Box<M> {
    fn dof(&self) -> usize {
        (**self).dof()
    }

    fn pose_and_jacobian(&self, q: &[f64]) -> Result<PoseJacobian, KinematicsError> {
        (**self).pose_and_jacobian(q)
    }

    fn forward_kinematics(&self, q: &[f64]) -> Result<Isometry3<f64>, KinematicsError> {
        (**self).forward_kinematics(q)
    }
}

impl<M: KinematicModel + ?Sized> KinematicModel for std::sync::Arc<M> {
    fn dof(&self) -> usize {
        (**self).dof()
    }

    fn pose_and_jacobian(&self, q: &[f64]) -> Result<PoseJacobian, KinematicsError> {
        (**self).pose_and_jacobian(q)
    }

    fn forward_kinematics(&self, q: &[f64]) -> Result<Isometry3<f64>, KinematicsError> {
        (**self).forward_kinematics(q)
    }
}
