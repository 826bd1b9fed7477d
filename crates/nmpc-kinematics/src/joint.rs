//! 关节定义

use crate::error::KinematicsError;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

/// 关节类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    /// 绕轴旋转（rad）
    Revolute,
    /// 沿轴平移（m）
    Prismatic,
}

/// 串联链中的单个关节
///
/// 关节 `i` 的变换为 `origin · motion(q_i)`，`origin` 相对上一个关节的子坐标系。
#[derive(Debug, Clone, PartialEq)]
pub struct ChainJoint {
    pub name: String,
    pub origin: Isometry3<f64>,
    pub axis: UnitVector3<f64>,
    pub kind: JointKind,
}

impl ChainJoint {
    /// 创建关节
    ///
    /// # 错误
    /// - `KinematicsError::InvalidJoint`: 轴长度为零或原点含非有限值
    pub fn new(
        name: impl Into<String>,
        origin: Isometry3<f64>,
        axis: Vector3<f64>,
        kind: JointKind,
    ) -> Result<Self, KinematicsError> {
        let name = name.into();
        let finite_origin = origin.translation.vector.iter().all(|v| v.is_finite())
            && origin.rotation.coords.iter().all(|v| v.is_finite());
        if !finite_origin {
            return Err(KinematicsError::InvalidJoint {
                name,
                reason: "origin contains non-finite values".to_string(),
            });
        }
        let axis = UnitVector3::try_new(axis, 1e-9).ok_or_else(|| KinematicsError::InvalidJoint {
            name: name.clone(),
            reason: "zero-length axis".to_string(),
        })?;
        Ok(Self {
            name,
            origin,
            axis,
            kind,
        })
    }

    /// 绕局部 z 轴的旋转关节
    pub fn revolute_z(name: impl Into<String>, origin: Isometry3<f64>) -> Self {
        Self {
            name: name.into(),
            origin,
            axis: Vector3::z_axis(),
            kind: JointKind::Revolute,
        }
    }

    /// 关节在位置 `q` 处的运动变换
    pub fn motion(&self, q: f64) -> Isometry3<f64> {
        match self.kind {
            JointKind::Revolute => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, q),
            ),
            JointKind::Prismatic => Isometry3::from_parts(
                Translation3::from(self.axis.into_inner() * q),
                UnitQuaternion::identity(),
            ),
        }
    }
}

/// 由 `xyz` 平移与 `rpy`（固定轴 XYZ）构造原点变换
pub fn origin_from_xyz_rpy(xyz: [f64; 3], rpy: [f64; 3]) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    )
}
