//! 串联运动链参考实现
//!
//! 状态向量布局：
//! - 底盘启用：`[x, y, yaw, q_1, …, q_n]`，底盘变换为 `Trans(x, y, 0) · Rz(yaw)`
//! - 底盘未启用：`[q_1, …, q_n]`
//!
//! 末端位姿 = 底盘 · Π(origin_i · motion_i(q_i)) · tip_offset。

use crate::error::KinematicsError;
use crate::joint::{ChainJoint, JointKind};
use crate::model::{KinematicModel, PoseJacobian};
use nalgebra::{Isometry3, Matrix6xX, Translation3, UnitQuaternion, Vector3};

/// 平面底盘自由度
const PLANAR_BASE_DOFS: usize = 3;

/// 串联运动链
#[derive(Debug, Clone, PartialEq)]
pub struct SerialChain {
    joints: Vec<ChainJoint>,
    tip_offset: Isometry3<f64>,
    planar_base: bool,
}

impl SerialChain {
    /// 创建运动链（无底盘）
    ///
    /// # 错误
    /// - `KinematicsError::EmptyChain`: 没有关节
    pub fn new(joints: Vec<ChainJoint>) -> Result<Self, KinematicsError> {
        if joints.is_empty() {
            return Err(KinematicsError::EmptyChain);
        }
        Ok(Self {
            joints,
            tip_offset: Isometry3::identity(),
            planar_base: false,
        })
    }

    /// 设置最后一个关节到末端坐标系的固定偏移
    pub fn with_tip_offset(mut self, tip_offset: Isometry3<f64>) -> Self {
        self.tip_offset = tip_offset;
        self
    }

    /// 启用平面移动底盘（状态向量前三位 `x, y, yaw`）
    pub fn with_planar_base(mut self, enabled: bool) -> Self {
        self.planar_base = enabled;
        self
    }

    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    pub fn joint_names(&self) -> Vec<&str> {
        self.joints.iter().map(|j| j.name.as_str()).collect()
    }

    pub fn tip_offset(&self) -> &Isometry3<f64> {
        &self.tip_offset
    }

    pub fn has_planar_base(&self) -> bool {
        self.planar_base
    }

    fn base_dofs(&self) -> usize {
        if self.planar_base { PLANAR_BASE_DOFS } else { 0 }
    }

    fn base_transform(&self, q: &[f64]) -> Isometry3<f64> {
        if self.planar_base {
            Isometry3::from_parts(
                Translation3::new(q[0], q[1], 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), q[2]),
            )
        } else {
            Isometry3::identity()
        }
    }
}

impl KinematicModel for SerialChain {
    fn dof(&self) -> usize {
        self.base_dofs() + self.joints.len()
    }

    fn pose_and_jacobian(&self, q: &[f64]) -> Result<PoseJacobian, KinematicsError> {
        let dof = self.dof();
        if q.len() != dof {
            return Err(KinematicsError::DimensionMismatch {
                expected: dof,
                actual: q.len(),
            });
        }

        let base = self.base_dofs();
        let mut transform = self.base_transform(q);
        // 每个关节在运动前的原点与轴（基座坐标系）
        let mut frames = Vec::with_capacity(self.joints.len());
        for (joint, &value) in self.joints.iter().zip(&q[base..]) {
            transform *= joint.origin;
            frames.push((
                transform.translation.vector,
                transform.rotation * joint.axis.into_inner(),
            ));
            transform *= joint.motion(value);
        }
        let pose = transform * self.tip_offset;
        let tip = pose.translation.vector;

        let mut jacobian = Matrix6xX::zeros(dof);
        if self.planar_base {
            jacobian[(0, 0)] = 1.0;
            jacobian[(1, 1)] = 1.0;
            let z = Vector3::z();
            let lever = tip - Vector3::new(q[0], q[1], 0.0);
            let linear = z.cross(&lever);
            jacobian.fixed_view_mut::<3, 1>(0, 2).copy_from(&linear);
            jacobian.fixed_view_mut::<3, 1>(3, 2).copy_from(&z);
        }

        for (i, (joint, (origin, axis))) in self.joints.iter().zip(frames.iter()).enumerate() {
            let col = base + i;
            match joint.kind {
                JointKind::Revolute => {
                    let linear = axis.cross(&(tip - origin));
                    jacobian.fixed_view_mut::<3, 1>(0, col).copy_from(&linear);
                    jacobian.fixed_view_mut::<3, 1>(3, col).copy_from(axis);
                },
                JointKind::Prismatic => {
                    jacobian.fixed_view_mut::<3, 1>(0, col).copy_from(axis);
                },
            }
        }

        Ok(PoseJacobian { pose, jacobian })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::origin_from_xyz_rpy;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    /// 平面两连杆：两个 z 轴旋转关节，连杆长 1.0 与 0.5
    fn planar_two_link() -> SerialChain {
        SerialChain::new(vec![
            ChainJoint::revolute_z("shoulder", Isometry3::identity()),
            ChainJoint::revolute_z("elbow", origin_from_xyz_rpy([1.0, 0.0, 0.0], [0.0; 3])),
        ])
        .unwrap()
        .with_tip_offset(origin_from_xyz_rpy([0.5, 0.0, 0.0], [0.0; 3]))
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert_eq!(SerialChain::new(vec![]), Err(KinematicsError::EmptyChain));
    }

    #[test]
    fn test_two_link_forward_kinematics() {
        let chain = planar_two_link();
        let pose = chain.forward_kinematics(&[0.0, FRAC_PI_2]).unwrap();
        assert_relative_eq!(pose.translation.vector, Vector3::new(1.0, 0.5, 0.0), epsilon = 1e-12);

        let pose = chain.forward_kinematics(&[FRAC_PI_2, 0.0]).unwrap();
        assert_relative_eq!(pose.translation.vector, Vector3::new(0.0, 1.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_two_link_jacobian_at_zero() {
        let chain = planar_two_link();
        let pj = chain.pose_and_jacobian(&[0.0, 0.0]).unwrap();
        // 末端在 (1.5, 0, 0)：肩关节贡献 vy = 1.5，肘关节 vy = 0.5
        assert_relative_eq!(pj.jacobian[(1, 0)], 1.5, epsilon = 1e-12);
        assert_relative_eq!(pj.jacobian[(1, 1)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(pj.jacobian[(5, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(pj.jacobian[(0, 0)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_planar_base_offsets_tip() {
        let chain = planar_two_link().with_planar_base(true);
        assert_eq!(chain.dof(), 5);
        let pose = chain
            .forward_kinematics(&[2.0, -1.0, FRAC_PI_2, 0.0, 0.0])
            .unwrap();
        // 底盘旋转 90° 后连杆沿 +y 伸出
        assert_relative_eq!(pose.translation.vector, Vector3::new(2.0, 0.5, 0.0), epsilon = 1e-12);

        let pj = chain.pose_and_jacobian(&[2.0, -1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(pj.jacobian[(0, 0)], 1.0);
        assert_relative_eq!(pj.jacobian[(1, 1)], 1.0);
        // yaw 列：杠杆 (1.5, 0, 0)
        assert_relative_eq!(pj.jacobian[(1, 2)], 1.5, epsilon = 1e-12);
        assert_relative_eq!(pj.jacobian[(5, 2)], 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let chain = planar_two_link();
        assert_eq!(
            chain.pose_and_jacobian(&[0.0]),
            Err(KinematicsError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
