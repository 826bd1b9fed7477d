//! 运动链描述（`chain/joints`、`chain/tip`）
//!
//! 每个关节由 `{ name, xyz, rpy, axis, kind }` 描述，`xyz`/`rpy` 为相对上一关节子坐标系的固定原点。

use nmpc_kinematics::{ChainJoint, JointKind, KinematicsError, SerialChain, origin_from_xyz_rpy};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

fn default_axis() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

/// 关节类型描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKindDescription {
    #[default]
    Revolute,
    /// 无限位旋转，运动学上等同 `Revolute`
    Continuous,
    Prismatic,
}

impl From<JointKindDescription> for JointKind {
    fn from(kind: JointKindDescription) -> Self {
        match kind {
            JointKindDescription::Revolute | JointKindDescription::Continuous => JointKind::Revolute,
            JointKindDescription::Prismatic => JointKind::Prismatic,
        }
    }
}

/// 单个关节描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescription {
    pub name: String,
    #[serde(default)]
    pub xyz: [f64; 3],
    #[serde(default)]
    pub rpy: [f64; 3],
    #[serde(default = "default_axis")]
    pub axis: [f64; 3],
    #[serde(default)]
    pub kind: JointKindDescription,
}

/// 末端偏移描述
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TipDescription {
    #[serde(default)]
    pub xyz: [f64; 3],
    #[serde(default)]
    pub rpy: [f64; 3],
}

/// 运动链描述
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChainDescription {
    pub joints: Vec<JointDescription>,
    pub tip: TipDescription,
}

impl ChainDescription {
    /// 关节名（按链序）
    pub fn joint_names(&self) -> Vec<&str> {
        self.joints.iter().map(|j| j.name.as_str()).collect()
    }

    /// 构建串联链模型
    pub fn build_model(&self, planar_base: bool) -> Result<SerialChain, KinematicsError> {
        let joints = self
            .joints
            .iter()
            .map(|joint| {
                ChainJoint::new(
                    joint.name.clone(),
                    origin_from_xyz_rpy(joint.xyz, joint.rpy),
                    Vector3::from(joint.axis),
                    joint.kind.into(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SerialChain::new(joints)?
            .with_tip_offset(origin_from_xyz_rpy(self.tip.xyz, self.tip.rpy))
            .with_planar_base(planar_base))
    }
}
