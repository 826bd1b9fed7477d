//! # NMPC Kinematics
//!
//! 运动学模型抽象层。
//!
//! 控制器只依赖 [`KinematicModel`]：给定状态向量 `q`，返回末端
//! （`chain_tip_link`）相对基座（`chain_base_link`）的位姿与 6×n 几何雅可比
//! （前三行线速度，后三行角速度）。
//!
//! [`SerialChain`] 是参考实现：固定原点 + 单轴关节的串联链，可选平面移动底盘
//! （`x, y, yaw` 位于状态向量前三位）。

mod error;
mod joint;
mod model;
mod serial;

pub use error::KinematicsError;
pub use joint::{ChainJoint, JointKind, origin_from_xyz_rpy};
pub use model::{KinematicModel, PoseJacobian};
pub use serial::SerialChain;

/// 运动学层 Result 类型别名
pub type Result<T> = std::result::Result<T, KinematicsError>;
