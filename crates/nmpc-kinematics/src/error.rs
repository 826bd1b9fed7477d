//! 运动学错误类型定义

use thiserror::Error;

/// 运动学模型错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// 输入状态向量长度与模型自由度不符
    #[error("Dimension mismatch: expected {expected} joint values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 关节定义非法（零长度轴、非有限原点等）
    #[error("Invalid joint '{name}': {reason}")]
    InvalidJoint { name: String, reason: String },

    /// 运动链为空
    #[error("Kinematic chain has no degrees of freedom")]
    EmptyChain,
}
