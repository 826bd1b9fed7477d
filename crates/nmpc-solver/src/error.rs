//! 求解期评估错误

use nmpc_kinematics::KinematicsError;
use thiserror::Error;

/// 代价/约束评估错误
///
/// 仅在求解期出现，由后端转换为终止码，不会中断控制循环。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// 运动学模型评估失败
    #[error("Kinematics error: {0}")]
    Kinematics(#[from] KinematicsError),

    /// 向量长度不符
    #[error("Dimension mismatch: {what} has {actual} entries, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 评估结果含非有限值
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}
