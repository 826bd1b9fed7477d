//! 模型层错误类型定义

use crate::constraints::ConstraintCategory;
use thiserror::Error;

/// 模型构造错误
///
/// 全部为启动期致命错误：约束、时域或维度不一致时不存在安全的默认值。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// 约束上下界非法（min > max、NaN、长度不匹配）
    #[error("Invalid {category} constraint: {reason}")]
    InvalidConstraint {
        category: ConstraintCategory,
        reason: String,
    },

    /// 时域参数非法（节点数 < 2、时域长度非正）
    #[error("Invalid horizon: {0}")]
    InvalidHorizon(String),

    /// 状态/控制维度非法或与关节列表、运动学模型不一致
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// 代价权重非正定
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_display() {
        let err = ModelError::InvalidConstraint {
            category: ConstraintCategory::Input,
            reason: "min[2] = 1 > max[2] = 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("input"), "unexpected message: {}", msg);
        assert!(msg.contains("min[2]"));

        let err = ModelError::InvalidHorizon("shooting_nodes = 1".to_string());
        assert_eq!(format!("{}", err), "Invalid horizon: shooting_nodes = 1");

        let err = ModelError::InvalidDimensions("state_dim = 0".to_string());
        assert!(format!("{}", err).starts_with("Invalid dimensions"));
    }
}
