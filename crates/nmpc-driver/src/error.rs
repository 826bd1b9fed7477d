//! 驱动层错误类型定义

use nmpc_model::ModelError;
use std::time::Duration;
use thiserror::Error;

/// 控制循环错误
#[derive(Error, Debug)]
pub enum LoopError {
    /// 循环配置非法（频率、时间预算、初始状态维度）
    #[error("Invalid loop config: {0}")]
    InvalidConfig(String),

    /// 模型构造错误
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// 控制线程创建失败
    #[error("Failed to spawn control thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// 控制线程未在时限内退出
    #[error("Control thread did not finish within {0:?}")]
    JoinTimeout(Duration),

    /// 控制线程 panic
    #[error("Control thread panicked")]
    ThreadPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_error_display() {
        let err = LoopError::InvalidConfig("control_rate_hz = 0".to_string());
        assert_eq!(format!("{}", err), "Invalid loop config: control_rate_hz = 0");

        let err = LoopError::JoinTimeout(Duration::from_secs(2));
        assert!(format!("{}", err).contains("2s"));

        let err: LoopError = ModelError::InvalidHorizon("shooting_nodes = 1".to_string()).into();
        assert!(matches!(err, LoopError::Model(_)));
        assert!(format!("{}", err).contains("shooting_nodes"));
    }
}
