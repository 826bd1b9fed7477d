//! SDK 顶层错误与进程退出码

use nmpc_driver::LoopError;
use nmpc_kinematics::KinematicsError;
use nmpc_model::ModelError;
use nmpc_params::ConfigError;
use thiserror::Error;

/// 模型构造失败的退出码
pub const EXIT_MODEL_ERROR: i32 = 5;

/// SDK 顶层错误
#[derive(Error, Debug)]
pub enum NmpcError {
    /// 参数加载失败
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 约束 / 时域 / 维度 / 权重非法
    #[error(transparent)]
    Model(#[from] ModelError),

    /// 运动链描述非法
    #[error("Kinematic model error: {0}")]
    Kinematics(#[from] KinematicsError),

    /// 既没有 `chain/joints` 描述，也没有调用方提供的运动学模型
    #[error("No kinematic model: set 'chain/joints' or supply a model")]
    MissingKinematicModel,

    /// 控制循环错误
    #[error(transparent)]
    Loop(#[from] LoopError),

    /// 日志初始化失败
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl NmpcError {
    /// 进程退出码
    ///
    /// | 错误 | 退出码 |
    /// |---|---|
    /// | `chain_tip_link` 缺失 | 2 |
    /// | `chain_base_link` 缺失 | 3 |
    /// | `tracking_frame` 缺失 | 4 |
    /// | 模型构造失败 | 5 |
    /// | 其他 | 1 |
    pub fn exit_code(&self) -> i32 {
        match self {
            NmpcError::Config(e) => e.exit_code(),
            NmpcError::Model(_)
            | NmpcError::Kinematics(_)
            | NmpcError::MissingKinematicModel
            | NmpcError::Loop(LoopError::Model(_)) => EXIT_MODEL_ERROR,
            NmpcError::Loop(_) | NmpcError::Logging(_) => 1,
        }
    }
}
