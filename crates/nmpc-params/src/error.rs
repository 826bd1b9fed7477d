//! 参数错误类型定义

use std::path::PathBuf;
use thiserror::Error;

/// 参数加载错误（启动期致命）
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 必需参数缺失
    #[error("Parameter '{0}' not set")]
    MissingKey(String),

    /// 参数类型不符
    #[error("Parameter '{key}' has wrong type: expected {expected}")]
    InvalidType { key: String, expected: &'static str },

    /// 参数取值非法
    #[error("Parameter '{key}' is invalid: {reason}")]
    InvalidValue { key: String, reason: String },

    /// `chain_tip_link` 缺失
    #[error("Parameter 'chain_tip_link' not set")]
    MissingChainTipLink,

    /// `chain_base_link` 缺失
    #[error("Parameter 'chain_base_link' not set")]
    MissingChainBaseLink,

    /// `tracking_frame` 缺失
    #[error("Parameter 'tracking_frame' not set")]
    MissingTrackingFrame,

    /// 文件读取失败
    #[error("Failed to read parameter file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse parameters: {0}")]
    Parse(String),
}

impl ConfigError {
    /// 进程退出码：末端 2、基座 3、跟踪坐标系 4，其余 1
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::MissingChainTipLink => 2,
            ConfigError::MissingChainBaseLink => 3,
            ConfigError::MissingTrackingFrame => 4,
            _ => 1,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
