//! # NMPC Params
//!
//! 参数加载层。
//!
//! TOML 文件被展平为 `/` 分隔的键（嵌套表与带引号的 `"nmpc/shooting_nodes"` 两种写法等价），
//! 再按命名空间前缀（例如 `arm`）查找：
//!
//! ```toml
//! [arm]
//! joint_names = ["joint_1", "joint_2"]
//! chain_base_link = "base_link"
//!
//! [arm.nmpc]
//! shooting_nodes = 20
//! ```
//!
//! 参数在启动时一次性加载为 [`NmpcParams`] 并按值传递，不存在全局查找。

mod chain_desc;
mod error;
mod params;
mod store;

pub use chain_desc::{ChainDescription, JointDescription, JointKindDescription, TipDescription};
pub use error::ConfigError;
pub use params::{NmpcParams, SolverParams, keys};
pub use store::{FromParam, ParameterStore, ParameterView};

/// 参数层 Result 类型别名
pub type Result<T> = std::result::Result<T, ConfigError>;
