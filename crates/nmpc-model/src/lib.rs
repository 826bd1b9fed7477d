//! # NMPC 数据模型
//!
//! 控制器各层共享的纯数据结构（无线程、无 IO），包括：
//! - `ConstraintSet` - 路径/终端/输入约束（构造时校验，构造后只读）
//! - `HorizonConfig` - 预测时域与多重打靶节点
//! - `ChainConfig` - 关节名称与链路标识（由外部运动学模型解析）
//! - `RobotState` / `TargetPose` - 传感快照（原子快照语义）
//! - `Trajectory` - 状态/控制轨迹，Warm-Start 平移
//!
//! **依赖原则**: 只依赖 `nalgebra` 与 `thiserror`，上层 crate 全部以此为基础。

pub mod chain;
pub mod constraints;
mod error;
pub mod horizon;
pub mod state;
pub mod trajectory;

pub use chain::{BASE_DOFS, ChainConfig};
pub use constraints::{BoundPair, ConstraintBounds, ConstraintCategory, ConstraintSet};
pub use error::ModelError;
pub use horizon::HorizonConfig;
pub use state::{RobotState, TargetPose};
pub use trajectory::{DecisionLayout, Trajectory};

/// 模型层结果类型
pub type Result<T> = std::result::Result<T, ModelError>;
