//! NMPC SDK - 末端坐标系跟踪的非线性模型预测控制器
//!
//! 周期性求解有限时域最优控制问题，把末端（`chain_tip_link`）驱动到
//! 外部给定的目标位姿，并只下发第一段控制量。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **模型层** (`model`): 约束、时域、运动链、状态快照与轨迹
//! - **运动学层** (`kinematics`): 正运动学 / 雅可比接口与串联链参考实现
//! - **求解层** (`solver`): 多重打靶问题构建、SQP 后端、终止码映射
//! - **参数层** (`params`): 分层参数加载与退出码
//! - **驱动层** (`driver`): 控制线程、无锁状态交换、遥测
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use nmpc_sdk::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), NmpcError> {
//! let store = ParameterStore::load("config/arm.toml")?;
//! let assembled = bootstrap(&store.namespace("arm"), None)?;
//!
//! let exchange = Arc::new(StateExchange::new());
//! let control_loop = assembled.into_control_loop(
//!     Arc::clone(&exchange),
//!     Arc::new(TracingTelemetry),
//!     None,
//! )?;
//! let handle = control_loop.spawn()?;
//! // exchange.publish_state(..) / exchange.publish_target(..)
//! handle.join()?;
//! # Ok(())
//! # }
//! ```

pub use nmpc_driver as driver;
pub use nmpc_kinematics as kinematics;
pub use nmpc_model as model;
pub use nmpc_params as params;
pub use nmpc_solver as solver;

mod error;
pub mod logging;
mod startup;

pub mod prelude;

pub use error::{EXIT_MODEL_ERROR, NmpcError};
pub use startup::{Bootstrap, bootstrap};

// 常用类型
pub use nmpc_driver::{
    ControlCommand, ControlLoop, ControlLoopHandle, CycleOutcome, LoopConfig, LoopError, LoopPhase,
    StateExchange, TelemetrySink,
};
pub use nmpc_kinematics::{KinematicModel, SerialChain};
pub use nmpc_model::{ConstraintSet, HorizonConfig, ModelError, RobotState, TargetPose};
pub use nmpc_params::{ConfigError, NmpcParams, ParameterStore};
pub use nmpc_solver::{NmpcProblem, SolveFailure, SolveResult, SolverAdapter};

/// SDK Result 类型别名
pub type Result<T> = std::result::Result<T, NmpcError>;
