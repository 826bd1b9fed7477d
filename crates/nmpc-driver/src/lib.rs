//! # NMPC Driver
//!
//! 控制循环与线程间状态交换层。
//!
//! ## 线程模型
//!
//! - **感知/目标上下文**（任意线程）：向 [`StateExchange`] 写入 `RobotState` 与 `TargetPose`，
//!   读取最新 [`ControlCommand`]
//! - **控制线程**（[`ControlLoop::spawn`] 启动）：固定频率快照 → 求解 → 发布
//!
//! 两个上下文之间只共享三个单槽邮箱（`ArcSwapOption`），写入方从不等待，
//! 读取方永远看到完整的值。求解器由控制线程独占，同一时刻最多一个求解在进行。
//!
//! ## 降级策略
//!
//! 求解失败（`Infeasible` / `SolverError`）时不发布任何新指令，控制槽保持上一周期的值，
//! 并通过 [`TelemetrySink`] 报告降级事件。

mod command;
pub mod control_loop;
mod error;
pub mod exchange;
mod metrics;
mod phase;
pub mod plant;
pub mod telemetry;

pub use command::ControlCommand;
pub use control_loop::{ControlLoop, ControlLoopBuilder, ControlLoopHandle, CycleOutcome, LoopConfig};
pub use error::LoopError;
pub use exchange::{Mailbox, StateExchange};
pub use metrics::{LoopMetrics, MetricsSnapshot};
pub use phase::{AtomicLoopPhase, LoopPhase};
pub use plant::KinematicPlant;
pub use telemetry::{
    ChannelTelemetry, CycleEvent, DegradedCycle, NullTelemetry, OverrunWarning, TelemetryEvent,
    TelemetrySink, TracingTelemetry,
};

/// 驱动层 Result 类型别名
pub type Result<T> = std::result::Result<T, LoopError>;
