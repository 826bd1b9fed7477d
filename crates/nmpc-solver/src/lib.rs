//! # NMPC Solver
//!
//! 多重打靶（multiple shooting）问题构建与逐周期求解。
//!
//! ## 模块
//!
//! - [`dynamics`]: 连续时间动力学 `ẋ = f(x, u)` 与默认的速度积分模型
//! - [`integrator`]: 定步长积分器（显式 Euler / RK4）及其灵敏度
//! - [`problem`]: [`ProblemBuilder`] → [`NmpcProblem`]（启动时构建一次）
//! - [`backend`]: 可插拔的 NLP 后端接口 [`NlpBackend`]
//! - [`sqp`]: 参考后端 [`SqpBackend`]（Gauss–Newton SQP + clarabel QP）
//! - [`adapter`]: [`SolverAdapter`]，将后端终止码映射为 [`SolveResult`]
//!
//! ## 决策向量
//!
//! `[x_0, u_0, x_1, u_1, …, x_{N-1}, u_{N-1}, x_N]`，首节点在求解时被等式固定为当前状态。

pub mod adapter;
pub mod backend;
pub mod dynamics;
mod error;
pub mod integrator;
pub mod problem;
pub mod result;
pub mod sqp;
pub mod weights;

pub use adapter::{SolverAdapter, SolverSettings};
pub use backend::{BackendOutcome, NlpBackend, SolveBudget, TerminationCode};
pub use dynamics::{Dynamics, VelocityIntegrator};
pub use error::EvaluationError;
pub use integrator::{Integrator, StepSensitivity};
pub use problem::{LinearizedProblem, NmpcProblem, ProblemBuilder, ProblemParameters};
pub use result::{SolveFailure, SolveReport, SolveResult};
pub use sqp::{SqpBackend, SqpConfig};
pub use weights::TrackingWeights;
