//! 单周期求解结果

use nmpc_model::Trajectory;
use std::fmt;
use std::time::Duration;

/// 超时失败的原因字符串
pub const TIMEOUT_REASON: &str = "timeout";

/// 求解结果
///
/// 只有 `Optimal` 与 `MaxIterationsReached` 携带可用轨迹。
#[derive(Debug, Clone, PartialEq)]
pub enum SolveResult {
    Optimal(Trajectory),
    Infeasible,
    MaxIterationsReached(Trajectory),
    SolverError(String),
}

/// 非最优结果的分类（用于遥测与指标）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveFailure {
    /// 可用但降级
    MaxIterationsReached,
    Infeasible,
    Timeout,
    SolverError(String),
}

impl fmt::Display for SolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveFailure::MaxIterationsReached => write!(f, "max iterations reached"),
            SolveFailure::Infeasible => write!(f, "infeasible"),
            SolveFailure::Timeout => write!(f, "timeout"),
            SolveFailure::SolverError(reason) => write!(f, "solver error: {}", reason),
        }
    }
}

impl SolveResult {
    /// 可用轨迹（若有）
    pub fn trajectory(&self) -> Option<&Trajectory> {
        match self {
            SolveResult::Optimal(traj) | SolveResult::MaxIterationsReached(traj) => Some(traj),
            SolveResult::Infeasible | SolveResult::SolverError(_) => None,
        }
    }

    pub fn into_trajectory(self) -> Option<Trajectory> {
        match self {
            SolveResult::Optimal(traj) | SolveResult::MaxIterationsReached(traj) => Some(traj),
            SolveResult::Infeasible | SolveResult::SolverError(_) => None,
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveResult::Optimal(_))
    }

    pub fn is_usable(&self) -> bool {
        self.trajectory().is_some()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SolveResult::SolverError(reason) if reason == TIMEOUT_REASON)
    }

    /// 非最优结果的分类；`Optimal` 返回 `None`
    pub fn failure(&self) -> Option<SolveFailure> {
        match self {
            SolveResult::Optimal(_) => None,
            SolveResult::MaxIterationsReached(_) => Some(SolveFailure::MaxIterationsReached),
            SolveResult::Infeasible => Some(SolveFailure::Infeasible),
            SolveResult::SolverError(reason) if reason == TIMEOUT_REASON => Some(SolveFailure::Timeout),
            SolveResult::SolverError(reason) => Some(SolveFailure::SolverError(reason.clone())),
        }
    }
}

/// 求解报告
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub result: SolveResult,
    pub elapsed: Duration,
    pub iterations: usize,
    pub objective: f64,
}

impl SolveReport {
    pub fn failed(reason: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            result: SolveResult::SolverError(reason.into()),
            elapsed,
            iterations: 0,
            objective: f64::NAN,
        }
    }
}
