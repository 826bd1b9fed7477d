//! NLP 后端接口
//!
//! 后端只负责"在预算内把决策向量推向最优"，不感知控制循环。
//! 终止原因通过 [`TerminationCode`] 返回，由 [`crate::SolverAdapter`] 统一映射。

use crate::problem::{NmpcProblem, ProblemParameters};
use nalgebra::DVector;
use std::fmt;
use std::time::{Duration, Instant};

/// 单次求解预算
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveBudget {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// 绝对截止时间
    pub deadline: Instant,
}

impl SolveBudget {
    pub fn new(max_iterations: usize, tolerance: f64, max_wall_time: Duration) -> Self {
        Self {
            max_iterations,
            tolerance,
            deadline: Instant::now() + max_wall_time,
        }
    }

    /// 距截止时间的剩余时长（已过期则为零）
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// 后端终止码
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationCode {
    /// 满足收敛容差
    Converged,
    /// 达到可接受水平（代价不再改善且可行）
    AcceptableLevel,
    /// 迭代次数耗尽
    MaxIterations,
    /// 子问题不可行
    Infeasible,
    /// 超出截止时间
    Timeout,
    /// 数值失败
    NumericalError(String),
}

impl fmt::Display for TerminationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCode::Converged => write!(f, "converged"),
            TerminationCode::AcceptableLevel => write!(f, "acceptable level"),
            TerminationCode::MaxIterations => write!(f, "max iterations"),
            TerminationCode::Infeasible => write!(f, "infeasible"),
            TerminationCode::Timeout => write!(f, "timeout"),
            TerminationCode::NumericalError(reason) => write!(f, "numerical error: {}", reason),
        }
    }
}

/// 后端求解结果
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    pub code: TerminationCode,
    /// 最终迭代点
    pub z: DVector<f64>,
    pub iterations: usize,
    pub objective: f64,
    /// 最长单次迭代耗时
    pub longest_iteration: Duration,
}

impl BackendOutcome {
    /// 未迭代即终止
    pub fn immediate(code: TerminationCode, z: DVector<f64>) -> Self {
        Self {
            code,
            z,
            iterations: 0,
            objective: f64::NAN,
            longest_iteration: Duration::ZERO,
        }
    }
}

/// NLP 后端
///
/// `z0` 已由适配器写入首节点固定值；后端需自行满足首节点等式。
pub trait NlpBackend: Send {
    /// 后端名称（用于日志）
    fn name(&self) -> &'static str;

    fn solve(
        &mut self,
        problem: &NmpcProblem,
        params: &ProblemParameters,
        z0: DVector<f64>,
        budget: &SolveBudget,
    ) -> BackendOutcome;
}

impl<B: NlpBackend + ?Sized> NlpBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve(
        &mut self,
        problem: &NmpcProblem,
        params: &ProblemParameters,
        z0: DVector<f64>,
        budget: &SolveBudget,
    ) -> BackendOutcome {
        (**self).solve(problem, params, z0, budget)
    }
}
