//! 求解适配器
//!
//! 负责把控制循环的一次求解请求交给后端，并把后端终止码映射为 [`SolveResult`]：
//!
//! | 终止码 | 结果 |
//! |---|---|
//! | `Converged` / `AcceptableLevel` | `Optimal` |
//! | `MaxIterations`（迭代点有限） | `MaxIterationsReached` |
//! | `MaxIterations`（迭代点发散） | `SolverError("diverged")` |
//! | `Infeasible` | `Infeasible` |
//! | `Timeout` | `SolverError("timeout")` |
//! | `NumericalError(r)` | `SolverError(r)` |
//!
//! 若后端返回时已超过 `max_wall_time + slack`，结果一律作废并报告为超时。

use crate::backend::{BackendOutcome, NlpBackend, SolveBudget, TerminationCode};
use crate::problem::{NmpcProblem, ProblemParameters};
use crate::result::{SolveReport, SolveResult, TIMEOUT_REASON};
use crate::sqp::SqpBackend;
use nmpc_model::{RobotState, TargetPose, Trajectory};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 适配器设置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// 最大 SQP 迭代数
    pub max_iterations: usize,
    /// 收敛容差
    pub tolerance: f64,
    /// 迟到判定的最小余量
    pub min_slack: Duration,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-4,
            min_slack: Duration::from_millis(1),
        }
    }
}

/// 求解适配器
///
/// 由控制线程独占，保证同一时刻最多只有一个求解在进行。
pub struct SolverAdapter {
    backend: Box<dyn NlpBackend>,
    settings: SolverSettings,
    longest_iteration: Duration,
}

impl Default for SolverAdapter {
    fn default() -> Self {
        Self::new(Box::new(SqpBackend::default()), SolverSettings::default())
    }
}

impl SolverAdapter {
    pub fn new(backend: Box<dyn NlpBackend>, settings: SolverSettings) -> Self {
        Self {
            backend,
            settings,
            longest_iteration: Duration::ZERO,
        }
    }

    /// 使用参考 SQP 后端
    pub fn sqp(settings: SolverSettings) -> Self {
        Self::new(Box::new(SqpBackend::default()), settings)
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// 迟到判定余量：观测到的最长单次迭代，至少 `min_slack`
    pub fn slack(&self) -> Duration {
        self.longest_iteration.max(self.settings.min_slack)
    }

    /// 求解一次
    ///
    /// # 参数
    /// - `initial_guess`: 热启动轨迹（首节点会被替换为当前状态）
    /// - `current_state`: 当前状态快照
    /// - `current_target`: 目标位姿快照
    /// - `max_wall_time`: 本次求解的时间预算
    ///
    /// 输入尺寸错误返回 `SolverError("dimension mismatch")`，从不 panic。
    pub fn solve(
        &mut self,
        problem: &NmpcProblem,
        initial_guess: &Trajectory,
        current_state: &RobotState,
        current_target: &TargetPose,
        max_wall_time: Duration,
    ) -> SolveReport {
        let start = Instant::now();
        let layout = problem.layout();

        if initial_guess.layout() != layout || current_state.dim() != layout.state_dim {
            warn!(
                expected_state_dim = layout.state_dim,
                state_dim = current_state.dim(),
                "Rejecting solve request with mismatched dimensions"
            );
            return SolveReport::failed("dimension mismatch", start.elapsed());
        }

        let z0 = initial_guess
            .clone()
            .with_first_state(current_state.positions())
            .to_decision_vector();
        let params = ProblemParameters::from_snapshots(current_state, current_target);
        let budget = SolveBudget::new(
            self.settings.max_iterations,
            self.settings.tolerance,
            max_wall_time,
        );

        let outcome = self.backend.solve(problem, &params, z0, &budget);
        self.longest_iteration = self.longest_iteration.max(outcome.longest_iteration);

        let elapsed = start.elapsed();
        let iterations = outcome.iterations;
        let objective = outcome.objective;

        let result = if elapsed > max_wall_time + self.slack() {
            warn!(
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                budget_ms = max_wall_time.as_secs_f64() * 1e3,
                "Discarding late solver result"
            );
            SolveResult::SolverError(TIMEOUT_REASON.to_string())
        } else {
            self.map_outcome(problem, outcome)
        };

        debug!(
            backend = self.backend.name(),
            iterations,
            objective,
            elapsed_us = elapsed.as_micros() as u64,
            optimal = result.is_optimal(),
            "Solve finished"
        );

        SolveReport {
            result,
            elapsed,
            iterations,
            objective,
        }
    }

    /// 返回后端自身的迭代点（首节点由等式约束固定，不做覆盖）
    fn map_outcome(&self, problem: &NmpcProblem, outcome: BackendOutcome) -> SolveResult {
        let trajectory = || {
            Trajectory::from_decision_vector(problem.layout(), &outcome.z)
                .ok()
                .filter(Trajectory::is_finite)
        };

        match &outcome.code {
            TerminationCode::Converged | TerminationCode::AcceptableLevel => match trajectory() {
                Some(traj) => SolveResult::Optimal(traj),
                None => SolveResult::SolverError("diverged".to_string()),
            },
            TerminationCode::MaxIterations => match trajectory() {
                // 零次迭代时目标值尚未评估
                Some(traj) if outcome.objective.is_finite() || outcome.iterations == 0 => {
                    SolveResult::MaxIterationsReached(traj)
                },
                _ => SolveResult::SolverError("diverged".to_string()),
            },
            TerminationCode::Infeasible => SolveResult::Infeasible,
            TerminationCode::Timeout => SolveResult::SolverError(TIMEOUT_REASON.to_string()),
            TerminationCode::NumericalError(reason) => SolveResult::SolverError(reason.clone()),
        }
    }
}
