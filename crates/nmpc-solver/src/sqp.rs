//! Gauss–Newton SQP 参考后端
//!
//! 每次迭代：
//! 1. 在当前迭代点线性化（[`NmpcProblem::linearize`]）
//! 2. 用 clarabel 求解步长 QP：等式进入零锥，有限边界进入非负锥（`Aδ + s = b, s >= 0`）
//! 3. 在价值函数 `J + ρ·‖defects‖₁` 上回溯线搜索
//!
//! 截止时间在每次迭代前检查，剩余时间同时作为 QP 的 `time_limit`，
//! 因此不会超出截止时间一个迭代以上。

use crate::backend::{BackendOutcome, NlpBackend, SolveBudget, TerminationCode};
use crate::problem::{LinearizedProblem, NmpcProblem, ProblemParameters};
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector};
use std::time::{Duration, Instant};
use tracing::trace;

/// 线搜索接受判据中的相对舍入余量
const MERIT_NOISE: f64 = 1e-12;

/// SQP 线搜索与正则化参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqpConfig {
    /// 初始 Levenberg 阻尼 `μ`
    pub initial_damping: f64,
    /// 阻尼下限
    pub min_damping: f64,
    /// 阻尼上限（超过即判定数值失败）
    pub max_damping: f64,
    /// 初始罚参数 `ρ`
    pub merit_penalty: f64,
    /// Armijo 充分下降系数
    pub armijo: f64,
    /// 最大回溯次数
    pub max_backtracks: usize,
    /// 单个 QP 的最大内点迭代数
    pub qp_max_iterations: u32,
}

impl Default for SqpConfig {
    fn default() -> Self {
        Self {
            initial_damping: 1e-6,
            min_damping: 1e-9,
            max_damping: 1e6,
            merit_penalty: 10.0,
            armijo: 1e-4,
            max_backtracks: 10,
            qp_max_iterations: 100,
        }
    }
}

/// QP 子问题结果
enum QpOutcome {
    Step {
        delta: DVector<f64>,
        eq_dual_max: f64,
    },
    Infeasible,
    Timeout,
    Failed(String),
}

/// Gauss–Newton SQP 后端
#[derive(Debug, Clone, Default)]
pub struct SqpBackend {
    config: SqpConfig,
}

impl SqpBackend {
    pub fn new(config: SqpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SqpConfig {
        &self.config
    }

    fn solve_qp(&self, lin: &LinearizedProblem, damping: f64, remaining: Duration) -> QpOutcome {
        let nv = lin.gradient.len();
        let n_eq = lin.eq_rhs.len();

        let mut hessian = lin.hessian.clone();
        for i in 0..nv {
            hessian[(i, i)] += 2.0 * damping;
        }
        let p = upper_triangular_csc(&hessian);

        let (a, b, n_ineq) = constraint_matrix(lin);
        let mut cones: Vec<SupportedConeT<f64>> = vec![ZeroConeT(n_eq)];
        if n_ineq > 0 {
            cones.push(NonnegativeConeT(n_ineq));
        }

        let settings = match DefaultSettingsBuilder::default()
            .max_iter(self.config.qp_max_iterations)
            .time_limit(remaining.as_secs_f64())
            .verbose(false)
            .tol_gap_abs(1e-9)
            .tol_gap_rel(1e-9)
            .tol_feas(1e-9)
            .build()
        {
            Ok(settings) => settings,
            Err(e) => return QpOutcome::Failed(format!("invalid QP settings: {:?}", e)),
        };

        let q: Vec<f64> = lin.gradient.iter().copied().collect();
        let mut solver = match DefaultSolver::new(&p, &q, &a, &b, &cones, settings) {
            Ok(solver) => solver,
            Err(e) => return QpOutcome::Failed(format!("QP setup failed: {:?}", e)),
        };
        solver.solve();
        let solution = &solver.solution;

        match solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                let delta = DVector::from_column_slice(&solution.x);
                if delta.iter().any(|v| !v.is_finite()) {
                    return QpOutcome::Failed("QP returned non-finite step".to_string());
                }
                let eq_dual_max = solution.z[..n_eq]
                    .iter()
                    .fold(0.0_f64, |acc, v| acc.max(v.abs()));
                QpOutcome::Step { delta, eq_dual_max }
            },
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                QpOutcome::Infeasible
            },
            SolverStatus::MaxTime => QpOutcome::Timeout,
            status => QpOutcome::Failed(format!("QP status {:?}", status)),
        }
    }
}

impl NlpBackend for SqpBackend {
    fn name(&self) -> &'static str {
        "gauss-newton-sqp"
    }

    fn solve(
        &mut self,
        problem: &NmpcProblem,
        params: &ProblemParameters,
        z0: DVector<f64>,
        budget: &SolveBudget,
    ) -> BackendOutcome {
        let tol = budget.tolerance;
        let mut z = z0;
        let mut damping = self.config.initial_damping;
        let mut penalty = self.config.merit_penalty;
        let mut iterations = 0;
        let mut longest_iteration = Duration::ZERO;
        let mut objective = f64::NAN;
        let mut last_cost: Option<f64> = None;

        let finish = |code, z, iterations, objective, longest_iteration| BackendOutcome {
            code,
            z,
            iterations,
            objective,
            longest_iteration,
        };

        loop {
            if iterations >= budget.max_iterations {
                return finish(TerminationCode::MaxIterations, z, iterations, objective, longest_iteration);
            }
            if budget.expired() {
                return finish(TerminationCode::Timeout, z, iterations, objective, longest_iteration);
            }
            let iteration_start = Instant::now();

            let lin = match problem.linearize(&z, params) {
                Ok(lin) => lin,
                Err(e) => {
                    return finish(
                        TerminationCode::NumericalError(e.to_string()),
                        z,
                        iterations,
                        objective,
                        longest_iteration,
                    );
                },
            };
            if objective.is_nan() {
                objective = lin.cost;
            }

            let (delta, eq_dual_max) = match self.solve_qp(&lin, damping, budget.remaining()) {
                QpOutcome::Step { delta, eq_dual_max } => (delta, eq_dual_max),
                QpOutcome::Infeasible => {
                    return finish(TerminationCode::Infeasible, z, iterations + 1, objective, longest_iteration);
                },
                QpOutcome::Timeout => {
                    return finish(TerminationCode::Timeout, z, iterations + 1, objective, longest_iteration);
                },
                QpOutcome::Failed(reason) => {
                    return finish(
                        TerminationCode::NumericalError(reason),
                        z,
                        iterations + 1,
                        objective,
                        longest_iteration,
                    );
                },
            };

            // 已在最优点：QP 步长只剩数值噪声
            if delta.amax() < tol && lin.defects.amax() < tol {
                iterations += 1;
                longest_iteration = longest_iteration.max(iteration_start.elapsed());
                return finish(TerminationCode::Converged, z, iterations, lin.cost, longest_iteration);
            }

            // 精确罚函数要求 ρ 大于等式乘子
            penalty = penalty.max(1.1 * eq_dual_max + 1.0);
            let defect_norm = lin.defects.lp_norm(1);
            let merit = lin.cost + penalty * defect_norm;
            let slope = (lin.gradient.dot(&delta) - penalty * defect_norm).min(0.0);

            let mut alpha = 1.0;
            let mut accepted = None;
            for _ in 0..self.config.max_backtracks {
                let trial = &z + &delta * alpha;
                if let (Ok(cost), Ok(defects)) =
                    (problem.cost(&trial, params), problem.defects(&trial, params))
                {
                    let trial_merit = cost + penalty * defects.lp_norm(1);
                    let noise = MERIT_NOISE * merit.abs().max(1.0);
                    if trial_merit <= merit + self.config.armijo * alpha * slope + noise {
                        accepted = Some((trial, cost, defects));
                        break;
                    }
                }
                alpha *= 0.5;
            }

            iterations += 1;
            longest_iteration = longest_iteration.max(iteration_start.elapsed());

            let Some((trial, cost, defects)) = accepted else {
                damping *= 10.0;
                trace!(iteration = iterations, damping, "SQP line search rejected step");
                if damping > self.config.max_damping {
                    return finish(
                        TerminationCode::NumericalError("line search failed".to_string()),
                        z,
                        iterations,
                        objective,
                        longest_iteration,
                    );
                }
                continue;
            };

            let step_norm = delta.amax() * alpha;
            let defect_max = defects.amax();
            z = trial;
            objective = cost;
            damping = (damping * 0.1).max(self.config.min_damping);

            trace!(
                iteration = iterations,
                cost,
                step_norm,
                defect_max,
                alpha,
                "SQP iteration"
            );

            if step_norm < tol && defect_max < tol {
                return finish(TerminationCode::Converged, z, iterations, objective, longest_iteration);
            }
            if let Some(previous) = last_cost
                && defect_max < tol
                && (previous - cost).abs() <= tol * cost.abs().max(1.0)
            {
                return finish(
                    TerminationCode::AcceptableLevel,
                    z,
                    iterations,
                    objective,
                    longest_iteration,
                );
            }
            last_cost = Some(cost);
        }
    }
}

/// 对称矩阵的上三角部分转为 CSC
fn upper_triangular_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// 约束矩阵 `[E; I_up; −I_low]` 与右端 `[e; ub − z̄; z̄ − lb]`
///
/// 只为有限边界生成行。返回 `(A, b, 不等式行数)`。
fn constraint_matrix(lin: &LinearizedProblem) -> (CscMatrix<f64>, Vec<f64>, usize) {
    let nv = lin.gradient.len();
    let n_eq = lin.eq_rhs.len();

    let upper_rows: Vec<Option<usize>> = {
        let mut next = 0;
        lin.step_upper
            .iter()
            .map(|v| {
                v.is_finite().then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    };
    let n_upper = upper_rows.iter().flatten().count();
    let lower_rows: Vec<Option<usize>> = {
        let mut next = 0;
        lin.step_lower
            .iter()
            .map(|v| {
                v.is_finite().then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    };
    let n_lower = lower_rows.iter().flatten().count();

    let mut colptr = vec![0usize; nv + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    for j in 0..nv {
        for i in 0..n_eq {
            let v = lin.eq_matrix[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        if let Some(r) = upper_rows[j] {
            rowval.push(n_eq + r);
            nzval.push(1.0);
        }
        if let Some(r) = lower_rows[j] {
            rowval.push(n_eq + n_upper + r);
            nzval.push(-1.0);
        }
        colptr[j + 1] = rowval.len();
    }

    let mut b = Vec::with_capacity(n_eq + n_upper + n_lower);
    b.extend(lin.eq_rhs.iter().copied());
    b.extend(lin.step_upper.iter().copied().filter(|v| v.is_finite()));
    b.extend(lin.step_lower.iter().copied().filter(|v| v.is_finite()).map(|v| -v));

    let a = CscMatrix::new(n_eq + n_upper + n_lower, nv, colptr, rowval, nzval);
    (a, b, n_upper + n_lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_linearization() -> LinearizedProblem {
        // 两个变量：δ_0 = 1（等式），δ_1 <= 0.5，δ_1 >= -inf
        LinearizedProblem {
            hessian: DMatrix::identity(2, 2) * 2.0,
            gradient: DVector::from_vec(vec![0.0, -4.0]),
            eq_matrix: DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            eq_rhs: DVector::from_vec(vec![1.0]),
            step_lower: DVector::from_vec(vec![f64::NEG_INFINITY, f64::NEG_INFINITY]),
            step_upper: DVector::from_vec(vec![f64::INFINITY, 0.5]),
            cost: 0.0,
            defects: DVector::from_vec(vec![-1.0]),
        }
    }

    #[test]
    fn test_constraint_matrix_skips_infinite_bounds() {
        let (a, b, n_ineq) = constraint_matrix(&toy_linearization());
        assert_eq!(n_ineq, 1);
        assert_eq!(a.m, 2);
        assert_eq!(a.n, 2);
        assert_eq!(b, vec![1.0, 0.5]);
        assert_eq!(a.colptr, vec![0, 1, 2]);
        assert_eq!(a.rowval, vec![0, 1]);
    }

    #[test]
    fn test_upper_triangular_csc() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let csc = upper_triangular_csc(&m);
        assert_eq!(csc.colptr, vec![0, 1, 3]);
        assert_eq!(csc.rowval, vec![0, 0, 1]);
        assert_eq!(csc.nzval, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_qp_step_respects_bounds() {
        let backend = SqpBackend::default();
        match backend.solve_qp(&toy_linearization(), 0.0, Duration::from_secs(5)) {
            QpOutcome::Step { delta, .. } => {
                // 无约束最优 δ_1 = 2，被上界截到 0.5
                assert!((delta[0] - 1.0).abs() < 1e-6);
                assert!((delta[1] - 0.5).abs() < 1e-6);
            },
            _ => panic!("expected a QP step"),
        }
    }

    #[test]
    fn test_qp_infeasible_detected() {
        let mut lin = toy_linearization();
        // δ_0 = 1 与 δ_0 <= 0 冲突
        lin.step_upper[0] = 0.0;
        assert!(matches!(
            SqpBackend::default().solve_qp(&lin, 0.0, Duration::from_secs(5)),
            QpOutcome::Infeasible
        ));
    }
}
