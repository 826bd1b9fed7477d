//! 控制循环指标
//!
//! 原子计数器，控制线程写入，任意线程通过 [`LoopMetrics::snapshot`] 读取。

use nmpc_solver::SolveResult;
use std::sync::atomic::{AtomicU64, Ordering};

/// 控制循环实时指标
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// 已执行的周期总数（含空闲周期）
    pub cycles_total: AtomicU64,
    pub optimal: AtomicU64,
    pub max_iterations: AtomicU64,
    pub infeasible: AtomicU64,
    /// 非超时的求解器错误
    pub solver_errors: AtomicU64,
    pub timeouts: AtomicU64,
    /// 周期耗时超过控制周期的次数
    pub overruns: AtomicU64,
    /// 尚未收到目标位姿的周期
    pub idle: AtomicU64,
    /// 未发布新指令、保持上一指令的周期
    pub held: AtomicU64,
    /// 最近一次求解耗时（微秒）
    pub last_solve_us: AtomicU64,
    /// 最长求解耗时（微秒）
    pub max_solve_us: AtomicU64,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次求解结果
    pub(crate) fn record_result(&self, result: &SolveResult, solve_us: u64) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        self.last_solve_us.store(solve_us, Ordering::Relaxed);
        self.max_solve_us.fetch_max(solve_us, Ordering::Relaxed);

        let counter = match result {
            SolveResult::Optimal(_) => &self.optimal,
            SolveResult::MaxIterationsReached(_) => &self.max_iterations,
            SolveResult::Infeasible => &self.infeasible,
            SolveResult::SolverError(_) if result.is_timeout() => &self.timeouts,
            SolveResult::SolverError(_) => &self.solver_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if !result.is_usable() {
            self.held.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_idle(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        self.idle.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            optimal: self.optimal.load(Ordering::Relaxed),
            max_iterations: self.max_iterations.load(Ordering::Relaxed),
            infeasible: self.infeasible.load(Ordering::Relaxed),
            solver_errors: self.solver_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
            held: self.held.load(Ordering::Relaxed),
            last_solve_us: self.last_solve_us.load(Ordering::Relaxed),
            max_solve_us: self.max_solve_us.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.cycles_total,
            &self.optimal,
            &self.max_iterations,
            &self.infeasible,
            &self.solver_errors,
            &self.timeouts,
            &self.overruns,
            &self.idle,
            &self.held,
            &self.last_solve_us,
            &self.max_solve_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub cycles_total: u64,
    pub optimal: u64,
    pub max_iterations: u64,
    pub infeasible: u64,
    pub solver_errors: u64,
    pub timeouts: u64,
    pub overruns: u64,
    pub idle: u64,
    pub held: u64,
    pub last_solve_us: u64,
    pub max_solve_us: u64,
}

impl MetricsSnapshot {
    /// 执行过求解的周期数
    pub fn solved(&self) -> u64 {
        self.optimal + self.max_iterations + self.infeasible + self.solver_errors + self.timeouts
    }

    /// 降级周期占比（百分比，0.0 ~ 100.0）
    ///
    /// `MaxIterationsReached` 与所有失败都计为降级；未求解过时返回 0.0。
    pub fn degraded_rate(&self) -> f64 {
        let solved = self.solved();
        if solved == 0 {
            return 0.0;
        }
        ((solved - self.optimal) as f64 / solved as f64) * 100.0
    }
}
