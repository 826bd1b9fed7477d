//! 固定频率控制循环
//!
//! 两阶段生命周期：[`ControlLoopBuilder::build`] 只做校验与初始化（不启动线程），
//! [`ControlLoop::spawn`] 显式启动控制线程并返回 [`ControlLoopHandle`]。
//!
//! 每个周期：
//! 1. 非阻塞读取最新 `RobotState` / `TargetPose`（无新状态时沿用上一次快照）
//! 2. 以上一条保留轨迹平移一个节点作为热启动，求解
//! 3. `Optimal` / `MaxIterationsReached` → 发布首个控制量并保留整条轨迹；
//!    失败 → 不发布，保留本周期的热启动轨迹
//!
//! **循环锚点机制**：使用绝对时间锚点消除累积漂移；周期超时（Overrun）时不睡眠，
//! 锚点重置到当前时间，不累积积压。

use crate::command::ControlCommand;
use crate::error::LoopError;
use crate::exchange::StateExchange;
use crate::metrics::{LoopMetrics, MetricsSnapshot};
use crate::phase::{AtomicLoopPhase, LoopPhase};
use crate::telemetry::{CycleEvent, DegradedCycle, OverrunWarning, TelemetrySink, TracingTelemetry};
use nmpc_model::{RobotState, Trajectory};
use nmpc_solver::result::TIMEOUT_REASON;
use nmpc_solver::{NmpcProblem, SolveFailure, SolveReport, SolveResult, SolverAdapter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug_span, error, info, trace, warn};

/// 未显式配置时，求解预算占控制周期的比例
const DEFAULT_BUDGET_FRACTION: f64 = 0.8;

/// 控制循环配置
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// 控制频率（Hz）
    pub control_rate_hz: f64,
    /// 单次求解时间预算；`None` 时取控制周期的 80%
    pub max_wall_time: Option<Duration>,
    /// 控制线程名
    pub thread_name: String,
    /// `Drop` / `join` 等待控制线程退出的时限
    pub join_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            control_rate_hz: 10.0,
            max_wall_time: None,
            thread_name: "nmpc-control".to_string(),
            join_timeout: Duration::from_secs(2),
        }
    }
}

impl LoopConfig {
    /// 控制周期（频率非法时饱和为 `Duration::MAX`，由 `validate` 拒绝）
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.control_rate_hz).unwrap_or(Duration::MAX)
    }

    /// 求解时间预算
    pub fn solve_budget(&self) -> Duration {
        self.max_wall_time
            .unwrap_or_else(|| self.period().mul_f64(DEFAULT_BUDGET_FRACTION))
    }

    fn validate(&self) -> Result<(), LoopError> {
        if !self.control_rate_hz.is_finite() || self.control_rate_hz <= 0.0 {
            return Err(LoopError::InvalidConfig(format!(
                "control_rate_hz = {} must be positive",
                self.control_rate_hz
            )));
        }
        if Duration::try_from_secs_f64(1.0 / self.control_rate_hz).is_err() {
            return Err(LoopError::InvalidConfig(format!(
                "control_rate_hz = {} gives an unrepresentable period",
                self.control_rate_hz
            )));
        }
        if self.max_wall_time.is_some_and(|budget| budget.is_zero()) {
            return Err(LoopError::InvalidConfig("max_wall_time must be positive".to_string()));
        }
        if self.thread_name.trim().is_empty() {
            return Err(LoopError::InvalidConfig("thread_name is empty".to_string()));
        }
        if self.solve_budget() > self.period() {
            warn!(
                budget_ms = self.solve_budget().as_secs_f64() * 1e3,
                period_ms = self.period().as_secs_f64() * 1e3,
                "Solve budget exceeds the control period, expect overruns"
            );
        }
        Ok(())
    }
}

/// 单个周期的结果
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// 尚未收到目标位姿，未求解
    Idle,
    /// 已发布新指令；`degraded` 表示来自 `MaxIterationsReached`
    Published { degraded: bool },
    /// 求解失败，保持上一条指令
    Held(SolveFailure),
    /// 已收到关闭请求
    Stopped,
}

/// 控制循环构建器
pub struct ControlLoopBuilder {
    problem: NmpcProblem,
    exchange: Arc<StateExchange>,
    adapter: Option<SolverAdapter>,
    config: LoopConfig,
    telemetry: Arc<dyn TelemetrySink>,
    initial_state: Option<RobotState>,
}

impl ControlLoopBuilder {
    pub fn new(problem: NmpcProblem, exchange: Arc<StateExchange>) -> Self {
        Self {
            problem,
            exchange,
            adapter: None,
            config: LoopConfig::default(),
            telemetry: Arc::new(TracingTelemetry),
            initial_state: None,
        }
    }

    /// 求解适配器（默认：参考 SQP 后端 + 默认设置）
    pub fn adapter(mut self, adapter: SolverAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn control_rate_hz(mut self, hz: f64) -> Self {
        self.config.control_rate_hz = hz;
        self
    }

    pub fn max_wall_time(mut self, budget: Duration) -> Self {
        self.config.max_wall_time = Some(budget);
        self
    }

    pub fn telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    /// 初始状态（默认：邮箱中已有的最新状态，否则全零）
    pub fn initial_state(mut self, state: RobotState) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// 校验配置并完成初始化（`Initializing → Ready`），不启动线程
    pub fn build(self) -> Result<ControlLoop, LoopError> {
        let phase = Arc::new(AtomicLoopPhase::new(LoopPhase::Initializing));

        if let Err(e) = self.config.validate() {
            phase.set(LoopPhase::Shutdown);
            error!("Control loop initialization failed: {}", e);
            return Err(e);
        }

        let state_dim = self.problem.state_dim();
        let (initial_state, state_sequence) = match self.initial_state {
            Some(state) => (Arc::new(state), 0),
            None => match self.exchange.robot_state.latest_since(0) {
                Some((sequence, state)) => (state, sequence),
                None => {
                    info!("No initial robot state given, starting from zeros");
                    (Arc::new(RobotState::zeros(state_dim)), 0)
                },
            },
        };

        if initial_state.dim() != state_dim {
            phase.set(LoopPhase::Shutdown);
            let e = LoopError::InvalidConfig(format!(
                "initial state has dimension {} but the problem expects {}",
                initial_state.dim(),
                state_dim
            ));
            error!("Control loop initialization failed: {}", e);
            return Err(e);
        }

        let retained = self.problem.hold_guess(initial_state.positions());
        let period = self.config.period();
        let solve_budget = self.config.solve_budget();
        let adapter = self.adapter.unwrap_or_default();

        info!(
            rate_hz = self.config.control_rate_hz,
            budget_ms = solve_budget.as_secs_f64() * 1e3,
            backend = adapter.backend_name(),
            shooting_nodes = self.problem.horizon().shooting_nodes(),
            "Control loop ready"
        );
        phase.set(LoopPhase::Ready);

        Ok(ControlLoop {
            problem: self.problem,
            adapter,
            exchange: self.exchange,
            telemetry: self.telemetry,
            config: self.config,
            period,
            solve_budget,
            phase,
            metrics: Arc::new(LoopMetrics::new()),
            is_running: Arc::new(AtomicBool::new(true)),
            last_state: initial_state,
            state_sequence,
            retained,
            cycle: 0,
        })
    }
}

/// 控制循环
///
/// 独占问题与求解适配器；`&mut self` 保证同一时刻最多一个求解。
pub struct ControlLoop {
    problem: NmpcProblem,
    adapter: SolverAdapter,
    exchange: Arc<StateExchange>,
    telemetry: Arc<dyn TelemetrySink>,
    config: LoopConfig,
    period: Duration,
    solve_budget: Duration,
    phase: Arc<AtomicLoopPhase>,
    metrics: Arc<LoopMetrics>,
    is_running: Arc<AtomicBool>,
    last_state: Arc<RobotState>,
    state_sequence: u64,
    retained: Trajectory,
    cycle: u64,
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("phase", &self.phase.get())
            .field("cycle", &self.cycle)
            .field("period", &self.period)
            .field("solve_budget", &self.solve_budget)
            .field("backend", &self.adapter.backend_name())
            .finish_non_exhaustive()
    }
}

impl ControlLoop {
    pub fn phase(&self) -> LoopPhase {
        self.phase.get()
    }

    pub fn metrics(&self) -> &Arc<LoopMetrics> {
        &self.metrics
    }

    pub fn exchange(&self) -> &Arc<StateExchange> {
        &self.exchange
    }

    pub fn problem(&self) -> &NmpcProblem {
        &self.problem
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// 下一个周期的序号
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// 当前保留的轨迹（下一周期热启动的来源）
    pub fn retained_trajectory(&self) -> &Trajectory {
        &self.retained
    }

    /// 最近一次使用的状态快照
    pub fn last_state(&self) -> &RobotState {
        &self.last_state
    }

    /// 请求关闭（下一个周期边界生效）
    pub fn shutdown(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    /// 同步执行一个周期
    pub fn step(&mut self) -> CycleOutcome {
        if !self.is_running.load(Ordering::Acquire) {
            self.phase.set(LoopPhase::Shutdown);
            return CycleOutcome::Stopped;
        }

        let cycle = self.cycle;
        self.cycle += 1;
        let _span = debug_span!("cycle", cycle).entered();
        self.phase.set(LoopPhase::Solving);

        if let Some((sequence, state)) = self.exchange.robot_state.latest_since(self.state_sequence) {
            self.state_sequence = sequence;
            self.last_state = state;
        }

        let Some(target) = self.exchange.target.latest() else {
            trace!("No target pose received yet, cycle idle");
            self.metrics.record_idle();
            self.phase.set(LoopPhase::Ready);
            return CycleOutcome::Idle;
        };

        let seed = self.retained.shifted();
        let report =
            self.adapter
                .solve(&self.problem, &seed, &self.last_state, &target, self.solve_budget);
        self.metrics
            .record_result(&report.result, report.elapsed.as_micros() as u64);

        let SolveReport {
            result,
            elapsed,
            iterations,
            objective,
        } = report;

        match result {
            SolveResult::Optimal(trajectory) => {
                self.publish(cycle, trajectory, None, elapsed, iterations, objective)
            },
            SolveResult::MaxIterationsReached(trajectory) => self.publish(
                cycle,
                trajectory,
                Some(SolveFailure::MaxIterationsReached),
                elapsed,
                iterations,
                objective,
            ),
            SolveResult::Infeasible => self.hold(cycle, seed, SolveFailure::Infeasible, elapsed),
            SolveResult::SolverError(reason) => {
                let failure = if reason == TIMEOUT_REASON {
                    SolveFailure::Timeout
                } else {
                    SolveFailure::SolverError(reason)
                };
                self.hold(cycle, seed, failure, elapsed)
            },
        }
    }

    fn publish(
        &mut self,
        cycle: u64,
        trajectory: Trajectory,
        failure: Option<SolveFailure>,
        solve_time: Duration,
        iterations: usize,
        objective: f64,
    ) -> CycleOutcome {
        self.phase.set(LoopPhase::Publishing);
        let degraded = failure.is_some();

        let command = ControlCommand::new(
            cycle,
            trajectory.first_control().iter().copied().collect(),
            degraded,
            self.problem.chain().base_active(),
        );
        self.exchange.command.publish(command);
        self.retained = trajectory;

        self.telemetry.on_cycle(&CycleEvent {
            cycle,
            solve_time,
            iterations,
            objective,
            degraded,
        });
        if let Some(failure) = failure {
            self.telemetry.on_degraded_cycle(&DegradedCycle {
                cycle,
                failure,
                solve_time,
                published: true,
            });
        }

        CycleOutcome::Published { degraded }
    }

    /// 不发布；热启动保留本周期的种子，而不是失败的迭代点
    fn hold(&mut self, cycle: u64, seed: Trajectory, failure: SolveFailure, solve_time: Duration) -> CycleOutcome {
        self.retained = seed;
        self.telemetry.on_degraded_cycle(&DegradedCycle {
            cycle,
            failure: failure.clone(),
            solve_time,
            published: false,
        });
        self.phase.set(LoopPhase::Ready);
        CycleOutcome::Held(failure)
    }

    /// 在当前线程上运行固定频率循环，直到收到关闭请求
    pub fn run(&mut self) {
        #[cfg(feature = "realtime")]
        {
            use thread_priority::*;

            match set_current_thread_priority(ThreadPriority::Max) {
                Ok(_) => {
                    info!("Control thread priority set to MAX (realtime)");
                },
                Err(e) => {
                    warn!(
                        "Failed to set control thread priority: {}. \
                        On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                        e
                    );
                },
            }
        }

        info!(period_ms = self.period.as_secs_f64() * 1e3, "Control loop started");
        let mut next_tick = Instant::now();

        while self.is_running.load(Ordering::Acquire) {
            // 1. 设定下一个锚点（绝对时间）
            next_tick += self.period;

            // 2. 执行一个周期
            let cycle = self.cycle;
            let started = Instant::now();
            if matches!(self.step(), CycleOutcome::Stopped) {
                break;
            }

            // 3. 睡眠到下一个锚点
            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
            } else {
                // 周期超时：不睡眠，锚点重置到当前时间
                let warning = OverrunWarning {
                    cycle,
                    elapsed: now.duration_since(started),
                    period: self.period,
                };
                self.metrics.record_overrun();
                self.telemetry.on_overrun(&warning);
                next_tick = now;
            }
        }

        self.phase.set(LoopPhase::Shutdown);
        let snapshot = self.metrics.snapshot();
        info!(
            cycles = snapshot.cycles_total,
            optimal = snapshot.optimal,
            degraded_rate = snapshot.degraded_rate(),
            overruns = snapshot.overruns,
            "Control loop stopped"
        );
    }

    /// 在命名线程上启动循环
    pub fn spawn(self) -> Result<ControlLoopHandle, LoopError> {
        let is_running = Arc::clone(&self.is_running);
        let phase = Arc::clone(&self.phase);
        let metrics = Arc::clone(&self.metrics);
        let exchange = Arc::clone(&self.exchange);
        let join_timeout = self.config.join_timeout;
        let name = self.config.thread_name.clone();

        let mut control_loop = self;
        let thread = std::thread::Builder::new()
            .name(name)
            .spawn(move || control_loop.run())
            .map_err(LoopError::ThreadSpawn)?;

        Ok(ControlLoopHandle {
            thread: Some(thread),
            is_running,
            phase,
            metrics,
            exchange,
            join_timeout,
        })
    }
}

trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> Result<(), LoopError>;
}

impl JoinTimeout for JoinHandle<()> {
    fn join_timeout(self, timeout: Duration) -> Result<(), LoopError> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // 看门狗线程负责 join，主线程只等待有限时间
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(LoopError::ThreadPanicked)
            },
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(LoopError::JoinTimeout(timeout)),
        }
    }
}

/// 运行中控制循环的句柄
///
/// `Drop` 时请求关闭并在 `join_timeout` 内等待线程退出。
pub struct ControlLoopHandle {
    thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    phase: Arc<AtomicLoopPhase>,
    metrics: Arc<LoopMetrics>,
    exchange: Arc<StateExchange>,
    join_timeout: Duration,
}

impl ControlLoopHandle {
    /// 请求关闭（不等待）
    pub fn shutdown(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    /// 请求关闭并等待控制线程退出
    pub fn join(mut self) -> Result<(), LoopError> {
        self.shutdown();
        match self.thread.take() {
            Some(thread) => thread.join_timeout(self.join_timeout),
            None => Ok(()),
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase.get()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn exchange(&self) -> &Arc<StateExchange> {
        &self.exchange
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }

    /// 共享的运行标志（例如交给 Ctrl-C 处理函数）
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.is_running)
    }
}

impl Drop for ControlLoopHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(thread) = self.thread.take()
            && let Err(e) = thread.join_timeout(self.join_timeout)
        {
            error!("Control thread failed to shut down cleanly: {}", e);
        }
    }
}
