//! 诊断事件输出
//!
//! 控制线程在每个周期结束时调用 [`TelemetrySink`]。实现必须非阻塞：
//! 需要跨线程处理时使用 [`ChannelTelemetry`]（有界队列 + `try_send`，队列满时丢弃事件）。

use crossbeam_channel::{Receiver, Sender, bounded};
use nmpc_solver::SolveFailure;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// 周期完成事件（发布了指令）
#[derive(Debug, Clone, PartialEq)]
pub struct CycleEvent {
    pub cycle: u64,
    pub solve_time: Duration,
    pub iterations: usize,
    pub objective: f64,
    /// 来自 `MaxIterationsReached`
    pub degraded: bool,
}

/// 降级周期事件
#[derive(Debug, Clone, PartialEq)]
pub struct DegradedCycle {
    pub cycle: u64,
    pub failure: SolveFailure,
    pub solve_time: Duration,
    /// 本周期是否仍发布了指令（仅 `MaxIterationsReached`）
    pub published: bool,
}

/// 周期超时警告
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrunWarning {
    pub cycle: u64,
    pub elapsed: Duration,
    pub period: Duration,
}

/// 通道中传递的事件
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Cycle(CycleEvent),
    Degraded(DegradedCycle),
    Overrun(OverrunWarning),
}

/// 诊断输出接口
///
/// 在控制线程上同步调用，实现不得阻塞。
pub trait TelemetrySink: Send + Sync {
    fn on_degraded_cycle(&self, event: &DegradedCycle);

    fn on_cycle(&self, event: &CycleEvent) {
        let _ = event;
    }

    fn on_overrun(&self, warning: &OverrunWarning) {
        let _ = warning;
    }
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Arc<S> {
    fn on_degraded_cycle(&self, event: &DegradedCycle) {
        (**self).on_degraded_cycle(event)
    }

    fn on_cycle(&self, event: &CycleEvent) {
        (**self).on_cycle(event)
    }

    fn on_overrun(&self, warning: &OverrunWarning) {
        (**self).on_overrun(warning)
    }
}

/// 丢弃所有事件
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn on_degraded_cycle(&self, _event: &DegradedCycle) {}
}

/// 以结构化日志输出事件
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn on_degraded_cycle(&self, event: &DegradedCycle) {
        warn!(
            cycle = event.cycle,
            failure = %event.failure,
            solve_ms = event.solve_time.as_secs_f64() * 1e3,
            published = event.published,
            "Degraded control cycle"
        );
    }

    fn on_cycle(&self, event: &CycleEvent) {
        debug!(
            cycle = event.cycle,
            solve_ms = event.solve_time.as_secs_f64() * 1e3,
            iterations = event.iterations,
            objective = event.objective,
            "Control cycle published"
        );
    }

    fn on_overrun(&self, warning: &OverrunWarning) {
        warn!(
            cycle = warning.cycle,
            elapsed_ms = warning.elapsed.as_secs_f64() * 1e3,
            period_ms = warning.period.as_secs_f64() * 1e3,
            "Control loop overrun, next tick fires immediately"
        );
    }
}

/// 有界通道输出
pub struct ChannelTelemetry {
    tx: Sender<TelemetryEvent>,
    dropped_events: Arc<AtomicU64>,
    include_cycles: bool,
}

impl ChannelTelemetry {
    /// 默认队列容量
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// 创建通道输出，返回 `(sink, receiver)`
    ///
    /// 默认只转发降级与超时事件；需要每周期事件时调用 [`ChannelTelemetry::with_cycle_events`]。
    pub fn new(capacity: usize) -> (Self, Receiver<TelemetryEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
                include_cycles: false,
            },
            rx,
        )
    }

    pub fn with_cycle_events(mut self) -> Self {
        self.include_cycles = true;
        self
    }

    /// 队列满或接收端关闭时丢弃的事件数
    pub fn dropped_events(&self) -> &Arc<AtomicU64> {
        &self.dropped_events
    }

    fn forward(&self, event: TelemetryEvent) {
        if self.tx.try_send(event).is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl TelemetrySink for ChannelTelemetry {
    fn on_degraded_cycle(&self, event: &DegradedCycle) {
        self.forward(TelemetryEvent::Degraded(event.clone()));
    }

    fn on_cycle(&self, event: &CycleEvent) {
        if self.include_cycles {
            self.forward(TelemetryEvent::Cycle(event.clone()));
        }
    }

    fn on_overrun(&self, warning: &OverrunWarning) {
        self.forward(TelemetryEvent::Overrun(*warning));
    }
}
