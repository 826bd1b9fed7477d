//! 控制循环阶段
//!
//! 阶段以原子方式存储，可在任意线程观察。

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 控制循环阶段
///
/// `Initializing → Ready → Solving → Publishing → (Solving …)`，
/// `Shutdown` 可从任意阶段进入且不可离开。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LoopPhase {
    #[default]
    Initializing = 0,
    /// 已构建，等待下一个周期
    Ready = 1,
    Solving = 2,
    Publishing = 3,
    Shutdown = 4,
}

impl LoopPhase {
    pub fn is_shutdown(self) -> bool {
        self == LoopPhase::Shutdown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoopPhase::Initializing => "initializing",
            LoopPhase::Ready => "ready",
            LoopPhase::Solving => "solving",
            LoopPhase::Publishing => "publishing",
            LoopPhase::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 阶段的原子版本（控制线程写，其他线程读）
#[derive(Debug)]
pub struct AtomicLoopPhase {
    inner: AtomicU8,
}

impl Default for AtomicLoopPhase {
    fn default() -> Self {
        Self::new(LoopPhase::Initializing)
    }
}

impl AtomicLoopPhase {
    pub fn new(phase: LoopPhase) -> Self {
        Self {
            inner: AtomicU8::new(phase.into()),
        }
    }

    /// 读取当前阶段；无效值视为 `Shutdown`
    pub fn get(&self) -> LoopPhase {
        LoopPhase::try_from(self.inner.load(Ordering::Acquire)).unwrap_or(LoopPhase::Shutdown)
    }

    /// 切换阶段
    ///
    /// 已进入 `Shutdown` 后不再改变，返回 `false`。
    pub fn set(&self, phase: LoopPhase) -> bool {
        let shutdown: u8 = LoopPhase::Shutdown.into();
        self.inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != shutdown).then_some(phase.into())
            })
            .is_ok()
    }
}
