//! 线程间状态交换
//!
//! 单槽覆盖写邮箱：写入方从不等待，读取方拿到的总是某次完整写入的 `Arc`，
//! 不排队，旧值直接被覆盖。

use crate::command::ControlCommand;
use arc_swap::ArcSwapOption;
use nmpc_model::{RobotState, TargetPose};
use std::sync::Arc;

struct Entry<T> {
    sequence: u64,
    value: Arc<T>,
}

/// 单槽邮箱
///
/// 每次写入分配一个严格递增的序号（从 1 开始），读取方可据此判断是否有新值。
pub struct Mailbox<T> {
    slot: ArcSwapOption<Entry<T>>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
        }
    }

    /// 写入新值，返回其序号
    pub fn publish(&self, value: T) -> u64 {
        let value = Arc::new(value);
        let previous = self.slot.rcu(|current| {
            let sequence = current.as_ref().map_or(0, |entry| entry.sequence) + 1;
            Some(Arc::new(Entry {
                sequence,
                value: Arc::clone(&value),
            }))
        });
        previous.as_ref().map_or(0, |entry| entry.sequence) + 1
    }

    /// 最新值
    pub fn latest(&self) -> Option<Arc<T>> {
        self.slot.load_full().map(|entry| Arc::clone(&entry.value))
    }

    /// 仅当存在比 `sequence` 更新的值时返回 `(序号, 值)`
    pub fn latest_since(&self, sequence: u64) -> Option<(u64, Arc<T>)> {
        self.slot
            .load_full()
            .filter(|entry| entry.sequence > sequence)
            .map(|entry| (entry.sequence, Arc::clone(&entry.value)))
    }

    /// 最新写入的序号；尚未写入时为 0
    pub fn sequence(&self) -> u64 {
        self.slot.load_full().map_or(0, |entry| entry.sequence)
    }
}

/// 感知上下文与控制线程之间共享的三个邮箱
#[derive(Default)]
pub struct StateExchange {
    pub robot_state: Mailbox<RobotState>,
    pub target: Mailbox<TargetPose>,
    pub command: Mailbox<ControlCommand>,
}

impl StateExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_state(&self, state: RobotState) -> u64 {
        self.robot_state.publish(state)
    }

    pub fn publish_target(&self, target: TargetPose) -> u64 {
        self.target.publish(target)
    }

    pub fn latest_command(&self) -> Option<Arc<ControlCommand>> {
        self.command.latest()
    }
}
