//! 速度控制的运动学仿真对象
//!
//! 模拟 `ẋ = u`：最新 [`ControlCommand`] 的速度被保持，直到下一条指令到来。
//! 用于无硬件运行控制循环（CLI `run` 命令）和端到端测试。

use crate::command::ControlCommand;
use nmpc_model::{ModelError, RobotState};
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug)]
struct PlantState {
    positions: Vec<f64>,
    velocities: Vec<f64>,
    last_cycle: Option<u64>,
}

/// 运动学仿真对象
#[derive(Debug)]
pub struct KinematicPlant {
    inner: Mutex<PlantState>,
}

impl KinematicPlant {
    /// 以静止状态创建
    pub fn new(initial_positions: Vec<f64>) -> Result<Self, ModelError> {
        if initial_positions.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidDimensions(
                "initial plant state must be finite".to_string(),
            ));
        }
        let dim = initial_positions.len();
        Ok(Self {
            inner: Mutex::new(PlantState {
                positions: initial_positions,
                velocities: vec![0.0; dim],
                last_cycle: None,
            }),
        })
    }

    pub fn dim(&self) -> usize {
        self.inner.lock().positions.len()
    }

    /// 应用速度指令
    ///
    /// 维度不符或同一周期重复的指令被忽略，返回 `false`。
    pub fn apply(&self, command: &ControlCommand) -> bool {
        let mut inner = self.inner.lock();
        if command.velocities.len() != inner.positions.len()
            || inner.last_cycle == Some(command.cycle)
            || command.velocities.iter().any(|v| !v.is_finite())
        {
            return false;
        }
        inner.velocities.clone_from(&command.velocities);
        inner.last_cycle = Some(command.cycle);
        true
    }

    /// 停止运动
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.velocities.iter_mut().for_each(|v| *v = 0.0);
    }

    /// 按当前速度积分 `dt`，返回新状态
    pub fn advance(&self, dt: Duration) -> RobotState {
        let mut inner = self.inner.lock();
        let h = dt.as_secs_f64();
        let PlantState {
            positions,
            velocities,
            ..
        } = &mut *inner;
        for (q, v) in positions.iter_mut().zip(velocities.iter()) {
            *q += v * h;
        }
        snapshot(&inner)
    }

    /// 当前状态快照
    pub fn state(&self) -> RobotState {
        snapshot(&self.inner.lock())
    }
}

fn snapshot(inner: &PlantState) -> RobotState {
    // 构造时与每次写入都保证有限，长度一致
    RobotState::new(inner.positions.clone(), inner.velocities.clone())
        .unwrap_or_else(|_| RobotState::zeros(inner.positions.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_integrates_held_velocity() {
        let plant = KinematicPlant::new(vec![0.0, 1.0]).unwrap();
        assert!(plant.apply(&ControlCommand::new(0, vec![0.5, -1.0], false, false)));

        plant.advance(Duration::from_millis(100));
        let state = plant.advance(Duration::from_millis(100));
        assert_relative_eq!(state.positions()[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(state.positions()[1], 0.8, epsilon = 1e-12);
        assert_eq!(state.velocities(), &[0.5, -1.0]);

        plant.stop();
        let state = plant.advance(Duration::from_secs(1));
        assert_relative_eq!(state.positions()[0], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_commands() {
        let plant = KinematicPlant::new(vec![0.0; 3]).unwrap();
        assert!(!plant.apply(&ControlCommand::new(0, vec![1.0], false, false)));
        assert!(!plant.apply(&ControlCommand::new(0, vec![f64::NAN; 3], false, false)));
        assert!(plant.apply(&ControlCommand::new(1, vec![1.0; 3], false, false)));
        // 同一周期的指令只应用一次
        assert!(!plant.apply(&ControlCommand::new(1, vec![2.0; 3], false, false)));
        assert_eq!(plant.state().velocities(), &[1.0; 3]);
    }

    #[test]
    fn test_non_finite_initial_state() {
        assert!(KinematicPlant::new(vec![f64::INFINITY]).is_err());
    }
}
