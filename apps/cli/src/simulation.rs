//! 运动学仿真对象的驱动线程
//!
//! 每个仿真周期：读取最新指令 → 积分 → 发布新的机器人状态。

use nmpc_sdk::driver::KinematicPlant;
use nmpc_sdk::{RobotState, StateExchange};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 仿真统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub ticks: u64,
    pub commands_applied: u64,
    pub commands_rejected: u64,
}

pub struct Simulation {
    plant: KinematicPlant,
    exchange: Arc<StateExchange>,
    period: Duration,
    command_sequence: u64,
    report: SimulationReport,
}

impl Simulation {
    pub fn new(plant: KinematicPlant, exchange: Arc<StateExchange>, period: Duration) -> Self {
        Self {
            plant,
            exchange,
            period,
            command_sequence: 0,
            report: SimulationReport::default(),
        }
    }

    pub fn state(&self) -> RobotState {
        self.plant.state()
    }

    pub fn report(&self) -> SimulationReport {
        self.report
    }

    /// 单个仿真周期
    pub fn tick(&mut self) -> RobotState {
        if let Some((sequence, command)) = self.exchange.command.latest_since(self.command_sequence) {
            self.command_sequence = sequence;
            if self.plant.apply(&command) {
                self.report.commands_applied += 1;
            } else {
                warn!(cycle = command.cycle, "Plant rejected command");
                self.report.commands_rejected += 1;
            }
        }

        let state = self.plant.advance(self.period);
        self.exchange.publish_state(state.clone());
        self.report.ticks += 1;
        state
    }

    /// 按仿真周期运行，直到 `running` 被清除或超过 `duration`
    pub fn run(&mut self, running: &AtomicBool, duration: Option<Duration>) {
        let start = Instant::now();
        let mut next_tick = start + self.period;

        while running.load(Ordering::Acquire) {
            if let Some(limit) = duration
                && start.elapsed() >= limit
            {
                debug!("Simulation duration reached");
                break;
            }

            self.tick();

            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
                next_tick += self.period;
            } else {
                next_tick = now + self.period;
            }
        }

        self.plant.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmpc_sdk::ControlCommand;

    fn simulation() -> (Simulation, Arc<StateExchange>) {
        let exchange = Arc::new(StateExchange::new());
        let plant = KinematicPlant::new(vec![0.0, 0.0]).unwrap();
        (
            Simulation::new(plant, Arc::clone(&exchange), Duration::from_millis(100)),
            exchange,
        )
    }

    #[test]
    fn test_tick_applies_command_once() {
        let (mut sim, exchange) = simulation();
        exchange.command.publish(ControlCommand::new(1, vec![1.0, -0.5], false, false));

        let state = sim.tick();
        assert!((state.positions()[0] - 0.1).abs() < 1e-9);
        assert!((state.positions()[1] + 0.05).abs() < 1e-9);
        assert_eq!(exchange.robot_state.sequence(), 1);

        // 同一条指令不重复计数，速度保持
        let state = sim.tick();
        assert!((state.positions()[0] - 0.2).abs() < 1e-9);
        assert_eq!(sim.report().commands_applied, 1);
        assert_eq!(sim.report().ticks, 2);
    }

    #[test]
    fn test_tick_rejects_wrong_dimension() {
        let (mut sim, exchange) = simulation();
        exchange.command.publish(ControlCommand::new(1, vec![1.0], false, false));

        let state = sim.tick();
        assert_eq!(state.positions(), &[0.0, 0.0]);
        assert_eq!(sim.report().commands_rejected, 1);
    }

    #[test]
    fn test_run_stops_when_flag_cleared() {
        let (mut sim, _exchange) = simulation();
        let running = AtomicBool::new(false);
        sim.run(&running, None);
        assert_eq!(sim.report().ticks, 0);
    }

    #[test]
    fn test_run_honors_duration() {
        let (mut sim, _exchange) = simulation();
        let running = AtomicBool::new(true);
        sim.run(&running, Some(Duration::from_millis(250)));
        let ticks = sim.report().ticks;
        assert!((2..=4).contains(&ticks), "ticks = {}", ticks);
        assert!(sim.state().velocities().iter().all(|v| *v == 0.0));
    }
}
