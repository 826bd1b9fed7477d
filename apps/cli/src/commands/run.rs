//! run 命令
//!
//! 启动控制线程，并以运动学仿真对象闭环运行

use anyhow::{Context, Result, bail};
use clap::Args;
use nalgebra::Vector3;
use nmpc_sdk::driver::{KinematicPlant, TracingTelemetry};
use nmpc_sdk::{KinematicModel, NmpcError, StateExchange, TargetPose};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::info;

use super::ConfigSource;
use crate::simulation::Simulation;
use crate::utils::{parse_values, parse_vector3};

/// 闭环运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    #[command(flatten)]
    pub source: ConfigSource,

    /// 运行时长（秒）；缺省时运行到 Ctrl+C
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// 目标相对初始末端位置的平移（m），格式 x,y,z
    #[arg(long, default_value = "0.05,0,-0.05", allow_hyphen_values = true)]
    pub offset: String,

    /// 初始状态（逗号分隔，缺省全零）
    #[arg(long, allow_hyphen_values = true)]
    pub initial: Option<String>,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let assembled = self.source.bootstrap()?;
        let state_dim = assembled.problem.state_dim();

        let initial = match &self.initial {
            Some(values) => parse_values(values).context("invalid --initial")?,
            None => vec![0.0; state_dim],
        };
        if initial.len() != state_dim {
            bail!("--initial has {} values, expected {}", initial.len(), state_dim);
        }
        let offset = parse_vector3(&self.offset).context("invalid --offset")?;
        let duration = self
            .duration
            .map(Duration::try_from_secs_f64)
            .transpose()
            .context("invalid --duration")?;

        let model = Arc::clone(&assembled.model);
        let start_pose = model.forward_kinematics(&initial).map_err(NmpcError::from)?;
        let mut target_pose = start_pose;
        target_pose.translation.vector += Vector3::from(offset);

        let plant = KinematicPlant::new(initial).map_err(NmpcError::from)?;
        let exchange = Arc::new(StateExchange::new());
        exchange.publish_state(plant.state());
        exchange.publish_target(TargetPose::new(target_pose));

        let period = assembled.loop_config.period();
        let control_loop =
            assembled.into_control_loop(Arc::clone(&exchange), Arc::new(TracingTelemetry), None)?;
        let handle = control_loop.spawn().map_err(NmpcError::from)?;

        let running = handle.running_flag();
        let flag = Arc::clone(&running);
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Shutting down...");
            flag.store(false, Ordering::Release);
        })
        .context("Failed to set signal handler")?;

        info!(
            offset = ?offset,
            period_ms = period.as_secs_f64() * 1e3,
            "Closed-loop simulation started"
        );
        println!("🚀 闭环运行中（Ctrl+C 停止）...");

        let mut simulation = Simulation::new(plant, Arc::clone(&exchange), period);
        simulation.run(&running, duration);
        let report = simulation.report();
        let metrics = handle.metrics();
        handle.join().map_err(NmpcError::from)?;

        let final_pose = model
            .forward_kinematics(simulation.state().positions())
            .map_err(NmpcError::from)?;
        let initial_error = (start_pose.translation.vector - target_pose.translation.vector).norm();
        let final_error = (final_pose.translation.vector - target_pose.translation.vector).norm();

        println!();
        println!("📊 运行结果:");
        println!("  仿真周期: {}", report.ticks);
        println!(
            "  指令: 应用 {}，拒绝 {}",
            report.commands_applied, report.commands_rejected
        );
        println!(
            "  控制周期: {}（求解 {}，保持 {}，超时 {}，超限 {}）",
            metrics.cycles_total, metrics.solved(), metrics.held, metrics.timeouts, metrics.overruns
        );
        println!("  降级率: {:.1}%", metrics.degraded_rate());
        println!("  最大求解时间: {:.2} ms", metrics.max_solve_us as f64 / 1e3);
        println!("  位置误差: {:.4} m → {:.4} m", initial_error, final_error);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_run_command_defaults() {
        let cmd = RunCommand {
            source: ConfigSource {
                config: PathBuf::from("config/arm.toml"),
                namespace: "arm".to_string(),
            },
            duration: None,
            offset: "0.05,0,-0.05".to_string(),
            initial: None,
        };

        assert!(cmd.duration.is_none());
        assert_eq!(parse_vector3(&cmd.offset).unwrap(), [0.05, 0.0, -0.05]);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let cmd = RunCommand {
            source: ConfigSource {
                config: PathBuf::from(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../config/arm.toml"
                )),
                namespace: "arm".to_string(),
            },
            duration: Some(-1.0),
            offset: "0,0,0".to_string(),
            initial: None,
        };

        let err = cmd.execute().unwrap_err();
        assert!(format!("{:#}", err).contains("--duration"));
    }
}
