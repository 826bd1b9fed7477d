//! check 命令
//!
//! 校验参数文件并打印装配结果

use anyhow::Result;
use clap::Args;

use super::ConfigSource;

/// 参数校验命令参数
#[derive(Args, Debug)]
pub struct CheckCommand {
    #[command(flatten)]
    pub source: ConfigSource,
}

impl CheckCommand {
    pub fn execute(&self) -> Result<()> {
        let assembled = self.source.bootstrap()?;
        let params = &assembled.params;
        let horizon = assembled.problem.horizon();

        println!("✅ 参数有效: {} [{}]", self.source.config.display(), params.namespace);
        println!("  关节: {}", params.joint_names.join(", "));
        println!(
            "  链路: {} → {}（跟踪 {}）",
            params.chain_base_link, params.chain_tip_link, params.tracking_frame
        );
        println!(
            "  时域: N = {}, T = {} s, Δt = {:.3} s",
            horizon.shooting_nodes(),
            horizon.time_horizon(),
            horizon.step_size()
        );
        println!(
            "  维度: nx = {}, nu = {}, 底盘 {}",
            assembled.problem.state_dim(),
            assembled.problem.control_dim(),
            if params.base_active { "启用" } else { "关闭" }
        );
        println!(
            "  控制: {} Hz, 求解预算 {:.1} ms, 后端 {}",
            assembled.loop_config.control_rate_hz,
            assembled.loop_config.solve_budget().as_secs_f64() * 1e3,
            assembled.adapter.backend_name()
        );
        Ok(())
    }
}
