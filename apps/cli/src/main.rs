//! # NMPC CLI
//!
//! NMPC 末端跟踪控制器的命令行入口。
//!
//! ```bash
//! # 校验参数文件并打印装配结果
//! nmpc-cli check --config config/arm.toml --namespace arm
//!
//! # 针对运动学仿真对象闭环运行（Ctrl+C 停止）
//! nmpc-cli run --config config/arm.toml --namespace arm --offset 0.05,0,-0.05
//! ```
//!
//! 退出码：`chain_tip_link` 缺失 2，`chain_base_link` 缺失 3，`tracking_frame` 缺失 4，
//! 模型构造失败 5，其他错误 1。

use clap::{Parser, Subcommand};
use nmpc_sdk::NmpcError;
use std::process;

mod commands;
mod simulation;
mod utils;

use commands::{CheckCommand, RunCommand};

/// NMPC CLI - 末端坐标系跟踪控制器
#[derive(Parser, Debug)]
#[command(name = "nmpc-cli")]
#[command(about = "Nonlinear MPC frame tracker", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志过滤指令（`RUST_LOG` 优先）
    #[arg(long, global = true, default_value = nmpc_sdk::logging::DEFAULT_DIRECTIVE)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 校验参数并装配控制器（不启动控制线程）
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 针对运动学仿真对象闭环运行
    Run {
        #[command(flatten)]
        args: RunCommand,
    },
}

/// 错误 → 退出码（非 SDK 错误一律为 1）
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<NmpcError>().map(NmpcError::exit_code).unwrap_or(1)
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = nmpc_sdk::logging::init_with_directive(&cli.log) {
        eprintln!("{}", e);
        process::exit(e.exit_code());
    }

    let result = match cli.command {
        Commands::Check { args } => args.execute(),
        Commands::Run { args } => args.execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(exit_code(&e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmpc_sdk::ConfigError;

    #[test]
    fn test_exit_code_from_sdk_error() {
        let err = anyhow::Error::new(NmpcError::from(ConfigError::MissingTrackingFrame));
        assert_eq!(exit_code(&err), 4);

        let err = anyhow::Error::new(NmpcError::MissingKinematicModel).context("bootstrap");
        assert_eq!(exit_code(&err), 5);
    }

    #[test]
    fn test_exit_code_for_other_errors() {
        assert_eq!(exit_code(&anyhow::anyhow!("invalid --offset")), 1);
    }

    #[test]
    fn test_cli_parses_run_arguments() {
        let cli = Cli::try_parse_from([
            "nmpc-cli",
            "run",
            "--config",
            "config/arm.toml",
            "--namespace",
            "arm",
            "--duration",
            "1.5",
        ])
        .unwrap();
        assert_eq!(cli.log, nmpc_sdk::logging::DEFAULT_DIRECTIVE);
        match cli.command {
            Commands::Run { args } => {
                assert_eq!(args.source.namespace, "arm");
                assert_eq!(args.duration, Some(1.5));
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
