//! 日志初始化
//!
//! 安装 `tracing-subscriber` fmt 订阅者（`RUST_LOG` 优先，否则使用默认指令），
//! 并通过 `tracing-log` 把 `log` 记录桥接到 `tracing`。

use crate::error::NmpcError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// 默认过滤指令
pub const DEFAULT_DIRECTIVE: &str = "nmpc=info";

fn env_filter(directive: &str) -> Result<EnvFilter, NmpcError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(directive).map_err(|e| NmpcError::Logging(e.to_string())),
    }
}

/// 以默认指令初始化到 stderr
pub fn init() -> Result<(), NmpcError> {
    init_with_directive(DEFAULT_DIRECTIVE)
}

/// 以指定指令初始化到 stderr（`RUST_LOG` 仍然优先）
pub fn init_with_directive(directive: &str) -> Result<(), NmpcError> {
    init_with_writer(directive, std::io::stderr)
}

/// 以指定指令和输出初始化
///
/// 只能成功调用一次；重复调用返回 `NmpcError::Logging`。
pub fn init_with_writer<W>(directive: &str, writer: W) -> Result<(), NmpcError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(directive)?)
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| NmpcError::Logging(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| NmpcError::Logging(e.to_string()))
}
