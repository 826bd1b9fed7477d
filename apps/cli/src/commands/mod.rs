//! 子命令

pub mod check;
pub mod run;

pub use check::CheckCommand;
pub use run::RunCommand;

use anyhow::Result;
use clap::Args;
use nmpc_sdk::{Bootstrap, NmpcError, ParameterStore};
use std::path::PathBuf;

/// 参数来源
#[derive(Args, Debug, Clone)]
pub struct ConfigSource {
    /// 参数文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 参数命名空间
    #[arg(short, long, default_value = "arm")]
    pub namespace: String,
}

impl ConfigSource {
    /// 加载参数并装配控制器
    pub fn bootstrap(&self) -> Result<Bootstrap> {
        let store = ParameterStore::load(&self.config).map_err(NmpcError::from)?;
        Ok(nmpc_sdk::bootstrap(&store.namespace(&self.namespace), None)?)
    }
}
