//! 预测时域配置

use crate::error::ModelError;
use std::time::Duration;

/// 预测时域
///
/// 不变量：`shooting_nodes >= 2`，`time_horizon` 为正且有限。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HorizonConfig {
    shooting_nodes: usize,
    time_horizon: f64,
}

impl HorizonConfig {
    /// 最少打靶节点数
    pub const MIN_SHOOTING_NODES: usize = 2;

    /// 创建时域配置
    ///
    /// # 错误
    /// - `ModelError::InvalidHorizon`: `shooting_nodes < 2` 或 `time_horizon` 非正/非有限
    pub fn new(shooting_nodes: usize, time_horizon: f64) -> Result<Self, ModelError> {
        if shooting_nodes < Self::MIN_SHOOTING_NODES {
            return Err(ModelError::InvalidHorizon(format!(
                "shooting_nodes = {}, need at least {}",
                shooting_nodes,
                Self::MIN_SHOOTING_NODES
            )));
        }
        if !time_horizon.is_finite() || time_horizon <= 0.0 {
            return Err(ModelError::InvalidHorizon(format!(
                "time_horizon = {} must be positive and finite",
                time_horizon
            )));
        }
        Ok(Self {
            shooting_nodes,
            time_horizon,
        })
    }

    /// 打靶区间数 `N`
    pub fn shooting_nodes(&self) -> usize {
        self.shooting_nodes
    }

    /// 时域长度（秒）
    pub fn time_horizon(&self) -> f64 {
        self.time_horizon
    }

    /// 积分步长 `h = T / N`
    pub fn step_size(&self) -> f64 {
        self.time_horizon / self.shooting_nodes as f64
    }

    /// 状态节点数 `N + 1`
    pub fn node_count(&self) -> usize {
        self.shooting_nodes + 1
    }

    /// 步长对应的时长
    pub fn step_duration(&self) -> Duration {
        Duration::from_secs_f64(self.step_size())
    }
}
