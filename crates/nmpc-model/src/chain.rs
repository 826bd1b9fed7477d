//! 运动链配置
//!
//! 描述被控运动链：关节顺序、基座/末端坐标系名、跟踪目标坐标系，
//! 以及是否启用平面移动底盘（`x, y, yaw` 占据状态向量前三位）。

use crate::error::ModelError;
use std::collections::HashSet;

/// 移动底盘自由度（`x, y, yaw`）
pub const BASE_DOFS: usize = 3;

/// 运动链配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainConfig {
    joint_names: Vec<String>,
    chain_base_link: String,
    chain_tip_link: String,
    tracking_frame: String,
    base_active: bool,
}

impl ChainConfig {
    /// 创建运动链配置
    ///
    /// # 参数
    /// - `joint_names`: 关节名（唯一、非空）
    /// - `chain_base_link`: 运动链基座坐标系
    /// - `chain_tip_link`: 运动链末端坐标系
    /// - `tracking_frame`: 跟踪目标坐标系
    /// - `base_active`: 是否启用移动底盘
    ///
    /// # 错误
    /// - `ModelError::InvalidDimensions`: 关节名为空、重复，或坐标系名为空
    pub fn new(
        joint_names: Vec<String>,
        chain_base_link: impl Into<String>,
        chain_tip_link: impl Into<String>,
        tracking_frame: impl Into<String>,
        base_active: bool,
    ) -> Result<Self, ModelError> {
        let chain_base_link = chain_base_link.into();
        let chain_tip_link = chain_tip_link.into();
        let tracking_frame = tracking_frame.into();

        if joint_names.is_empty() && !base_active {
            return Err(ModelError::InvalidDimensions(
                "joint_names is empty and base is inactive".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(joint_names.len());
        for name in &joint_names {
            if name.trim().is_empty() {
                return Err(ModelError::InvalidDimensions(
                    "joint_names contains an empty name".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ModelError::InvalidDimensions(format!(
                    "duplicate joint name '{}'",
                    name
                )));
            }
        }

        for (label, frame) in [
            ("chain_base_link", &chain_base_link),
            ("chain_tip_link", &chain_tip_link),
            ("tracking_frame", &tracking_frame),
        ] {
            if frame.trim().is_empty() {
                return Err(ModelError::InvalidDimensions(format!("{} is empty", label)));
            }
        }

        Ok(Self {
            joint_names,
            chain_base_link,
            chain_tip_link,
            tracking_frame,
            base_active,
        })
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn chain_base_link(&self) -> &str {
        &self.chain_base_link
    }

    pub fn chain_tip_link(&self) -> &str {
        &self.chain_tip_link
    }

    pub fn tracking_frame(&self) -> &str {
        &self.tracking_frame
    }

    pub fn base_active(&self) -> bool {
        self.base_active
    }

    /// 关节数量（不含底盘）
    pub fn joint_count(&self) -> usize {
        self.joint_names.len()
    }

    /// 状态维度：关节数 + 底盘自由度（若启用）
    pub fn state_dim(&self) -> usize {
        self.joint_count() + self.base_offset()
    }

    /// 关节在状态向量中的起始偏移
    pub fn base_offset(&self) -> usize {
        if self.base_active { BASE_DOFS } else { 0 }
    }

    /// 关节名 → 状态向量下标
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joint_names
            .iter()
            .position(|n| n == name)
            .map(|i| i + self.base_offset())
    }

    /// 校验外部声明的状态维度与关节列表一致
    pub fn check_state_dim(&self, state_dim: usize) -> Result<(), ModelError> {
        if state_dim != self.state_dim() {
            return Err(ModelError::InvalidDimensions(format!(
                "state_dim = {} but {} joints{} require {}",
                state_dim,
                self.joint_count(),
                if self.base_active { " + base" } else { "" },
                self.state_dim()
            )));
        }
        Ok(())
    }

    /// 将带名字的关节消息合并进状态向量
    ///
    /// 消息中未出现的关节保留 `prev` 中的值；不属于本链的名字被忽略。
    /// 返回被更新的关节数量。
    pub fn merge_joint_state(&self, state: &mut [f64], names: &[String], positions: &[f64]) -> usize {
        let mut updated = 0;
        for (name, value) in names.iter().zip(positions.iter()) {
            if let Some(idx) = self.joint_index(name)
                && idx < state.len()
            {
                state[idx] = *value;
                updated += 1;
            }
        }
        updated
    }

    /// 将底盘位姿写入状态向量前三位
    ///
    /// 底盘未启用时不做任何修改，返回 `false`。
    pub fn merge_base_pose(&self, state: &mut [f64], x: f64, y: f64, yaw: f64) -> bool {
        if !self.base_active || state.len() < BASE_DOFS {
            return false;
        }
        state[0] = x;
        state[1] = y;
        state[2] = yaw;
        true
    }
}
