//! 预测轨迹与决策向量布局
//!
//! 决策向量按节点交错排列：
//!
//! ```text
//! [x_0, u_0, x_1, u_1, …, x_{N-1}, u_{N-1}, x_N]
//! ```
//!
//! 长度 `NV = nx·(N+1) + nu·N`。

use crate::error::ModelError;
use nalgebra::DVector;

/// 决策向量布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionLayout {
    pub state_dim: usize,
    pub control_dim: usize,
    pub shooting_nodes: usize,
}

impl DecisionLayout {
    pub fn new(state_dim: usize, control_dim: usize, shooting_nodes: usize) -> Self {
        Self {
            state_dim,
            control_dim,
            shooting_nodes,
        }
    }

    /// 单个节点（状态 + 控制）占用的长度
    pub fn stride(&self) -> usize {
        self.state_dim + self.control_dim
    }

    /// 第 `k` 个状态在决策向量中的起始下标（`k <= N`）
    pub fn state_offset(&self, k: usize) -> usize {
        k * self.stride()
    }

    /// 第 `k` 个控制在决策向量中的起始下标（`k < N`）
    pub fn control_offset(&self, k: usize) -> usize {
        k * self.stride() + self.state_dim
    }

    /// 决策向量总长度
    pub fn len(&self) -> usize {
        self.state_dim * (self.shooting_nodes + 1) + self.control_dim * self.shooting_nodes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 预测轨迹：`N + 1` 个状态，`N` 个控制
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    states: Vec<DVector<f64>>,
    controls: Vec<DVector<f64>>,
}

impl Trajectory {
    /// 从状态/控制序列构造
    ///
    /// # 错误
    /// - `ModelError::InvalidDimensions`: 节点数不匹配或各节点维度不一致
    pub fn new(states: Vec<DVector<f64>>, controls: Vec<DVector<f64>>) -> Result<Self, ModelError> {
        if controls.is_empty() {
            return Err(ModelError::InvalidDimensions(
                "trajectory needs at least one control".to_string(),
            ));
        }
        if states.len() != controls.len() + 1 {
            return Err(ModelError::InvalidDimensions(format!(
                "trajectory has {} states for {} controls",
                states.len(),
                controls.len()
            )));
        }
        let nx = states[0].len();
        let nu = controls[0].len();
        if states.iter().any(|x| x.len() != nx) || controls.iter().any(|u| u.len() != nu) {
            return Err(ModelError::InvalidDimensions(
                "trajectory nodes have inconsistent dimensions".to_string(),
            ));
        }
        Ok(Self { states, controls })
    }

    /// 保持轨迹：所有节点等于 `state`，控制为零
    pub fn hold(state: &[f64], shooting_nodes: usize, control_dim: usize) -> Self {
        let x = DVector::from_column_slice(state);
        Self {
            states: vec![x; shooting_nodes + 1],
            controls: vec![DVector::zeros(control_dim); shooting_nodes],
        }
    }

    /// 平移一个节点：丢弃首节点，末尾复制最后的状态与控制
    ///
    /// 用作下一周期的热启动。
    pub fn shifted(&self) -> Self {
        let mut states: Vec<_> = self.states[1..].to_vec();
        if let Some(last) = self.states.last() {
            states.push(last.clone());
        }
        let mut controls: Vec<_> = self.controls[1..].to_vec();
        if let Some(last) = self.controls.last() {
            controls.push(last.clone());
        }
        Self { states, controls }
    }

    /// 替换首节点状态
    pub fn with_first_state(mut self, state: &[f64]) -> Self {
        if let Some(first) = self.states.first_mut()
            && first.len() == state.len()
        {
            first.copy_from_slice(state);
        }
        self
    }

    pub fn states(&self) -> &[DVector<f64>] {
        &self.states
    }

    pub fn controls(&self) -> &[DVector<f64>] {
        &self.controls
    }

    pub fn first_state(&self) -> &DVector<f64> {
        &self.states[0]
    }

    pub fn first_control(&self) -> &DVector<f64> {
        &self.controls[0]
    }

    pub fn last_state(&self) -> &DVector<f64> {
        &self.states[self.states.len() - 1]
    }

    pub fn shooting_nodes(&self) -> usize {
        self.controls.len()
    }

    pub fn state_dim(&self) -> usize {
        self.states[0].len()
    }

    pub fn control_dim(&self) -> usize {
        self.controls[0].len()
    }

    pub fn layout(&self) -> DecisionLayout {
        DecisionLayout::new(self.state_dim(), self.control_dim(), self.shooting_nodes())
    }

    /// 所有元素均为有限值
    pub fn is_finite(&self) -> bool {
        self.states
            .iter()
            .chain(self.controls.iter())
            .all(|v| v.iter().all(|x| x.is_finite()))
    }

    /// 转换为交错决策向量
    pub fn to_decision_vector(&self) -> DVector<f64> {
        let layout = self.layout();
        let mut z = DVector::zeros(layout.len());
        for (k, x) in self.states.iter().enumerate() {
            z.rows_mut(layout.state_offset(k), layout.state_dim).copy_from(x);
        }
        for (k, u) in self.controls.iter().enumerate() {
            z.rows_mut(layout.control_offset(k), layout.control_dim).copy_from(u);
        }
        z
    }

    /// 从交错决策向量还原
    ///
    /// # 错误
    /// - `ModelError::InvalidDimensions`: 向量长度与布局不符
    pub fn from_decision_vector(layout: DecisionLayout, z: &DVector<f64>) -> Result<Self, ModelError> {
        if z.len() != layout.len() {
            return Err(ModelError::InvalidDimensions(format!(
                "decision vector has {} entries, layout expects {}",
                z.len(),
                layout.len()
            )));
        }
        let states = (0..=layout.shooting_nodes)
            .map(|k| z.rows(layout.state_offset(k), layout.state_dim).into_owned())
            .collect();
        let controls = (0..layout.shooting_nodes)
            .map(|k| z.rows(layout.control_offset(k), layout.control_dim).into_owned())
            .collect();
        Self::new(states, controls)
    }
}
