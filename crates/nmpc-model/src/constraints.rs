//! 约束集合
//!
//! 三类上下界：
//! - **路径约束**（path）：作用于节点 `1..N-1` 的状态
//! - **终端约束**（terminal）：作用于最终节点 `N` 的状态
//! - **输入约束**（input）：作用于每个控制量
//!
//! 每一类独立校验，参数与字段一一对应（同名参数只写入同名字段）。
//! 非有限值（±∞）表示该侧无约束；NaN 一律拒绝。

use crate::error::ModelError;
use std::fmt;

/// 约束类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintCategory {
    /// 路径状态约束
    PathState,
    /// 终端状态约束
    TerminalState,
    /// 输入约束
    Input,
}

impl fmt::Display for ConstraintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintCategory::PathState => "path state",
            ConstraintCategory::TerminalState => "terminal state",
            ConstraintCategory::Input => "input",
        };
        f.write_str(name)
    }
}

/// 原始约束输入（来自参数加载，尚未校验）
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintBounds {
    pub path_state_min: Vec<f64>,
    pub path_state_max: Vec<f64>,
    pub terminal_state_min: Vec<f64>,
    pub terminal_state_max: Vec<f64>,
    pub input_min: Vec<f64>,
    pub input_max: Vec<f64>,
}

/// 已校验的一对上下界
///
/// 不变量：`min.len() == max.len()` 且 `min[i] <= max[i]`。
#[derive(Debug, Clone, PartialEq)]
pub struct BoundPair {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl BoundPair {
    fn validate(
        category: ConstraintCategory,
        expected_len: usize,
        min: Vec<f64>,
        max: Vec<f64>,
    ) -> Result<Self, ModelError> {
        let invalid = |reason: String| ModelError::InvalidConstraint { category, reason };

        if min.len() != expected_len {
            return Err(invalid(format!(
                "min has {} entries, expected {}",
                min.len(),
                expected_len
            )));
        }
        if max.len() != expected_len {
            return Err(invalid(format!(
                "max has {} entries, expected {}",
                max.len(),
                expected_len
            )));
        }

        for (i, (lo, hi)) in min.iter().zip(max.iter()).enumerate() {
            if lo.is_nan() || hi.is_nan() {
                return Err(invalid(format!("bound {} is NaN", i)));
            }
            if lo > hi {
                return Err(invalid(format!("min[{}] = {} > max[{}] = {}", i, lo, i, hi)));
            }
        }

        Ok(Self { min, max })
    }

    fn unbounded(len: usize) -> Self {
        Self {
            min: vec![f64::NEG_INFINITY; len],
            max: vec![f64::INFINITY; len],
        }
    }

    /// 下界
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    /// 上界
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// 维度
    pub fn len(&self) -> usize {
        self.min.len()
    }

    /// 是否为零维
    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// 检查向量是否落在上下界内（`tol` 为允许的越界量）
    pub fn contains(&self, values: &[f64], tol: f64) -> bool {
        values.len() == self.len()
            && values
                .iter()
                .zip(self.min.iter().zip(self.max.iter()))
                .all(|(v, (lo, hi))| *v >= lo - tol && *v <= hi + tol)
    }
}

/// 约束集合（构造后不可变）
///
/// 由 Problem Builder 独占持有。
///
/// # 示例
///
/// ```
/// use nmpc_model::{ConstraintBounds, ConstraintSet};
///
/// let bounds = ConstraintBounds {
///     path_state_min: vec![-3.0; 2],
///     path_state_max: vec![3.0; 2],
///     terminal_state_min: vec![-3.0; 2],
///     terminal_state_max: vec![3.0; 2],
///     input_min: vec![-0.5; 2],
///     input_max: vec![0.5; 2],
/// };
/// let constraints = ConstraintSet::new(2, 2, bounds).unwrap();
/// assert_eq!(constraints.input().max(), &[0.5, 0.5]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    state_dim: usize,
    control_dim: usize,
    path_state: BoundPair,
    terminal_state: BoundPair,
    input: BoundPair,
}

impl ConstraintSet {
    /// 从原始上下界构造并校验
    ///
    /// # 错误
    /// - `ModelError::InvalidConstraint`: 任一元素 `min > max`、出现 NaN，或长度与维度不符
    pub fn new(
        state_dim: usize,
        control_dim: usize,
        bounds: ConstraintBounds,
    ) -> Result<Self, ModelError> {
        let ConstraintBounds {
            path_state_min,
            path_state_max,
            terminal_state_min,
            terminal_state_max,
            input_min,
            input_max,
        } = bounds;

        let path_state = BoundPair::validate(
            ConstraintCategory::PathState,
            state_dim,
            path_state_min,
            path_state_max,
        )?;
        let terminal_state = BoundPair::validate(
            ConstraintCategory::TerminalState,
            state_dim,
            terminal_state_min,
            terminal_state_max,
        )?;
        let input =
            BoundPair::validate(ConstraintCategory::Input, control_dim, input_min, input_max)?;

        Ok(Self {
            state_dim,
            control_dim,
            path_state,
            terminal_state,
            input,
        })
    }

    /// 无约束集合（所有上下界为 ±∞）
    pub fn unbounded(state_dim: usize, control_dim: usize) -> Self {
        Self {
            state_dim,
            control_dim,
            path_state: BoundPair::unbounded(state_dim),
            terminal_state: BoundPair::unbounded(state_dim),
            input: BoundPair::unbounded(control_dim),
        }
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn control_dim(&self) -> usize {
        self.control_dim
    }

    /// 路径状态约束（节点 `1..N-1`）
    pub fn path_state(&self) -> &BoundPair {
        &self.path_state
    }

    /// 终端状态约束（节点 `N`）
    pub fn terminal_state(&self) -> &BoundPair {
        &self.terminal_state
    }

    /// 输入约束
    pub fn input(&self) -> &BoundPair {
        &self.input
    }

    /// 按类别访问
    pub fn category(&self, category: ConstraintCategory) -> &BoundPair {
        match category {
            ConstraintCategory::PathState => &self.path_state,
            ConstraintCategory::TerminalState => &self.terminal_state,
            ConstraintCategory::Input => &self.input,
        }
    }
}
