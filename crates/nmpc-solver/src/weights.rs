//! 跟踪代价权重

use nmpc_model::ModelError;

/// 代价权重
///
/// `J = Σ h·(‖W^½ r(x_k)‖² + w_u‖u_k‖² + w_x‖x_k‖²) + w_T‖W^½ r(x_N)‖²`，
/// 其中 `W = diag(w_p, w_p, w_p, w_o, w_o, w_o)`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingWeights {
    /// 位置误差权重 `w_p`
    pub position: f64,
    /// 姿态误差权重 `w_o`
    pub orientation: f64,
    /// 控制量权重 `w_u`
    pub control: f64,
    /// 状态正则权重 `w_x`
    pub state: f64,
    /// 终端代价权重 `w_T`
    pub terminal: f64,
}

impl Default for TrackingWeights {
    fn default() -> Self {
        Self {
            position: 10.0,
            orientation: 1.0,
            control: 1.0,
            state: 0.0,
            terminal: 1.0,
        }
    }
}

impl TrackingWeights {
    /// 校验权重
    ///
    /// # 错误
    /// - `ModelError::InvalidWeights`: `W` 非正定、`w_u <= 0`，或 `w_x`、`w_T` 为负/非有限
    pub fn validate(&self) -> Result<(), ModelError> {
        let positive = [
            ("position", self.position),
            ("orientation", self.orientation),
            ("control", self.control),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ModelError::InvalidWeights(format!(
                    "{} weight must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [("state", self.state), ("terminal", self.terminal)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidWeights(format!(
                    "{} weight must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// `W^½` 的对角元素
    pub(crate) fn pose_sqrt_diag(&self) -> [f64; 6] {
        let p = self.position.sqrt();
        let o = self.orientation.sqrt();
        [p, p, p, o, o, o]
    }
}
