//! 连续时间动力学模型

use nalgebra::{DMatrix, DVector};

/// 连续时间动力学 `ẋ = f(x, u)`
///
/// 求解器需要 `f` 及其雅可比 `∂f/∂x`、`∂f/∂u` 来传播积分器灵敏度。
pub trait Dynamics: Send + Sync {
    fn state_dim(&self) -> usize;

    fn control_dim(&self) -> usize;

    /// `f(x, u)`
    fn derivative(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64>;

    /// `(∂f/∂x, ∂f/∂u)`，尺寸分别为 `nx×nx`、`nx×nu`
    fn jacobians(&self, x: &DVector<f64>, u: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>);
}

/// 速度控制运动学 `ẋ = u`
///
/// 每个状态分量（底盘位姿、关节位置）由同序号的速度指令直接驱动，
/// 要求 `state_dim == control_dim`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityIntegrator {
    dim: usize,
}

impl VelocityIntegrator {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Dynamics for VelocityIntegrator {
    fn state_dim(&self) -> usize {
        self.dim
    }

    fn control_dim(&self) -> usize {
        self.dim
    }

    fn derivative(&self, _x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        u.clone()
    }

    fn jacobians(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        (
            DMatrix::zeros(self.dim, self.dim),
            DMatrix::identity(self.dim, self.dim),
        )
    }
}

impl<D: Dynamics + ?Sized> Dynamics for std::sync::Arc<D> {
    fn state_dim(&self) -> usize {
        (**self).state_dim()
    }

    fn control_dim(&self) -> usize {
        (**self).control_dim()
    }

    fn derivative(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        (**self).derivative(x, u)
    }

    fn jacobians(&self, x: &DVector<f64>, u: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        (**self).jacobians(x, u)
    }
}
