//! 定步长积分器
//!
//! 离散化 `x_{k+1} = Φ(x_k, u_k, h)`，并传播离散灵敏度
//! `A_d = ∂Φ/∂x`、`B_d = ∂Φ/∂u`（供 Gauss–Newton 线性化使用）。

use crate::dynamics::Dynamics;
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::str::FromStr;

/// 积分方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Integrator {
    /// 显式 Euler：`x + h·f(x, u)`
    ExplicitEuler,
    /// 经典四阶 Runge–Kutta
    #[default]
    Rk4,
}

/// 单步积分结果与灵敏度
#[derive(Debug, Clone, PartialEq)]
pub struct StepSensitivity {
    pub next: DVector<f64>,
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
}

impl Integrator {
    /// 积分一步
    pub fn step(
        &self,
        dynamics: &dyn Dynamics,
        x: &DVector<f64>,
        u: &DVector<f64>,
        h: f64,
    ) -> DVector<f64> {
        match self {
            Integrator::ExplicitEuler => x + dynamics.derivative(x, u) * h,
            Integrator::Rk4 => {
                let k1 = dynamics.derivative(x, u);
                let k2 = dynamics.derivative(&(x + &k1 * (h / 2.0)), u);
                let k3 = dynamics.derivative(&(x + &k2 * (h / 2.0)), u);
                let k4 = dynamics.derivative(&(x + &k3 * h), u);
                x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
            },
        }
    }

    /// 积分一步并返回 `(Φ, ∂Φ/∂x, ∂Φ/∂u)`
    pub fn step_with_sensitivity(
        &self,
        dynamics: &dyn Dynamics,
        x: &DVector<f64>,
        u: &DVector<f64>,
        h: f64,
    ) -> StepSensitivity {
        let nx = x.len();
        let identity = DMatrix::<f64>::identity(nx, nx);

        match self {
            Integrator::ExplicitEuler => {
                let (fx, fu) = dynamics.jacobians(x, u);
                StepSensitivity {
                    next: x + dynamics.derivative(x, u) * h,
                    a: &identity + fx * h,
                    b: fu * h,
                }
            },
            Integrator::Rk4 => {
                // 各阶段的 ∂k_i/∂x、∂k_i/∂u 通过链式法则逐级传播
                let k1 = dynamics.derivative(x, u);
                let (a1, b1) = dynamics.jacobians(x, u);
                let dk1x = a1;
                let dk1u = b1;

                let x2 = x + &k1 * (h / 2.0);
                let k2 = dynamics.derivative(&x2, u);
                let (a2, b2) = dynamics.jacobians(&x2, u);
                let dk2x = &a2 * (&identity + &dk1x * (h / 2.0));
                let dk2u = &a2 * (&dk1u * (h / 2.0)) + b2;

                let x3 = x + &k2 * (h / 2.0);
                let k3 = dynamics.derivative(&x3, u);
                let (a3, b3) = dynamics.jacobians(&x3, u);
                let dk3x = &a3 * (&identity + &dk2x * (h / 2.0));
                let dk3u = &a3 * (&dk2u * (h / 2.0)) + b3;

                let x4 = x + &k3 * h;
                let k4 = dynamics.derivative(&x4, u);
                let (a4, b4) = dynamics.jacobians(&x4, u);
                let dk4x = &a4 * (&identity + &dk3x * h);
                let dk4u = &a4 * (&dk3u * h) + b4;

                let next = x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0);
                let a = &identity + (dk1x + dk2x * 2.0 + dk3x * 2.0 + dk4x) * (h / 6.0);
                let b = (dk1u + dk2u * 2.0 + dk3u * 2.0 + dk4u) * (h / 6.0);
                StepSensitivity { next, a, b }
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Integrator::ExplicitEuler => "euler",
            Integrator::Rk4 => "rk4",
        }
    }
}

impl fmt::Display for Integrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Integrator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rk4" | "runge_kutta" => Ok(Integrator::Rk4),
            "euler" | "explicit_euler" => Ok(Integrator::ExplicitEuler),
            other => Err(format!("unknown integrator '{}' (expected 'rk4' or 'euler')", other)),
        }
    }
}
