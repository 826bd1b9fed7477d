//! 多重打靶问题构建
//!
//! [`ProblemBuilder`] 在启动时校验全部维度与权重并生成不可变的 [`NmpcProblem`]。
//! 每个控制周期只传入 [`ProblemParameters`]（当前状态与目标位姿），问题结构从不重建。
//!
//! # 结构
//!
//! - 等式约束：`x_0 = x_cur`，`x_{k+1} = Φ(x_k, u_k, h)`，共 `nx·(N+1)` 行
//! - 路径约束作用于 `x_1 … x_{N-1}`，终端约束作用于 `x_N`，输入约束作用于每个 `u_k`
//! - 代价：阶段代价乘以步长 `h`，终端位姿代价乘以 `w_T`

use crate::dynamics::{Dynamics, VelocityIntegrator};
use crate::error::EvaluationError;
use crate::integrator::Integrator;
use crate::weights::TrackingWeights;
use nalgebra::{DMatrix, DVector, Isometry3, Matrix6xX, Vector6};
use nmpc_kinematics::KinematicModel;
use nmpc_model::{
    ChainConfig, ConstraintSet, DecisionLayout, HorizonConfig, ModelError, RobotState, TargetPose,
};
use std::sync::Arc;
use tracing::debug;

/// 求解期参数
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemParameters {
    /// 当前状态（首节点固定值）
    pub current_state: DVector<f64>,
    /// 目标位姿（`chain_base_link` 坐标系）
    pub target: Isometry3<f64>,
}

impl ProblemParameters {
    pub fn new(current_state: DVector<f64>, target: Isometry3<f64>) -> Self {
        Self {
            current_state,
            target,
        }
    }

    /// 由状态与目标快照构造
    pub fn from_snapshots(state: &RobotState, target: &TargetPose) -> Self {
        Self {
            current_state: DVector::from_column_slice(state.positions()),
            target: *target.pose(),
        }
    }
}

/// 在参考点 `z̄` 处的 Gauss–Newton 局部模型（步长变量 `δ = z − z̄`）
///
/// - 代价：`½ δᵀ H δ + gᵀ δ`
/// - 等式：`E δ = e`
/// - 边界：`step_lower <= δ <= step_upper`（非有限值表示无界）
#[derive(Debug, Clone)]
pub struct LinearizedProblem {
    pub hessian: DMatrix<f64>,
    pub gradient: DVector<f64>,
    pub eq_matrix: DMatrix<f64>,
    pub eq_rhs: DVector<f64>,
    pub step_lower: DVector<f64>,
    pub step_upper: DVector<f64>,
    /// 参考点处的代价
    pub cost: f64,
    /// 参考点处的等式残差
    pub defects: DVector<f64>,
}

/// 问题构建器
pub struct ProblemBuilder {
    horizon: HorizonConfig,
    chain: ChainConfig,
    constraints: ConstraintSet,
    model: Arc<dyn KinematicModel>,
    dynamics: Arc<dyn Dynamics>,
    weights: TrackingWeights,
    integrator: Integrator,
}

impl ProblemBuilder {
    /// 创建构建器
    pub fn new(
        horizon: HorizonConfig,
        chain: ChainConfig,
        constraints: ConstraintSet,
        model: Arc<dyn KinematicModel>,
        dynamics: Arc<dyn Dynamics>,
    ) -> Self {
        Self {
            horizon,
            chain,
            constraints,
            model,
            dynamics,
            weights: TrackingWeights::default(),
            integrator: Integrator::default(),
        }
    }

    /// 使用速度控制运动学 `ẋ = u` 作为动力学
    pub fn velocity_controlled(
        horizon: HorizonConfig,
        chain: ChainConfig,
        constraints: ConstraintSet,
        model: Arc<dyn KinematicModel>,
    ) -> Self {
        let dynamics = Arc::new(VelocityIntegrator::new(constraints.state_dim()));
        Self::new(horizon, chain, constraints, model, dynamics)
    }

    pub fn weights(mut self, weights: TrackingWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    /// 校验并构建问题
    ///
    /// # 错误
    /// - `ModelError::InvalidDimensions`: 维度为零，或与关节列表、运动学模型、动力学不一致
    /// - `ModelError::InvalidWeights`: 权重非法
    pub fn build(self) -> Result<NmpcProblem, ModelError> {
        let nx = self.constraints.state_dim();
        let nu = self.constraints.control_dim();

        if nx == 0 || nu == 0 {
            return Err(ModelError::InvalidDimensions(format!(
                "state_dim = {}, control_dim = {}; both must be positive",
                nx, nu
            )));
        }
        self.chain.check_state_dim(nx)?;
        if self.model.dof() != nx {
            return Err(ModelError::InvalidDimensions(format!(
                "kinematic model has {} DOF but state_dim = {}",
                self.model.dof(),
                nx
            )));
        }
        if self.dynamics.state_dim() != nx || self.dynamics.control_dim() != nu {
            return Err(ModelError::InvalidDimensions(format!(
                "dynamics is {}x{} but problem is state_dim = {}, control_dim = {}",
                self.dynamics.state_dim(),
                self.dynamics.control_dim(),
                nx,
                nu
            )));
        }
        self.weights.validate()?;

        let layout = DecisionLayout::new(nx, nu, self.horizon.shooting_nodes());
        let (lower, upper) = assemble_bounds(&layout, &self.constraints);

        debug!(
            state_dim = nx,
            control_dim = nu,
            shooting_nodes = layout.shooting_nodes,
            decision_len = layout.len(),
            integrator = %self.integrator,
            "NMPC problem built"
        );

        Ok(NmpcProblem {
            horizon: self.horizon,
            chain: self.chain,
            constraints: self.constraints,
            model: self.model,
            dynamics: self.dynamics,
            weights: self.weights,
            integrator: self.integrator,
            layout,
            lower,
            upper,
        })
    }
}

/// 决策向量的绝对上下界（首节点无界，由等式固定）
fn assemble_bounds(layout: &DecisionLayout, constraints: &ConstraintSet) -> (DVector<f64>, DVector<f64>) {
    let mut lower = DVector::from_element(layout.len(), f64::NEG_INFINITY);
    let mut upper = DVector::from_element(layout.len(), f64::INFINITY);
    let n = layout.shooting_nodes;

    for k in 1..=n {
        let bounds = if k == n {
            constraints.terminal_state()
        } else {
            constraints.path_state()
        };
        let offset = layout.state_offset(k);
        lower.rows_mut(offset, layout.state_dim).copy_from_slice(bounds.min());
        upper.rows_mut(offset, layout.state_dim).copy_from_slice(bounds.max());
    }
    for k in 0..n {
        let offset = layout.control_offset(k);
        let bounds = constraints.input();
        lower.rows_mut(offset, layout.control_dim).copy_from_slice(bounds.min());
        upper.rows_mut(offset, layout.control_dim).copy_from_slice(bounds.max());
    }
    (lower, upper)
}

/// 构建完成的 NMPC 问题（不可变）
pub struct NmpcProblem {
    horizon: HorizonConfig,
    chain: ChainConfig,
    constraints: ConstraintSet,
    model: Arc<dyn KinematicModel>,
    dynamics: Arc<dyn Dynamics>,
    weights: TrackingWeights,
    integrator: Integrator,
    layout: DecisionLayout,
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl std::fmt::Debug for NmpcProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NmpcProblem")
            .field("horizon", &self.horizon)
            .field("chain", &self.chain)
            .field("weights", &self.weights)
            .field("integrator", &self.integrator)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl NmpcProblem {
    pub fn horizon(&self) -> &HorizonConfig {
        &self.horizon
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn weights(&self) -> &TrackingWeights {
        &self.weights
    }

    pub fn integrator(&self) -> Integrator {
        self.integrator
    }

    pub fn model(&self) -> &dyn KinematicModel {
        self.model.as_ref()
    }

    pub fn layout(&self) -> DecisionLayout {
        self.layout
    }

    pub fn state_dim(&self) -> usize {
        self.layout.state_dim
    }

    pub fn control_dim(&self) -> usize {
        self.layout.control_dim
    }

    /// 决策向量长度 `NV`
    pub fn decision_len(&self) -> usize {
        self.layout.len()
    }

    /// 等式约束行数 `nx·(N+1)`
    pub fn equality_count(&self) -> usize {
        self.layout.state_dim * (self.layout.shooting_nodes + 1)
    }

    pub fn lower_bounds(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper_bounds(&self) -> &DVector<f64> {
        &self.upper
    }

    /// 校验求解期参数与决策向量尺寸
    pub fn check_inputs(&self, z: &DVector<f64>, params: &ProblemParameters) -> Result<(), EvaluationError> {
        if z.len() != self.decision_len() {
            return Err(EvaluationError::DimensionMismatch {
                what: "decision vector",
                expected: self.decision_len(),
                actual: z.len(),
            });
        }
        if params.current_state.len() != self.state_dim() {
            return Err(EvaluationError::DimensionMismatch {
                what: "current state",
                expected: self.state_dim(),
                actual: params.current_state.len(),
            });
        }
        Ok(())
    }

    /// 位姿残差 `[p − p_t ; log(R·R_tᵀ)]` 及其对 `q` 的雅可比
    pub fn pose_residual(
        &self,
        q: &[f64],
        target: &Isometry3<f64>,
    ) -> Result<(Vector6<f64>, Matrix6xX<f64>), EvaluationError> {
        let pj = self.model.pose_and_jacobian(q)?;
        let position_error = pj.pose.translation.vector - target.translation.vector;
        let orientation_error = (pj.pose.rotation * target.rotation.inverse()).scaled_axis();
        let mut residual = Vector6::zeros();
        residual.fixed_rows_mut::<3>(0).copy_from(&position_error);
        residual.fixed_rows_mut::<3>(3).copy_from(&orientation_error);
        Ok((residual, pj.jacobian))
    }

    /// 第 `k` 个节点的位姿代价系数（阶段为 `h`，终端为 `w_T`）
    fn pose_scale(&self, k: usize) -> f64 {
        if k == self.layout.shooting_nodes {
            self.weights.terminal
        } else {
            self.horizon.step_size()
        }
    }

    fn state_scale(&self, k: usize) -> f64 {
        if k == self.layout.shooting_nodes {
            0.0
        } else {
            self.horizon.step_size() * self.weights.state
        }
    }

    fn control_scale(&self) -> f64 {
        self.horizon.step_size() * self.weights.control
    }

    /// 代价 `J(z)`
    pub fn cost(&self, z: &DVector<f64>, params: &ProblemParameters) -> Result<f64, EvaluationError> {
        self.check_inputs(z, params)?;
        let w = self.weights.pose_sqrt_diag();
        let mut cost = 0.0;

        for k in 0..=self.layout.shooting_nodes {
            let x = z.rows(self.layout.state_offset(k), self.layout.state_dim);
            let (residual, _) = self.pose_residual(x.as_slice(), &params.target)?;
            let weighted: f64 = residual.iter().zip(w.iter()).map(|(r, s)| (r * s).powi(2)).sum();
            cost += self.pose_scale(k) * weighted + self.state_scale(k) * x.norm_squared();
        }
        for k in 0..self.layout.shooting_nodes {
            let u = z.rows(self.layout.control_offset(k), self.layout.control_dim);
            cost += self.control_scale() * u.norm_squared();
        }

        if !cost.is_finite() {
            return Err(EvaluationError::NonFinite("cost"));
        }
        Ok(cost)
    }

    /// 等式残差 `[x_0 − x_cur ; x_{k+1} − Φ(x_k, u_k)]`
    pub fn defects(&self, z: &DVector<f64>, params: &ProblemParameters) -> Result<DVector<f64>, EvaluationError> {
        self.check_inputs(z, params)?;
        let nx = self.layout.state_dim;
        let nu = self.layout.control_dim;
        let h = self.horizon.step_size();
        let mut defects = DVector::zeros(self.equality_count());

        let x0 = z.rows(self.layout.state_offset(0), nx);
        defects.rows_mut(0, nx).copy_from(&(x0 - &params.current_state));

        for k in 0..self.layout.shooting_nodes {
            let x = z.rows(self.layout.state_offset(k), nx).into_owned();
            let u = z.rows(self.layout.control_offset(k), nu).into_owned();
            let next = z.rows(self.layout.state_offset(k + 1), nx);
            let predicted = self.integrator.step(self.dynamics.as_ref(), &x, &u, h);
            defects.rows_mut(nx * (k + 1), nx).copy_from(&(next - predicted));
        }
        Ok(defects)
    }

    /// 在 `z̄` 处构建 Gauss–Newton 局部模型
    pub fn linearize(
        &self,
        z: &DVector<f64>,
        params: &ProblemParameters,
    ) -> Result<LinearizedProblem, EvaluationError> {
        self.check_inputs(z, params)?;
        let nv = self.decision_len();
        let nx = self.layout.state_dim;
        let nu = self.layout.control_dim;
        let n = self.layout.shooting_nodes;
        let h = self.horizon.step_size();
        let w = self.weights.pose_sqrt_diag();

        let mut hessian = DMatrix::zeros(nv, nv);
        let mut gradient = DVector::zeros(nv);
        let mut cost = 0.0;

        // 状态块：2·JᵀJ + 2·c_x·I
        for k in 0..=n {
            let offset = self.layout.state_offset(k);
            let x = z.rows(offset, nx);
            let (residual, jacobian) = self.pose_residual(x.as_slice(), &params.target)?;
            let scale = self.pose_scale(k).sqrt();

            let mut r = residual;
            let mut j = jacobian;
            for row in 0..6 {
                let s = scale * w[row];
                r[row] *= s;
                j.row_mut(row).scale_mut(s);
            }
            let state_scale = self.state_scale(k);

            cost += r.norm_squared() + state_scale * x.norm_squared();

            let block_grad = j.transpose() * r * 2.0 + x * (2.0 * state_scale);
            gradient.rows_mut(offset, nx).copy_from(&block_grad);

            let mut block_hess = j.transpose() * &j * 2.0;
            for i in 0..nx {
                block_hess[(i, i)] += 2.0 * state_scale;
            }
            hessian.view_mut((offset, offset), (nx, nx)).copy_from(&block_hess);
        }

        // 控制块：2·h·w_u·I
        let control_scale = self.control_scale();
        for k in 0..n {
            let offset = self.layout.control_offset(k);
            let u = z.rows(offset, nu);
            cost += control_scale * u.norm_squared();
            gradient.rows_mut(offset, nu).copy_from(&(u * (2.0 * control_scale)));
            for i in 0..nu {
                hessian[(offset + i, offset + i)] = 2.0 * control_scale;
            }
        }

        if !cost.is_finite() {
            return Err(EvaluationError::NonFinite("cost"));
        }

        // 等式：δx_0 = x_cur − x̄_0；δx_{k+1} − A δx_k − B δu_k = Φ(x̄_k, ū_k) − x̄_{k+1}
        let n_eq = self.equality_count();
        let mut eq_matrix = DMatrix::zeros(n_eq, nv);
        let mut eq_rhs = DVector::zeros(n_eq);
        let mut defects = DVector::zeros(n_eq);

        let x0 = z.rows(self.layout.state_offset(0), nx);
        let pin = &params.current_state - x0;
        eq_matrix
            .view_mut((0, self.layout.state_offset(0)), (nx, nx))
            .fill_with_identity();
        eq_rhs.rows_mut(0, nx).copy_from(&pin);
        defects.rows_mut(0, nx).copy_from(&(-&pin));

        for k in 0..n {
            let row = nx * (k + 1);
            let x = z.rows(self.layout.state_offset(k), nx).into_owned();
            let u = z.rows(self.layout.control_offset(k), nu).into_owned();
            let next = z.rows(self.layout.state_offset(k + 1), nx);
            let step = self
                .integrator
                .step_with_sensitivity(self.dynamics.as_ref(), &x, &u, h);

            eq_matrix
                .view_mut((row, self.layout.state_offset(k + 1)), (nx, nx))
                .fill_with_identity();
            eq_matrix
                .view_mut((row, self.layout.state_offset(k)), (nx, nx))
                .copy_from(&(-&step.a));
            eq_matrix
                .view_mut((row, self.layout.control_offset(k)), (nx, nu))
                .copy_from(&(-&step.b));

            let gap = &step.next - next;
            eq_rhs.rows_mut(row, nx).copy_from(&gap);
            defects.rows_mut(row, nx).copy_from(&(-&gap));
        }

        let step_lower = &self.lower - z;
        let step_upper = &self.upper - z;

        Ok(LinearizedProblem {
            hessian,
            gradient,
            eq_matrix,
            eq_rhs,
            step_lower,
            step_upper,
            cost,
            defects,
        })
    }

    /// 以保持轨迹作为冷启动初值
    pub fn hold_guess(&self, state: &[f64]) -> nmpc_model::Trajectory {
        nmpc_model::Trajectory::hold(state, self.layout.shooting_nodes, self.layout.control_dim)
    }
}
