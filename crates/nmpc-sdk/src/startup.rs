//! 启动装配
//!
//! 参数 → 时域 / 运动链 / 约束 → 问题 → 求解适配器 → 控制循环。
//! 任何一步失败都不会启动控制线程。

use crate::error::NmpcError;
use nmpc_driver::{ControlLoop, ControlLoopBuilder, LoopConfig, StateExchange, TelemetrySink};
use nmpc_kinematics::KinematicModel;
use nmpc_model::RobotState;
use nmpc_params::{NmpcParams, ParameterView};
use nmpc_solver::{NmpcProblem, ProblemBuilder, SolverAdapter};
use std::sync::Arc;
use tracing::{error, info};

/// 装配完成、尚未启动的控制器组件
pub struct Bootstrap {
    pub params: NmpcParams,
    /// 与问题共享的运动学模型（用于在控制线程外计算末端位姿）
    pub model: Arc<dyn KinematicModel>,
    pub problem: NmpcProblem,
    pub adapter: SolverAdapter,
    pub loop_config: LoopConfig,
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("namespace", &self.params.namespace)
            .field("problem", &self.problem)
            .field("backend", &self.adapter.backend_name())
            .field("loop_config", &self.loop_config)
            .finish()
    }
}

/// 从参数视图装配控制器
///
/// `model` 为 `None` 时由 `chain/joints` 描述构建串联链模型。
///
/// # 错误
/// - `NmpcError::Config`: 参数缺失或非法（退出码 1–4）
/// - `NmpcError::Model` / `NmpcError::Kinematics` / `NmpcError::MissingKinematicModel`: 退出码 5
pub fn bootstrap(
    view: &ParameterView<'_>,
    model: Option<Arc<dyn KinematicModel>>,
) -> Result<Bootstrap, NmpcError> {
    let params = NmpcParams::load(view)?;
    build(params, model).inspect_err(|e| error!("Controller bootstrap failed: {}", e))
}

fn build(
    params: NmpcParams,
    model: Option<Arc<dyn KinematicModel>>,
) -> Result<Bootstrap, NmpcError> {
    let horizon = params.horizon()?;
    let chain = params.chain_config()?;
    let constraints = params.constraint_set()?;

    let model = match (model, &params.chain_description) {
        (Some(model), _) => model,
        (None, Some(description)) => {
            Arc::new(description.build_model(params.base_active)?) as Arc<dyn KinematicModel>
        },
        (None, None) => return Err(NmpcError::MissingKinematicModel),
    };

    let problem =
        ProblemBuilder::velocity_controlled(horizon, chain, constraints, Arc::clone(&model))
            .weights(params.weights)
            .integrator(params.integrator)
            .build()?;

    let adapter = SolverAdapter::sqp(params.solver_settings());
    let loop_config = LoopConfig {
        control_rate_hz: params.control_rate_hz,
        max_wall_time: params.solver.max_wall_time,
        ..LoopConfig::default()
    };

    info!(
        namespace = %params.namespace,
        tracking_frame = %params.tracking_frame,
        shooting_nodes = params.shooting_nodes,
        time_horizon = params.time_horizon,
        "Controller assembled"
    );

    Ok(Bootstrap {
        params,
        model,
        problem,
        adapter,
        loop_config,
    })
}

impl Bootstrap {
    /// 构建控制循环（`Ready`，未启动线程）
    pub fn into_control_loop(
        self,
        exchange: Arc<StateExchange>,
        telemetry: Arc<dyn TelemetrySink>,
        initial_state: Option<RobotState>,
    ) -> Result<ControlLoop, NmpcError> {
        let mut builder = ControlLoopBuilder::new(self.problem, exchange)
            .adapter(self.adapter)
            .config(self.loop_config)
            .telemetry(telemetry);
        if let Some(state) = initial_state {
            builder = builder.initial_state(state);
        }
        Ok(builder.build()?)
    }
}
