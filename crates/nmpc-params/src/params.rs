//! NMPC 参数加载
//!
//! 一次性读取全部参数：每个缺失的必需键都记录一条 `error` 日志，然后整体失败。
//! 多个键缺失时，退出码按 `chain_tip_link` → `chain_base_link` → `tracking_frame` 的优先级决定。

use crate::chain_desc::{ChainDescription, JointDescription, TipDescription};
use crate::error::ConfigError;
use crate::store::{FromParam, ParameterView};
use nmpc_model::{ChainConfig, ConstraintBounds, ConstraintSet, HorizonConfig, ModelError};
use nmpc_solver::{Integrator, SolverSettings, TrackingWeights};
use std::time::Duration;
use tracing::{error, info};

/// 参数键（相对命名空间）
pub mod keys {
    pub const JOINT_NAMES: &str = "joint_names";
    pub const CHAIN_BASE_LINK: &str = "chain_base_link";
    pub const CHAIN_TIP_LINK: &str = "chain_tip_link";
    pub const TRACKING_FRAME: &str = "tracking_frame";
    pub const TRACKING_FRAME_ALIAS: &str = "frame_tracker/target_frame";

    pub const SHOOTING_NODES: &str = "nmpc/shooting_nodes";
    pub const TIME_HORIZON: &str = "nmpc/time_horizon";
    pub const STATE_DIM: &str = "nmpc/state_dim";
    pub const CONTROL_DIM: &str = "nmpc/control_dim";
    pub const BASE_ACTIVE: &str = "nmpc/base/base_active";

    pub const PATH_MIN: &str = "nmpc/constraints/state/path_constraints/min";
    pub const PATH_MAX: &str = "nmpc/constraints/state/path_constraints/max";
    pub const TERMINAL_MIN: &str = "nmpc/constraints/state/terminal_constraints/min";
    pub const TERMINAL_MAX: &str = "nmpc/constraints/state/terminal_constraints/max";
    pub const INPUT_MIN: &str = "nmpc/constraints/input/input_constraints/min";
    pub const INPUT_MAX: &str = "nmpc/constraints/input/input_constraints/max";

    pub const CONTROL_RATE_HZ: &str = "nmpc/control_rate_hz";
    pub const INTEGRATOR: &str = "nmpc/integrator";

    pub const WEIGHT_POSITION: &str = "nmpc/weights/position";
    pub const WEIGHT_ORIENTATION: &str = "nmpc/weights/orientation";
    pub const WEIGHT_CONTROL: &str = "nmpc/weights/control";
    pub const WEIGHT_STATE: &str = "nmpc/weights/state";
    pub const WEIGHT_TERMINAL: &str = "nmpc/weights/terminal";

    pub const SOLVER_MAX_ITERATIONS: &str = "nmpc/solver/max_iterations";
    pub const SOLVER_TOLERANCE: &str = "nmpc/solver/tolerance";
    pub const SOLVER_MAX_WALL_TIME: &str = "nmpc/solver/max_wall_time";

    pub const CHAIN_JOINTS: &str = "chain/joints";
    pub const CHAIN_TIP_XYZ: &str = "chain/tip/xyz";
    pub const CHAIN_TIP_RPY: &str = "chain/tip/rpy";
}

/// 默认控制频率（Hz）
pub const DEFAULT_CONTROL_RATE_HZ: f64 = 10.0;

/// 求解器参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// 单次求解时间预算；未设置时由控制周期推导
    pub max_wall_time: Option<Duration>,
}

impl Default for SolverParams {
    fn default() -> Self {
        let settings = SolverSettings::default();
        Self {
            max_iterations: settings.max_iterations,
            tolerance: settings.tolerance,
            max_wall_time: None,
        }
    }
}

/// 已加载的 NMPC 参数
#[derive(Debug, Clone, PartialEq)]
pub struct NmpcParams {
    pub namespace: String,
    pub joint_names: Vec<String>,
    pub chain_base_link: String,
    pub chain_tip_link: String,
    pub tracking_frame: String,
    pub shooting_nodes: usize,
    pub time_horizon: f64,
    pub state_dim: usize,
    pub control_dim: usize,
    pub base_active: bool,
    pub bounds: ConstraintBounds,
    pub control_rate_hz: f64,
    pub integrator: Integrator,
    pub weights: TrackingWeights,
    pub solver: SolverParams,
    pub chain_description: Option<ChainDescription>,
}

/// 逐键收集缺失项，最后统一报告
struct Collector<'v, 'a> {
    view: &'v ParameterView<'a>,
    missing: Vec<String>,
}

impl<'v, 'a> Collector<'v, 'a> {
    fn new(view: &'v ParameterView<'a>) -> Self {
        Self {
            view,
            missing: Vec::new(),
        }
    }

    /// 类型错误立即返回；缺失只记录
    fn required<T: FromParam>(&mut self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.view.get::<T>(key)? {
            Some(value) => Ok(Some(value)),
            None => {
                error!(namespace = %self.view.prefix(), "Parameter '{}' not set", key);
                self.missing.push(key.to_string());
                Ok(None)
            },
        }
    }

    fn is_missing(&self, key: &str) -> bool {
        self.missing.iter().any(|k| k == key)
    }

    /// 缺失键 → 错误（链路坐标系优先）
    fn finish(&self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            return Ok(());
        }
        if self.is_missing(keys::CHAIN_TIP_LINK) {
            return Err(ConfigError::MissingChainTipLink);
        }
        if self.is_missing(keys::CHAIN_BASE_LINK) {
            return Err(ConfigError::MissingChainBaseLink);
        }
        if self.is_missing(keys::TRACKING_FRAME) {
            return Err(ConfigError::MissingTrackingFrame);
        }
        Err(ConfigError::MissingKey(self.missing[0].clone()))
    }
}

impl NmpcParams {
    /// 从命名空间视图加载参数
    ///
    /// # 错误
    /// - `ConfigError::MissingChainTipLink` / `MissingChainBaseLink` / `MissingTrackingFrame`
    /// - `ConfigError::MissingKey`: 其他必需键缺失
    /// - `ConfigError::InvalidType` / `InvalidValue`: 类型或取值错误
    pub fn load(view: &ParameterView<'_>) -> Result<Self, ConfigError> {
        let mut c = Collector::new(view);

        let chain_tip_link = c.required::<String>(keys::CHAIN_TIP_LINK)?;
        let chain_base_link = c.required::<String>(keys::CHAIN_BASE_LINK)?;
        let tracking_frame = match view.get::<String>(keys::TRACKING_FRAME)? {
            Some(frame) => Some(frame),
            None => match view.get::<String>(keys::TRACKING_FRAME_ALIAS)? {
                Some(frame) => Some(frame),
                None => c.required::<String>(keys::TRACKING_FRAME)?,
            },
        };
        let joint_names = c.required::<Vec<String>>(keys::JOINT_NAMES)?;
        let shooting_nodes = c.required::<usize>(keys::SHOOTING_NODES)?;
        let time_horizon = c.required::<f64>(keys::TIME_HORIZON)?;
        let state_dim = c.required::<usize>(keys::STATE_DIM)?;
        let control_dim = c.required::<usize>(keys::CONTROL_DIM)?;
        let base_active = c.required::<bool>(keys::BASE_ACTIVE)?;
        let path_min = c.required::<Vec<f64>>(keys::PATH_MIN)?;
        let path_max = c.required::<Vec<f64>>(keys::PATH_MAX)?;
        let terminal_min = c.required::<Vec<f64>>(keys::TERMINAL_MIN)?;
        let terminal_max = c.required::<Vec<f64>>(keys::TERMINAL_MAX)?;
        let input_min = c.required::<Vec<f64>>(keys::INPUT_MIN)?;
        let input_max = c.required::<Vec<f64>>(keys::INPUT_MAX)?;

        c.finish()?;

        // finish() 成功意味着全部必需键都已读到
        let (
            Some(chain_tip_link),
            Some(chain_base_link),
            Some(tracking_frame),
            Some(joint_names),
            Some(shooting_nodes),
            Some(time_horizon),
            Some(state_dim),
            Some(control_dim),
            Some(base_active),
            Some(path_state_min),
            Some(path_state_max),
            Some(terminal_state_min),
            Some(terminal_state_max),
            Some(input_min),
            Some(input_max),
        ) = (
            chain_tip_link,
            chain_base_link,
            tracking_frame,
            joint_names,
            shooting_nodes,
            time_horizon,
            state_dim,
            control_dim,
            base_active,
            path_min,
            path_max,
            terminal_min,
            terminal_max,
            input_min,
            input_max,
        )
        else {
            return Err(ConfigError::MissingKey("required parameter".to_string()));
        };

        let control_rate_hz = view.get_or(keys::CONTROL_RATE_HZ, DEFAULT_CONTROL_RATE_HZ)?;
        if !control_rate_hz.is_finite() || control_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: keys::CONTROL_RATE_HZ.to_string(),
                reason: format!("{} must be positive", control_rate_hz),
            });
        }

        let integrator = match view.get::<String>(keys::INTEGRATOR)? {
            Some(name) => name.parse::<Integrator>().map_err(|reason| ConfigError::InvalidValue {
                key: keys::INTEGRATOR.to_string(),
                reason,
            })?,
            None => Integrator::default(),
        };

        let defaults = TrackingWeights::default();
        let weights = TrackingWeights {
            position: view.get_or(keys::WEIGHT_POSITION, defaults.position)?,
            orientation: view.get_or(keys::WEIGHT_ORIENTATION, defaults.orientation)?,
            control: view.get_or(keys::WEIGHT_CONTROL, defaults.control)?,
            state: view.get_or(keys::WEIGHT_STATE, defaults.state)?,
            terminal: view.get_or(keys::WEIGHT_TERMINAL, defaults.terminal)?,
        };

        let solver_defaults = SolverParams::default();
        let max_wall_time = match view.get::<f64>(keys::SOLVER_MAX_WALL_TIME)? {
            Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => {
                return Err(ConfigError::InvalidValue {
                    key: keys::SOLVER_MAX_WALL_TIME.to_string(),
                    reason: format!("{} must be a positive number of seconds", secs),
                });
            },
            None => None,
        };
        let solver = SolverParams {
            max_iterations: view.get_or(keys::SOLVER_MAX_ITERATIONS, solver_defaults.max_iterations)?,
            tolerance: view.get_or(keys::SOLVER_TOLERANCE, solver_defaults.tolerance)?,
            max_wall_time,
        };

        let chain_description = match view.deserialize::<Vec<JointDescription>>(keys::CHAIN_JOINTS)? {
            Some(joints) => Some(ChainDescription {
                joints,
                tip: TipDescription {
                    xyz: view.get_or(keys::CHAIN_TIP_XYZ, [0.0; 3])?,
                    rpy: view.get_or(keys::CHAIN_TIP_RPY, [0.0; 3])?,
                },
            }),
            None => None,
        };

        if let Some(desc) = &chain_description {
            let described = desc.joint_names();
            if described != joint_names.iter().map(String::as_str).collect::<Vec<_>>() {
                return Err(ConfigError::InvalidValue {
                    key: keys::CHAIN_JOINTS.to_string(),
                    reason: format!(
                        "joint order {:?} does not match joint_names {:?}",
                        described, joint_names
                    ),
                });
            }
        }

        info!(
            namespace = %view.prefix(),
            joints = joint_names.len(),
            shooting_nodes,
            time_horizon,
            base_active,
            control_rate_hz,
            "NMPC parameters loaded"
        );

        Ok(Self {
            namespace: view.prefix().to_string(),
            joint_names,
            chain_base_link,
            chain_tip_link,
            tracking_frame,
            shooting_nodes,
            time_horizon,
            state_dim,
            control_dim,
            base_active,
            bounds: ConstraintBounds {
                path_state_min,
                path_state_max,
                terminal_state_min,
                terminal_state_max,
                input_min,
                input_max,
            },
            control_rate_hz,
            integrator,
            weights,
            solver,
            chain_description,
        })
    }

    /// 时域配置
    pub fn horizon(&self) -> Result<HorizonConfig, ModelError> {
        HorizonConfig::new(self.shooting_nodes, self.time_horizon)
    }

    /// 运动链配置（校验关节数与 `state_dim` 一致）
    pub fn chain_config(&self) -> Result<ChainConfig, ModelError> {
        let chain = ChainConfig::new(
            self.joint_names.clone(),
            self.chain_base_link.clone(),
            self.chain_tip_link.clone(),
            self.tracking_frame.clone(),
            self.base_active,
        )?;
        chain.check_state_dim(self.state_dim)?;
        Ok(chain)
    }

    /// 约束集合
    pub fn constraint_set(&self) -> Result<ConstraintSet, ModelError> {
        ConstraintSet::new(self.state_dim, self.control_dim, self.bounds.clone())
    }

    /// 控制周期
    pub fn control_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.control_rate_hz)
    }

    /// 适配器设置
    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            max_iterations: self.solver.max_iterations,
            tolerance: self.solver.tolerance,
            ..SolverSettings::default()
        }
    }
}
