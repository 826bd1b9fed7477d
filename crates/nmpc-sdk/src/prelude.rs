//! Prelude
//!
//! ```rust
//! use nmpc_sdk::prelude::*;
//! ```

pub use crate::{Bootstrap, NmpcError, bootstrap};

pub use nmpc_driver::{
    ChannelTelemetry, ControlCommand, ControlLoop, ControlLoopBuilder, ControlLoopHandle,
    CycleOutcome, KinematicPlant, LoopConfig, LoopPhase, NullTelemetry, StateExchange,
    TelemetryEvent, TelemetrySink, TracingTelemetry,
};
pub use nmpc_kinematics::{KinematicModel, SerialChain};
pub use nmpc_model::{RobotState, TargetPose, Trajectory};
pub use nmpc_params::{NmpcParams, ParameterStore, ParameterView};
pub use nmpc_solver::{SolveFailure, SolveResult, SolverAdapter};
