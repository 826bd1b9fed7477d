//! 控制循环状态机测试
//!
//! 脚本化后端精确控制每个周期的求解结果。

mod common;

use common::{ScriptedBackend, Step, planar_problem};
use nmpc_driver::{
    ChannelTelemetry, ControlLoop, ControlLoopBuilder, CycleOutcome, LoopConfig, LoopError,
    LoopPhase, StateExchange, TelemetryEvent,
};
use nmpc_model::{RobotState, TargetPose};
use nmpc_solver::{SolveFailure, SolverAdapter, SolverSettings};
use std::sync::Arc;
use std::time::{Duration, Instant};

const Q: [f64; 2] = [0.3, -0.2];

fn target_pose() -> TargetPose {
    TargetPose::from_position_quaternion([0.6, 0.3, 0.0], [1.0, 0.0, 0.0, 0.0])
}

struct Fixture {
    control_loop: ControlLoop,
    exchange: Arc<StateExchange>,
    events: crossbeam_channel::Receiver<TelemetryEvent>,
    recording: Arc<parking_lot::Mutex<common::Recording>>,
}

fn fixture(script: Vec<Step>, config: LoopConfig) -> Fixture {
    let exchange = Arc::new(StateExchange::new());
    let (backend, recording) = ScriptedBackend::new(script);
    let (telemetry, events) = ChannelTelemetry::new(64);
    let control_loop = ControlLoopBuilder::new(planar_problem(5), Arc::clone(&exchange))
        .adapter(SolverAdapter::new(Box::new(backend), SolverSettings::default()))
        .config(config)
        .telemetry(Arc::new(telemetry))
        .initial_state(RobotState::at_rest(Q.to_vec()).unwrap())
        .build()
        .unwrap();
    Fixture {
        control_loop,
        exchange,
        events,
        recording,
    }
}

fn generous_budget() -> LoopConfig {
    LoopConfig {
        max_wall_time: Some(Duration::from_secs(2)),
        ..LoopConfig::default()
    }
}

#[test]
fn test_build_enters_ready_without_spawning() {
    let f = fixture(vec![], LoopConfig::default());
    assert_eq!(f.control_loop.phase(), LoopPhase::Ready);
    assert_eq!(f.control_loop.cycle(), 0);
    // 热启动为静止保持轨迹
    let retained = f.control_loop.retained_trajectory();
    assert_eq!(retained.shooting_nodes(), 5);
    assert!(retained.states().iter().all(|x| x.as_slice() == Q));
    assert!(retained.controls().iter().all(|u| u.iter().all(|v| *v == 0.0)));
}

#[test]
fn test_build_rejects_invalid_config() {
    let exchange = Arc::new(StateExchange::new());
    let err = ControlLoopBuilder::new(planar_problem(5), Arc::clone(&exchange))
        .control_rate_hz(0.0)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, LoopError::InvalidConfig(_)));

    let err = ControlLoopBuilder::new(planar_problem(5), exchange)
        .initial_state(RobotState::zeros(3))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, LoopError::InvalidConfig(msg) if msg.contains("dimension")));
}

#[test]
fn test_initial_state_taken_from_exchange() {
    let exchange = Arc::new(StateExchange::new());
    exchange.publish_state(RobotState::at_rest(vec![1.0, 2.0]).unwrap());
    let control_loop = ControlLoopBuilder::new(planar_problem(3), exchange)
        .build()
        .unwrap();
    assert_eq!(control_loop.last_state().positions(), &[1.0, 2.0]);
}

#[test]
fn test_idle_until_target_arrives() {
    let mut f = fixture(vec![Step::Converge(0.1)], generous_budget());
    assert_eq!(f.control_loop.step(), CycleOutcome::Idle);
    assert!(f.exchange.latest_command().is_none());
    assert!(f.recording.lock().seen.is_empty());

    f.exchange.publish_target(target_pose());
    assert_eq!(
        f.control_loop.step(),
        CycleOutcome::Published { degraded: false }
    );
    let metrics = f.control_loop.metrics().snapshot();
    assert_eq!(metrics.idle, 1);
    assert_eq!(metrics.optimal, 1);
    assert_eq!(metrics.cycles_total, 2);
}

#[test]
fn test_fail_safe_hold_keeps_previous_command() {
    let mut f = fixture(
        vec![Step::Converge(0.1), Step::Infeasible, Step::Converge(0.3)],
        generous_budget(),
    );
    f.exchange.publish_target(target_pose());

    assert_eq!(
        f.control_loop.step(),
        CycleOutcome::Published { degraded: false }
    );
    assert_eq!(f.control_loop.phase(), LoopPhase::Publishing);
    let first = f.exchange.latest_command().unwrap();
    assert_eq!(first.cycle, 0);
    assert_eq!(first.velocities, vec![0.1, 0.1]);

    assert_eq!(
        f.control_loop.step(),
        CycleOutcome::Held(SolveFailure::Infeasible)
    );
    // 控制槽保持上一周期的指令
    let held = f.exchange.latest_command().unwrap();
    assert_eq!(*held, *first);
    assert_eq!(f.exchange.command.sequence(), 1);

    assert_eq!(
        f.control_loop.step(),
        CycleOutcome::Published { degraded: false }
    );
    let third = f.exchange.latest_command().unwrap();
    assert_eq!(third.cycle, 2);
    assert_eq!(third.velocities, vec![0.3, 0.3]);

    let degraded: Vec<_> = f
        .events
        .try_iter()
        .filter_map(|event| match event {
            TelemetryEvent::Degraded(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(degraded.len(), 1);
    assert_eq!(degraded[0].cycle, 1);
    assert_eq!(degraded[0].failure, SolveFailure::Infeasible);
    assert!(!degraded[0].published);

    let metrics = f.control_loop.metrics().snapshot();
    assert_eq!(metrics.held, 1);
    assert_eq!(metrics.infeasible, 1);
}

#[test]
fn test_warm_start_after_failure_uses_pre_failure_trajectory() {
    let mut f = fixture(
        vec![Step::Converge(0.2), Step::Diverge, Step::Converge(0.0)],
        generous_budget(),
    );
    f.exchange.publish_target(target_pose());

    f.control_loop.step();
    let solved = f.control_loop.retained_trajectory().clone();

    assert!(matches!(
        f.control_loop.step(),
        CycleOutcome::Held(SolveFailure::SolverError(reason)) if reason == "diverged"
    ));
    // 保留轨迹是失败周期的种子，而不是发散的迭代点
    assert_eq!(f.control_loop.retained_trajectory(), &solved.shifted());
    assert!(f.control_loop.retained_trajectory().is_finite());

    f.control_loop.step();

    let recording = f.recording.lock();
    assert_eq!(recording.seen.len(), 3);
    assert_eq!(recording.seen[1], solved.shifted().to_decision_vector());
    assert_eq!(recording.seen[2], solved.shifted().shifted().to_decision_vector());
}

#[test]
fn test_warm_start_pins_latest_state() {
    let mut f = fixture(vec![Step::Converge(0.1), Step::Converge(0.1)], generous_budget());
    f.exchange.publish_target(target_pose());
    f.control_loop.step();

    let moved = [0.35, -0.15];
    f.exchange
        .publish_state(RobotState::at_rest(moved.to_vec()).unwrap());
    f.control_loop.step();

    let recording = f.recording.lock();
    let layout = f.control_loop.problem().layout();
    assert_eq!(&recording.seen[1].as_slice()[..layout.state_dim], &moved);
    assert_eq!(f.control_loop.last_state().positions(), &moved);
}

#[test]
fn test_max_iterations_publishes_degraded_command() {
    let mut f = fixture(vec![Step::MaxIterations(0.05)], generous_budget());
    f.exchange.publish_target(target_pose());

    assert_eq!(
        f.control_loop.step(),
        CycleOutcome::Published { degraded: true }
    );
    let command = f.exchange.latest_command().unwrap();
    assert!(command.degraded);
    assert_eq!(command.velocities, vec![0.05, 0.05]);

    let events: Vec<_> = f.events.try_iter().collect();
    assert!(events.iter().any(|event| matches!(
        event,
        TelemetryEvent::Degraded(e) if e.failure == SolveFailure::MaxIterationsReached && e.published
    )));
}

#[test]
fn test_stalled_solve_times_out_within_budget() {
    let budget = Duration::from_millis(50);
    let mut f = fixture(
        vec![
            Step::Converge(0.1),
            Step::Stall {
                stall: Duration::from_secs(5),
                honor_deadline: true,
            },
        ],
        LoopConfig {
            max_wall_time: Some(budget),
            ..LoopConfig::default()
        },
    );
    f.exchange.publish_target(target_pose());
    f.control_loop.step();

    let start = Instant::now();
    let outcome = f.control_loop.step();
    let elapsed = start.elapsed();

    assert_eq!(outcome, CycleOutcome::Held(SolveFailure::Timeout));
    assert!(elapsed < budget + Duration::from_millis(200), "took {:?}", elapsed);
    assert_eq!(f.exchange.latest_command().unwrap().cycle, 0);
    assert_eq!(f.control_loop.metrics().snapshot().timeouts, 1);
}

#[test]
fn test_late_result_is_discarded() {
    let mut f = fixture(
        vec![Step::Stall {
            stall: Duration::from_millis(150),
            honor_deadline: false,
        }],
        LoopConfig {
            max_wall_time: Some(Duration::from_millis(20)),
            ..LoopConfig::default()
        },
    );
    f.exchange.publish_target(target_pose());

    assert_eq!(f.control_loop.step(), CycleOutcome::Held(SolveFailure::Timeout));
    assert!(f.exchange.latest_command().is_none());
}

#[test]
fn test_shutdown_stops_stepping() {
    let mut f = fixture(vec![], generous_budget());
    f.exchange.publish_target(target_pose());
    f.control_loop.shutdown();

    assert_eq!(f.control_loop.step(), CycleOutcome::Stopped);
    assert_eq!(f.control_loop.phase(), LoopPhase::Shutdown);
    assert!(f.exchange.latest_command().is_none());
}

#[test]
fn test_spawned_loop_ticks_and_shuts_down() {
    let f = fixture(
        vec![],
        LoopConfig {
            control_rate_hz: 50.0,
            max_wall_time: Some(Duration::from_millis(15)),
            ..LoopConfig::default()
        },
    );
    f.exchange.publish_target(target_pose());
    let exchange = Arc::clone(&f.exchange);

    let handle = f.control_loop.spawn().unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(handle.is_running());
    assert!(!handle.phase().is_shutdown());

    let metrics = handle.metrics();
    assert!(metrics.cycles_total >= 5, "only {} cycles", metrics.cycles_total);
    assert!(metrics.optimal >= 5);

    let shared = Arc::clone(handle.exchange());
    handle.join().unwrap();
    assert!(Arc::ptr_eq(&shared, &exchange));

    // 关闭后不再发布
    let sequence = exchange.command.sequence();
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(exchange.command.sequence(), sequence);
}

#[test]
fn test_overrun_fires_next_tick_immediately() {
    // 每次求解 40 ms，控制周期 20 ms
    let stall = Step::Stall {
        stall: Duration::from_millis(40),
        honor_deadline: false,
    };
    let f = fixture(
        vec![stall.clone(), stall.clone(), stall.clone(), stall],
        LoopConfig {
            control_rate_hz: 50.0,
            max_wall_time: Some(Duration::from_millis(500)),
            ..LoopConfig::default()
        },
    );
    f.exchange.publish_target(target_pose());
    let events = f.events.clone();

    let start = Instant::now();
    let handle = f.control_loop.spawn().unwrap();
    while handle.metrics().cycles_total < 4 && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(5));
    }
    let elapsed = start.elapsed();
    let metrics = handle.metrics();
    handle.join().unwrap();

    assert!(metrics.overruns >= 3, "overruns = {}", metrics.overruns);
    // 没有积压：四个 40 ms 的周期不会额外等待周期的整数倍
    assert!(elapsed < Duration::from_millis(400), "took {:?}", elapsed);
    assert!(
        events
            .try_iter()
            .any(|event| matches!(event, TelemetryEvent::Overrun(w) if w.elapsed >= w.period))
    );
}

#[test]
fn test_handle_drop_joins_thread() {
    let f = fixture(vec![], generous_budget());
    let exchange = Arc::clone(&f.exchange);
    exchange.publish_target(target_pose());

    let handle = f.control_loop.spawn().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    drop(handle);

    let sequence = exchange.command.sequence();
    std::thread::sleep(Duration::from_millis(250));
    assert_eq!(exchange.command.sequence(), sequence);
}
