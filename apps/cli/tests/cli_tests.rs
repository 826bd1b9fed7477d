//! 命令行集成测试：退出码与输出

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

const ARM_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/arm.toml");

fn cli() -> Command {
    Command::cargo_bin("nmpc-cli").unwrap()
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_check_shipped_config() {
    cli()
        .args(["check", "--config", ARM_CONFIG, "--namespace", "arm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("joint_1"))
        .stdout(predicate::str::contains("N = 20"));
}

#[test]
fn test_unknown_namespace_reports_missing_tip_link() {
    // 所有键缺失时，chain_tip_link 优先
    cli()
        .args(["check", "--config", ARM_CONFIG, "--namespace", "nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("chain_tip_link"));
}

#[test]
fn test_missing_tracking_frame_exit_code() {
    let content = std::fs::read_to_string(ARM_CONFIG)
        .unwrap()
        .replace("tracking_frame = \"target_frame\"", "");
    let file = write_config(&content);

    cli()
        .args(["check", "--namespace", "arm", "--config"])
        .arg(file.path())
        .assert()
        .code(4);
}

#[test]
fn test_model_error_exit_code() {
    let content = std::fs::read_to_string(ARM_CONFIG)
        .unwrap()
        .replace("state_dim = 6", "state_dim = 5");
    let file = write_config(&content);

    cli()
        .args(["check", "--namespace", "arm", "--config"])
        .arg(file.path())
        .assert()
        .code(5);
}

#[test]
fn test_missing_file_exit_code() {
    cli()
        .args(["check", "--config", "/nonexistent/params.toml"])
        .assert()
        .code(1);
}

#[test]
fn test_run_for_short_duration() {
    cli()
        .args([
            "run",
            "--config",
            ARM_CONFIG,
            "--namespace",
            "arm",
            "--duration",
            "0.5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("运行结果"));
}
