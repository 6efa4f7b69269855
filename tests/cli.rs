//! 命令行入口: 角色校验先于配置加载

use std::io::Write;
use std::process::{Command, Output};

fn broken_config() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[server\nworker_port = ").unwrap();
    file
}

fn sdrelay(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sdrelay"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn unknown_role_prints_usage_without_reading_config() {
    let config = broken_config();
    let output = sdrelay(&["--relaySide", "foo", "--config", config.path().to_str().unwrap()]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown relay side 'foo'"));
    assert!(stderr.contains("usage: sdrelay --relaySide"));
}

#[test]
fn missing_role_prints_usage_without_reading_config() {
    let config = broken_config();
    let output = sdrelay(&["--config", config.path().to_str().unwrap()]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing --relaySide"));
}

#[test]
fn known_role_still_rejects_broken_config() {
    let config = broken_config();
    let output = sdrelay(&["--relaySide", "ai", "--config", config.path().to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}
