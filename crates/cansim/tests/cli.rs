#![cfg(feature = "cli")]

use std::process::{Command, Output};

fn cansim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cansim"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .env_remove("CANSIM_CHANNEL")
        .env_remove("CANSIM_LOG")
        .output()
        .expect("cansim should run")
}

#[test]
fn version_prints_package_version() {
    let out = cansim(&["version"]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim(), format!("cansim {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_lists_transports() {
    let out = cansim(&["version", "--extended"]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("transports: "), "stdout: {stdout}");
    assert!(stdout.contains("rx_fifo_size: 4"), "stdout: {stdout}");
}

#[test]
fn send_over_loopback_prints_json_frame() {
    let out = cansim(&[
        "--format",
        "json",
        "send",
        "cli-send",
        "--transport",
        "loopback",
        "--id",
        "0x123",
        "--data",
        "01020304",
    ]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let line = String::from_utf8_lossy(&out.stdout);
    let value: serde_json::Value =
        serde_json::from_str(line.trim()).expect("stdout should be one JSON object");
    assert_eq!(value["direction"], "tx");
    assert_eq!(value["channel"], "cli-send");
    assert_eq!(value["id"], "123");
    assert_eq!(value["dlc"], 4);
    assert_eq!(value["data"], "01 02 03 04");
}

#[test]
fn send_raw_writes_wire_frame() {
    let out = cansim(&[
        "--format",
        "raw",
        "send",
        "cli-raw",
        "--transport",
        "loopback",
        "--id",
        "1FFFFFFF",
        "--extended",
        "--remote",
    ]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(out.stdout.len(), 16);
    let can_id = u32::from_ne_bytes([out.stdout[0], out.stdout[1], out.stdout[2], out.stdout[3]]);
    assert_eq!(can_id, 0x8000_0000 | 0x4000_0000 | 0x1FFF_FFFF);
}

#[test]
fn channel_falls_back_to_environment() {
    let out = Command::new(env!("CARGO_BIN_EXE_cansim"))
        .args(["--format", "json", "send", "--transport", "loopback", "--id", "7"])
        .env("CANSIM_CHANNEL", "cli-env")
        .output()
        .expect("cansim should run");
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("\"channel\":\"cli-env\""));
}

#[test]
fn out_of_range_standard_id_is_usage_error() {
    let out = cansim(&[
        "send",
        "cli-bad",
        "--transport",
        "loopback",
        "--id",
        "0x800",
    ]);
    assert_eq!(out.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
}

#[test]
fn listen_without_traffic_times_out() {
    let out = cansim(&[
        "--format",
        "json",
        "listen",
        "cli-idle",
        "--transport",
        "loopback",
        "--timeout",
        "200ms",
    ]);
    assert_eq!(out.status.code(), Some(124));
    assert!(out.stdout.is_empty());
}

#[test]
fn listen_rejects_zero_count() {
    let out = cansim(&["listen", "cli-zero", "--transport", "loopback", "--count", "0"]);
    assert_eq!(out.status.code(), Some(64));
    assert!(out.stdout.is_empty());
}

#[test]
fn send_accepts_timeout_beyond_instant_range() {
    let out = cansim(&[
        "--format",
        "json",
        "send",
        "cli-maxwait",
        "--transport",
        "loopback",
        "--id",
        "1",
        "--timeout",
        "18446744073709551615s",
    ]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}
