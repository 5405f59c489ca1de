//! Runs the `qp` binary end to end

mod common;

use common::write_config;
use serial_test::serial;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const QP: &str = env!("CARGO_BIN_EXE_qp");

#[test]
#[serial]
fn test_missing_config_file_exits_with_misconfiguration() {
    let status = Command::new(QP)
        .arg("/definitely/not/here.toml")
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
#[serial]
fn test_invalid_strategy_options_exit_with_misconfiguration() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[[Queue]]
Name = "incoming"
Type = "Memory"

[[Processor]]
Name = "printer"
Type = "Stdout"

[[Strategy]]
Name = "main"
Type = "ParallelProcessing"
Options = { MaxThreads = 0, Queue = "incoming", Processor = "printer" }
"#,
    );

    let output = Command::new(QP).arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("MaxThreads"));
}

#[test]
#[serial]
fn test_version_flag() {
    let output = Command::new(QP).arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[cfg(unix)]
#[test]
#[serial]
fn test_sigterm_drains_and_exits_cleanly() {
    use std::io::Read;
    use std::time::Duration;

    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[General]
ShutdownTimeout = 5

[[Queue]]
Name = "incoming"
Type = "Memory"
Options = { Messages = ["hello", "world"] }

[[Processor]]
Name = "printer"
Type = "Stdout"

[[Strategy]]
Name = "main"
Type = "ParallelProcessing"
Options = { MaxThreads = 2, Queue = "incoming", Processor = "printer" }
"#,
    );

    let mut child = Command::new(QP)
        .arg(&path)
        .arg("--no-color")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(750));
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
    let status = child.wait().unwrap();

    let mut stdout = String::new();
    child
        .stdout
        .take()
        .unwrap()
        .read_to_string(&mut stdout)
        .unwrap();
    assert_eq!(status.code(), Some(0), "stdout: {}", stdout);
    assert!(stdout.contains("hello"));
    assert!(stdout.contains("world"));
}
