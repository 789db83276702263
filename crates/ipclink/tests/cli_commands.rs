#![cfg(all(unix, feature = "cli"))]

use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const APP_SPACE: &str = "t.";

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/ilcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn ipclink(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ipclink"));
    cmd.arg("--log-level")
        .arg("error")
        .arg("--socket-root")
        .arg(root)
        .arg("--app-space")
        .arg(APP_SPACE);
    cmd
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    loop {
        if UnixStream::connect(path).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("connect timeout");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

struct EchoServer {
    child: Child,
    dir: PathBuf,
}

impl EchoServer {
    fn start(tag: &str, extra: &[&str]) -> Self {
        let dir = unique_temp_dir(tag);
        let child = ipclink(&dir)
            .arg("echo")
            .arg("svc")
            .args(extra)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("echo command should start");
        wait_for_socket(&dir.join(format!("{APP_SPACE}svc")), Duration::from_secs(5));
        Self { child, dir }
    }

    fn run(&self, args: &[&str]) -> Output {
        ipclink(&self.dir)
            .args(["--format", "json"])
            .args(args)
            .output()
            .expect("command should run")
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn call_against_echo_prints_data() {
    let server = EchoServer::start("data", &[]);
    let output = server.run(&["call", "svc", "echo", "--json", r#"{"x":1}"#]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), r#"{"data":{"x":1}}"#);
}

#[test]
fn string_reply_is_reported_as_error() {
    let server = EchoServer::start("boom", &[]);
    let output = server.run(&["call", "svc", "echo", "--data", "boom"]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), r#"{"error":"boom"}"#);
}

#[test]
fn call_to_missing_endpoint_is_not_listening() {
    let dir = unique_temp_dir("ghost");
    let output = ipclink(&dir)
        .args(["--format", "json", "call", "ghost-endpoint", "ping", "--json", "{}"])
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout(&output),
        r#"{"error":"ghost-endpoint is not listening"}"#
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn probe_exit_codes() {
    let server = EchoServer::start("probe", &[]);
    let live = server.run(&["probe", "svc"]);
    assert_eq!(live.status.code(), Some(0));
    assert!(stdout(&live).contains("\"listening\":true"));

    let ghost = server.run(&["probe", "nobody"]);
    assert_eq!(ghost.status.code(), Some(30));
    assert!(stdout(&ghost).contains("\"listening\":false"));
}

#[test]
fn subscribe_prints_pushed_events() {
    let server = EchoServer::start("sub", &["--tick", "heartbeat", "--interval-ms", "50"]);
    let output = server.run(&["subscribe", "svc", "heartbeat", "--count", "2"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2, "{text}");
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).expect("json line");
        assert_eq!(value["event"], "heartbeat");
        assert_eq!(value["endpoint"], "svc");
    }
}

#[test]
fn invalid_json_args_exit_60() {
    let dir = unique_temp_dir("badjson");
    let output = ipclink(&dir)
        .args(["call", "svc", "m", "--json", "{nope"])
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error: invalid --json"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn path_like_endpoint_name_is_usage_error() {
    let dir = unique_temp_dir("usage");
    let output = ipclink(&dir)
        .args(["probe", "../escape"])
        .output()
        .expect("probe should run");

    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_crate_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_ipclink"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        format!("ipclink {}", env!("CARGO_PKG_VERSION"))
    );
}
