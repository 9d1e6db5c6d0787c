//! Tests that change process-wide state: signal disposition and the file
//! descriptor limit.
//!
//! Each test re-runs this test binary filtered to itself with
//! `WSERVER_TEST_CHILD` set. The child performs the scenario and the parent
//! checks how it exited, so a SIGINT that kills the child, or a lowered
//! descriptor limit, never reaches the harness running the other tests.

use std::env;
use std::fs::File;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use rustix::io::Errno;
use rustix::process::{Resource, Rlimit, getrlimit, setrlimit};
use signal_hook::consts::SIGINT;
use signal_hook::low_level::raise;
use tempfile::TempDir;

use wserver::{Client, MacAddr, Server, ServerConfig, ServerHandle, StationTable, UpdateResult};

const CHILD_ENV: &str = "WSERVER_TEST_CHILD";

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Long enough for a SIGINT that is not handled to have ended the process.
const SIGNAL_GRACE: Duration = Duration::from_millis(300);

fn in_child() -> bool {
    env::var_os(CHILD_ENV).is_some()
}

/// Runs the test named `test` alone in a fresh copy of this binary.
fn run_in_child(test: &str) -> ExitStatus {
    Command::new(env::current_exe().expect("test binary path"))
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .stdout(Stdio::null())
        .status()
        .expect("spawn child test")
}

fn mac(last: u8) -> MacAddr {
    MacAddr::new([0x02, 0, 0, 0, 0, last])
}

/// Starts a server that watches SIGINT but leaves the process running.
fn start_watching_interrupt(dir: &Path) -> ServerHandle {
    wserver::init_tracing();
    let config = ServerConfig {
        handle_interrupt: true,
        exit_on_interrupt: false,
        ..ServerConfig::embedded(dir.join("wserver.sock"))
    };
    Server::start(&config, StationTable::default()).expect("start server")
}

fn assert_killed_by_interrupt(status: ExitStatus) {
    assert_eq!(status.signal(), Some(SIGINT), "child exited with {status:?}");
}

#[test]
fn interrupt_after_stop_terminates_process() {
    if !in_child() {
        assert_killed_by_interrupt(run_in_child("interrupt_after_stop_terminates_process"));
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    start_watching_interrupt(dir.path()).stop();

    raise(SIGINT).unwrap();
    thread::sleep(SIGNAL_GRACE);
}

#[test]
fn interrupt_after_protocol_shutdown_terminates_process() {
    if !in_child() {
        assert_killed_by_interrupt(run_in_child(
            "interrupt_after_protocol_shutdown_terminates_process",
        ));
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let handle = start_watching_interrupt(dir.path());
    Client::connect(handle.socket_path())
        .unwrap()
        .shutdown()
        .unwrap();
    while handle.is_running() {
        thread::sleep(Duration::from_millis(5));
    }

    // Teardown already released the watcher; the handle is still alive.
    raise(SIGINT).unwrap();
    thread::sleep(SIGNAL_GRACE);
    handle.wait();
}

#[test]
fn restarted_server_still_handles_interrupt() {
    if !in_child() {
        let status = run_in_child("restarted_server_still_handles_interrupt");
        assert!(status.success(), "child exited with {status:?}");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    start_watching_interrupt(dir.path()).stop();

    let handle = start_watching_interrupt(dir.path());
    raise(SIGINT).unwrap();
    handle.wait();
    assert!(!dir.path().join("wserver.sock").exists());
}

/// Opens `/dev/null` until the descriptor limit is hit.
fn exhaust_descriptors() -> Vec<File> {
    let mut files = Vec::new();
    loop {
        match File::open("/dev/null") {
            Ok(file) => files.push(file),
            Err(e) if e.raw_os_error() == Some(Errno::MFILE.raw_os_error()) => return files,
            Err(e) => panic!("unexpected open failure: {e}"),
        }
    }
}

#[test]
fn accept_resumes_after_descriptor_exhaustion() {
    if !in_child() {
        let status = run_in_child("accept_resumes_after_descriptor_exhaustion");
        assert!(status.success(), "child exited with {status:?}");
        return;
    }

    wserver::init_tracing();
    let dir: TempDir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wserver.sock");
    let handle = Server::start(&ServerConfig::embedded(&path), StationTable::default()).unwrap();

    let limit = getrlimit(Resource::Nofile);
    setrlimit(
        Resource::Nofile,
        Rlimit {
            current: Some(256),
            maximum: limit.maximum,
        },
    )
    .unwrap();

    // Leave exactly one descriptor for the client; the server cannot accept.
    let mut held = exhaust_descriptors();
    held.pop().expect("at least one descriptor to give back");
    let mut client = Client::connect(&path).unwrap();
    client.set_timeout(Some(READ_TIMEOUT)).unwrap();
    thread::sleep(Duration::from_millis(200));

    drop(held);
    let added = client.add_station(mac(1)).unwrap();
    assert_eq!(added.result, UpdateResult::Success);

    // Connections that arrive later are accepted as usual.
    let mut second = Client::connect(&path).unwrap();
    second.set_timeout(Some(READ_TIMEOUT)).unwrap();
    assert_eq!(
        second.delete_by_mac(mac(1)).unwrap().result,
        UpdateResult::Success
    );
    handle.stop();
}
