//! Engine integration tests - watcher → store → subprocess round trips.
//!
//! Interpreter-dependent scenarios probe for the interpreter binary first
//! and skip with a note when it is not installed, so the suite passes on
//! minimal CI images.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use miru::monitor::{Interpreter, NewMonitor};
use miru::report::{Report, Significance};
use miru::store::{MonitorStore, SqliteStore};
use miru::types::{Error, MonitorId, RequestId, UserId, WatcherConfig};
use miru::watcher::Watcher;
use pretty_assertions::assert_eq;
use tokio::time::timeout;

const HELLO_PYTHON: &str = r#"
print('{"lastChangeSignificance": 0, "message": "hello world", "checksum": "", "state": {}}')
"#;

const HELLO_RUBY: &str = r#"
puts '{"lastChangeSignificance": 0, "message": "hello world", "checksum": "", "state": {}}'
"#;

const HELLO_PERL: &str = r#"
my $json = '{"lastChangeSignificance": 0, "message": "hello world", "checksum": "", "state": {}}';
print $json;
"#;

const COUNTER_PYTHON: &str = r#"
import json, sys
record = json.load(sys.stdin)
runs = int(record["state"].get("runs", 0)) + 1
record["state"]["runs"] = runs
record["message"] = "run %d" % runs
record["lastChangeSignificance"] = 1
print(json.dumps(record))
"#;

const FAILING_PYTHON: &str = r#"
import sys
print("hi")
sys.exit(1)
"#;

fn interpreter_available(command: &str) -> bool {
    std::process::Command::new(command)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn new_monitor(interpreter: Interpreter, script_path: PathBuf) -> NewMonitor {
    NewMonitor {
        request_id: RequestId::new(1),
        created_by: UserId::new(1),
        interpreter,
        script_path,
        wait_period_minutes: 0,
        expected_runtime_secs: 0,
    }
}

fn fast_config() -> WatcherConfig {
    WatcherConfig {
        tick_interval: Duration::from_millis(20),
        ready_limit: 2,
        queue_capacity: 2,
        drain_grace: Duration::from_secs(2),
    }
}

async fn migrated_store() -> Arc<SqliteStore> {
    let store = SqliteStore::connect_in_memory().await.unwrap();
    store.migrate().await.unwrap();
    Arc::new(store)
}

/// Poll the store until the monitor's latest report satisfies `accept`.
async fn wait_for_report<F>(store: &SqliteStore, id: MonitorId, accept: F) -> Report
where
    F: Fn(&Report) -> bool,
{
    let monitor = {
        // latest_report only reads the id off the monitor; fetch it fresh.
        let ready = store.list_ready(64).await.unwrap();
        ready.into_iter().find(|m| m.id == id)
    };

    let poll = async {
        loop {
            let probe = match &monitor {
                Some(m) => store.latest_report(m).await.unwrap(),
                None => None,
            };
            if let Some(report) = probe {
                if accept(&report) {
                    return report;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };

    timeout(Duration::from_secs(10), poll)
        .await
        .expect("report did not appear in time")
}

async fn report_count(store: &SqliteStore, id: MonitorId) -> i64 {
    use sqlx::Row;
    sqlx::query("select count(*) as n from reports where monitor_id = ?")
        .bind(id.as_i64())
        .fetch_one(store.pool())
        .await
        .unwrap()
        .try_get("n")
        .unwrap()
}

async fn run_happy_path(interpreter: Interpreter, script_name: &str, script_body: &str) {
    let Some(command) = interpreter.command() else {
        panic!("happy path needs a whitelisted interpreter");
    };
    if !interpreter_available(command) {
        eprintln!("skipping: {command} not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), script_name, script_body);
    let store = migrated_store().await;
    let monitor = store
        .create_monitor(new_monitor(interpreter, script))
        .await
        .unwrap();

    let (watcher, _diagnostics) = Watcher::new(store.clone(), fast_config());
    let supervisor = watcher.start();

    let report = wait_for_report(&store, monitor.id, |r| r.message == "hello world").await;
    assert_eq!(report.significance, Significance::NoChange);
    assert_eq!(report.checksum, "");
    assert_eq!(report.monitor_id, monitor.id);

    watcher.shutdown();
    timeout(Duration::from_secs(5), supervisor)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn python_happy_path_persists_a_report() {
    run_happy_path(Interpreter::python(), "hello.py", HELLO_PYTHON).await;
}

#[tokio::test]
async fn ruby_happy_path_persists_a_report() {
    run_happy_path(Interpreter::ruby(), "hello.rb", HELLO_RUBY).await;
}

#[tokio::test]
async fn perl_happy_path_persists_a_report() {
    run_happy_path(Interpreter::perl(), "hello.pl", HELLO_PERL).await;
}

#[tokio::test]
async fn state_carries_over_between_invocations() {
    if !interpreter_available("python") {
        eprintln!("skipping: python not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "counter.py", COUNTER_PYTHON);
    let store = migrated_store().await;
    let monitor = store
        .create_monitor(new_monitor(Interpreter::python(), script))
        .await
        .unwrap();

    let (watcher, _diagnostics) = Watcher::new(store.clone(), fast_config());
    let supervisor = watcher.start();

    // Each run reads the previous run's counter off its stdin and increments
    // it, so a counter of 3 proves state flowed through three invocations.
    let report = wait_for_report(&store, monitor.id, |r| {
        r.state.get("runs").and_then(|v| v.as_i64()).unwrap_or(0) >= 3
    })
    .await;

    let runs = report.state["runs"].as_i64().unwrap();
    assert_eq!(report.message, format!("run {runs}"));
    assert_eq!(report.significance, Significance::MinorUpdate);

    watcher.shutdown();
    timeout(Duration::from_secs(5), supervisor)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn unknown_interpreter_never_spawns_and_surfaces() {
    let store = migrated_store().await;
    let monitor = store
        .create_monitor(new_monitor(Interpreter::new("bash"), PathBuf::from("x.sh")))
        .await
        .unwrap();

    let (watcher, mut diagnostics) = Watcher::new(store.clone(), fast_config());
    let supervisor = watcher.start();

    let diagnostic = timeout(Duration::from_secs(5), diagnostics.recv())
        .await
        .expect("expected a diagnostic")
        .unwrap();
    assert_eq!(diagnostic.monitor, Some(monitor.id));
    assert!(matches!(diagnostic.error, Error::UnknownInterpreter(_)));

    watcher.shutdown();
    timeout(Duration::from_secs(5), supervisor)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn failing_script_saves_no_report() {
    if !interpreter_available("python") {
        eprintln!("skipping: python not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "fail.py", FAILING_PYTHON);
    let store = migrated_store().await;
    let monitor = store
        .create_monitor(new_monitor(Interpreter::python(), script))
        .await
        .unwrap();

    let (watcher, mut diagnostics) = Watcher::new(store.clone(), fast_config());
    let supervisor = watcher.start();

    let find_failure = async {
        loop {
            let diagnostic = diagnostics.recv().await.unwrap();
            if matches!(
                diagnostic.error,
                Error::ScriptExited(_) | Error::ScriptOutputMalformed(_)
            ) {
                assert_eq!(diagnostic.monitor, Some(monitor.id));
                break;
            }
        }
    };
    timeout(Duration::from_secs(5), find_failure)
        .await
        .expect("expected a script failure diagnostic");

    watcher.shutdown();
    timeout(Duration::from_secs(5), supervisor)
        .await
        .unwrap()
        .unwrap();

    // Only the first-run seed was ever persisted.
    assert_eq!(report_count(&store, monitor.id).await, 1);
}
