//! Supervisor integration tests.
//!
//! Fixture plugins are small `/bin/sh` scripts speaking the framed
//! protocol: a readiness line on stderr, then one JSON response line per
//! request line. State that must survive a crash-restart cycle (the
//! fetch counter, the configure log) lives in files under a tempdir.

#![cfg(unix)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::time::Duration;

use junctionrelay_host::{
    HostError, LaunchCommand, PluginSupervisor, SupervisorCallbacks, SupervisorOptions,
};
use junctionrelay_protocol::ConfigureParams;

/// Replies success (with an empty sensor batch) to every request.
const ECHO_PLUGIN: &str = r#"
echo ready >&2
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  printf '{"jsonrpc":"2.0","id":%s,"result":{"success":true,"sensors":[]}}\n' "$id"
done
"#;

/// Signals ready, then swallows every request without answering.
const SILENT_PLUGIN: &str = r#"
echo ready >&2
while IFS= read -r line; do :; done
"#;

/// Never signals ready.
const MUTE_PLUGIN: &str = "sleep 5";

/// Signals ready and exits immediately.
const FLAKY_PLUGIN: &str = "echo ready >&2\nexit 1";

/// Logs configure lines to @CFG@, counts fetches in @COUNT@, and exits
/// with status 7 on the third fetch overall.
const CRASHY_PLUGIN: &str = r#"
echo ready >&2
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"configure"'*)
      printf '%s\n' "$line" >> '@CFG@'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"success":true}}\n' "$id"
      ;;
    *'"fetchSensors"'*)
      n=$(cat '@COUNT@' 2>/dev/null || echo 0)
      n=$((n+1))
      echo "$n" > '@COUNT@'
      if [ "$n" -eq 3 ]; then exit 7; fi
      printf '{"jsonrpc":"2.0","id":%s,"result":{"sensors":[]}}\n' "$id"
      ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"success":true}}\n' "$id"
      ;;
  esac
done
"#;

fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        request_timeout_ms: 2_000,
        ready_timeout_ms: Some(5_000),
        max_restarts: 3,
        restart_delay_ms: 100,
    }
}

fn sh_supervisor(
    script: &str,
    options: SupervisorOptions,
    callbacks: SupervisorCallbacks,
) -> PluginSupervisor {
    let launch = LaunchCommand {
        program: "/bin/sh".into(),
        args: vec!["-c".into(), script.to_owned()],
        cwd: std::env::temp_dir(),
    };
    PluginSupervisor::with_launch("fixture".into(), launch, options, callbacks)
}

async fn wait_until(what: &str, mut condition: impl AsyncFnMut() -> bool) {
    for _ in 0..100 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for: {what}");
}

#[tokio::test]
async fn start_then_send_receives_responses() {
    let supervisor = sh_supervisor(ECHO_PLUGIN, fast_options(), SupervisorCallbacks::default());
    supervisor.start().await.unwrap();

    let result = supervisor.test_connection().await.unwrap();
    assert_eq!(result["success"], true);

    assert!(supervisor.fetch_sensors().await.unwrap().is_empty());
    assert!(
        supervisor
            .fetch_selected_sensors(&["a".into()])
            .await
            .unwrap()
            .is_empty()
    );

    supervisor.stop().await;
}

#[tokio::test]
async fn send_before_start_is_rejected() {
    let supervisor = sh_supervisor(ECHO_PLUGIN, fast_options(), SupervisorCallbacks::default());
    let err = supervisor.fetch_sensors().await.unwrap_err();
    assert!(matches!(err, HostError::NotRunning));
    assert_eq!(err.to_string(), "Plugin process not running");
}

#[tokio::test]
async fn stop_rejects_subsequent_sends() {
    let supervisor = sh_supervisor(ECHO_PLUGIN, fast_options(), SupervisorCallbacks::default());
    supervisor.start().await.unwrap();
    supervisor.stop().await;

    let err = supervisor.test_connection().await.unwrap_err();
    assert_eq!(err.to_string(), "Plugin process not running");
    assert!(!supervisor.is_running().await);
}

#[tokio::test]
async fn unanswered_request_times_out_with_method_name() {
    let options = SupervisorOptions {
        request_timeout_ms: 300,
        ..fast_options()
    };
    let supervisor = sh_supervisor(SILENT_PLUGIN, options, SupervisorCallbacks::default());
    supervisor.start().await.unwrap();

    let err = supervisor.fetch_sensors().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Request timed out after 300ms: fetchSensors"
    );
    // A timed-out request does not kill the child.
    assert!(supervisor.is_running().await);

    supervisor.stop().await;
}

#[tokio::test]
async fn missing_readiness_line_fails_start() {
    let options = SupervisorOptions {
        ready_timeout_ms: Some(300),
        ..fast_options()
    };
    let supervisor = sh_supervisor(MUTE_PLUGIN, options, SupervisorCallbacks::default());

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, HostError::ReadyTimeout));
    assert_eq!(err.to_string(), "Timeout waiting for plugin ready");
    assert!(!supervisor.is_running().await);
}

#[tokio::test]
async fn stderr_lines_are_tagged_and_buffered() {
    let seen: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let callbacks = SupervisorCallbacks {
        on_log: Some(Arc::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_owned());
        })),
        ..Default::default()
    };

    let script = "echo ready >&2\necho hello from plugin >&2\nsleep 5";
    let supervisor = sh_supervisor(script, fast_options(), callbacks);
    supervisor.start().await.unwrap();

    wait_until("both stderr lines", async || {
        supervisor.get_logs().await.len() >= 2
    })
    .await;

    let logs = supervisor.get_logs().await;
    assert_eq!(logs[0].line, "[fixture] ready");
    assert_eq!(logs[1].line, "[fixture] hello from plugin");
    assert_eq!(*seen.lock().unwrap(), vec![
        "[fixture] ready".to_owned(),
        "[fixture] hello from plugin".to_owned(),
    ]);

    supervisor.stop().await;
}

#[tokio::test]
async fn crash_triggers_restart_with_configure_replay() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_log = dir.path().join("configure.log");
    let counter = dir.path().join("fetch.count");
    let script = CRASHY_PLUGIN
        .replace("@CFG@", &cfg_log.to_string_lossy())
        .replace("@COUNT@", &counter.to_string_lossy());

    let exits: Arc<AtomicI32> = Arc::default();
    let exit_sink = Arc::clone(&exits);
    let callbacks = SupervisorCallbacks {
        on_exit: Some(Arc::new(move |code| {
            exit_sink.store(code, Ordering::SeqCst);
        })),
        ..Default::default()
    };

    let supervisor = sh_supervisor(&script, fast_options(), callbacks);
    supervisor.start().await.unwrap();

    let params = ConfigureParams {
        collector_id: 42,
        ..Default::default()
    };
    supervisor.configure(&params).await.unwrap();

    supervisor.fetch_sensors().await.unwrap();
    supervisor.fetch_sensors().await.unwrap();

    // Third fetch: the child exits with status 7 before replying.
    let err = supervisor.fetch_sensors().await.unwrap_err();
    assert_eq!(err.to_string(), "Plugin process exited with code 7");

    // The supervisor respawns and replays the stored configuration.
    wait_until("configure replay", async || {
        std::fs::read_to_string(&cfg_log)
            .map(|log| log.lines().count() == 2)
            .unwrap_or(false)
    })
    .await;

    let log = std::fs::read_to_string(&cfg_log).unwrap();
    for line in log.lines() {
        assert!(line.contains("\"collectorId\":42"), "got: {line}");
    }

    assert_eq!(supervisor.restart_count(), 1);
    assert_eq!(exits.load(Ordering::SeqCst), 7);

    // The fresh child serves requests again.
    assert!(supervisor.fetch_sensors().await.unwrap().is_empty());

    supervisor.stop().await;
}

#[tokio::test]
async fn restart_budget_is_bounded() {
    let restarts: Arc<AtomicU32> = Arc::default();
    let exhausted: Arc<AtomicBool> = Arc::default();
    let restart_sink = Arc::clone(&restarts);
    let exhausted_sink = Arc::clone(&exhausted);
    let callbacks = SupervisorCallbacks {
        on_restart: Some(Arc::new(move |attempt| {
            restart_sink.store(attempt, Ordering::SeqCst);
        })),
        on_max_restarts_exceeded: Some(Arc::new(move || {
            exhausted_sink.store(true, Ordering::SeqCst);
        })),
        ..Default::default()
    };

    let options = SupervisorOptions {
        max_restarts: 2,
        restart_delay_ms: 50,
        ..fast_options()
    };
    let supervisor = sh_supervisor(FLAKY_PLUGIN, options, callbacks);
    supervisor.start().await.unwrap();

    wait_until("restart budget exhaustion", async || {
        exhausted.load(Ordering::SeqCst)
    })
    .await;

    assert_eq!(supervisor.restart_count(), 2);
    assert_eq!(restarts.load(Ordering::SeqCst), 2);
    assert!(!supervisor.is_running().await);

    let err = supervisor.fetch_sensors().await.unwrap_err();
    assert_eq!(err.to_string(), "Plugin process not running");
}

#[tokio::test]
async fn stop_inhibits_restart() {
    let supervisor = sh_supervisor(ECHO_PLUGIN, fast_options(), SupervisorCallbacks::default());
    supervisor.start().await.unwrap();
    supervisor.stop().await;

    // Long enough for a restart to have happened if stop() did not
    // inhibit it.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!supervisor.is_running().await);
    assert_eq!(supervisor.restart_count(), 0);
}
