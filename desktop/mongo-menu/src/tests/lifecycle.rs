use super::{CRASHING_SERVER, GRACEFUL_SERVER, STUBBORN_SERVER, Sandbox, fast_shutdown, free_port};
use crate::server::{
    Diagnosis, Installation, Notification, ServerManager, ServerState, StartError, StopOutcome,
};

use std::net::{Ipv4Addr, TcpListener};
use std::time::{Duration, Instant};

use serial_test::serial;
use tokio::sync::{broadcast, oneshot};

async fn next_notification(events: &mut broadcast::Receiver<Notification>) -> Notification {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification channel closed")
}

#[tokio::test]
#[serial]
async fn test_start_then_stop_runs_full_cycle() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();
    let mut events = manager.subscribe();

    manager.start().await.unwrap();
    assert_eq!(manager.state(), ServerState::Running);
    assert!(manager.status().running);
    assert_eq!(manager.status().port, sandbox.config.port);
    sandbox.wait_for_launches(1).await;

    let started = Instant::now();
    let outcome = manager.stop().await;

    assert_eq!(outcome, StopOutcome::Graceful);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(manager.state(), ServerState::Stopped);
    assert!(!manager.status().running);

    match next_notification(&mut events).await {
        Notification::StatusChanged(status) => assert!(status.running),
        other => panic!("unexpected notification {other:?}"),
    }
    match next_notification(&mut events).await {
        Notification::StatusChanged(status) => {
            assert!(!status.running);
            assert_eq!(status.port, sandbox.config.port);
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn test_start_creates_data_and_log_directories() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();
    std::fs::remove_dir_all(&sandbox.config.data_dir).unwrap();
    std::fs::remove_dir_all(sandbox.config.log_dir()).unwrap();

    manager.start().await.unwrap();
    sandbox.wait_for_launches(1).await;

    assert!(sandbox.config.data_dir.is_dir());
    assert!(sandbox.config.log_path.is_file());

    manager.stop().await;
}

#[tokio::test]
#[serial]
async fn test_concurrent_starts_spawn_one_process() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();

    let (a, b, c) = tokio::join!(manager.start(), manager.start(), manager.start());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    sandbox.wait_for_launches(1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sandbox.launches(), 1);

    // Starting while running is a no-op as well
    manager.start().await.unwrap();
    assert_eq!(manager.state(), ServerState::Running);

    manager.stop().await;
    assert_eq!(sandbox.launches(), 1);
}

#[tokio::test]
#[serial]
async fn test_stop_when_stopped_invokes_callback_immediately() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();

    for _ in 0..2 {
        let (tx, rx) = oneshot::channel();
        let handle = manager.stop_then(move |outcome| {
            let _ = tx.send(outcome);
        });

        let outcome = tokio::time::timeout(Duration::from_millis(500), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, StopOutcome::AlreadyStopped);
        assert_eq!(handle.await.unwrap(), StopOutcome::AlreadyStopped);
    }

    assert_eq!(manager.state(), ServerState::Stopped);
    assert_eq!(sandbox.launches(), 0);
}

#[tokio::test]
#[serial]
async fn test_stop_then_reports_after_process_is_gone() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();
    manager.start().await.unwrap();
    sandbox.wait_for_launches(1).await;

    let observer = manager.clone();
    let (tx, rx) = oneshot::channel();
    manager.stop_then(move |outcome| {
        let _ = tx.send((outcome, observer.state()));
    });

    let (outcome, state) = rx.await.unwrap();
    assert_eq!(outcome, StopOutcome::Graceful);
    assert_eq!(state, ServerState::Stopped);
}

#[tokio::test]
#[serial]
async fn test_stop_forces_kill_when_server_ignores_term() {
    let sandbox = Sandbox::new(STUBBORN_SERVER);
    let manager = sandbox.manager();
    manager.start().await.unwrap();
    sandbox.wait_for_launches(1).await;

    let started = Instant::now();
    let outcome = manager.stop().await;
    let elapsed = started.elapsed();

    let shutdown = fast_shutdown();
    assert_eq!(outcome, StopOutcome::Forced);
    assert!(elapsed >= shutdown.grace_period());
    assert!(elapsed < shutdown.grace_period() + shutdown.kill_wait());
    assert_eq!(manager.state(), ServerState::Stopped);

    // Second stop has nothing left to kill
    assert_eq!(manager.stop().await, StopOutcome::AlreadyStopped);
}

#[tokio::test]
#[serial]
async fn test_stop_uses_shell_client_when_installed() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    sandbox.install_shell();
    let shutdown = mm_config::ShutdownConfig {
        signal_fallback: false,
        ..fast_shutdown()
    };
    let manager = ServerManager::new(sandbox.installation(), sandbox.config.clone(), shutdown);

    manager.start().await.unwrap();
    sandbox.wait_for_launches(1).await;

    assert_eq!(manager.stop().await, StopOutcome::Graceful);

    let args = std::fs::read_to_string(sandbox.config.data_dir.join("mongosh.args")).unwrap();
    assert_eq!(
        args.trim(),
        format!(
            "--port {} --eval db.adminCommand({{shutdown: 1}})",
            sandbox.config.port
        )
    );
}

#[tokio::test]
#[serial]
async fn test_start_fails_when_port_in_use() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();

    let manager = sandbox.manager();
    manager.set_port(port);

    let err = manager.start().await.unwrap_err();

    assert!(matches!(err, StartError::PortInUse { port: p, .. } if p == port));
    assert_eq!(manager.state(), ServerState::Stopped);
    assert!(!manager.status().running);
    assert_eq!(manager.stop().await, StopOutcome::AlreadyStopped);
    assert_eq!(sandbox.launches(), 0);
}

#[tokio::test]
#[serial]
async fn test_start_fails_when_binary_missing() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let empty = tempfile::TempDir::new().unwrap();
    let manager = ServerManager::new(
        Installation::new(empty.path()),
        sandbox.config.clone(),
        fast_shutdown(),
    );

    let err = manager.start().await.unwrap_err();

    match &err {
        StartError::BinaryNotFound { path, .. } => {
            assert_eq!(path, &empty.path().join("mongodb/bin/mongod"));
        }
        other => panic!("expected BinaryNotFound, got {other:?}"),
    }
    assert_eq!(err.title(), "MongoDB Binary Not Found");
    assert_eq!(manager.state(), ServerState::Stopped);
}

#[tokio::test]
#[serial]
async fn test_non_executable_binary_fails_once_then_starts() {
    use std::os::unix::fs::PermissionsExt;

    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    std::fs::set_permissions(
        sandbox.server_binary(),
        std::fs::Permissions::from_mode(0o644),
    )
    .unwrap();
    let manager = sandbox.manager();

    let err = manager.start().await.unwrap_err();
    assert!(matches!(
        err,
        StartError::NotExecutable {
            permissions_fixed: true,
            ..
        }
    ));
    assert_eq!(manager.state(), ServerState::Stopped);
    assert_eq!(sandbox.launches(), 0);

    manager.start().await.unwrap();
    assert_eq!(manager.state(), ServerState::Running);
    sandbox.wait_for_launches(1).await;

    manager.stop().await;
}

#[tokio::test]
#[serial]
async fn test_start_fails_when_data_dir_cannot_be_created() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let blocker = sandbox.dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let manager = sandbox.manager();
    let mut config = manager.config();
    config.data_dir = blocker.join("data");
    manager.configure(config);

    let err = manager.start().await.unwrap_err();

    match &err {
        StartError::DirectoryCreationFailed { path, .. } => {
            assert_eq!(path, &blocker.join("data"));
        }
        other => panic!("expected DirectoryCreationFailed, got {other:?}"),
    }
    assert_eq!(manager.state(), ServerState::Stopped);
}

#[tokio::test]
#[serial]
async fn test_unexpected_exit_publishes_diagnosis() {
    let sandbox = Sandbox::new(CRASHING_SERVER);
    let manager = sandbox.manager();
    let mut events = manager.subscribe();
    let mut state = manager.subscribe_state();

    manager.start().await.unwrap();

    match next_notification(&mut events).await {
        Notification::StatusChanged(status) => assert!(status.running),
        other => panic!("unexpected notification {other:?}"),
    }
    match next_notification(&mut events).await {
        Notification::StatusChanged(status) => assert!(!status.running),
        other => panic!("unexpected notification {other:?}"),
    }
    assert_eq!(
        next_notification(&mut events).await,
        Notification::Failure(Diagnosis::PermissionDenied)
    );

    tokio::time::timeout(
        Duration::from_secs(1),
        state.wait_for(|s| *s == ServerState::Stopped),
    )
    .await
    .unwrap()
    .unwrap();

    // Handle was released by the exit observer
    assert_eq!(manager.stop().await, StopOutcome::AlreadyStopped);
}

#[tokio::test]
#[serial]
async fn test_stop_after_unobserved_crash_publishes_diagnosis() {
    let sandbox = Sandbox::new(CRASHING_SERVER);
    let manager = sandbox.manager();
    let mut events = manager.subscribe();

    manager.start().await.unwrap();

    // Block the runtime so the exit watcher cannot claim the crash first
    std::thread::sleep(Duration::from_secs(2));

    assert_eq!(manager.stop().await, StopOutcome::Graceful);
    assert_eq!(manager.state(), ServerState::Stopped);

    let mut diagnosed = None;
    while let Ok(Ok(notification)) =
        tokio::time::timeout(Duration::from_secs(2), events.recv()).await
    {
        if let Notification::Failure(diagnosis) = notification {
            diagnosed = Some(diagnosis);
            break;
        }
    }
    assert_eq!(diagnosed, Some(Diagnosis::PermissionDenied));
}

#[tokio::test]
#[serial]
async fn test_port_change_applies_to_next_start() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();
    let first = sandbox.config.port;
    let second = free_port();

    manager.start().await.unwrap();
    sandbox.wait_for_launches(1).await;
    manager.set_port(second);

    assert_eq!(manager.status().port, first);

    manager.stop().await;
    assert_eq!(manager.status().port, second);
}

#[tokio::test]
#[serial]
async fn test_restart_launches_a_new_process() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();

    manager.start().await.unwrap();
    sandbox.wait_for_launches(1).await;

    manager.restart().await.unwrap();
    sandbox.wait_for_launches(2).await;
    assert_eq!(manager.state(), ServerState::Running);

    manager.stop().await;
    assert_eq!(sandbox.launches(), 2);
}

#[tokio::test]
#[serial]
async fn test_recent_log_lines_reads_server_log() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();

    manager.start().await.unwrap();
    sandbox.wait_for_launches(1).await;
    manager.stop().await;

    let lines = manager.recent_log_lines(10).unwrap();
    assert_eq!(lines, vec![r#"{"s":"I","msg":"Waiting for connections"}"#.to_string()]);
}

#[tokio::test]
#[serial]
async fn test_new_creates_configured_directories() {
    let sandbox = Sandbox::new(GRACEFUL_SERVER);
    let manager = sandbox.manager();

    assert!(manager.data_folder().is_dir());
    assert!(manager.log_folder().is_dir());
    assert_eq!(manager.log_folder(), sandbox.dir.path().join("log"));
}
