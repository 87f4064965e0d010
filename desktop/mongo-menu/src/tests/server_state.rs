use crate::server::{Diagnosis, Notification, ServerState, ServerStatus, StatusPublisher};

use tokio::sync::broadcast::error::TryRecvError;

const ALL: [ServerState; 4] = [
    ServerState::Stopped,
    ServerState::Starting,
    ServerState::Running,
    ServerState::Stopping,
];

#[test]
fn test_transition_graph_allows_only_lifecycle_edges() {
    let allowed = [
        (ServerState::Stopped, ServerState::Starting),
        (ServerState::Starting, ServerState::Running),
        (ServerState::Starting, ServerState::Stopped),
        (ServerState::Running, ServerState::Stopping),
        (ServerState::Stopping, ServerState::Stopped),
    ];

    for from in ALL {
        for to in ALL {
            assert_eq!(
                from.can_transition_to(to),
                allowed.contains(&(from, to)),
                "{} -> {}",
                from.as_str(),
                to.as_str()
            );
        }
    }
}

#[test]
fn test_only_running_is_running() {
    let running: Vec<_> = ALL.into_iter().filter(|s| s.is_running()).collect();
    assert_eq!(running, vec![ServerState::Running]);
}

#[test]
fn test_state_serializes_snake_case() {
    let json = serde_json::to_string(&ServerState::Stopping).unwrap();
    assert_eq!(json, r#""stopping""#);
}

#[test]
fn test_publisher_rejects_invalid_transition() {
    let publisher = StatusPublisher::new();

    assert!(!publisher.transition(ServerState::Running, 27017));
    assert_eq!(publisher.state(), ServerState::Stopped);

    assert!(publisher.transition(ServerState::Starting, 27017));
    assert!(!publisher.transition(ServerState::Stopping, 27017));
    assert_eq!(publisher.state(), ServerState::Starting);
}

#[test]
fn test_publisher_notifies_on_entering_and_leaving_running() {
    let publisher = StatusPublisher::new();
    let mut events = publisher.subscribe();

    publisher.transition(ServerState::Starting, 28000);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(publisher.active_port(), 28000);

    publisher.transition(ServerState::Running, 28000);
    assert_eq!(
        events.try_recv(),
        Ok(Notification::StatusChanged(ServerStatus {
            running: true,
            port: 28000,
        }))
    );

    publisher.transition(ServerState::Stopping, 28000);
    assert_eq!(
        events.try_recv(),
        Ok(Notification::StatusChanged(ServerStatus {
            running: false,
            port: 28000,
        }))
    );

    publisher.transition(ServerState::Stopped, 28000);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn test_failed_start_publishes_no_status_change() {
    let publisher = StatusPublisher::new();
    let mut events = publisher.subscribe();

    publisher.transition(ServerState::Starting, 27017);
    publisher.transition(ServerState::Stopped, 27017);

    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(publisher.state(), ServerState::Stopped);
}

#[test]
fn test_publisher_broadcasts_diagnosis() {
    let publisher = StatusPublisher::new();
    let mut events = publisher.subscribe();

    publisher.report(Diagnosis::PortConflict);

    assert_eq!(
        events.try_recv(),
        Ok(Notification::Failure(Diagnosis::PortConflict))
    );
}

#[test]
fn test_state_receiver_sees_latest_state() {
    let publisher = StatusPublisher::new();
    let state = publisher.subscribe_state();

    publisher.transition(ServerState::Starting, 27017);
    publisher.transition(ServerState::Running, 27017);

    assert_eq!(*state.borrow(), ServerState::Running);
}
