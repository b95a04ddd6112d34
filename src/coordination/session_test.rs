use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_utils::MemoryConnector;
use crate::test_utils::MemoryCoordination;
use crate::CoordinationConfig;

async fn setup(auto_establish: bool) -> (Arc<MemoryConnector>, Arc<SessionManager>) {
    let store = Arc::new(MemoryCoordination::new());
    let connector = Arc::new(MemoryConnector::new(store));
    connector.set_auto_establish(auto_establish);
    let session = SessionManager::connect(
        Arc::clone(&connector) as Arc<dyn SessionConnector>,
        CoordinationConfig::default(),
        CancellationToken::new(),
    )
    .await
    .expect("connect");
    (connector, session)
}

#[tokio::test]
async fn test_gate_blocks_until_established() {
    let (connector, session) = setup(false).await;

    assert!(!session.is_connected());
    let blocked = timeout(Duration::from_millis(50), session.await_connected()).await;
    assert!(blocked.is_err(), "gate should block before establishment");

    connector.establish();
    timeout(Duration::from_millis(500), session.await_connected())
        .await
        .expect("gate should open after establishment");
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_gate_returns_immediately_when_connected() {
    let (_connector, session) = setup(true).await;

    // Establishment happened before anyone subscribed to the gate; the
    // state must have latched regardless.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.is_connected());
    timeout(Duration::from_millis(100), session.await_connected())
        .await
        .expect("gate should already be open");
}

#[tokio::test]
async fn test_blocked_caller_released_after_reconnect() {
    let (connector, session) = setup(true).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.is_connected());

    // Lose the session; rebuild must not auto-establish so the gate stays
    // closed until the test signals the new session.
    connector.set_auto_establish(false);
    connector.lose_session();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!session.is_connected());

    let waiter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session.await_connected().await;
            42
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "caller should still be gated");

    connector.establish();
    let result = timeout(Duration::from_millis(500), waiter)
        .await
        .expect("waiter should complete after re-establishment")
        .unwrap();
    assert_eq!(result, 42);

    // The session was rebuilt, not patched in place.
    assert_eq!(connector.connect_calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_shutdown_stops_supervisor() {
    let store = Arc::new(MemoryCoordination::new());
    let connector = Arc::new(MemoryConnector::new(store));
    let shutdown = CancellationToken::new();
    let session = SessionManager::connect(
        Arc::clone(&connector) as Arc<dyn SessionConnector>,
        CoordinationConfig::default(),
        shutdown.clone(),
    )
    .await
    .expect("connect");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.is_connected());

    shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Lost events are no longer consumed; the gate state stays as-is.
    connector.lose_session();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.is_connected());
}
