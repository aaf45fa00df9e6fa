//! End-to-end lifecycle tests: startup, credential persistence, shutdown.

use rendezvous_server::{Coordinator, LifecycleState, ServerError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

mod common;

#[tokio::test]
async fn clean_stop_without_token_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path(), "");
    let coordinator = Coordinator::new(config).unwrap();
    let mut state = coordinator.state();
    let shutdown = coordinator.shutdown_handle();

    let run = tokio::spawn(coordinator.run());
    assert_eq!(common::wait_started(&mut state).await, LifecycleState::Serving);

    shutdown.trigger();
    run.await.unwrap().expect("clean shutdown");

    assert_eq!(*state.borrow(), LifecycleState::Stopped);
    assert!(!common::auth_file(dir.path()).exists());
}

#[tokio::test]
async fn token_is_persisted_before_serving() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path(), "secret");
    let coordinator = Coordinator::new(config).unwrap();
    let mut state = coordinator.state();
    let shutdown = coordinator.shutdown_handle();

    let run = tokio::spawn(coordinator.run());
    common::wait_started(&mut state).await;

    let content = std::fs::read(common::auth_file(dir.path())).unwrap();
    assert_eq!(content, b"secret");

    shutdown.trigger();
    run.await.unwrap().unwrap();
    assert_eq!(*state.borrow(), LifecycleState::Stopped);
}

#[tokio::test]
async fn serves_builtin_routes() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path(), "");
    let addr = common::loopback(config.port);
    let coordinator = Coordinator::new(config).unwrap();
    let mut state = coordinator.state();
    let shutdown = coordinator.shutdown_handle();

    let run = tokio::spawn(coordinator.run());
    common::wait_started(&mut state).await;

    let client = common::client();
    let ping = client.get(format!("http://{addr}/ping")).send().await.unwrap();
    assert_eq!(ping.text().await.unwrap(), "pong");

    let version: serde_json::Value = client
        .get(format!("http://{addr}/version"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(version["version"], "1.0.0");

    let page = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert!(page.text().await.unwrap().contains("serving"));

    shutdown.trigger();
    run.await.unwrap().unwrap();

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn repeated_trigger_has_no_additional_effect() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = Coordinator::new(common::test_config(dir.path(), "")).unwrap();
    let mut state = coordinator.state();
    let shutdown = coordinator.shutdown_handle();

    let run = tokio::spawn(coordinator.run());
    common::wait_started(&mut state).await;

    assert!(shutdown.trigger());
    assert!(!shutdown.trigger());
    run.await.unwrap().unwrap();
    assert!(!shutdown.trigger());

    assert_eq!(*state.borrow(), LifecycleState::Stopped);
}

#[tokio::test]
async fn occupied_port_fails_bind_after_single_credential_write() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path(), "secret");
    let _occupied = std::net::TcpListener::bind(config.socket_addr()).unwrap();
    let coordinator = Coordinator::new(config).unwrap();
    let state = coordinator.state();

    let err = coordinator.run().await.unwrap_err();

    assert!(matches!(err, ServerError::ListenerBindFailed(_)), "got {err}");
    assert_eq!(*state.borrow(), LifecycleState::Aborted);
    assert_eq!(
        std::fs::read_to_string(common::auth_file(dir.path())).unwrap(),
        "secret"
    );
}

#[tokio::test]
async fn in_flight_request_completes_within_grace() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path(), "");
    config.shutdown.grace_period_ms = 1_000;
    let addr = common::loopback(config.port);

    let entered = Arc::new(Notify::new());
    let coordinator = Coordinator::new(config)
        .unwrap()
        .merge_routes(common::slow_route(entered.clone(), Duration::from_millis(300)));
    let mut state = coordinator.state();
    let shutdown = coordinator.shutdown_handle();

    let run = tokio::spawn(coordinator.run());
    common::wait_started(&mut state).await;

    let request = tokio::spawn(async move {
        common::client()
            .get(format!("http://{addr}/slow"))
            .send()
            .await
    });
    entered.notified().await;
    shutdown.trigger();

    run.await.unwrap().expect("drained within grace");
    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "finished");
    assert_eq!(*state.borrow(), LifecycleState::Stopped);
}

#[tokio::test]
async fn request_held_past_grace_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path(), "");
    config.shutdown.grace_period_ms = 300;
    let addr = common::loopback(config.port);

    let entered = Arc::new(Notify::new());
    let coordinator = Coordinator::new(config)
        .unwrap()
        .merge_routes(common::slow_route(entered.clone(), Duration::from_secs(3)));
    let mut state = coordinator.state();
    let shutdown = coordinator.shutdown_handle();

    let run = tokio::spawn(coordinator.run());
    common::wait_started(&mut state).await;

    let _request = tokio::spawn(async move {
        common::client()
            .get(format!("http://{addr}/slow"))
            .send()
            .await
    });
    entered.notified().await;

    let triggered_at = Instant::now();
    shutdown.trigger();
    let err = run.await.unwrap().unwrap_err();

    assert!(
        matches!(err, ServerError::ShutdownTimedOut { remaining: 1, .. }),
        "got {err}"
    );
    assert!(triggered_at.elapsed() < Duration::from_secs(2));
    assert_eq!(*state.borrow(), LifecycleState::Aborted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn credential_write_happens_before_first_accept() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path(), "secret");
    let addr = common::loopback(config.port);
    let (sink, finished_at) = common::SlowSink::new(dir.path(), Duration::from_millis(300));

    let coordinator = Coordinator::new(config).unwrap().with_credential_sink(sink);
    let mut state = coordinator.state();
    let shutdown = coordinator.shutdown_handle();

    let probe = tokio::spawn(async move {
        loop {
            if tokio::net::TcpStream::connect(addr).await.is_ok() {
                return Instant::now();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let run = tokio::spawn(coordinator.run());
    common::wait_started(&mut state).await;

    let first_accept = tokio::time::timeout(Duration::from_secs(5), probe)
        .await
        .unwrap()
        .unwrap();
    let written = finished_at.lock().unwrap().expect("sink was called");
    assert!(written <= first_accept);

    shutdown.trigger();
    run.await.unwrap().unwrap();
}

/// Trigger shutdown while one request is `delay` into a handler and return
/// what `run` reports with the given grace period.
async fn shutdown_with_request_in_flight(
    grace: Duration,
    delay: Duration,
) -> Result<(), ServerError> {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path(), "");
    config.shutdown.grace_period_ms = grace.as_millis() as u64;
    let addr = common::loopback(config.port);

    let entered = Arc::new(Notify::new());
    let coordinator = Coordinator::new(config)
        .unwrap()
        .merge_routes(common::slow_route(entered.clone(), delay));
    let mut state = coordinator.state();
    let shutdown = coordinator.shutdown_handle();

    let run = tokio::spawn(coordinator.run());
    common::wait_started(&mut state).await;

    let _request = tokio::spawn(async move {
        common::client()
            .get(format!("http://{addr}/slow"))
            .send()
            .await
    });
    entered.notified().await;
    shutdown.trigger();

    run.await.unwrap()
}

#[tokio::test]
async fn request_finishing_just_before_deadline_is_clean() {
    let result = shutdown_with_request_in_flight(
        Duration::from_millis(500),
        Duration::from_millis(450),
    )
    .await;

    assert!(result.is_ok(), "got {result:?}");
}

#[tokio::test]
async fn request_finishing_just_after_deadline_times_out() {
    let result = shutdown_with_request_in_flight(
        Duration::from_millis(500),
        Duration::from_millis(550),
    )
    .await;

    match result {
        Err(ServerError::ShutdownTimedOut { grace, remaining }) => {
            assert_eq!(grace, Duration::from_millis(500));
            assert_eq!(remaining, 1);
        }
        other => panic!("expected a shutdown timeout, got {other:?}"),
    }
}
