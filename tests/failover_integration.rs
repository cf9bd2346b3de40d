//! End-to-end failover: two real `OjpProxy` servers, one locator, and a
//! session that must move off the endpoint that goes dark (§8 scenario 5).

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ojp_client::pb::{ConnectionDetails, StatementRequest};
use ojp_client::{Client, RouterConfig};

use common::{spawn_fake_proxy, FakeState};

#[tokio::test]
async fn session_moves_off_endpoint_that_goes_unavailable() {
    let state_a = Arc::new(FakeState::default());
    let state_b = Arc::new(FakeState::default());

    let (port_a, _handle_a) = spawn_fake_proxy("A", state_a.clone()).await;
    let (port_b, _handle_b) = spawn_fake_proxy("B", state_b.clone()).await;

    let locator = format!(
        "jdbc:ojp[127.0.0.1:{port_a},127.0.0.1:{port_b}]_h2:mem:test",
    );

    let client = Client::connect(
        &locator,
        RouterConfig::default().with_retry_delay(Duration::from_millis(10)),
    )
    .unwrap();

    // The round-robin cursor starts at 0, so `open_session` lands on A
    // (the first endpoint in the locator) and pins the returned session
    // there.
    let session = client
        .open_session(ConnectionDetails {
            url: client.downstream_url().to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(session.get().identifier, "sess-A");

    // Make A's *next* query fail with Unavailable, simulating the
    // endpoint going dark mid-session.
    state_a.fail_next_query.store(true, Ordering::SeqCst);

    let result = client
        .execute_query(&session, StatementRequest::default())
        .await
        .unwrap();
    assert_eq!(result.kind, 2);

    // The dispatcher must have: (1) seen A fail and marked it
    // unhealthy, (2) unpinned the session, (3) retried on B, and (4)
    // adopted B's session as the new pinned value.
    assert_eq!(session.get().identifier, "sess-B");
    assert_eq!(state_a.query_calls.lock().len(), 1);
    assert_eq!(state_b.query_calls.lock().len(), 1);

    // Subsequent calls on the same session must stay pinned to B even
    // though A has an earlier position in the round-robin order.
    client
        .execute_query(&session, StatementRequest::default())
        .await
        .unwrap();
    assert_eq!(state_a.query_calls.lock().len(), 1);
    assert_eq!(state_b.query_calls.lock().len(), 2);
}

#[tokio::test]
async fn no_healthy_endpoints_exhausts_retries_and_fails() {
    // Reserve a port and drop the listener without ever serving on it,
    // so connection attempts are refused deterministically.
    let dead_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = dead_listener.local_addr().unwrap().port();
    drop(dead_listener);

    let locator = format!("jdbc:ojp[127.0.0.1:{dead_port}]_h2:mem:test");
    let client = Client::connect(
        &locator,
        RouterConfig::default()
            .with_max_attempts(Some(1))
            .with_retry_delay(Duration::from_millis(5)),
    )
    .unwrap();

    let err = client
        .open_session(ConnectionDetails {
            url: client.downstream_url().to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ojp_client::OjpError::NoHealthyEndpoints | ojp_client::OjpError::TransportUnavailable(_)
    ));
}
