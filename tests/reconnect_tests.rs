//! Disconnect handling over real connections: reconnection grace and the
//! action timeout, with timers shortened to keep the tests fast.


use std::time::Duration;

use serde_json::json;

use poker_table_server::session::SessionConfig;
use test_helpers::{spawn_server, TestClient};

fn short_timers() -> SessionConfig {
    SessionConfig {
        action_timeout: Duration::from_millis(400),
        reconnect_grace: Duration::from_millis(300),
    }
}

async fn seat_two_players(addr: std::net::SocketAddr) -> (TestClient, TestClient) {
    let mut alice = TestClient::connect(addr, Some("alice")).await;
    let mut bob = TestClient::connect(addr, Some("bob")).await;
    for (client, seat, name) in [(&mut alice, 0, "Alice"), (&mut bob, 1, "Bob")] {
        client.request_ok("join", json!({"id": "t1"})).await;
        client
            .request_ok("reserveSeat", json!({"id": "t1", "index": seat}))
            .await;
        client
            .request_ok(
                "sitDown",
                json!({"id": "t1", "name": name, "buyIn": 300, "avatarStyle": "classic"}),
            )
            .await;
    }
    alice.expect_event("startHand").await;
    bob.expect_event("startHand").await;
    (alice, bob)
}

/// A dropped connection that never comes back loses its seat and
/// reservation once the grace period elapses.
#[tokio::test]
async fn grace_expiry_vacates_the_seat() {
    let config = SessionConfig {
        // Keep the action timer out of the way.
        action_timeout: Duration::from_secs(60),
        reconnect_grace: Duration::from_millis(300),
    };
    let addr = spawn_server(config).await;
    let (alice, mut bob) = seat_two_players(addr).await;

    alice.close().await;

    let stand_up = bob.expect_event("standUp").await;
    assert_eq!(stand_up["table"]["reservations"][0], serde_json::Value::Null);
    assert_eq!(stand_up["table"]["seats"][0], serde_json::Value::Null);

    // Standing up heads-up ends the hand.
    bob.expect_event("showdown").await;
}

/// Reconnecting and rejoining before the grace elapses keeps the seat.
#[tokio::test]
async fn rejoin_before_grace_keeps_the_seat() {
    let config = SessionConfig {
        action_timeout: Duration::from_secs(60),
        reconnect_grace: Duration::from_millis(500),
    };
    let addr = spawn_server(config).await;
    let (alice, mut bob) = seat_two_players(addr).await;

    alice.close().await;

    // Same identity, fresh connection, rejoin in time.
    let mut alice_again = TestClient::connect(addr, Some("alice")).await;
    let base = alice_again.request_ok("join", json!({"id": "t1"})).await;
    assert_eq!(base["seatIndex"], 0);
    assert_eq!(base["table"]["seats"][0]["totalChips"], 300);

    bob.assert_no_event("standUp", Duration::from_millis(900))
        .await;

    alice_again.close().await;
    bob.close().await;
}

/// Nobody acts: the action timer folds the player to act through the same
/// cascade as a manual action.
#[tokio::test]
async fn action_timeout_folds_the_stalled_player() {
    let addr = spawn_server(short_timers()).await;
    let (mut alice, mut bob) = seat_two_players(addr).await;

    // Neither player acts; the forced fold ends the heads-up hand and the
    // next hand starts automatically.
    let folded = bob.expect_event("actionTaken").await;
    assert_eq!(folded["action"], "fold");
    bob.expect_event("bettingRoundEnd").await;
    bob.expect_event("showdown").await;
    bob.expect_event("startHand").await;

    // The other client observed the same sequence.
    let folded = alice.expect_event("actionTaken").await;
    assert_eq!(folded["action"], "fold");

    alice.close().await;
    bob.close().await;
}
