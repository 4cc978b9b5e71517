//! Integration tests for sleep and resume handling.

mod helpers;

use std::time::Duration;

use floatlease_core::types::{CallbackEvent, LeaseState};

use helpers::{TestEnv, wait_for_state};

#[tokio::test]
async fn test_sleep_drops_and_resume_regains() {
    let env = TestEnv::new();
    let (client, mut events) = env.leased_client().await;

    env.power.suspend();
    assert_eq!(events.next().await, CallbackEvent::LeaseDroppedSleep);
    assert_eq!(client.state().await.unwrap(), LeaseState::DroppedSleep);
    assert!(!client.has_lease().await.unwrap());
    assert_eq!(env.server.seats_in_use(), 0);

    env.power.resume();
    assert_eq!(events.next().await, CallbackEvent::LeaseRegained);
    assert!(client.has_lease().await.unwrap());
    // One request at start, exactly one more on resume.
    assert_eq!(env.server.grant_calls(), 2);
}

#[tokio::test]
async fn test_failed_regain_expires_without_event() {
    let env = TestEnv::new();
    let (client, mut events) = env.leased_client().await;

    env.power.suspend();
    assert_eq!(events.next().await, CallbackEvent::LeaseDroppedSleep);

    env.server.go_offline();
    env.power.resume();
    wait_for_state(&client, LeaseState::Expired).await;

    assert_eq!(env.server.grant_calls(), 2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(env.server.grant_calls(), 2);
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn test_sleep_without_lease_is_ignored() {
    let env = TestEnv::new();
    let (client, mut events) = env.configured_client().await;

    env.power.suspend();
    env.power.resume();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.state().await.unwrap(), LeaseState::None);
    assert_eq!(env.server.grant_calls(), 0);
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn test_resume_without_sleep_is_ignored() {
    let env = TestEnv::new();
    let (client, mut events) = env.leased_client().await;

    env.power.resume();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(client.has_lease().await.unwrap());
    assert_eq!(env.server.grant_calls(), 1);
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn test_every_client_reacts_to_sleep() {
    let env = TestEnv::new();
    let (a, mut a_events) = env.leased_client().await;
    let (b, mut b_events) = env.leased_client().await;
    assert_eq!(env.server.seats_in_use(), 2);

    env.power.suspend();
    assert_eq!(a_events.next().await, CallbackEvent::LeaseDroppedSleep);
    assert_eq!(b_events.next().await, CallbackEvent::LeaseDroppedSleep);

    env.power.resume();
    assert_eq!(a_events.next().await, CallbackEvent::LeaseRegained);
    assert_eq!(b_events.next().await, CallbackEvent::LeaseRegained);
    assert!(a.has_lease().await.unwrap());
    assert!(b.has_lease().await.unwrap());
}

#[tokio::test]
async fn test_drop_while_asleep_clears_state() {
    let env = TestEnv::new();
    let (client, mut events) = env.leased_client().await;

    env.power.suspend();
    assert_eq!(events.next().await, CallbackEvent::LeaseDroppedSleep);

    client.drop_lease().await;
    env.power.resume();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.state().await.unwrap(), LeaseState::None);
    assert_eq!(env.server.grant_calls(), 1);
}
