//! In-memory lease server for development and testing.
//!
//! Simulates a floating-license server without any network: a finite seat
//! pool, feature values, revocation, clock skew, latency and injected
//! failures are all controllable from the test.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use floatlease_core::error::LeaseError;
use floatlease_core::result::LeaseResult;

use super::{
    FeatureMap, Grant, LeaseRequest, LeaseTransport, RenewOutcome, Renewal, TransportContext,
};

/// A lease held in the mock pool.
#[derive(Debug, Clone)]
struct MockLease {
    client_id: Uuid,
    username: String,
    features_changed: bool,
}

#[derive(Debug)]
struct MockState {
    total_seats: u32,
    lease_duration: Duration,
    leases: HashMap<String, MockLease>,
    features: FeatureMap,
    products: Option<HashSet<String>>,
    server_uuid: Option<Uuid>,
    allowed_users: Option<HashSet<String>>,
    clock_skew: chrono::Duration,
    latency: Duration,
    failure: Option<LeaseError>,
    next_id: u64,
}

/// Mock lease server that simulates a seat pool in memory.
#[derive(Debug)]
pub struct MockLeaseServer {
    state: Mutex<MockState>,
    grant_calls: AtomicU32,
    renew_calls: AtomicU32,
    release_calls: AtomicU32,
}

impl MockLeaseServer {
    /// Create a server with ten seats and a ten-minute lease period.
    pub fn new() -> Self {
        Self::with_seats(10)
    }

    /// Create a server with the given number of seats.
    pub fn with_seats(total_seats: u32) -> Self {
        Self {
            state: Mutex::new(MockState {
                total_seats,
                lease_duration: Duration::from_secs(600),
                leases: HashMap::new(),
                features: FeatureMap::new(),
                products: None,
                server_uuid: None,
                allowed_users: None,
                clock_skew: chrono::Duration::zero(),
                latency: Duration::ZERO,
                failure: None,
                next_id: 1,
            }),
            grant_calls: AtomicU32::new(0),
            renew_calls: AtomicU32::new(0),
            release_calls: AtomicU32::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Change the size of the seat pool.
    pub fn set_total_seats(&self, seats: u32) {
        self.lock().total_seats = seats;
    }

    /// Change the lease period handed out by later grants and renewals.
    pub fn set_lease_duration(&self, duration: Duration) {
        self.lock().lease_duration = duration;
    }

    /// Set a feature value; every held lease sees the change on its next renewal.
    pub fn set_feature(&self, name: &str, value: &str) {
        let mut state = self.lock();
        state.features.insert(name.to_string(), value.to_string());
        state
            .leases
            .values_mut()
            .for_each(|lease| lease.features_changed = true);
    }

    /// Remove a feature; every held lease sees the change on its next renewal.
    pub fn remove_feature(&self, name: &str) {
        let mut state = self.lock();
        if state.features.remove(name).is_some() {
            state
                .leases
                .values_mut()
                .for_each(|lease| lease.features_changed = true);
        }
    }

    /// Only grant leases for the listed product GUIDs.
    pub fn serve_products(&self, guids: &[&str]) {
        self.lock().products = Some(guids.iter().map(|g| g.to_string()).collect());
    }

    /// Require this hosted-server selector in the endpoint.
    pub fn set_server_uuid(&self, uuid: Uuid) {
        self.lock().server_uuid = Some(uuid);
    }

    /// Only grant leases to the listed usernames.
    pub fn allow_users(&self, users: &[&str]) {
        self.lock().allowed_users = Some(users.iter().map(|u| u.to_string()).collect());
    }

    /// Offset the server clock from the local clock.
    pub fn set_clock_skew(&self, skew: chrono::Duration) {
        self.lock().clock_skew = skew;
    }

    /// Delay every call by this much.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Fail every call with this error until cleared with `None`.
    pub fn fail_with(&self, failure: Option<LeaseError>) {
        self.lock().failure = failure;
    }

    /// Shorthand for failing every call with [`LeaseError::Inet`].
    pub fn go_offline(&self) {
        self.fail_with(Some(LeaseError::Inet));
    }

    /// Clear an injected failure.
    pub fn come_online(&self) {
        self.fail_with(None);
    }

    /// Revoke a single lease.
    pub fn revoke(&self, lease_id: &str) -> bool {
        let removed = self.lock().leases.remove(lease_id).is_some();
        if removed {
            tracing::info!(lease_id, "[MockLeaseServer] Lease revoked");
        }
        removed
    }

    /// Revoke every lease.
    pub fn revoke_all(&self) -> usize {
        let mut state = self.lock();
        let count = state.leases.len();
        state.leases.clear();
        tracing::info!(count, "[MockLeaseServer] All leases revoked");
        count
    }

    /// Ids of the leases currently held.
    pub fn active_leases(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().leases.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of seats in use.
    pub fn seats_in_use(&self) -> u32 {
        self.lock().leases.len() as u32
    }

    /// Number of grant calls received.
    pub fn grant_calls(&self) -> u32 {
        self.grant_calls.load(Ordering::SeqCst)
    }

    /// Number of renew calls received.
    pub fn renew_calls(&self) -> u32 {
        self.renew_calls.load(Ordering::SeqCst)
    }

    /// Number of release calls received.
    pub fn release_calls(&self) -> u32 {
        self.release_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) -> LeaseResult<()> {
        let (latency, failure) = {
            let state = self.lock();
            (state.latency, state.failure.clone())
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn server_now(state: &MockState) -> chrono::DateTime<Utc> {
        Utc::now() + state.clock_skew
    }
}

impl Default for MockLeaseServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaseTransport for MockLeaseServer {
    async fn grant(&self, ctx: &TransportContext, request: &LeaseRequest) -> LeaseResult<Grant> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await?;

        let mut state = self.lock();

        if let Some(expected) = state.server_uuid {
            if ctx.endpoint.server_uuid() != Some(expected) {
                return Err(LeaseError::ServerUuidMismatch);
            }
        }

        if let Some(products) = &state.products {
            if !products.contains(&request.product_guid) {
                tracing::warn!(
                    product = %request.product_guid,
                    "[MockLeaseServer] Grant denied: product not served"
                );
                return Err(LeaseError::WrongServerProduct);
            }
        }

        if let Some(users) = &state.allowed_users {
            if !users.contains(&request.username) {
                return Err(LeaseError::UsernameNotAllowed);
            }
        }

        // A client that already holds a seat gets the same lease back.
        let existing = state
            .leases
            .iter()
            .find(|(_, lease)| lease.client_id == request.client_id)
            .map(|(id, _)| id.clone());

        let lease_id = match existing {
            Some(id) => id,
            None => {
                if state.leases.len() as u32 >= state.total_seats {
                    tracing::warn!(
                        used = state.leases.len(),
                        total = state.total_seats,
                        "[MockLeaseServer] Grant denied: no free seats"
                    );
                    return Err(LeaseError::NoFreeLeases);
                }
                let id = format!("lease-{}", state.next_id);
                state.next_id += 1;
                state.leases.insert(
                    id.clone(),
                    MockLease {
                        client_id: request.client_id,
                        username: request.username.clone(),
                        features_changed: false,
                    },
                );
                id
            }
        };

        tracing::info!(
            lease_id = %lease_id,
            used = state.leases.len(),
            total = state.total_seats,
            "[MockLeaseServer] Lease granted"
        );

        Ok(Grant {
            lease_id,
            server_time: Self::server_now(&state),
            lease_duration: state.lease_duration,
            features: state.features.clone(),
        })
    }

    async fn renew(&self, _ctx: &TransportContext, lease_id: &str) -> LeaseResult<RenewOutcome> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await?;

        let mut state = self.lock();
        let server_time = Self::server_now(&state);
        let lease_duration = state.lease_duration;
        let features = state.features.clone();

        let Some(lease) = state.leases.get_mut(lease_id) else {
            tracing::debug!(lease_id, "[MockLeaseServer] Renew for unknown lease");
            return Ok(RenewOutcome::Revoked);
        };

        let changed = std::mem::take(&mut lease.features_changed);
        tracing::debug!(lease_id, user = %lease.username, changed, "[MockLeaseServer] Lease renewed");

        Ok(RenewOutcome::Renewed(Renewal {
            server_time,
            lease_duration,
            features: changed.then_some(features),
        }))
    }

    async fn release(&self, _ctx: &TransportContext, lease_id: &str) -> LeaseResult<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await?;

        let mut state = self.lock();
        if state.leases.remove(lease_id).is_none() {
            tracing::warn!(lease_id, "[MockLeaseServer] Release for unknown lease");
            return Err(LeaseError::NoLease);
        }

        tracing::info!(
            lease_id,
            remaining = state.leases.len(),
            "[MockLeaseServer] Lease released"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use floatlease_core::types::{SaveFlags, ServerEndpoint};

    use super::*;

    fn ctx() -> TransportContext {
        TransportContext {
            endpoint: ServerEndpoint::new("127.0.0.1", 13, SaveFlags::USER).unwrap(),
            proxy: None,
        }
    }

    fn request() -> LeaseRequest {
        LeaseRequest {
            product_guid: "guid".to_string(),
            product_version: "1.0".to_string(),
            client_id: Uuid::new_v4(),
            username: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_seat_pool_exhaustion() {
        let server = MockLeaseServer::with_seats(1);
        server.grant(&ctx(), &request()).await.unwrap();
        let err = server.grant(&ctx(), &request()).await.unwrap_err();
        assert_eq!(err, LeaseError::NoFreeLeases);
        assert_eq!(server.seats_in_use(), 1);
    }

    #[tokio::test]
    async fn test_same_client_gets_same_lease() {
        let server = MockLeaseServer::with_seats(1);
        let req = request();
        let first = server.grant(&ctx(), &req).await.unwrap();
        let second = server.grant(&ctx(), &req).await.unwrap();
        assert_eq!(first.lease_id, second.lease_id);
    }

    #[tokio::test]
    async fn test_release_frees_seat() {
        let server = MockLeaseServer::with_seats(1);
        let grant = server.grant(&ctx(), &request()).await.unwrap();
        server.release(&ctx(), &grant.lease_id).await.unwrap();
        assert_eq!(server.seats_in_use(), 0);
        assert_eq!(
            server.release(&ctx(), &grant.lease_id).await,
            Err(LeaseError::NoLease)
        );
    }

    #[tokio::test]
    async fn test_feature_change_reported_once() {
        let server = MockLeaseServer::new();
        server.set_feature("edition", "pro");
        let grant = server.grant(&ctx(), &request()).await.unwrap();
        assert_eq!(grant.features.get("edition").map(String::as_str), Some("pro"));

        let RenewOutcome::Renewed(renewal) = server.renew(&ctx(), &grant.lease_id).await.unwrap()
        else {
            panic!("expected renewal");
        };
        assert!(renewal.features.is_none());

        server.set_feature("edition", "enterprise");
        let RenewOutcome::Renewed(renewal) = server.renew(&ctx(), &grant.lease_id).await.unwrap()
        else {
            panic!("expected renewal");
        };
        assert_eq!(
            renewal.features.unwrap().get("edition").map(String::as_str),
            Some("enterprise")
        );
    }

    #[tokio::test]
    async fn test_revoked_lease_renews_as_revoked() {
        let server = MockLeaseServer::new();
        let grant = server.grant(&ctx(), &request()).await.unwrap();
        assert!(server.revoke(&grant.lease_id));
        assert!(matches!(
            server.renew(&ctx(), &grant.lease_id).await.unwrap(),
            RenewOutcome::Revoked
        ));
    }

    #[tokio::test]
    async fn test_configuration_mismatches() {
        let server = MockLeaseServer::new();
        server.serve_products(&["other"]);
        assert_eq!(
            server.grant(&ctx(), &request()).await.unwrap_err(),
            LeaseError::WrongServerProduct
        );

        let server = MockLeaseServer::new();
        server.allow_users(&["bob"]);
        assert_eq!(
            server.grant(&ctx(), &request()).await.unwrap_err(),
            LeaseError::UsernameNotAllowed
        );

        let server = MockLeaseServer::new();
        server.set_server_uuid(Uuid::new_v4());
        assert_eq!(
            server.grant(&ctx(), &request()).await.unwrap_err(),
            LeaseError::ServerUuidMismatch
        );
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let server = MockLeaseServer::new();
        server.go_offline();
        assert_eq!(
            server.grant(&ctx(), &request()).await.unwrap_err(),
            LeaseError::Inet
        );
        server.come_online();
        assert!(server.grant(&ctx(), &request()).await.is_ok());
        assert_eq!(server.grant_calls(), 2);
    }
}
