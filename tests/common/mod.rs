// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mys_social_client::gateway::{InMemoryGateway, ProfileSeed, SharedGateway};
use mys_social_client::models::{Amount, ChargeFollowPolicy, Currency, FollowPolicy, Profile, Publication};
use mys_social_client::notify::{Notification, Notifier};
use mys_social_client::session::{Capability, SessionContext};
use tokio::sync::mpsc::UnboundedReceiver;

pub const VIEWER: &str = "0x01";
pub const VIEWER_ADDRESS: &str = "0x1111111111111111111111111111111111111111";
pub const AUTHOR: &str = "0x02";
pub const AUTHOR_HANDLE: &str = "stani";
pub const OTHER: &str = "0x03";
pub const FOLLOW_MODULE: &str = "0x4444444444444444444444444444444444444444";
pub const WMATIC_ADDRESS: &str = "0x9c3c9283d3e44854697cd22d3faa240cfb032889";

/// Artificial gateway latency for tests that need overlapping calls
pub const LATENCY: Duration = Duration::from_millis(30);

pub fn wmatic() -> Currency {
    Currency::new("WMATIC", WMATIC_ADDRESS, 18)
}

pub fn follow_fee() -> Amount {
    Amount::new(5, wmatic())
}

pub fn charge_policy() -> FollowPolicy {
    FollowPolicy::Charge(ChargeFollowPolicy {
        amount: follow_fee(),
        payee_address: "0x2222222222222222222222222222222222222222".to_string(),
        contract_address: FOLLOW_MODULE.to_string(),
    })
}

pub fn viewer() -> Capability {
    SessionContext::signed_in(VIEWER, VIEWER_ADDRESS)
        .capability()
        .expect("signed-in session has a capability")
}

pub fn viewer_id() -> String {
    VIEWER.to_string()
}

/// Sandbox with the viewer, an author under `policy` and a bystander
pub async fn sandbox_with(gateway: InMemoryGateway, policy: FollowPolicy) -> Arc<InMemoryGateway> {
    gateway
        .insert_profile(ProfileSeed::open(VIEWER, "me", VIEWER_ADDRESS).with_name("Me"))
        .await;
    gateway
        .insert_profile(
            ProfileSeed::open(AUTHOR, AUTHOR_HANDLE, "0x2222222222222222222222222222222222222222")
                .with_name("Stani")
                .with_policy(policy),
        )
        .await;
    gateway
        .insert_profile(ProfileSeed::open(OTHER, "aave", "0x3333333333333333333333333333333333333333"))
        .await;
    Arc::new(gateway)
}

pub async fn sandbox() -> Arc<InMemoryGateway> {
    sandbox_with(InMemoryGateway::new(), FollowPolicy::Open).await
}

pub fn shared(gateway: &Arc<InMemoryGateway>) -> SharedGateway {
    gateway.clone()
}

pub async fn profile_for_viewer(gateway: &InMemoryGateway, handle: &str) -> Profile {
    use mys_social_client::gateway::RemoteActionGateway;
    gateway
        .get_profile(handle, Some(&viewer_id()))
        .await
        .expect("seeded profile")
}

pub async fn publication_for_viewer(gateway: &InMemoryGateway, id: &str) -> Publication {
    use mys_social_client::gateway::RemoteActionGateway;
    gateway
        .get_publication(&id.to_string(), Some(&viewer_id()))
        .await
        .expect("seeded publication")
}

pub fn notifier() -> (Notifier, UnboundedReceiver<Notification>) {
    Notifier::channel()
}

/// Everything delivered so far, without waiting
pub fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}
