// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;

use bigdecimal::BigDecimal;
use common::*;
use mys_social_client::editor::{FollowPolicyChoice, ProfileEdit, ProfileEditor};
use mys_social_client::error::GatewayError;
use mys_social_client::follow::FollowController;
use mys_social_client::gateway::{
    GatewayCall, GatewayOperation, InMemoryGateway, RemoteActionGateway, SANDBOX_FOLLOW_MODULE,
};
use mys_social_client::models::FollowPolicy;
use mys_social_client::notify::{ActionOutcome, Notification, SuppressReason};
use mys_social_client::publish::MediaFile;
use mys_social_client::session::{Capability, SessionContext};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_test::traced_test;

const AUTHOR_ADDRESS: &str = "0x2222222222222222222222222222222222222222";
const IPFS_GATEWAY: &str = "https://gateway.ipfscdn.io/ipfs";

fn author() -> Capability {
    SessionContext::signed_in(AUTHOR, AUTHOR_ADDRESS)
        .capability()
        .expect("signed-in session has a capability")
}

fn png() -> MediaFile {
    MediaFile {
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
        mime: "image/png".to_string(),
    }
}

/// Editor for the author's own profile, with recorded calls cleared
async fn author_editor(gateway: &Arc<InMemoryGateway>) -> (ProfileEditor, UnboundedReceiver<Notification>) {
    let profile = gateway
        .get_profile_by_id(&AUTHOR.to_string(), Some(&AUTHOR.to_string()))
        .await
        .expect("seeded author");
    assert!(profile.owned_by_viewer);
    gateway.clear_calls().await;

    let (notifier, rx) = notifier();
    (ProfileEditor::new(shared(gateway), notifier, profile, IPFS_GATEWAY, wmatic()), rx)
}

fn title(outcome: &ActionOutcome) -> Option<&str> {
    outcome.notification().map(|n| n.title.as_str())
}

#[tokio::test]
#[traced_test]
async fn setting_a_price_makes_follows_paid() {
    let gateway = sandbox().await;
    let (editor, mut rx) = author_editor(&gateway).await;

    let outcome = editor
        .save(
            Some(&author()),
            ProfileEdit {
                follow_policy: Some(FollowPolicyChoice::Charge(BigDecimal::from(5))),
                ..ProfileEdit::default()
            },
        )
        .await;

    assert_eq!(title(&outcome), Some("Profile updated Successfully."));
    assert_eq!(
        gateway.operations().await,
        vec![GatewayOperation::UpdateFollowPolicy, GatewayOperation::GetProfileById]
    );
    let saved = editor.profile().await;
    let policy = saved.charge_policy().expect("charge policy after save");
    assert_eq!(policy.amount, follow_fee());
    assert_eq!(policy.payee_address, AUTHOR_ADDRESS);
    assert_eq!(drain(&mut rx).len(), 1);

    // a viewer now goes through the allowance step
    gateway.clear_calls().await;
    let (notifier, _rx) = notifier();
    let follow = FollowController::new(
        shared(&gateway),
        notifier,
        profile_for_viewer(&gateway, AUTHOR_HANDLE).await,
    );
    assert!(follow.click(Some(&viewer())).await.is_confirmed());

    let calls = gateway.calls().await;
    assert!(matches!(
        &calls[0],
        GatewayCall::ApproveAllowance { grant, .. } if grant.spender == SANDBOX_FOLLOW_MODULE
    ));
    assert!(matches!(&calls[1], GatewayCall::Follow { fee: Some(fee), .. } if *fee == follow_fee()));
    assert!(gateway.is_following(VIEWER, AUTHOR).await);
}

#[tokio::test]
async fn switching_back_to_open_clears_the_fee() {
    let gateway = sandbox_with(InMemoryGateway::new(), charge_policy()).await;
    let (editor, _rx) = author_editor(&gateway).await;

    let outcome = editor
        .save(
            Some(&author()),
            ProfileEdit {
                follow_policy: Some(FollowPolicyChoice::Open),
                ..ProfileEdit::default()
            },
        )
        .await;

    assert!(outcome.is_confirmed(), "{:?}", outcome);
    assert_eq!(editor.profile().await.follow_policy, FollowPolicy::Open);
    assert_eq!(profile_for_viewer(&gateway, AUTHOR_HANDLE).await.follow_policy, FollowPolicy::Open);
}

#[tokio::test]
async fn images_are_uploaded_before_details_are_written() {
    let gateway = sandbox().await;
    let (editor, _rx) = author_editor(&gateway).await;

    let outcome = editor
        .save(
            Some(&author()),
            ProfileEdit {
                name: Some("Stani K".to_string()),
                picture: Some(png()),
                cover_picture: Some(png()),
                ..ProfileEdit::default()
            },
        )
        .await;
    assert!(outcome.is_confirmed(), "{:?}", outcome);

    assert_eq!(
        gateway.operations().await,
        vec![
            GatewayOperation::Upload,
            GatewayOperation::Upload,
            GatewayOperation::UpdateProfile,
            GatewayOperation::UpdateProfileImage,
            GatewayOperation::GetProfileById,
        ]
    );

    let saved = editor.profile().await;
    assert_eq!(saved.display_name(), "Stani K");
    assert!(saved.picture.unwrap_or_default().starts_with(IPFS_GATEWAY));
    assert!(saved.cover_picture.unwrap_or_default().starts_with(IPFS_GATEWAY));
}

#[tokio::test]
async fn failed_step_stops_the_save() {
    let gateway = sandbox().await;
    let (editor, mut rx) = author_editor(&gateway).await;
    gateway
        .fail_next(GatewayOperation::UpdateProfile, GatewayError::Transient("timeout".into()))
        .await;

    let outcome = editor
        .save(
            Some(&author()),
            ProfileEdit {
                bio: Some("Building in public".to_string()),
                follow_policy: Some(FollowPolicyChoice::Charge(BigDecimal::from(5))),
                ..ProfileEdit::default()
            },
        )
        .await;

    assert!(outcome.is_failed());
    let notification = outcome.notification().cloned().expect("failure notification");
    assert_eq!(notification.title, "Something went wrong. Please try again later.");
    assert!(notification.description.unwrap_or_default().contains("timeout"));
    assert_eq!(gateway.count(GatewayOperation::UpdateFollowPolicy).await, 0);
    assert_eq!(gateway.count(GatewayOperation::GetProfileById).await, 1);
    assert_eq!(editor.profile().await.follow_policy, FollowPolicy::Open);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn invalid_input_is_reported_without_calls() {
    let gateway = sandbox().await;
    let (editor, mut rx) = author_editor(&gateway).await;

    let short = editor
        .save(
            Some(&author()),
            ProfileEdit {
                name: Some("St".to_string()),
                ..ProfileEdit::default()
            },
        )
        .await;
    assert!(short.is_failed());
    assert!(short
        .notification()
        .and_then(|n| n.description.clone())
        .unwrap_or_default()
        .contains("between 3 and 20"));

    let document = editor
        .save(
            Some(&author()),
            ProfileEdit {
                picture: Some(MediaFile {
                    bytes: b"%PDF".to_vec(),
                    mime: "application/pdf".to_string(),
                }),
                ..ProfileEdit::default()
            },
        )
        .await;
    assert!(document.is_failed());

    assert!(gateway.calls().await.is_empty());
    assert_eq!(drain(&mut rx).len(), 2);
}

#[tokio::test]
async fn only_the_owner_with_changes_saves() {
    let gateway = sandbox().await;
    let (editor, mut rx) = author_editor(&gateway).await;
    let rename = || ProfileEdit {
        name: Some("Someone else".to_string()),
        ..ProfileEdit::default()
    };

    assert_eq!(
        editor.save(None, rename()).await,
        ActionOutcome::Suppressed(SuppressReason::SignedOut)
    );
    assert_eq!(
        editor.save(Some(&viewer()), rename()).await,
        ActionOutcome::Suppressed(SuppressReason::NotOwner)
    );
    assert_eq!(
        editor
            .save(
                Some(&author()),
                ProfileEdit {
                    name: Some("Stani".to_string()),
                    follow_policy: Some(FollowPolicyChoice::Open),
                    ..ProfileEdit::default()
                }
            )
            .await,
        ActionOutcome::Suppressed(SuppressReason::NoChanges)
    );

    // a profile fetched by someone else is never editable
    let (notifier, _rx) = notifier();
    let foreign = ProfileEditor::new(
        shared(&gateway),
        notifier,
        profile_for_viewer(&gateway, AUTHOR_HANDLE).await,
        IPFS_GATEWAY,
        wmatic(),
    );
    assert_eq!(
        foreign.save(Some(&author()), rename()).await,
        ActionOutcome::Suppressed(SuppressReason::NotOwner)
    );

    assert_eq!(gateway.count(GatewayOperation::UpdateProfile).await, 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn second_save_while_saving_is_ignored() {
    let gateway = sandbox_with(InMemoryGateway::new().with_latency(LATENCY), FollowPolicy::Open).await;
    let (editor, _rx) = author_editor(&gateway).await;
    let capability = author();
    let edit = ProfileEdit {
        bio: Some("gm".to_string()),
        ..ProfileEdit::default()
    };

    let (first, second) = tokio::join!(
        editor.save(Some(&capability), edit.clone()),
        editor.save(Some(&capability), edit.clone()),
    );

    assert!(first.is_confirmed());
    assert_eq!(second, ActionOutcome::Suppressed(SuppressReason::InFlight));
    assert_eq!(gateway.count(GatewayOperation::UpdateProfile).await, 1);
}
