// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use mys_social_client::error::GatewayError;
use mys_social_client::gateway::{CollectRules, GatewayOperation, InMemoryGateway, PublicationSeed};
use mys_social_client::interaction::{InteractionKind, InteractionStateMachine};
use mys_social_client::models::{FollowPolicy, ReactionRecord, ReactionType};
use mys_social_client::notify::{ActionOutcome, Notification, SuppressReason};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_test::traced_test;

async fn machine_for(
    gateway: &Arc<InMemoryGateway>,
    seed: PublicationSeed,
) -> (InteractionStateMachine, UnboundedReceiver<Notification>, String) {
    let id = gateway.insert_publication(seed).await;
    let publication = publication_for_viewer(gateway, &id).await;
    let (notifier, rx) = notifier();
    gateway.clear_calls().await;
    (InteractionStateMachine::new(shared(gateway), notifier, publication), rx, id)
}

fn title(outcome: &ActionOutcome) -> Option<&str> {
    outcome.notification().map(|n| n.title.as_str())
}

#[tokio::test]
#[traced_test]
async fn upvote_toggles_on_and_off() {
    let gateway = sandbox().await;
    let (machine, mut rx, _) = machine_for(&gateway, PublicationSeed::post(AUTHOR, "gm")).await;
    let capability = viewer();

    let added = machine.toggle_reaction(Some(&capability), ReactionType::Upvote).await;
    assert_eq!(title(&added), Some("Added upvote"));
    let view = machine.view().await;
    assert!(view.upvoted);
    assert_eq!(view.stats.upvotes, 1);
    assert!(view.in_flight.is_empty());

    let removed = machine.toggle_reaction(Some(&capability), ReactionType::Upvote).await;
    assert_eq!(title(&removed), Some("Removed upvote"));
    assert!(!machine.is_active(InteractionKind::Reaction(ReactionType::Upvote)).await);
    assert_eq!(machine.view().await.stats.upvotes, 0);

    assert_eq!(
        gateway.operations().await,
        vec![
            GatewayOperation::AddReaction,
            GatewayOperation::GetPublication,
            GatewayOperation::RemoveReaction,
            GatewayOperation::GetPublication,
        ]
    );
    assert_eq!(drain(&mut rx).len(), 2);
}

#[tokio::test]
async fn existing_reaction_is_only_removed() {
    let gateway = sandbox().await;
    let id = gateway.insert_publication(PublicationSeed::post(AUTHOR, "gm")).await;
    gateway
        .insert_reaction(ReactionRecord {
            publication_id: id.clone(),
            profile_id: VIEWER.to_string(),
            reaction: ReactionType::Upvote,
        })
        .await;
    let publication = publication_for_viewer(&gateway, &id).await;
    let (notifier, _rx) = notifier();
    let machine = InteractionStateMachine::new(shared(&gateway), notifier, publication);
    gateway.clear_calls().await;

    machine.toggle_reaction(Some(&viewer()), ReactionType::Upvote).await;

    assert_eq!(gateway.count(GatewayOperation::AddReaction).await, 0);
    assert_eq!(gateway.count(GatewayOperation::RemoveReaction).await, 1);
    assert!(gateway.reaction_records().await.is_empty());
}

#[tokio::test]
async fn failed_reaction_restores_previous_state() {
    let gateway = sandbox().await;
    let (machine, mut rx, _) = machine_for(&gateway, PublicationSeed::post(AUTHOR, "gm")).await;
    gateway
        .fail_next(GatewayOperation::AddReaction, GatewayError::Transient("timeout".into()))
        .await;

    let outcome = machine.toggle_reaction(Some(&viewer()), ReactionType::Upvote).await;

    assert!(outcome.is_failed());
    assert_eq!(title(&outcome), Some("Failed to upvote"));
    let view = machine.view().await;
    assert!(!view.upvoted);
    assert!(view.in_flight.is_empty());
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
#[traced_test]
async fn mirror_of_protected_publication_is_reported() {
    let gateway = sandbox().await;
    let (machine, mut rx, _) =
        machine_for(&gateway, PublicationSeed::post(AUTHOR, "mine").without_mirroring()).await;

    let outcome = machine.mirror(Some(&viewer())).await;

    let notification = outcome.notification().cloned().expect("failure notification");
    assert!(notification.is_destructive());
    assert!(notification
        .description
        .unwrap_or_default()
        .contains("disabled mirroring"));
    assert!(!machine.publication().await.is_mirrored_by_me);
    assert!(!machine.view().await.mirrored);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn mirror_happens_once() {
    let gateway = sandbox().await;
    let (machine, _rx, _) = machine_for(&gateway, PublicationSeed::post(AUTHOR, "share me")).await;
    let capability = viewer();

    let first = machine.mirror(Some(&capability)).await;
    assert_eq!(title(&first), Some("Mirrored post"));
    assert_eq!(machine.view().await.stats.mirrors, 1);

    let second = machine.mirror(Some(&capability)).await;
    assert_eq!(second, ActionOutcome::Suppressed(SuppressReason::AlreadyMirrored));
    assert_eq!(gateway.count(GatewayOperation::CreateMirror).await, 1);
}

#[tokio::test]
async fn collect_by_non_follower_never_reaches_gateway() {
    let gateway = sandbox().await;
    let (machine, mut rx, _) = machine_for(
        &gateway,
        PublicationSeed::post(AUTHOR, "for fans").with_collect(CollectRules::open().followers_only()),
    )
    .await;

    let outcome = machine.collect(Some(&viewer())).await;

    assert!(outcome.is_failed());
    assert_eq!(title(&outcome), Some("You need to follow to collect this post."));
    assert!(gateway.calls().await.is_empty());
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn collect_past_limit_is_denied_locally() {
    let gateway = sandbox().await;
    let id = gateway
        .insert_publication(PublicationSeed::post(AUTHOR, "one of one").with_collect(CollectRules::open().with_limit(1)))
        .await;
    {
        use mys_social_client::gateway::RemoteActionGateway;
        gateway
            .collect(&OTHER.to_string(), &id)
            .await
            .expect("first collect succeeds");
    }
    let publication = publication_for_viewer(&gateway, &id).await;
    let (notifier, _rx) = notifier();
    let machine = InteractionStateMachine::new(shared(&gateway), notifier, publication);
    gateway.clear_calls().await;

    let outcome = machine.collect(Some(&viewer())).await;

    assert_eq!(title(&outcome), Some("This post has reached its collect limit."));
    assert!(gateway.calls().await.is_empty());
}

#[tokio::test]
async fn collect_succeeds_once() {
    let gateway = sandbox().await;
    let (machine, _rx, _) = machine_for(
        &gateway,
        PublicationSeed::post(AUTHOR, "collect me").with_collect(CollectRules::open()),
    )
    .await;
    let capability = viewer();

    let outcome = machine.collect(Some(&capability)).await;
    assert_eq!(title(&outcome), Some("Collected post"));
    assert!(machine.view().await.collected);

    let again = machine.collect(Some(&capability)).await;
    assert_eq!(again, ActionOutcome::Suppressed(SuppressReason::AlreadyCollected));
    assert_eq!(gateway.count(GatewayOperation::Collect).await, 1);
}

#[tokio::test]
async fn toggles_are_independent_and_not_reentrant() {
    let gateway = sandbox_with(InMemoryGateway::new().with_latency(LATENCY), FollowPolicy::Open).await;
    let (machine, mut rx, _) = machine_for(&gateway, PublicationSeed::post(AUTHOR, "gm")).await;
    let capability = viewer();

    let (upvote, repeat, mirror) = tokio::join!(
        machine.toggle_reaction(Some(&capability), ReactionType::Upvote),
        machine.toggle_reaction(Some(&capability), ReactionType::Upvote),
        machine.mirror(Some(&capability)),
    );

    assert!(upvote.is_confirmed());
    assert_eq!(repeat, ActionOutcome::Suppressed(SuppressReason::InFlight));
    assert!(mirror.is_confirmed());
    assert_eq!(gateway.count(GatewayOperation::AddReaction).await, 1);
    assert_eq!(gateway.count(GatewayOperation::RemoveReaction).await, 0);
    assert_eq!(drain(&mut rx).len(), 2);
}

#[tokio::test]
async fn pending_toggle_shows_target_value() {
    let gateway = sandbox_with(InMemoryGateway::new().with_latency(LATENCY), FollowPolicy::Open).await;
    let (machine, _rx, _) = machine_for(&gateway, PublicationSeed::post(AUTHOR, "gm")).await;
    let capability = viewer();
    let kind = InteractionKind::Reaction(ReactionType::Downvote);

    let (_, (active, in_flight)) = tokio::join!(
        machine.toggle_reaction(Some(&capability), ReactionType::Downvote),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            (machine.is_active(kind).await, machine.is_in_flight(kind).await)
        }
    );

    assert!(active);
    assert!(in_flight);
    assert!(!machine.is_in_flight(kind).await);
}

#[tokio::test]
async fn signed_out_actions_are_suppressed() {
    let gateway = sandbox().await;
    let (machine, mut rx, _) = machine_for(&gateway, PublicationSeed::post(AUTHOR, "gm")).await;

    assert_eq!(
        machine.toggle_reaction(None, ReactionType::Upvote).await,
        ActionOutcome::Suppressed(SuppressReason::SignedOut)
    );
    assert_eq!(
        machine.mirror(None).await,
        ActionOutcome::Suppressed(SuppressReason::SignedOut)
    );
    assert_eq!(
        machine.collect(None).await,
        ActionOutcome::Suppressed(SuppressReason::SignedOut)
    );
    assert!(gateway.calls().await.is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn confirmed_value_survives_failed_refetch() {
    let gateway = sandbox().await;
    let (machine, _rx, _) = machine_for(&gateway, PublicationSeed::post(AUTHOR, "gm")).await;
    gateway
        .fail_next(GatewayOperation::GetPublication, GatewayError::Transient("timeout".into()))
        .await;

    let outcome = machine.toggle_reaction(Some(&viewer()), ReactionType::Upvote).await;

    assert!(outcome.is_confirmed());
    let view = machine.view().await;
    assert!(view.upvoted);
    // counts only move with a fetched snapshot
    assert_eq!(view.stats.upvotes, 0);

    let fresh = publication_for_viewer(&gateway, &machine.publication().await.id).await;
    machine.refresh(fresh).await;
    assert_eq!(machine.view().await.stats.upvotes, 1);
}

#[tokio::test]
async fn closed_machine_still_notifies_but_keeps_state() {
    let gateway = sandbox_with(InMemoryGateway::new().with_latency(LATENCY), FollowPolicy::Open).await;
    let (machine, mut rx, _) = machine_for(&gateway, PublicationSeed::post(AUTHOR, "gm")).await;
    let capability = viewer();

    let (outcome, _) = tokio::join!(
        machine.toggle_reaction(Some(&capability), ReactionType::Upvote),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            machine.close().await;
        }
    );

    assert!(outcome.is_confirmed());
    assert_eq!(drain(&mut rx).len(), 1);
    assert!(machine.publication().await.reactions_by_me.is_empty());
    assert_eq!(
        machine.toggle_reaction(Some(&capability), ReactionType::Upvote).await,
        ActionOutcome::Suppressed(SuppressReason::Closed)
    );
}
