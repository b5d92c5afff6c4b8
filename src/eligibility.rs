// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Pure eligibility rules for social actions.
//!
//! Nothing here performs I/O or mutates its inputs; profile and publication
//! snapshots are read-shared across every caller.

use crate::models::{CollectState, Profile, Publication};

/// Whether the follow button leads anywhere for this viewer.
///
/// Existing followers stay eligible even when the policy refuses new
/// follows, so they can still reach the unfollow path.
pub fn can_follow(profile: &Profile) -> bool {
    !profile.owned_by_viewer && (profile.follow_eligibility.can_follow || profile.is_followed_by_me)
}

pub fn can_unfollow(profile: &Profile) -> bool {
    profile.is_followed_by_me && profile.follow_eligibility.can_unfollow
}

/// Why a collect was refused before reaching the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Expired,
    LimitReached,
    NotAFollower,
    Disabled,
}

impl DenyReason {
    pub fn title(&self) -> &'static str {
        match self {
            DenyReason::Expired => "This post can no longer be collected.",
            DenyReason::LimitReached => "This post has reached its collect limit.",
            DenyReason::NotAFollower => "You need to follow to collect this post.",
            DenyReason::Disabled => "This post can't be collected.",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DenyReason::Expired => "The collect period for this post has ended.",
            DenyReason::LimitReached => "Every available copy has already been collected.",
            DenyReason::NotAFollower => "Only followers of the author can collect it.",
            DenyReason::Disabled => "The author has not enabled collecting.",
        }
    }
}

/// Single terminal outcome of a collect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectDecision {
    Proceed,
    Deny(DenyReason),
}

pub fn resolve_collect_action(publication: &Publication) -> CollectDecision {
    match publication.collect_policy.state {
        CollectState::CanCollect => CollectDecision::Proceed,
        CollectState::TimeExpired => CollectDecision::Deny(DenyReason::Expired),
        CollectState::LimitReached => CollectDecision::Deny(DenyReason::LimitReached),
        CollectState::NotAFollower => CollectDecision::Deny(DenyReason::NotAFollower),
        CollectState::CannotCollect => CollectDecision::Deny(DenyReason::Disabled),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptGate {
    ShouldDecrypt,
    Withhold,
}

/// Decide whether a decrypt should be started for `publication`.
///
/// `has_decrypted_view` is true when plaintext is already held for it.
pub fn decrypt_gate(publication: &Publication, has_decrypted_view: bool) -> DecryptGate {
    if publication.is_gated && publication.observer_can_decrypt && !has_decrypted_view {
        DecryptGate::ShouldDecrypt
    } else {
        DecryptGate::Withhold
    }
}
