// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::media::{ContentFocus, MediaObject};
use super::profile::{Profile, ProfileId};
use super::reaction::ReactionType;

pub type PublicationId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationKind {
    Post,
    Comment { parent_id: PublicationId },
}

/// Body of a publication as delivered by the network.
///
/// Encrypted bodies are opaque markers: they are never rendered, only handed
/// to the gateway for decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublicationContent {
    Plaintext { text: String },
    Encrypted { ciphertext: String },
}

/// Condition a viewer must meet to decrypt a gated publication
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateCriteria {
    #[default]
    None,
    FollowProfile { profile_id: ProfileId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectState {
    CanCollect,
    TimeExpired,
    LimitReached,
    NotAFollower,
    CannotCollect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectPolicy {
    pub state: CollectState,
    #[serde(default)]
    pub fee: Option<Amount>,
    #[serde(default)]
    pub collect_limit: Option<u64>,
}

impl CollectPolicy {
    /// Policy for publications that cannot be collected at all
    pub fn disabled() -> Self {
        Self {
            state: CollectState::CannotCollect,
            fee: None,
            collect_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublicationStats {
    pub comments: u64,
    pub mirrors: u64,
    pub upvotes: u64,
    pub collects: u64,
}

/// A post or comment as seen by the current viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: PublicationId,
    pub kind: PublicationKind,
    pub author: Profile,
    pub content: PublicationContent,
    #[serde(default)]
    pub media: Vec<MediaObject>,
    #[serde(default)]
    pub content_focus: ContentFocus,
    pub is_gated: bool,
    #[serde(default)]
    pub gate_criteria: GateCriteria,
    /// Server hint that the viewer meets the gate criteria
    pub observer_can_decrypt: bool,
    pub collect_policy: CollectPolicy,
    #[serde(default)]
    pub stats: PublicationStats,
    pub is_mirrored_by_me: bool,
    pub has_collected_by_me: bool,
    /// Reactions the viewer currently has on this publication
    #[serde(default)]
    pub reactions_by_me: Vec<ReactionType>,
    pub created_at: DateTime<Utc>,
}

impl Publication {
    pub fn has_reacted(&self, reaction: ReactionType) -> bool {
        self.reactions_by_me.contains(&reaction)
    }

    /// Plaintext body, only for publications that are not gated.
    ///
    /// Gated publications never expose their body here, even when the
    /// network happened to deliver it unencrypted.
    pub fn public_text(&self) -> Option<&str> {
        if self.is_gated {
            return None;
        }
        match &self.content {
            PublicationContent::Plaintext { text } => Some(text),
            PublicationContent::Encrypted { .. } => None,
        }
    }
}

/// Payload for creating a post or comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPublication {
    pub kind: PublicationKind,
    pub content: String,
    pub media: Vec<MediaObject>,
    pub content_focus: ContentFocus,
    /// `FollowProfile` makes the publication gated (followers only)
    pub gate: GateCriteria,
    pub collect_policy: CollectPolicy,
    pub locale: String,
    /// Uploaded metadata document describing the publication
    #[serde(default)]
    pub content_uri: Option<String>,
}
