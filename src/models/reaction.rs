// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

use super::profile::ProfileId;
use super::publication::PublicationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionType {
    Upvote,
    Downvote,
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactionType::Upvote => write!(f, "upvote"),
            ReactionType::Downvote => write!(f, "downvote"),
        }
    }
}

/// A reaction left by a profile on a publication.
///
/// Existence of the record means "has reacted"; toggling inserts or deletes
/// the record and never updates it in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub publication_id: PublicationId,
    pub profile_id: ProfileId,
    pub reaction: ReactionType,
}
