// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use super::amount::Amount;

pub type ProfileId = String;

/// Rule governing who may follow a profile and at what price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowPolicy {
    /// Anyone may follow for free
    Open,
    /// Following costs a fee paid through the follow module contract
    Charge(ChargeFollowPolicy),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeFollowPolicy {
    /// Fee and the currency it is charged in
    pub amount: Amount,
    /// Address that ultimately receives the fee
    pub payee_address: String,
    /// Follow module contract that pulls the fee (the allowance spender)
    pub contract_address: String,
}

/// Server-computed follow permissions of the viewer towards a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FollowEligibility {
    pub can_follow: bool,
    pub can_unfollow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileStats {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

/// A profile as seen by the current viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub handle: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub follow_policy: FollowPolicy,
    pub is_followed_by_me: bool,
    pub follow_eligibility: FollowEligibility,
    pub owned_by_viewer: bool,
    #[serde(default)]
    pub stats: ProfileStats,
    /// Resolved URL of the avatar image
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub cover_picture: Option<String>,
}

impl Profile {
    /// Name shown in notifications, falling back to the handle
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(self.handle.as_str())
    }

    /// The charge terms, if following this profile costs a fee
    pub fn charge_policy(&self) -> Option<&ChargeFollowPolicy> {
        match &self.follow_policy {
            FollowPolicy::Charge(policy) => Some(policy),
            FollowPolicy::Open => None,
        }
    }
}

/// Profile metadata written by `update_profile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub name: String,
    pub bio: String,
    pub cover_picture: Option<String>,
}

/// Follow policy requested by a profile owner.
///
/// The protocol picks the follow module contract for a charge policy, so only
/// the fee and the wallet receiving it are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowPolicyUpdate {
    Open,
    Charge { amount: Amount, recipient: String },
}

/// One page of a follower or following list
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfilePage {
    pub profiles: Vec<Profile>,
    /// Pass back to fetch the next page; `None` on the last one
    pub next_cursor: Option<String>,
}
