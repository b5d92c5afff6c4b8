// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

mod memory;
mod rpc;

pub use memory::{
    CollectRules, GatewayCall, GatewayOperation, InMemoryGateway, ProfileSeed, PublicationSeed,
    SANDBOX_FOLLOW_MODULE,
};
pub use rpc::RpcGateway;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;
use crate::models::{
    AllowanceGrant, Amount, FollowPolicyUpdate, NewPublication, Profile, ProfileDetails, ProfileId,
    ProfilePage, Publication, PublicationId, ReactionType,
};

/// Data handed to the content-addressed store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadPayload {
    Bytes { data: Vec<u8>, mime: String },
    Json { value: serde_json::Value },
}

/// Remote protocol operations the client depends on.
///
/// Every call expresses an intent and returns its result; callers decide how
/// failures are surfaced. Reads take the observer so that viewer-relative
/// fields (`is_followed_by_me`, `observer_can_decrypt`, ...) are computed
/// remotely.
#[async_trait]
pub trait RemoteActionGateway: Send + Sync {
    async fn get_profile(&self, handle: &str, observer: Option<&ProfileId>) -> GatewayResult<Profile>;

    async fn get_profile_by_id(&self, id: &ProfileId, observer: Option<&ProfileId>) -> GatewayResult<Profile>;

    /// Profiles following `profile`, `limit` at a time
    async fn list_followers(
        &self,
        profile: &ProfileId,
        observer: Option<&ProfileId>,
        cursor: Option<&str>,
        limit: usize,
    ) -> GatewayResult<ProfilePage>;

    /// Profiles that `profile` follows
    async fn list_following(
        &self,
        profile: &ProfileId,
        observer: Option<&ProfileId>,
        cursor: Option<&str>,
        limit: usize,
    ) -> GatewayResult<ProfilePage>;

    async fn get_publication(
        &self,
        id: &PublicationId,
        observer: Option<&ProfileId>,
    ) -> GatewayResult<Publication>;

    /// Follow `followee`; `fee` is the charge being paid, if any
    async fn follow(
        &self,
        followee: &ProfileId,
        follower: &ProfileId,
        fee: Option<&Amount>,
    ) -> GatewayResult<()>;

    async fn unfollow(&self, followee: &ProfileId, follower: &ProfileId) -> GatewayResult<()>;

    async fn add_reaction(
        &self,
        publication: &PublicationId,
        profile: &ProfileId,
        reaction: ReactionType,
    ) -> GatewayResult<()>;

    async fn remove_reaction(
        &self,
        publication: &PublicationId,
        profile: &ProfileId,
        reaction: ReactionType,
    ) -> GatewayResult<()>;

    async fn create_mirror(&self, publisher: &ProfileId, publication: &PublicationId) -> GatewayResult<()>;

    async fn collect(&self, collector: &ProfileId, publication: &PublicationId) -> GatewayResult<()>;

    /// Decrypt a gated publication for `viewer`, returning its plaintext
    async fn decrypt(&self, viewer: &ProfileId, publication: &Publication) -> GatewayResult<String>;

    /// Submit an allowance from the wallet at `owner`
    async fn approve_allowance(&self, owner: &str, grant: &AllowanceGrant) -> GatewayResult<()>;

    /// Store the payload and return its content URI
    async fn upload(&self, payload: UploadPayload) -> GatewayResult<String>;

    async fn create_publication(
        &self,
        publisher: &ProfileId,
        publication: &NewPublication,
    ) -> GatewayResult<Publication>;

    async fn update_profile(&self, profile: &ProfileId, details: &ProfileDetails) -> GatewayResult<()>;

    /// Point the avatar of `profile` at an uploaded image
    async fn update_profile_image(&self, profile: &ProfileId, image_uri: &str) -> GatewayResult<()>;

    async fn update_follow_policy(&self, profile: &ProfileId, policy: &FollowPolicyUpdate) -> GatewayResult<()>;
}

pub type SharedGateway = Arc<dyn RemoteActionGateway>;
