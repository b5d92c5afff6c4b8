// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{RemoteActionGateway, UploadPayload};
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::models::address::{is_valid_address, normalize_address};
use crate::models::{
    AllowanceGrant, Amount, ChargeFollowPolicy, CollectPolicy, CollectState, ContentFocus,
    FollowEligibility, FollowPolicy, FollowPolicyUpdate, GateCriteria, MediaObject, NewPublication,
    Profile, ProfileDetails, ProfileId, ProfilePage, ProfileStats, Publication, PublicationContent,
    PublicationId, PublicationKind, PublicationStats, ReactionRecord, ReactionType,
};

/// Follow module contract the sandbox assigns to charge policies
pub const SANDBOX_FOLLOW_MODULE: &str = "0x4444444444444444444444444444444444444444";

/// Remote operations, used to label recorded calls and injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOperation {
    GetProfile,
    GetProfileById,
    ListFollowers,
    ListFollowing,
    GetPublication,
    Follow,
    Unfollow,
    AddReaction,
    RemoveReaction,
    CreateMirror,
    Collect,
    Decrypt,
    ApproveAllowance,
    Upload,
    CreatePublication,
    UpdateProfile,
    UpdateProfileImage,
    UpdateFollowPolicy,
}

impl GatewayOperation {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayOperation::GetProfile => "get_profile",
            GatewayOperation::GetProfileById => "get_profile_by_id",
            GatewayOperation::ListFollowers => "list_followers",
            GatewayOperation::ListFollowing => "list_following",
            GatewayOperation::GetPublication => "get_publication",
            GatewayOperation::Follow => "follow",
            GatewayOperation::Unfollow => "unfollow",
            GatewayOperation::AddReaction => "add_reaction",
            GatewayOperation::RemoveReaction => "remove_reaction",
            GatewayOperation::CreateMirror => "create_mirror",
            GatewayOperation::Collect => "collect",
            GatewayOperation::Decrypt => "decrypt",
            GatewayOperation::ApproveAllowance => "approve_allowance",
            GatewayOperation::Upload => "upload",
            GatewayOperation::CreatePublication => "create_publication",
            GatewayOperation::UpdateProfile => "update_profile",
            GatewayOperation::UpdateProfileImage => "update_profile_image",
            GatewayOperation::UpdateFollowPolicy => "update_follow_policy",
        }
    }
}

/// A call received by the sandbox, with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    GetProfile { handle: String },
    GetProfileById { id: ProfileId },
    ListFollowers { profile: ProfileId, cursor: Option<String> },
    ListFollowing { profile: ProfileId, cursor: Option<String> },
    GetPublication { id: PublicationId },
    Follow { followee: ProfileId, follower: ProfileId, fee: Option<Amount> },
    Unfollow { followee: ProfileId, follower: ProfileId },
    AddReaction { publication: PublicationId, profile: ProfileId, reaction: ReactionType },
    RemoveReaction { publication: PublicationId, profile: ProfileId, reaction: ReactionType },
    CreateMirror { publisher: ProfileId, publication: PublicationId },
    Collect { collector: ProfileId, publication: PublicationId },
    Decrypt { viewer: ProfileId, publication: PublicationId },
    ApproveAllowance { owner: String, grant: AllowanceGrant },
    Upload { size: usize },
    CreatePublication { publisher: ProfileId, kind: PublicationKind },
    UpdateProfile { profile: ProfileId, details: ProfileDetails },
    UpdateProfileImage { profile: ProfileId, image_uri: String },
    UpdateFollowPolicy { profile: ProfileId, policy: FollowPolicyUpdate },
}

impl GatewayCall {
    pub fn operation(&self) -> GatewayOperation {
        match self {
            GatewayCall::GetProfile { .. } => GatewayOperation::GetProfile,
            GatewayCall::GetProfileById { .. } => GatewayOperation::GetProfileById,
            GatewayCall::ListFollowers { .. } => GatewayOperation::ListFollowers,
            GatewayCall::ListFollowing { .. } => GatewayOperation::ListFollowing,
            GatewayCall::GetPublication { .. } => GatewayOperation::GetPublication,
            GatewayCall::Follow { .. } => GatewayOperation::Follow,
            GatewayCall::Unfollow { .. } => GatewayOperation::Unfollow,
            GatewayCall::AddReaction { .. } => GatewayOperation::AddReaction,
            GatewayCall::RemoveReaction { .. } => GatewayOperation::RemoveReaction,
            GatewayCall::CreateMirror { .. } => GatewayOperation::CreateMirror,
            GatewayCall::Collect { .. } => GatewayOperation::Collect,
            GatewayCall::Decrypt { .. } => GatewayOperation::Decrypt,
            GatewayCall::ApproveAllowance { .. } => GatewayOperation::ApproveAllowance,
            GatewayCall::Upload { .. } => GatewayOperation::Upload,
            GatewayCall::CreatePublication { .. } => GatewayOperation::CreatePublication,
            GatewayCall::UpdateProfile { .. } => GatewayOperation::UpdateProfile,
            GatewayCall::UpdateProfileImage { .. } => GatewayOperation::UpdateProfileImage,
            GatewayCall::UpdateFollowPolicy { .. } => GatewayOperation::UpdateFollowPolicy,
        }
    }
}

/// A profile to register in the sandbox
#[derive(Debug, Clone)]
pub struct ProfileSeed {
    pub id: ProfileId,
    pub handle: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub picture: Option<String>,
    pub cover_picture: Option<String>,
    /// Wallet that owns the profile and pays its fees
    pub owner_address: String,
    pub follow_policy: FollowPolicy,
    pub accepts_new_followers: bool,
}

impl ProfileSeed {
    pub fn open(id: impl Into<ProfileId>, handle: impl Into<String>, owner_address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
            name: None,
            bio: None,
            picture: None,
            cover_picture: None,
            owner_address: owner_address.into(),
            follow_policy: FollowPolicy::Open,
            accepts_new_followers: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    pub fn with_policy(mut self, policy: FollowPolicy) -> Self {
        self.follow_policy = policy;
        self
    }

    pub fn closed_to_new_followers(mut self) -> Self {
        self.accepts_new_followers = false;
        self
    }
}

/// Collect settings of a sandbox publication
#[derive(Debug, Clone, Default)]
pub struct CollectRules {
    pub enabled: bool,
    pub followers_only: bool,
    pub limit: Option<u64>,
    pub ends_at: Option<DateTime<Utc>>,
    pub fee: Option<Amount>,
}

impl CollectRules {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn open() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn followers_only(mut self) -> Self {
        self.followers_only = true;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn ending_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }
}

/// A publication to register in the sandbox
#[derive(Debug, Clone)]
pub struct PublicationSeed {
    pub author: ProfileId,
    pub kind: PublicationKind,
    pub text: String,
    pub media: Vec<MediaObject>,
    pub content_focus: ContentFocus,
    pub followers_only: bool,
    pub mirroring_disabled: bool,
    pub collect: CollectRules,
    pub created_at: DateTime<Utc>,
}

impl PublicationSeed {
    pub fn post(author: impl Into<ProfileId>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            kind: PublicationKind::Post,
            text: text.into(),
            media: Vec::new(),
            content_focus: ContentFocus::TextOnly,
            followers_only: false,
            mirroring_disabled: false,
            collect: CollectRules::disabled(),
            created_at: Utc::now(),
        }
    }

    pub fn followers_only(mut self) -> Self {
        self.followers_only = true;
        self
    }

    pub fn without_mirroring(mut self) -> Self {
        self.mirroring_disabled = true;
        self
    }

    pub fn with_collect(mut self, rules: CollectRules) -> Self {
        self.collect = rules;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

struct PublicationRecord {
    id: PublicationId,
    seed: PublicationSeed,
}

#[derive(Default)]
struct State {
    profiles: HashMap<ProfileId, ProfileSeed>,
    publications: Vec<PublicationRecord>,
    /// (follower, followee)
    follows: HashSet<(ProfileId, ProfileId)>,
    reactions: HashSet<ReactionRecord>,
    /// (publisher, publication)
    mirrors: HashSet<(ProfileId, PublicationId)>,
    /// (collector, publication)
    collects: HashSet<(ProfileId, PublicationId)>,
    /// (owner, spender, token) -> remaining allowance
    allowances: HashMap<(String, String, String), BigDecimal>,
    uploads: Vec<UploadPayload>,
    calls: Vec<GatewayCall>,
    failures: HashMap<GatewayOperation, VecDeque<GatewayError>>,
}

impl State {
    fn profile_record(&self, id: &ProfileId) -> GatewayResult<&ProfileSeed> {
        self.profiles
            .get(id)
            .ok_or_else(|| GatewayError::NotFound(format!("profile {}", id)))
    }

    fn publication_record(&self, id: &PublicationId) -> GatewayResult<&PublicationRecord> {
        self.publications
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("publication {}", id)))
    }

    fn is_following(&self, follower: &ProfileId, followee: &ProfileId) -> bool {
        self.follows.contains(&(follower.clone(), followee.clone()))
    }

    fn profile_view(&self, id: &ProfileId, observer: Option<&ProfileId>) -> GatewayResult<Profile> {
        let record = self.profile_record(id)?;
        let owned = observer == Some(id);
        let followed = observer.map(|o| self.is_following(o, id)).unwrap_or(false);

        Ok(Profile {
            id: record.id.clone(),
            handle: record.handle.clone(),
            name: record.name.clone(),
            bio: record.bio.clone(),
            follow_policy: record.follow_policy.clone(),
            is_followed_by_me: followed,
            follow_eligibility: FollowEligibility {
                can_follow: observer.is_some() && !owned && !followed && record.accepts_new_followers,
                can_unfollow: followed,
            },
            owned_by_viewer: owned,
            stats: ProfileStats {
                followers: self.follows.iter().filter(|(_, followee)| followee == id).count() as u64,
                following: self.follows.iter().filter(|(follower, _)| follower == id).count() as u64,
                posts: self
                    .publications
                    .iter()
                    .filter(|p| &p.seed.author == id && p.seed.kind == PublicationKind::Post)
                    .count() as u64,
            },
            picture: record.picture.clone(),
            cover_picture: record.cover_picture.clone(),
        })
    }

    /// Page through `ids` in id order; the cursor is the offset of the next page
    fn profile_page(
        &self,
        mut ids: Vec<ProfileId>,
        observer: Option<&ProfileId>,
        cursor: Option<&str>,
        limit: usize,
    ) -> GatewayResult<ProfilePage> {
        ids.sort();
        let offset = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| GatewayError::rejected(format!("Invalid cursor {}", cursor)))?,
            None => 0,
        };
        let end = offset.saturating_add(limit.max(1)).min(ids.len());

        let profiles = ids
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|id| self.profile_view(id, observer))
            .collect::<GatewayResult<Vec<_>>>()?;

        Ok(ProfilePage {
            profiles,
            next_cursor: (end < ids.len()).then(|| end.to_string()),
        })
    }

    fn can_decrypt(&self, record: &PublicationRecord, observer: Option<&ProfileId>) -> bool {
        if !record.seed.followers_only {
            return true;
        }
        match observer {
            Some(o) if o == &record.seed.author => true,
            Some(o) => self.is_following(o, &record.seed.author),
            None => false,
        }
    }

    fn collect_count(&self, id: &PublicationId) -> u64 {
        self.collects.iter().filter(|(_, p)| p == id).count() as u64
    }

    fn collect_state(&self, record: &PublicationRecord, observer: Option<&ProfileId>) -> CollectState {
        let rules = &record.seed.collect;
        if !rules.enabled {
            return CollectState::CannotCollect;
        }
        if rules.ends_at.map(|end| end <= Utc::now()).unwrap_or(false) {
            return CollectState::TimeExpired;
        }
        if rules.limit.map(|limit| self.collect_count(&record.id) >= limit).unwrap_or(false) {
            return CollectState::LimitReached;
        }
        if rules.followers_only {
            let follows = observer
                .map(|o| o == &record.seed.author || self.is_following(o, &record.seed.author))
                .unwrap_or(false);
            if !follows {
                return CollectState::NotAFollower;
            }
        }
        CollectState::CanCollect
    }

    fn publication_view(&self, id: &PublicationId, observer: Option<&ProfileId>) -> GatewayResult<Publication> {
        let record = self.publication_record(id)?;
        let seed = &record.seed;

        let content = if seed.followers_only {
            PublicationContent::Encrypted {
                ciphertext: STANDARD.encode(record.id.as_bytes()),
            }
        } else {
            PublicationContent::Plaintext {
                text: seed.text.clone(),
            }
        };

        let gate_criteria = if seed.followers_only {
            GateCriteria::FollowProfile {
                profile_id: seed.author.clone(),
            }
        } else {
            GateCriteria::None
        };

        let reactions_by_me = match observer {
            Some(o) => [ReactionType::Upvote, ReactionType::Downvote]
                .into_iter()
                .filter(|r| {
                    self.reactions.contains(&ReactionRecord {
                        publication_id: record.id.clone(),
                        profile_id: o.clone(),
                        reaction: *r,
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        let has = |set: &HashSet<(ProfileId, PublicationId)>| {
            observer
                .map(|o| set.contains(&(o.clone(), record.id.clone())))
                .unwrap_or(false)
        };

        Ok(Publication {
            id: record.id.clone(),
            kind: seed.kind.clone(),
            author: self.profile_view(&seed.author, observer)?,
            content,
            media: seed.media.clone(),
            content_focus: seed.content_focus,
            is_gated: seed.followers_only,
            gate_criteria,
            observer_can_decrypt: self.can_decrypt(record, observer),
            collect_policy: CollectPolicy {
                state: self.collect_state(record, observer),
                fee: seed.collect.fee.clone(),
                collect_limit: seed.collect.limit,
            },
            stats: PublicationStats {
                comments: self
                    .publications
                    .iter()
                    .filter(|p| matches!(&p.seed.kind, PublicationKind::Comment { parent_id } if parent_id == id))
                    .count() as u64,
                mirrors: self.mirrors.iter().filter(|(_, p)| p == id).count() as u64,
                upvotes: self
                    .reactions
                    .iter()
                    .filter(|r| &r.publication_id == id && r.reaction == ReactionType::Upvote)
                    .count() as u64,
                collects: self.collect_count(id),
            },
            is_mirrored_by_me: has(&self.mirrors),
            has_collected_by_me: has(&self.collects),
            reactions_by_me,
            created_at: seed.created_at,
        })
    }

    fn insert_publication(&mut self, seed: PublicationSeed) -> PublicationId {
        let sequence = self
            .publications
            .iter()
            .filter(|p| p.seed.author == seed.author)
            .count()
            + 1;
        let id = format!("{}-0x{:02x}", seed.author, sequence);
        self.publications.push(PublicationRecord { id: id.clone(), seed });
        id
    }
}

/// Sandbox social graph that records every call it receives.
///
/// Used for offline runs and as the backend of the scenario tests. Failures
/// can be injected per operation with [`InMemoryGateway::fail_next`].
pub struct InMemoryGateway {
    state: Mutex<State>,
    latency: Duration,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call, so that callers can observe in-flight state
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn insert_profile(&self, seed: ProfileSeed) {
        let mut state = self.state.lock().await;
        debug!("Seeding profile {} (@{})", seed.id, seed.handle);
        state.profiles.insert(seed.id.clone(), seed);
    }

    pub async fn insert_publication(&self, seed: PublicationSeed) -> PublicationId {
        let mut state = self.state.lock().await;
        let id = state.insert_publication(seed);
        debug!("Seeding publication {}", id);
        id
    }

    /// Seed a follow relationship without going through `follow`
    pub async fn insert_follow(&self, follower: impl Into<ProfileId>, followee: impl Into<ProfileId>) {
        let mut state = self.state.lock().await;
        state.follows.insert((follower.into(), followee.into()));
    }

    pub async fn insert_reaction(&self, record: ReactionRecord) {
        let mut state = self.state.lock().await;
        state.reactions.insert(record);
    }

    /// Make the next call of `operation` fail with `error`
    pub async fn fail_next(&self, operation: GatewayOperation, error: GatewayError) {
        let mut state = self.state.lock().await;
        state.failures.entry(operation).or_default().push_back(error);
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn operations(&self) -> Vec<GatewayOperation> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .map(GatewayCall::operation)
            .collect()
    }

    pub async fn count(&self, operation: GatewayOperation) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn is_following(&self, follower: &str, followee: &str) -> bool {
        self.state
            .lock()
            .await
            .is_following(&follower.to_string(), &followee.to_string())
    }

    pub async fn reaction_records(&self) -> Vec<ReactionRecord> {
        self.state.lock().await.reactions.iter().cloned().collect()
    }

    pub async fn allowance(&self, owner: &str, spender: &str, token: &str) -> BigDecimal {
        let key = (
            normalize_address(owner),
            normalize_address(spender),
            normalize_address(token),
        );
        self.state
            .lock()
            .await
            .allowances
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Record the call and hand out the state, unless a failure was injected
    async fn begin(&self, call: GatewayCall) -> GatewayResult<MutexGuard<'_, State>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let operation = call.operation();
        metrics::record_gateway_call(operation.name());

        let mut state = self.state.lock().await;
        state.calls.push(call);

        if let Some(error) = state.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            debug!("Injected failure for {}: {}", operation.name(), error);
            return Err(error);
        }

        Ok(state)
    }
}

#[async_trait]
impl RemoteActionGateway for InMemoryGateway {
    async fn get_profile(&self, handle: &str, observer: Option<&ProfileId>) -> GatewayResult<Profile> {
        let state = self
            .begin(GatewayCall::GetProfile {
                handle: handle.to_string(),
            })
            .await?;

        let id = state
            .profiles
            .values()
            .find(|p| p.handle == handle)
            .map(|p| p.id.clone())
            .ok_or_else(|| GatewayError::NotFound(format!("profile @{}", handle)))?;

        state.profile_view(&id, observer)
    }

    async fn get_profile_by_id(&self, id: &ProfileId, observer: Option<&ProfileId>) -> GatewayResult<Profile> {
        let state = self.begin(GatewayCall::GetProfileById { id: id.clone() }).await?;
        state.profile_view(id, observer)
    }

    async fn list_followers(
        &self,
        profile: &ProfileId,
        observer: Option<&ProfileId>,
        cursor: Option<&str>,
        limit: usize,
    ) -> GatewayResult<ProfilePage> {
        let state = self
            .begin(GatewayCall::ListFollowers {
                profile: profile.clone(),
                cursor: cursor.map(str::to_string),
            })
            .await?;

        state.profile_record(profile)?;
        let followers = state
            .follows
            .iter()
            .filter(|(_, followee)| followee == profile)
            .map(|(follower, _)| follower.clone())
            .collect();
        state.profile_page(followers, observer, cursor, limit)
    }

    async fn list_following(
        &self,
        profile: &ProfileId,
        observer: Option<&ProfileId>,
        cursor: Option<&str>,
        limit: usize,
    ) -> GatewayResult<ProfilePage> {
        let state = self
            .begin(GatewayCall::ListFollowing {
                profile: profile.clone(),
                cursor: cursor.map(str::to_string),
            })
            .await?;

        state.profile_record(profile)?;
        let following = state
            .follows
            .iter()
            .filter(|(follower, _)| follower == profile)
            .map(|(_, followee)| followee.clone())
            .collect();
        state.profile_page(following, observer, cursor, limit)
    }

    async fn get_publication(
        &self,
        id: &PublicationId,
        observer: Option<&ProfileId>,
    ) -> GatewayResult<Publication> {
        let state = self.begin(GatewayCall::GetPublication { id: id.clone() }).await?;
        state.publication_view(id, observer)
    }

    async fn follow(
        &self,
        followee: &ProfileId,
        follower: &ProfileId,
        fee: Option<&Amount>,
    ) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::Follow {
                followee: followee.clone(),
                follower: follower.clone(),
                fee: fee.cloned(),
            })
            .await?;

        let target = state.profile_record(followee)?.clone();
        let owner = normalize_address(&state.profile_record(follower)?.owner_address);

        if state.is_following(follower, followee) {
            return Ok(());
        }
        if !target.accepts_new_followers {
            return Err(GatewayError::rejected("This profile is not accepting new followers"));
        }

        if let FollowPolicy::Charge(policy) = &target.follow_policy {
            let offered = fee.ok_or_else(|| GatewayError::rejected("Following this profile requires a fee"))?;
            if !offered.covers(&policy.amount) {
                return Err(GatewayError::rejected(
                    "Follow fee does not match the profile's follow policy",
                ));
            }

            let key = (
                owner,
                normalize_address(&policy.contract_address),
                normalize_address(&policy.amount.currency.address),
            );
            let allowance = state.allowances.get(&key).cloned().unwrap_or_default();
            if allowance < policy.amount.value {
                return Err(GatewayError::InsufficientFunds {
                    message: format!("allowance is below {}", policy.amount),
                });
            }
            state.allowances.insert(key, allowance - &policy.amount.value);
        }

        state.follows.insert((follower.clone(), followee.clone()));
        info!("Sandbox follow {} -> {}", follower, followee);
        Ok(())
    }

    async fn unfollow(&self, followee: &ProfileId, follower: &ProfileId) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::Unfollow {
                followee: followee.clone(),
                follower: follower.clone(),
            })
            .await?;

        state.profile_record(followee)?;
        if !state.follows.remove(&(follower.clone(), followee.clone())) {
            return Err(GatewayError::rejected("You are not following this profile"));
        }

        info!("Sandbox unfollow {} -> {}", follower, followee);
        Ok(())
    }

    async fn add_reaction(
        &self,
        publication: &PublicationId,
        profile: &ProfileId,
        reaction: ReactionType,
    ) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::AddReaction {
                publication: publication.clone(),
                profile: profile.clone(),
                reaction,
            })
            .await?;

        state.publication_record(publication)?;
        state.reactions.insert(ReactionRecord {
            publication_id: publication.clone(),
            profile_id: profile.clone(),
            reaction,
        });
        Ok(())
    }

    async fn remove_reaction(
        &self,
        publication: &PublicationId,
        profile: &ProfileId,
        reaction: ReactionType,
    ) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::RemoveReaction {
                publication: publication.clone(),
                profile: profile.clone(),
                reaction,
            })
            .await?;

        state.publication_record(publication)?;
        state.reactions.remove(&ReactionRecord {
            publication_id: publication.clone(),
            profile_id: profile.clone(),
            reaction,
        });
        Ok(())
    }

    async fn create_mirror(&self, publisher: &ProfileId, publication: &PublicationId) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::CreateMirror {
                publisher: publisher.clone(),
                publication: publication.clone(),
            })
            .await?;

        if state.publication_record(publication)?.seed.mirroring_disabled {
            return Err(GatewayError::MirroringDisabled);
        }

        state.mirrors.insert((publisher.clone(), publication.clone()));
        Ok(())
    }

    async fn collect(&self, collector: &ProfileId, publication: &PublicationId) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::Collect {
                collector: collector.clone(),
                publication: publication.clone(),
            })
            .await?;

        let record = state.publication_record(publication)?;
        match state.collect_state(record, Some(collector)) {
            CollectState::CanCollect => {}
            CollectState::TimeExpired => return Err(GatewayError::rejected("The collect period has ended")),
            CollectState::LimitReached => return Err(GatewayError::rejected("The collect limit has been reached")),
            CollectState::NotAFollower => return Err(GatewayError::rejected("Only followers can collect")),
            CollectState::CannotCollect => return Err(GatewayError::rejected("Collecting is disabled")),
        }

        if !state.collects.insert((collector.clone(), publication.clone())) {
            return Err(GatewayError::rejected("You have already collected this publication"));
        }
        Ok(())
    }

    async fn decrypt(&self, viewer: &ProfileId, publication: &Publication) -> GatewayResult<String> {
        let state = self
            .begin(GatewayCall::Decrypt {
                viewer: viewer.clone(),
                publication: publication.id.clone(),
            })
            .await?;

        let record = state.publication_record(&publication.id)?;
        if !state.can_decrypt(record, Some(viewer)) {
            return Err(GatewayError::rejected(
                "You do not meet the criteria to decrypt this publication",
            ));
        }
        Ok(record.seed.text.clone())
    }

    async fn approve_allowance(&self, owner: &str, grant: &AllowanceGrant) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::ApproveAllowance {
                owner: owner.to_string(),
                grant: grant.clone(),
            })
            .await?;

        if !is_valid_address(&grant.spender) {
            return Err(GatewayError::rejected(format!("Invalid spender address {}", grant.spender)));
        }
        if !is_valid_address(&grant.token_address) {
            return Err(GatewayError::rejected(format!(
                "Invalid token address {}",
                grant.token_address
            )));
        }

        let key = (
            normalize_address(owner),
            normalize_address(&grant.spender),
            normalize_address(&grant.token_address),
        );
        state.allowances.insert(key, grant.amount.value.clone());
        info!("Sandbox allowance of {} for {}", grant.amount, grant.spender);
        Ok(())
    }

    async fn upload(&self, payload: UploadPayload) -> GatewayResult<String> {
        let size = match &payload {
            UploadPayload::Bytes { data, .. } => data.len(),
            UploadPayload::Json { value } => value.to_string().len(),
        };
        let mut state = self.begin(GatewayCall::Upload { size }).await?;

        let name = match &payload {
            UploadPayload::Bytes { .. } => "0",
            UploadPayload::Json { .. } => "metadata.json",
        };
        state.uploads.push(payload);
        Ok(format!("ipfs://bafy{:016x}/{}", state.uploads.len(), name))
    }

    async fn create_publication(
        &self,
        publisher: &ProfileId,
        publication: &NewPublication,
    ) -> GatewayResult<Publication> {
        let mut state = self
            .begin(GatewayCall::CreatePublication {
                publisher: publisher.clone(),
                kind: publication.kind.clone(),
            })
            .await?;

        state.profile_record(publisher)?;
        if let PublicationKind::Comment { parent_id } = &publication.kind {
            state.publication_record(parent_id)?;
        }

        let collect = match publication.collect_policy.state {
            CollectState::CanCollect => CollectRules {
                enabled: true,
                followers_only: false,
                limit: publication.collect_policy.collect_limit,
                ends_at: None,
                fee: publication.collect_policy.fee.clone(),
            },
            _ => CollectRules::disabled(),
        };

        let seed = PublicationSeed {
            author: publisher.clone(),
            kind: publication.kind.clone(),
            text: publication.content.clone(),
            media: publication.media.clone(),
            content_focus: publication.content_focus,
            followers_only: matches!(publication.gate, GateCriteria::FollowProfile { .. }),
            mirroring_disabled: false,
            collect,
            created_at: Utc::now(),
        };

        let id = state.insert_publication(seed);
        info!("Sandbox publication {} created by {}", id, publisher);
        state.publication_view(&id, Some(publisher))
    }

    async fn update_profile(&self, profile: &ProfileId, details: &ProfileDetails) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::UpdateProfile {
                profile: profile.clone(),
                details: details.clone(),
            })
            .await?;

        let record = state
            .profiles
            .get_mut(profile)
            .ok_or_else(|| GatewayError::NotFound(format!("profile {}", profile)))?;
        record.name = Some(details.name.clone()).filter(|n| !n.is_empty());
        record.bio = Some(details.bio.clone()).filter(|b| !b.is_empty());
        record.cover_picture = details.cover_picture.clone();
        info!("Sandbox profile {} updated", profile);
        Ok(())
    }

    async fn update_profile_image(&self, profile: &ProfileId, image_uri: &str) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::UpdateProfileImage {
                profile: profile.clone(),
                image_uri: image_uri.to_string(),
            })
            .await?;

        let record = state
            .profiles
            .get_mut(profile)
            .ok_or_else(|| GatewayError::NotFound(format!("profile {}", profile)))?;
        record.picture = Some(image_uri.to_string());
        Ok(())
    }

    async fn update_follow_policy(&self, profile: &ProfileId, policy: &FollowPolicyUpdate) -> GatewayResult<()> {
        let mut state = self
            .begin(GatewayCall::UpdateFollowPolicy {
                profile: profile.clone(),
                policy: policy.clone(),
            })
            .await?;

        let follow_policy = match policy {
            FollowPolicyUpdate::Open => FollowPolicy::Open,
            FollowPolicyUpdate::Charge { amount, recipient } => {
                if amount.value <= BigDecimal::from(0) {
                    return Err(GatewayError::rejected("Follow fee must be greater than zero"));
                }
                if !is_valid_address(recipient) {
                    return Err(GatewayError::rejected(format!("Invalid recipient address {}", recipient)));
                }
                FollowPolicy::Charge(ChargeFollowPolicy {
                    amount: amount.clone(),
                    payee_address: recipient.clone(),
                    contract_address: SANDBOX_FOLLOW_MODULE.to_string(),
                })
            }
        };

        let record = state
            .profiles
            .get_mut(profile)
            .ok_or_else(|| GatewayError::NotFound(format!("profile {}", profile)))?;
        record.follow_policy = follow_policy;
        info!("Sandbox follow policy of {} set to {:?}", profile, policy);
        Ok(())
    }
}
