// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod address;
pub mod allowance;
pub mod amount;
pub mod media;
pub mod profile;
pub mod publication;
pub mod reaction;

pub use allowance::AllowanceGrant;
pub use amount::{Amount, Currency};
pub use media::{ContentFocus, MediaObject, MediaType};
pub use profile::{
    ChargeFollowPolicy, FollowEligibility, FollowPolicy, FollowPolicyUpdate, Profile, ProfileDetails,
    ProfileId, ProfilePage, ProfileStats,
};
pub use publication::{
    CollectPolicy, CollectState, GateCriteria, NewPublication, Publication, PublicationContent,
    PublicationId, PublicationKind, PublicationStats,
};
pub use reaction::{ReactionRecord, ReactionType};
