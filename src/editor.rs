// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use bigdecimal::BigDecimal;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ProfileEditError;
use crate::gateway::{SharedGateway, UploadPayload};
use crate::models::{Amount, Currency, FollowPolicy, FollowPolicyUpdate, Profile, ProfileDetails};
use crate::notify::{ActionOutcome, Notifier, SuppressReason};
use crate::publish::{media_type_for, resolve_upload_url, MediaFile};
use crate::session::Capability;

const ACTION_EDIT_PROFILE: &str = "edit_profile";
const NAME_LENGTH: std::ops::RangeInclusive<usize> = 3..=20;
const MAX_BIO_LENGTH: usize = 1000;

/// Follow policy picked on the edit form; charge prices are in the fee currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowPolicyChoice {
    Open,
    Charge(BigDecimal),
}

/// Changes requested on the edit form; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub picture: Option<MediaFile>,
    pub cover_picture: Option<MediaFile>,
    pub follow_policy: Option<FollowPolicyChoice>,
}

/// Remote calls needed to apply an edit
#[derive(Debug, Default)]
struct EditPlan {
    details: Option<(String, String)>,
    picture: Option<MediaFile>,
    cover_picture: Option<MediaFile>,
    follow_policy: Option<FollowPolicyUpdate>,
}

impl EditPlan {
    fn is_empty(&self) -> bool {
        self.details.is_none()
            && self.picture.is_none()
            && self.cover_picture.is_none()
            && self.follow_policy.is_none()
    }
}

struct EditTarget {
    profile: Profile,
    in_flight: bool,
    closed: bool,
}

/// Saves the viewer's own profile details, images and follow policy
pub struct ProfileEditor {
    gateway: SharedGateway,
    notifier: Notifier,
    ipfs_gateway_url: String,
    fee_currency: Currency,
    target: Mutex<EditTarget>,
}

impl ProfileEditor {
    pub fn new(
        gateway: SharedGateway,
        notifier: Notifier,
        profile: Profile,
        ipfs_gateway_url: impl Into<String>,
        fee_currency: Currency,
    ) -> Self {
        Self {
            gateway,
            notifier,
            ipfs_gateway_url: ipfs_gateway_url.into(),
            fee_currency,
            target: Mutex::new(EditTarget {
                profile,
                in_flight: false,
                closed: false,
            }),
        }
    }

    pub async fn profile(&self) -> Profile {
        self.target.lock().await.profile.clone()
    }

    pub async fn close(&self) {
        self.target.lock().await.closed = true;
    }

    /// Apply `edit`: images are uploaded first, then details, avatar and
    /// follow policy are written in that order, stopping at the first failure
    pub async fn save(&self, capability: Option<&Capability>, edit: ProfileEdit) -> ActionOutcome {
        let Some(capability) = capability else {
            return self.notifier.suppress(ACTION_EDIT_PROFILE, SuppressReason::SignedOut);
        };

        let profile = match self.claim(capability).await {
            Ok(profile) => profile,
            Err(outcome) => return outcome,
        };

        let outcome = match plan_edit(&profile, capability, &self.fee_currency, edit) {
            Err(e) => self.notifier.fail(
                ACTION_EDIT_PROFILE,
                "Something went wrong. Please try again later.",
                Some(e.to_string()),
            ),
            Ok(plan) if plan.is_empty() => self
                .notifier
                .suppress(ACTION_EDIT_PROFILE, SuppressReason::NoChanges),
            Ok(plan) => {
                let result = self.apply(&profile, plan).await;
                self.reload(capability, &profile).await;
                match result {
                    Ok(()) => {
                        info!("Updated profile @{}", profile.handle);
                        self.notifier
                            .confirm(ACTION_EDIT_PROFILE, "Profile updated Successfully.")
                    }
                    Err(e) => self.notifier.fail(
                        ACTION_EDIT_PROFILE,
                        "Something went wrong. Please try again later.",
                        Some(e.to_string()),
                    ),
                }
            }
        };

        self.target.lock().await.in_flight = false;
        outcome
    }

    async fn claim(&self, capability: &Capability) -> Result<Profile, ActionOutcome> {
        let mut target = self.target.lock().await;
        if target.closed {
            return Err(self.notifier.suppress(ACTION_EDIT_PROFILE, SuppressReason::Closed));
        }
        if target.in_flight {
            return Err(self.notifier.suppress(ACTION_EDIT_PROFILE, SuppressReason::InFlight));
        }
        if !target.profile.owned_by_viewer || target.profile.id != capability.profile_id {
            return Err(self.notifier.suppress(ACTION_EDIT_PROFILE, SuppressReason::NotOwner));
        }
        target.in_flight = true;
        Ok(target.profile.clone())
    }

    async fn apply(&self, profile: &Profile, plan: EditPlan) -> Result<(), ProfileEditError> {
        let cover_picture = match plan.cover_picture {
            Some(file) => Some(self.upload_image(file).await?),
            None => None,
        };
        let picture = match plan.picture {
            Some(file) => Some(self.upload_image(file).await?),
            None => None,
        };

        if plan.details.is_some() || cover_picture.is_some() {
            let (name, bio) = plan.details.unwrap_or_else(|| {
                (
                    profile.name.clone().unwrap_or_default(),
                    profile.bio.clone().unwrap_or_default(),
                )
            });
            let details = ProfileDetails {
                name,
                bio,
                cover_picture: cover_picture.or_else(|| profile.cover_picture.clone()),
            };
            self.gateway.update_profile(&profile.id, &details).await?;
        }

        if let Some(picture) = picture {
            self.gateway.update_profile_image(&profile.id, &picture).await?;
        }

        if let Some(policy) = plan.follow_policy {
            debug!("Setting follow policy of @{} to {:?}", profile.handle, policy);
            self.gateway.update_follow_policy(&profile.id, &policy).await?;
        }
        Ok(())
    }

    async fn upload_image(&self, file: MediaFile) -> Result<String, ProfileEditError> {
        let uri = self
            .gateway
            .upload(UploadPayload::Bytes {
                data: file.bytes,
                mime: file.mime,
            })
            .await?;
        Ok(resolve_upload_url(&self.ipfs_gateway_url, &uri))
    }

    async fn reload(&self, capability: &Capability, profile: &Profile) {
        match self
            .gateway
            .get_profile_by_id(&profile.id, Some(&capability.profile_id))
            .await
        {
            Ok(fresh) => {
                let mut target = self.target.lock().await;
                if !target.closed {
                    target.profile = fresh;
                }
            }
            Err(e) => warn!("Failed to reload profile @{}: {}", profile.handle, e),
        }
    }
}

/// Validate `edit` and keep only what differs from `profile`
fn plan_edit(
    profile: &Profile,
    capability: &Capability,
    fee_currency: &Currency,
    edit: ProfileEdit,
) -> Result<EditPlan, ProfileEditError> {
    if let Some(name) = &edit.name {
        if !NAME_LENGTH.contains(&name.chars().count()) {
            return Err(ProfileEditError::InvalidName);
        }
    }
    if let Some(bio) = &edit.bio {
        if bio.chars().count() > MAX_BIO_LENGTH {
            return Err(ProfileEditError::BioTooLong);
        }
    }
    for file in edit.picture.iter().chain(edit.cover_picture.iter()) {
        if !file.mime.starts_with("image/") || media_type_for(&file.mime).is_err() {
            return Err(ProfileEditError::UnsupportedImage(file.mime.clone()));
        }
    }

    let name_changed = edit.name.is_some() && edit.name != profile.name;
    let bio_changed = edit.bio.is_some() && edit.bio != profile.bio;
    let details = (name_changed || bio_changed).then(|| {
        (
            edit.name.or_else(|| profile.name.clone()).unwrap_or_default(),
            edit.bio.or_else(|| profile.bio.clone()).unwrap_or_default(),
        )
    });

    let follow_policy = match edit.follow_policy {
        None => None,
        Some(FollowPolicyChoice::Open) => match profile.follow_policy {
            FollowPolicy::Open => None,
            FollowPolicy::Charge(_) => Some(FollowPolicyUpdate::Open),
        },
        Some(FollowPolicyChoice::Charge(price)) => {
            if price <= BigDecimal::from(0) {
                return Err(ProfileEditError::InvalidPrice);
            }
            let amount = Amount::new(price, fee_currency.clone());
            let unchanged = profile.charge_policy().is_some_and(|current| {
                current.amount == amount && current.payee_address.eq_ignore_ascii_case(&capability.address)
            });
            (!unchanged).then(|| FollowPolicyUpdate::Charge {
                amount,
                recipient: capability.address.clone(),
            })
        }
    };

    Ok(EditPlan {
        details,
        picture: edit.picture,
        cover_picture: edit.cover_picture,
        follow_policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChargeFollowPolicy, FollowEligibility, ProfileStats};

    const ADDRESS: &str = "0x1111111111111111111111111111111111111111";

    fn wmatic() -> Currency {
        Currency::new("WMATIC", "0x9c3c9283d3e44854697cd22d3faa240cfb032889", 18)
    }

    fn own_profile() -> Profile {
        Profile {
            id: "0x01".into(),
            handle: "me".into(),
            name: Some("Luigi".into()),
            bio: None,
            follow_policy: FollowPolicy::Open,
            is_followed_by_me: false,
            follow_eligibility: FollowEligibility::default(),
            owned_by_viewer: true,
            stats: ProfileStats::default(),
            picture: None,
            cover_picture: None,
        }
    }

    fn capability() -> Capability {
        Capability {
            profile_id: "0x01".into(),
            address: ADDRESS.into(),
        }
    }

    fn plan(profile: &Profile, edit: ProfileEdit) -> Result<EditPlan, ProfileEditError> {
        plan_edit(profile, &capability(), &wmatic(), edit)
    }

    #[test]
    fn unchanged_fields_plan_nothing() {
        let rename = ProfileEdit {
            name: Some("Mario".into()),
            ..ProfileEdit::default()
        };
        assert_eq!(
            plan(&own_profile(), rename).unwrap().details,
            Some(("Mario".to_string(), String::new()))
        );

        let same = ProfileEdit {
            name: Some("Luigi".into()),
            follow_policy: Some(FollowPolicyChoice::Open),
            ..ProfileEdit::default()
        };
        assert!(plan(&own_profile(), same).unwrap().is_empty());

        let short = ProfileEdit {
            name: Some("Me".into()),
            ..ProfileEdit::default()
        };
        assert!(matches!(plan(&own_profile(), short), Err(ProfileEditError::InvalidName)));
    }

    #[test]
    fn validates_form_limits() {
        let long_bio = ProfileEdit {
            bio: Some("a".repeat(MAX_BIO_LENGTH + 1)),
            ..ProfileEdit::default()
        };
        assert!(matches!(plan(&own_profile(), long_bio), Err(ProfileEditError::BioTooLong)));

        let free = ProfileEdit {
            follow_policy: Some(FollowPolicyChoice::Charge(BigDecimal::from(0))),
            ..ProfileEdit::default()
        };
        assert!(matches!(plan(&own_profile(), free), Err(ProfileEditError::InvalidPrice)));

        let video_avatar = ProfileEdit {
            picture: Some(MediaFile {
                bytes: vec![0],
                mime: "video/mp4".into(),
            }),
            ..ProfileEdit::default()
        };
        assert!(matches!(
            plan(&own_profile(), video_avatar),
            Err(ProfileEditError::UnsupportedImage(mime)) if mime == "video/mp4"
        ));
    }

    #[test]
    fn same_charge_is_not_resent() {
        let mut profile = own_profile();
        profile.follow_policy = FollowPolicy::Charge(ChargeFollowPolicy {
            amount: Amount::new(5, wmatic()),
            payee_address: ADDRESS.into(),
            contract_address: "0x4444444444444444444444444444444444444444".into(),
        });

        let same = ProfileEdit {
            follow_policy: Some(FollowPolicyChoice::Charge(BigDecimal::from(5))),
            ..ProfileEdit::default()
        };
        assert!(plan(&profile, same).unwrap().follow_policy.is_none());

        let raised = ProfileEdit {
            follow_policy: Some(FollowPolicyChoice::Charge(BigDecimal::from(7))),
            ..ProfileEdit::default()
        };
        assert_eq!(
            plan(&profile, raised).unwrap().follow_policy,
            Some(FollowPolicyUpdate::Charge {
                amount: Amount::new(7, wmatic()),
                recipient: ADDRESS.into(),
            })
        );
    }
}
