// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::eligibility::{can_follow, can_unfollow};
use crate::error::GatewayError;
use crate::gateway::SharedGateway;
use crate::models::{AllowanceGrant, FollowPolicy, Profile};
use crate::notify::{ActionOutcome, Notifier, SuppressReason};
use crate::session::Capability;

const ACTION_FOLLOW: &str = "follow";
const ACTION_UNFOLLOW: &str = "unfollow";

/// Remote step of a follow that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowStage {
    Approving,
    Following,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowFlowState {
    Idle,
    Approving,
    Following,
    Done,
    Failed(FollowStage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowFailure {
    pub stage: FollowStage,
    pub error: GatewayError,
}

/// Runs a follow, approving the fee allowance first for charge policies.
///
/// The allowance call is always awaited to completion before the follow is
/// sent; open policies skip it entirely.
pub struct PaidFollowOrchestrator {
    gateway: SharedGateway,
    state: Mutex<FollowFlowState>,
    transitions: Mutex<Vec<FollowFlowState>>,
}

impl PaidFollowOrchestrator {
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            state: Mutex::new(FollowFlowState::Idle),
            transitions: Mutex::new(Vec::new()),
        }
    }

    pub async fn state(&self) -> FollowFlowState {
        *self.state.lock().await
    }

    /// States visited by the last run, starting at `Idle`
    pub async fn transitions(&self) -> Vec<FollowFlowState> {
        self.transitions.lock().await.clone()
    }

    async fn transition(&self, next: FollowFlowState) {
        debug!("Follow flow -> {:?}", next);
        *self.state.lock().await = next;
        self.transitions.lock().await.push(next);
    }

    pub async fn execute(&self, capability: &Capability, profile: &Profile) -> Result<(), FollowFailure> {
        self.transitions.lock().await.clear();
        self.transition(FollowFlowState::Idle).await;

        let fee = match &profile.follow_policy {
            FollowPolicy::Open => None,
            FollowPolicy::Charge(policy) => {
                self.transition(FollowFlowState::Approving).await;
                let grant = AllowanceGrant::for_follow_fee(policy);
                info!(
                    "Approving {} for {} to follow {}",
                    grant.amount, grant.spender, profile.handle
                );

                if let Err(error) = self
                    .gateway
                    .approve_allowance(&capability.address, &grant)
                    .await
                {
                    self.transition(FollowFlowState::Failed(FollowStage::Approving)).await;
                    return Err(FollowFailure {
                        stage: FollowStage::Approving,
                        error,
                    });
                }
                Some(&policy.amount)
            }
        };

        self.transition(FollowFlowState::Following).await;
        if let Err(error) = self
            .gateway
            .follow(&profile.id, &capability.profile_id, fee)
            .await
        {
            self.transition(FollowFlowState::Failed(FollowStage::Following)).await;
            return Err(FollowFailure {
                stage: FollowStage::Following,
                error,
            });
        }

        self.transition(FollowFlowState::Done).await;
        Ok(())
    }
}

struct FollowTarget {
    profile: Profile,
    in_flight: bool,
    closed: bool,
}

/// Follow button behavior for one profile
pub struct FollowController {
    gateway: SharedGateway,
    notifier: Notifier,
    orchestrator: PaidFollowOrchestrator,
    target: Mutex<FollowTarget>,
}

impl FollowController {
    pub fn new(gateway: SharedGateway, notifier: Notifier, profile: Profile) -> Self {
        Self {
            orchestrator: PaidFollowOrchestrator::new(gateway.clone()),
            gateway,
            notifier,
            target: Mutex::new(FollowTarget {
                profile,
                in_flight: false,
                closed: false,
            }),
        }
    }

    pub async fn profile(&self) -> Profile {
        self.target.lock().await.profile.clone()
    }

    pub fn orchestrator(&self) -> &PaidFollowOrchestrator {
        &self.orchestrator
    }

    pub async fn close(&self) {
        self.target.lock().await.closed = true;
    }

    /// Handle a click: unfollow when already following, follow otherwise
    pub async fn click(&self, capability: Option<&Capability>) -> ActionOutcome {
        let Some(capability) = capability else {
            return self.notifier.suppress(ACTION_FOLLOW, SuppressReason::SignedOut);
        };

        let profile = match self.claim(ACTION_FOLLOW).await {
            Ok(profile) => profile,
            Err(outcome) => return outcome,
        };

        let outcome = if !can_follow(&profile) {
            self.notifier.fail(
                ACTION_FOLLOW,
                "You can't follow this profile.",
                Some("You may have already followed this profile, or it may be private.".to_string()),
            )
        } else if profile.is_followed_by_me {
            self.run_unfollow(capability, &profile).await
        } else {
            self.run_follow(capability, &profile).await
        };

        self.release().await;
        outcome
    }

    /// Unfollow directly, without the click dispatch
    pub async fn unfollow(&self, capability: Option<&Capability>) -> ActionOutcome {
        let Some(capability) = capability else {
            return self.notifier.suppress(ACTION_UNFOLLOW, SuppressReason::SignedOut);
        };

        let profile = match self.claim(ACTION_UNFOLLOW).await {
            Ok(profile) => profile,
            Err(outcome) => return outcome,
        };

        let outcome = self.run_unfollow(capability, &profile).await;
        self.release().await;
        outcome
    }

    /// Mark the controller busy and hand out the current snapshot
    async fn claim(&self, action: &str) -> Result<Profile, ActionOutcome> {
        let mut target = self.target.lock().await;
        if target.closed {
            return Err(self.notifier.suppress(action, SuppressReason::Closed));
        }
        if target.in_flight {
            return Err(self.notifier.suppress(action, SuppressReason::InFlight));
        }
        if target.profile.owned_by_viewer {
            return Err(self.notifier.suppress(action, SuppressReason::OwnProfile));
        }
        target.in_flight = true;
        Ok(target.profile.clone())
    }

    async fn release(&self) {
        self.target.lock().await.in_flight = false;
    }

    async fn run_follow(&self, capability: &Capability, profile: &Profile) -> ActionOutcome {
        let name = profile.display_name().to_string();

        match self.orchestrator.execute(capability, profile).await {
            Ok(()) => {
                self.reload(capability, profile).await;
                self.notifier.confirm(ACTION_FOLLOW, format!("Followed {}", name))
            }
            Err(FollowFailure { stage, error }) => {
                let description = match stage {
                    FollowStage::Approving => format!("Approving the follow fee failed: {}", error),
                    FollowStage::Following => error.to_string(),
                };
                self.notifier
                    .fail(ACTION_FOLLOW, format!("Failed to follow {}", name), Some(description))
            }
        }
    }

    async fn run_unfollow(&self, capability: &Capability, profile: &Profile) -> ActionOutcome {
        let name = profile.display_name().to_string();

        if !can_unfollow(profile) {
            return self.notifier.fail(
                ACTION_UNFOLLOW,
                "You can't unfollow this profile.",
                None,
            );
        }

        match self.gateway.unfollow(&profile.id, &capability.profile_id).await {
            Ok(()) => {
                self.reload(capability, profile).await;
                self.notifier
                    .confirm(ACTION_UNFOLLOW, format!("Unfollowed {}", name))
            }
            Err(e) => self.notifier.fail(
                ACTION_UNFOLLOW,
                format!("Failed to unfollow {}", name),
                Some(e.to_string()),
            ),
        }
    }

    /// Replace the snapshot with the gateway's view after a mutation
    async fn reload(&self, capability: &Capability, profile: &Profile) {
        match self
            .gateway
            .get_profile(&profile.handle, Some(&capability.profile_id))
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

/// Text of the follow button
pub fn follow_button_label(profile: &Profile) -> &'static str {
    if profile.owned_by_viewer {
        "Edit Profile"
    } else if profile.is_followed_by_me {
        "Unfollow"
    } else {
        "Follow"
    }
}

/// Price hint under the follow button; none on the viewer's own profile
pub fn follow_price_label(profile: &Profile) -> Option<String> {
    if profile.owned_by_viewer {
        return None;
    }
    Some(match profile.charge_policy() {
        Some(policy) => format!(
            "{} ${} to follow",
            policy.amount.value.normalized(),
            policy.amount.currency.symbol
        ),
        None => "Free to follow!".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amount, ChargeFollowPolicy, Currency, FollowEligibility, ProfileStats};

    fn profile(policy: FollowPolicy) -> Profile {
        Profile {
            id: "0x02".into(),
            handle: "stani".into(),
            name: Some("Stani".into()),
            bio: None,
            follow_policy: policy,
            is_followed_by_me: false,
            follow_eligibility: FollowEligibility {
                can_follow: true,
                can_unfollow: false,
            },
            owned_by_viewer: false,
            stats: ProfileStats::default(),
            picture: None,
            cover_picture: None,
        }
    }

    fn charge() -> FollowPolicy {
        FollowPolicy::Charge(ChargeFollowPolicy {
            amount: Amount::new(
                5,
                Currency::new("WMATIC", "0x9c3c9283d3e44854697cd22d3faa240cfb032889", 18),
            ),
            payee_address: "0x2222222222222222222222222222222222222222".into(),
            contract_address: "0x3333333333333333333333333333333333333333".into(),
        })
    }

    #[test]
    fn labels_follow_relationship() {
        let mut p = profile(FollowPolicy::Open);
        assert_eq!(follow_button_label(&p), "Follow");

        p.is_followed_by_me = true;
        assert_eq!(follow_button_label(&p), "Unfollow");

        p.owned_by_viewer = true;
        assert_eq!(follow_button_label(&p), "Edit Profile");
    }

    #[test]
    fn price_label_shows_fee_or_free() {
        assert_eq!(
            follow_price_label(&profile(charge())).as_deref(),
            Some("5 $WMATIC to follow")
        );
        assert_eq!(
            follow_price_label(&profile(FollowPolicy::Open)).as_deref(),
            Some("Free to follow!")
        );

        let mut own = profile(FollowPolicy::Open);
        own.owned_by_viewer = true;
        assert_eq!(follow_price_label(&own), None);
    }
}
