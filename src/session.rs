// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::models::ProfileId;

/// Proof that the viewer is signed in with a usable wallet.
///
/// Components that act on behalf of the viewer take an
/// `Option<&Capability>`; `None` disables their triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub profile_id: ProfileId,
    /// Wallet address that signs and pays
    pub address: String,
}

/// Wallet and sign-in state, passed explicitly to every component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub wallet_ready: bool,
    /// Wallet is connected to a different chain than the protocol's
    pub network_mismatch: bool,
    pub viewer_profile: Option<ProfileId>,
    pub viewer_address: Option<String>,
}

impl SessionContext {
    pub fn signed_in(profile_id: impl Into<ProfileId>, address: impl Into<String>) -> Self {
        Self {
            wallet_ready: true,
            network_mismatch: false,
            viewer_profile: Some(profile_id.into()),
            viewer_address: Some(address.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    /// The viewer's capability, if every session precondition holds
    pub fn capability(&self) -> Option<Capability> {
        if !self.wallet_ready || self.network_mismatch {
            return None;
        }

        match (&self.viewer_profile, &self.viewer_address) {
            (Some(profile_id), Some(address)) => Some(Capability {
                profile_id: profile_id.clone(),
                address: address.clone(),
            }),
            _ => None,
        }
    }

    /// Profile used as observer when fetching, even without a wallet
    pub fn observer(&self) -> Option<&ProfileId> {
        self.viewer_profile.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_requires_ready_wallet_on_right_network() {
        let mut session = SessionContext::signed_in("0x01", "0x9c3c9283d3e44854697cd22d3faa240cfb032889");
        assert!(session.capability().is_some());

        session.network_mismatch = true;
        assert!(session.capability().is_none());

        session.network_mismatch = false;
        session.wallet_ready = false;
        assert!(session.capability().is_none());
    }

    #[test]
    fn signed_out_has_no_capability() {
        assert_eq!(SessionContext::signed_out().capability(), None);
    }
}
