// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::profile::ChargeFollowPolicy;

/// Permission for `spender` to pull up to `amount` of the viewer's tokens.
///
/// A grant is a one-shot side effect: once submitted it is assumed applied
/// before the follow that depends on it is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceGrant {
    /// Contract allowed to spend the tokens
    pub spender: String,
    /// Token contract the allowance is set on
    pub token_address: String,
    pub amount: Amount,
}

impl AllowanceGrant {
    /// Grant covering exactly the fee of a charge follow policy
    pub fn for_follow_fee(policy: &ChargeFollowPolicy) -> Self {
        Self {
            spender: policy.contract_address.clone(),
            token_address: policy.amount.currency.address.clone(),
            amount: policy.amount.clone(),
        }
    }
}
