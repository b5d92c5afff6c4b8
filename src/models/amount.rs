// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// ERC-20 style token a fee is denominated in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    /// Ticker symbol, e.g. `WMATIC`
    pub symbol: String,
    /// Token contract address
    pub address: String,
    pub decimals: u8,
}

impl Currency {
    pub fn new(symbol: impl Into<String>, address: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address: address.into(),
            decimals,
        }
    }
}

/// A token amount in whole units (not wei)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: BigDecimal,
    pub currency: Currency,
}

impl Amount {
    pub fn new(value: impl Into<BigDecimal>, currency: Currency) -> Self {
        Self {
            value: value.into(),
            currency,
        }
    }

    /// Whether this amount covers `other`; amounts in different currencies never do
    pub fn covers(&self, other: &Amount) -> bool {
        self.currency.address.eq_ignore_ascii_case(&other.currency.address) && self.value >= other.value
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value.normalized(), self.currency.symbol)
    }
}
