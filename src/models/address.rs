// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

/// Number of bytes in an account or contract address
const ADDRESS_LEN: usize = 20;

/// Check that a string is a `0x`-prefixed, 20-byte hex address
pub fn is_valid_address(address: &str) -> bool {
    let Some(body) = address.strip_prefix("0x") else {
        return false;
    };

    match hex::decode(body) {
        Ok(bytes) => bytes.len() == ADDRESS_LEN,
        Err(_) => false,
    }
}

/// Lowercase an address so that comparisons ignore checksum casing
pub fn normalize_address(address: &str) -> String {
    address.to_ascii_lowercase()
}
