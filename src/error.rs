// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Failure returned by a remote protocol operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The call executed and the protocol refused it
    #[error("{message}")]
    Rejected { message: String },

    #[error("The author has disabled mirroring for this publication")]
    MirroringDisabled,

    #[error("Insufficient funds: {message}")]
    InsufficientFunds { message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// The call did not complete (network, timeout, node unavailable)
    #[error("Network error: {0}")]
    Transient(String),
}

impl GatewayError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure while composing a publication locally
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Failure while saving profile changes
#[derive(Error, Debug)]
pub enum ProfileEditError {
    #[error("Display name must be between 3 and 20 characters")]
    InvalidName,

    #[error("Bio must be at most 1000 characters")]
    BioTooLong,

    #[error("Follow price must be greater than zero")]
    InvalidPrice,

    #[error("Profile images must be images, got {0}")]
    UnsupportedImage(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
