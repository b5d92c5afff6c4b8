// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::address::is_valid_address;
use crate::models::Currency;
use crate::session::SessionContext;

/// Wrapped MATIC, the default follow fee token
pub const DEFAULT_FEE_TOKEN_SYMBOL: &str = "WMATIC";
pub const DEFAULT_FEE_TOKEN_ADDRESS: &str = "0x9c3c9283d3e44854697cd22d3faa240cfb032889";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub viewer: ViewerConfig,
    pub fees: FeeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    /// JSON-RPC against a social node
    Rpc,
    /// Local sandbox with demo data
    Memory,
}

impl FromStr for GatewayMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rpc" => Ok(GatewayMode::Rpc),
            "memory" => Ok(GatewayMode::Memory),
            other => Err(anyhow!("Unknown gateway mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    pub rpc_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Public HTTP gateway used to resolve `ipfs://` URIs
    pub ipfs_gateway_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub profile_id: Option<String>,
    pub address: Option<String>,
    pub wallet_ready: bool,
    pub network_mismatch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    pub token_symbol: String,
    pub token_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        let _ = dotenv::dotenv();

        let address = env::var("VIEWER_ADDRESS").ok();
        let wallet_ready = match env::var("WALLET_READY") {
            Ok(value) => parse_flag("WALLET_READY", &value)?,
            Err(_) => address.is_some(),
        };

        let config = Config {
            gateway: GatewayConfig {
                mode: env::var("GATEWAY_MODE")
                    .unwrap_or_else(|_| "memory".to_string())
                    .parse()?,
                rpc_url: env::var("GATEWAY_RPC_URL").unwrap_or_else(|_| "http://localhost:9000".to_string()),
                timeout_ms: env::var("GATEWAY_TIMEOUT_MS")
                    .unwrap_or_else(|_| "30000".to_string())
                    .parse()
                    .context("GATEWAY_TIMEOUT_MS must be a number")?,
            },
            storage: StorageConfig {
                ipfs_gateway_url: env::var("IPFS_GATEWAY_URL")
                    .unwrap_or_else(|_| "https://gateway.ipfscdn.io/ipfs".to_string()),
            },
            viewer: ViewerConfig {
                profile_id: env::var("VIEWER_PROFILE_ID").ok(),
                address,
                wallet_ready,
                network_mismatch: match env::var("NETWORK_MISMATCH") {
                    Ok(value) => parse_flag("NETWORK_MISMATCH", &value)?,
                    Err(_) => false,
                },
            },
            fees: FeeConfig {
                token_symbol: env::var("FOLLOW_FEE_TOKEN_SYMBOL")
                    .unwrap_or_else(|_| DEFAULT_FEE_TOKEN_SYMBOL.to_string()),
                token_address: env::var("FOLLOW_FEE_TOKEN_ADDRESS")
                    .unwrap_or_else(|_| DEFAULT_FEE_TOKEN_ADDRESS.to_string()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(address) = &self.viewer.address {
            if !is_valid_address(address) {
                bail!("VIEWER_ADDRESS is not a valid address: {}", address);
            }
        }
        if !is_valid_address(&self.fees.token_address) {
            bail!(
                "FOLLOW_FEE_TOKEN_ADDRESS is not a valid address: {}",
                self.fees.token_address
            );
        }
        Ok(())
    }

    /// Session state derived from the configured viewer
    pub fn session(&self) -> SessionContext {
        SessionContext {
            wallet_ready: self.viewer.wallet_ready,
            network_mismatch: self.viewer.network_mismatch,
            viewer_profile: self.viewer.profile_id.clone(),
            viewer_address: self.viewer.address.clone(),
        }
    }

    pub fn fee_currency(&self) -> Currency {
        Currency::new(&self.fees.token_symbol, &self.fees.token_address, 18)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(anyhow!("{} must be a boolean, got {}", name, other)),
    }
}
