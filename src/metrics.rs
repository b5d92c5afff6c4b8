// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

/// Counters for user actions and remote calls
pub struct ClientMetrics {
    registry: Registry,
    actions: IntCounterVec,
    gateway_calls: IntCounterVec,
}

impl ClientMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let actions = IntCounterVec::new(
            Opts::new(
                "social_client_actions_total",
                "User actions by resolved outcome",
            ),
            &["action", "outcome"],
        )?;
        registry.register(Box::new(actions.clone()))?;

        let gateway_calls = IntCounterVec::new(
            Opts::new(
                "social_client_gateway_calls_total",
                "Remote protocol operations issued",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(gateway_calls.clone()))?;

        Ok(Self {
            registry,
            actions,
            gateway_calls,
        })
    }
}

static METRICS: Lazy<Option<ClientMetrics>> = Lazy::new(|| match ClientMetrics::new() {
    Ok(metrics) => Some(metrics),
    Err(e) => {
        error!("Failed to initialize metrics: {}", e);
        None
    }
});

/// Count a user action that resolved to `outcome`
pub fn record_action(action: &str, outcome: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.actions.with_label_values(&[action, outcome]).inc();
    }
}

/// Count a remote call issued through a gateway
pub fn record_gateway_call(operation: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.gateway_calls.with_label_values(&[operation]).inc();
    }
}

/// Render all counters in the Prometheus text format
pub fn gather_text() -> Result<String> {
    let Some(metrics) = METRICS.as_ref() else {
        return Ok(String::new());
    };

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metrics.registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
