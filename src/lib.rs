// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod app;
pub mod config;
pub mod editor;
pub mod eligibility;
pub mod error;
pub mod feed;
pub mod follow;
pub mod format;
pub mod gated;
pub mod gateway;
pub mod interaction;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod publish;
pub mod session;
