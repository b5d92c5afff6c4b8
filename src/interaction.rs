// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::eligibility::{resolve_collect_action, CollectDecision};
use crate::error::GatewayResult;
use crate::gateway::SharedGateway;
use crate::models::{Publication, PublicationId, PublicationStats, ReactionType};
use crate::notify::{ActionOutcome, Notifier, SuppressReason};
use crate::session::Capability;

/// One of the independent toggles a viewer has on a publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Reaction(ReactionType),
    Mirror,
    Collect,
}

impl InteractionKind {
    fn action(&self) -> &'static str {
        match self {
            InteractionKind::Reaction(_) => "reaction",
            InteractionKind::Mirror => "mirror",
            InteractionKind::Collect => "collect",
        }
    }
}

/// Local overlay on top of the authoritative snapshot, per toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overlay {
    /// Remote call in flight; shows the value it will produce
    Pending { target: bool },
    /// Call succeeded but no fresh snapshot was obtained yet
    Confirmed { value: bool },
}

/// What the reader should show for a publication's interactions.
///
/// Counts always come from the last fetched snapshot and are never adjusted
/// locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionView {
    pub upvoted: bool,
    pub downvoted: bool,
    pub mirrored: bool,
    pub collected: bool,
    pub stats: PublicationStats,
    pub in_flight: Vec<InteractionKind>,
}

struct Inner {
    publication: Publication,
    overlays: HashMap<InteractionKind, Overlay>,
    closed: bool,
}

impl Inner {
    fn authoritative(&self, kind: InteractionKind) -> bool {
        match kind {
            InteractionKind::Reaction(reaction) => self.publication.has_reacted(reaction),
            InteractionKind::Mirror => self.publication.is_mirrored_by_me,
            InteractionKind::Collect => self.publication.has_collected_by_me,
        }
    }

    fn displayed(&self, kind: InteractionKind) -> bool {
        match self.overlays.get(&kind) {
            Some(Overlay::Pending { target }) => *target,
            Some(Overlay::Confirmed { value }) => *value,
            None => self.authoritative(kind),
        }
    }

    fn is_pending(&self, kind: InteractionKind) -> bool {
        matches!(self.overlays.get(&kind), Some(Overlay::Pending { .. }))
    }

    /// Adopt a fresh snapshot; only in-flight overlays survive it
    fn replace_snapshot(&mut self, publication: Publication) {
        self.publication = publication;
        self.overlays
            .retain(|_, overlay| matches!(overlay, Overlay::Pending { .. }));
    }
}

/// Reaction, mirror and collect state of one publication for one viewer
pub struct InteractionStateMachine {
    gateway: SharedGateway,
    notifier: Notifier,
    inner: Mutex<Inner>,
}

impl InteractionStateMachine {
    pub fn new(gateway: SharedGateway, notifier: Notifier, publication: Publication) -> Self {
        Self {
            gateway,
            notifier,
            inner: Mutex::new(Inner {
                publication,
                overlays: HashMap::new(),
                closed: false,
            }),
        }
    }

    pub async fn publication(&self) -> Publication {
        self.inner.lock().await.publication.clone()
    }

    pub async fn is_active(&self, kind: InteractionKind) -> bool {
        self.inner.lock().await.displayed(kind)
    }

    pub async fn is_in_flight(&self, kind: InteractionKind) -> bool {
        self.inner.lock().await.is_pending(kind)
    }

    pub async fn view(&self) -> InteractionView {
        let inner = self.inner.lock().await;
        let mut in_flight: Vec<InteractionKind> = inner
            .overlays
            .iter()
            .filter(|(_, overlay)| matches!(overlay, Overlay::Pending { .. }))
            .map(|(kind, _)| *kind)
            .collect();
        in_flight.sort_by_key(|kind| kind.action());

        InteractionView {
            upvoted: inner.displayed(InteractionKind::Reaction(ReactionType::Upvote)),
            downvoted: inner.displayed(InteractionKind::Reaction(ReactionType::Downvote)),
            mirrored: inner.displayed(InteractionKind::Mirror),
            collected: inner.displayed(InteractionKind::Collect),
            stats: inner.publication.stats,
            in_flight,
        }
    }

    /// Replace the snapshot with a freshly fetched one
    pub async fn refresh(&self, publication: Publication) {
        let mut inner = self.inner.lock().await;
        if !inner.closed {
            inner.replace_snapshot(publication);
        }
    }

    /// Tear down; in-flight calls still notify but no longer touch state
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        inner.overlays.clear();
    }

    /// Add the reaction if absent, remove it if present
    pub async fn toggle_reaction(
        &self,
        capability: Option<&Capability>,
        reaction: ReactionType,
    ) -> ActionOutcome {
        let kind = InteractionKind::Reaction(reaction);
        let Some(capability) = capability else {
            return self.notifier.suppress(kind.action(), SuppressReason::SignedOut);
        };

        let (publication_id, target) = match self.begin(kind, |inner| Ok(!inner.displayed(kind))).await {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let result = if target {
            self.gateway
                .add_reaction(&publication_id, &capability.profile_id, reaction)
                .await
        } else {
            self.gateway
                .remove_reaction(&publication_id, &capability.profile_id, reaction)
                .await
        };

        let (done, failed) = if target {
            (format!("Added {}", reaction), format!("Failed to {}", reaction))
        } else {
            (format!("Removed {}", reaction), format!("Failed to remove {}", reaction))
        };

        self.settle(capability, kind, &publication_id, target, result, done, failed)
            .await
    }

    /// Mirror the publication to the viewer's followers
    pub async fn mirror(&self, capability: Option<&Capability>) -> ActionOutcome {
        let kind = InteractionKind::Mirror;
        let Some(capability) = capability else {
            return self.notifier.suppress(kind.action(), SuppressReason::SignedOut);
        };

        let started = self
            .begin(kind, |inner| {
                if inner.displayed(kind) {
                    Err(Gate::Suppress(SuppressReason::AlreadyMirrored))
                } else {
                    Ok(true)
                }
            })
            .await;
        let (publication_id, target) = match started {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let result = self
            .gateway
            .create_mirror(&capability.profile_id, &publication_id)
            .await;

        self.settle(
            capability,
            kind,
            &publication_id,
            target,
            result,
            "Mirrored post".to_string(),
            "Failed to mirror post".to_string(),
        )
        .await
    }

    /// Collect the publication, unless its collect policy denies it up front
    pub async fn collect(&self, capability: Option<&Capability>) -> ActionOutcome {
        let kind = InteractionKind::Collect;
        let Some(capability) = capability else {
            return self.notifier.suppress(kind.action(), SuppressReason::SignedOut);
        };

        let started = self
            .begin(kind, |inner| {
                if inner.displayed(kind) {
                    return Err(Gate::Suppress(SuppressReason::AlreadyCollected));
                }
                match resolve_collect_action(&inner.publication) {
                    CollectDecision::Proceed => Ok(true),
                    CollectDecision::Deny(reason) => Err(Gate::Deny {
                        title: reason.title(),
                        description: reason.description(),
                    }),
                }
            })
            .await;
        let (publication_id, target) = match started {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let result = self
            .gateway
            .collect(&capability.profile_id, &publication_id)
            .await;

        self.settle(
            capability,
            kind,
            &publication_id,
            target,
            result,
            "Collected post".to_string(),
            "Failed to collect post".to_string(),
        )
        .await
    }

    /// Check guards and mark `kind` in flight.
    ///
    /// `decide` sees the locked state and returns the target value, or why
    /// the action stops here.
    async fn begin<F>(&self, kind: InteractionKind, decide: F) -> Result<(PublicationId, bool), ActionOutcome>
    where
        F: FnOnce(&Inner) -> Result<bool, Gate>,
    {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(self.notifier.suppress(kind.action(), SuppressReason::Closed));
        }
        if inner.is_pending(kind) {
            return Err(self.notifier.suppress(kind.action(), SuppressReason::InFlight));
        }

        match decide(&*inner) {
            Ok(target) => {
                inner.overlays.insert(kind, Overlay::Pending { target });
                debug!("{:?} on {} in flight", kind, inner.publication.id);
                Ok((inner.publication.id.clone(), target))
            }
            Err(Gate::Suppress(reason)) => Err(self.notifier.suppress(kind.action(), reason)),
            Err(Gate::Deny { title, description }) => {
                info!("{:?} on {} denied: {}", kind, inner.publication.id, title);
                Err(self
                    .notifier
                    .fail(kind.action(), title, Some(description.to_string())))
            }
        }
    }

    /// Resolve an in-flight toggle with the remote result
    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &self,
        capability: &Capability,
        kind: InteractionKind,
        publication_id: &PublicationId,
        target: bool,
        result: GatewayResult<()>,
        done: String,
        failed: String,
    ) -> ActionOutcome {
        if let Err(e) = result {
            let mut inner = self.inner.lock().await;
            if !inner.closed {
                inner.overlays.remove(&kind);
            }
            drop(inner);
            return self.notifier.fail(kind.action(), failed, Some(e.to_string()));
        }

        // Remote truth wins over the local flip whenever it can be fetched
        let refreshed = self
            .gateway
            .get_publication(publication_id, Some(&capability.profile_id))
            .await;

        let mut inner = self.inner.lock().await;
        if !inner.closed {
            inner.overlays.remove(&kind);
            match refreshed {
                Ok(publication) => inner.replace_snapshot(publication),
                Err(e) => {
                    warn!("Failed to refresh {} after {:?}: {}", publication_id, kind, e);
                    inner.overlays.insert(kind, Overlay::Confirmed { value: target });
                }
            }
        }
        drop(inner);

        self.notifier.confirm(kind.action(), done)
    }
}

/// Why `begin` stopped before any remote call
enum Gate {
    Suppress(SuppressReason),
    Deny {
        title: &'static str,
        description: &'static str,
    },
}
