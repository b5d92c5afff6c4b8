// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::eligibility::{decrypt_gate, DecryptGate};
use crate::gateway::SharedGateway;
use crate::models::{Publication, PublicationId};
use crate::session::Capability;

/// Lifecycle of a gated publication's body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    /// Not decrypted yet; may start a decrypt on the next evaluation
    Sealed,
    /// A decrypt call is in flight
    Pending,
    /// Plaintext is available
    Revealed,
    /// Viewer is not eligible; no decrypt will be attempted
    Withheld,
}

/// Plaintext overlay of a publication, valid until the source changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedView {
    pub publication_id: PublicationId,
    pub text: String,
}

/// What the reader should display in place of the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedContent {
    Text(String),
    /// Locked placeholder, shown while sealed or decrypting
    Sealed,
    /// Placeholder inviting the viewer to follow the author
    FollowToUnlock { author_handle: String },
    /// Ungated publication delivered without a readable body
    Unavailable,
}

struct ViewState {
    publication: Publication,
    state: ContentState,
    view: Option<DecryptedView>,
    /// Bumped whenever the source publication is replaced
    generation: u64,
    closed: bool,
}

/// Drives decryption of one publication and decides what may be rendered
pub struct GatedContentController {
    gateway: SharedGateway,
    inner: Mutex<ViewState>,
}

impl GatedContentController {
    pub fn new(gateway: SharedGateway, publication: Publication) -> Self {
        Self {
            gateway,
            inner: Mutex::new(ViewState {
                publication,
                state: ContentState::Sealed,
                view: None,
                generation: 0,
                closed: false,
            }),
        }
    }

    pub async fn state(&self) -> ContentState {
        self.inner.lock().await.state
    }

    pub async fn publication(&self) -> Publication {
        self.inner.lock().await.publication.clone()
    }

    pub async fn decrypted_view(&self) -> Option<DecryptedView> {
        self.inner.lock().await.view.clone()
    }

    /// Advance the state machine as far as the current snapshot allows.
    ///
    /// Starts at most one decrypt; evaluating while pending, revealed or
    /// withheld changes nothing.
    pub async fn evaluate(&self, capability: Option<&Capability>) -> ContentState {
        let (publication, generation, viewer) = {
            let mut inner = self.inner.lock().await;
            if inner.closed || !inner.publication.is_gated || inner.state != ContentState::Sealed {
                return inner.state;
            }

            if decrypt_gate(&inner.publication, inner.view.is_some()) == DecryptGate::Withhold {
                if !inner.publication.observer_can_decrypt {
                    info!("Withholding gated publication {}", inner.publication.id);
                    inner.state = ContentState::Withheld;
                }
                return inner.state;
            }

            let Some(capability) = capability else {
                debug!("No session, leaving {} sealed", inner.publication.id);
                return inner.state;
            };

            inner.state = ContentState::Pending;
            debug!("Decrypting publication {}", inner.publication.id);
            (
                inner.publication.clone(),
                inner.generation,
                capability.profile_id.clone(),
            )
        };

        let result = self.gateway.decrypt(&viewer, &publication).await;

        let mut inner = self.inner.lock().await;
        if inner.closed || inner.generation != generation {
            debug!("Discarding decrypt result for replaced publication {}", publication.id);
            return inner.state;
        }

        match result {
            Ok(text) => {
                inner.view = Some(DecryptedView {
                    publication_id: publication.id.clone(),
                    text,
                });
                inner.state = ContentState::Revealed;
                info!("Revealed publication {}", publication.id);
            }
            Err(e) if e.is_transient() => {
                warn!("Decrypt of {} failed, will retry: {}", publication.id, e);
                inner.state = ContentState::Sealed;
            }
            Err(e) => {
                warn!("Decrypt of {} denied: {}", publication.id, e);
                inner.state = ContentState::Withheld;
            }
        }
        inner.state
    }

    /// Content to display for the current state.
    ///
    /// Gated plaintext is only ever taken from a decrypted view.
    pub async fn render(&self) -> RenderedContent {
        let inner = self.inner.lock().await;

        if !inner.publication.is_gated {
            return match inner.publication.public_text() {
                Some(text) => RenderedContent::Text(text.to_string()),
                None => RenderedContent::Unavailable,
            };
        }

        match (inner.state, &inner.view) {
            (ContentState::Revealed, Some(view)) => RenderedContent::Text(view.text.clone()),
            (ContentState::Withheld, _) => RenderedContent::FollowToUnlock {
                author_handle: inner.publication.author.handle.clone(),
            },
            _ => RenderedContent::Sealed,
        }
    }

    /// Replace the source publication, discarding any decrypted view
    pub async fn refresh(&self, publication: Publication) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.publication = publication;
        inner.view = None;
        inner.state = ContentState::Sealed;
        inner.generation += 1;
    }

    /// Tear down: drop plaintext and ignore any in-flight decrypt
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        inner.view = None;
        inner.generation += 1;
    }
}
