// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::GatewayResult;
use crate::gated::{ContentState, GatedContentController};
use crate::gateway::SharedGateway;
use crate::interaction::InteractionStateMachine;
use crate::models::{ProfileId, Publication, PublicationId};
use crate::notify::Notifier;
use crate::session::Capability;

/// Gated content and interaction state of one publication in a feed
pub struct PublicationController {
    pub id: PublicationId,
    pub content: GatedContentController,
    pub interactions: InteractionStateMachine,
}

impl PublicationController {
    pub fn new(gateway: SharedGateway, notifier: Notifier, publication: Publication) -> Self {
        Self {
            id: publication.id.clone(),
            content: GatedContentController::new(gateway.clone(), publication.clone()),
            interactions: InteractionStateMachine::new(gateway, notifier, publication),
        }
    }

    /// Hand a freshly fetched snapshot to both controllers
    pub async fn refresh(&self, publication: Publication) {
        self.content.refresh(publication.clone()).await;
        self.interactions.refresh(publication).await;
    }

    pub async fn close(&self) {
        self.content.close().await;
        self.interactions.close().await;
    }
}

/// Ordered list of publications shown to the viewer
pub struct Feed {
    gateway: SharedGateway,
    notifier: Notifier,
    entries: Mutex<Vec<Arc<PublicationController>>>,
}

impl Feed {
    pub fn new(gateway: SharedGateway, notifier: Notifier) -> Self {
        Self {
            gateway,
            notifier,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Replace the feed contents, tearing down the previous controllers
    pub async fn load(&self, publications: Vec<Publication>) {
        let fresh: Vec<_> = publications
            .into_iter()
            .map(|p| Arc::new(PublicationController::new(self.gateway.clone(), self.notifier.clone(), p)))
            .collect();

        let previous = std::mem::replace(&mut *self.entries.lock().await, fresh);
        for entry in previous {
            entry.close().await;
        }
    }

    /// Add a publication at the end; a known id refreshes the existing entry
    pub async fn append(&self, publication: Publication) -> Arc<PublicationController> {
        let mut entries = self.entries.lock().await;
        let existing = entries.iter().find(|e| e.id == publication.id).cloned();
        if let Some(existing) = existing {
            drop(entries);
            existing.refresh(publication).await;
            return existing;
        }

        debug!("Appending {} to feed", publication.id);
        let entry = Arc::new(PublicationController::new(
            self.gateway.clone(),
            self.notifier.clone(),
            publication,
        ));
        entries.push(entry.clone());
        entry
    }

    pub async fn get(&self, id: &str) -> Option<Arc<PublicationController>> {
        self.entries.lock().await.iter().find(|e| e.id == id).cloned()
    }

    pub async fn ids(&self) -> Vec<PublicationId> {
        self.entries.lock().await.iter().map(|e| e.id.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Evaluate every entry's gated content concurrently
    pub async fn reveal_all(&self, capability: Option<&Capability>) -> Vec<(PublicationId, ContentState)> {
        let entries = self.entries.lock().await.clone();

        let states = join_all(entries.iter().map(|e| e.content.evaluate(capability))).await;
        entries.iter().map(|e| e.id.clone()).zip(states).collect()
    }

    /// Refetch one publication for the viewer and push it to its controllers
    pub async fn refresh(&self, id: &PublicationId, capability: Option<&Capability>) -> GatewayResult<()> {
        let Some(entry) = self.get(id).await else {
            return Ok(());
        };

        let observer = capability.map(|c| &c.profile_id);
        let publication = self.gateway.get_publication(id, observer).await?;
        entry.refresh(publication).await;
        Ok(())
    }

    /// Refetch every entry written by `author`, e.g. after the viewer's
    /// relationship to them changed. All entries are attempted; the first
    /// error is returned.
    pub async fn refresh_author(&self, author: &ProfileId, capability: Option<&Capability>) -> GatewayResult<usize> {
        let entries = self.entries.lock().await.clone();
        let mut ids = Vec::new();
        for entry in entries {
            if &entry.interactions.publication().await.author.id == author {
                ids.push(entry.id.clone());
            }
        }

        debug!("Refreshing {} feed entries by {}", ids.len(), author);
        let results = join_all(ids.iter().map(|id| self.refresh(id, capability))).await;
        results.into_iter().collect::<GatewayResult<Vec<()>>>()?;
        Ok(ids.len())
    }

    /// Tear down every entry and empty the feed
    pub async fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.lock().await);
        info!("Clearing {} feed entries", entries.len());
        for entry in entries {
            entry.close().await;
        }
    }
}
