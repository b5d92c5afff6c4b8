// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use serde_json::json;
use tracing::{debug, info};

use crate::error::PublishError;
use crate::feed::Feed;
use crate::gateway::{SharedGateway, UploadPayload};
use crate::models::{
    CollectPolicy, ContentFocus, GateCriteria, MediaObject, MediaType, NewPublication,
    Publication, PublicationId, PublicationKind,
};
use crate::notify::{ActionOutcome, Notifier, SuppressReason};
use crate::session::Capability;

const ACTION_POST: &str = "post";
const ACTION_COMMENT: &str = "comment";
const LOCALE: &str = "en-us";

/// A local file picked for attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub content: String,
    pub media: Option<MediaFile>,
    /// Gate the post so only the publisher's followers can read it
    pub followers_only: bool,
}

impl PostDraft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.media.is_none()
    }
}

pub fn media_type_for(mime: &str) -> Result<MediaType, PublishError> {
    match mime {
        "image/png" => Ok(MediaType::Png),
        "image/jpeg" => Ok(MediaType::Jpeg),
        "image/gif" => Ok(MediaType::Gif),
        "image/webp" => Ok(MediaType::Webp),
        "video/mp4" => Ok(MediaType::Mp4),
        "audio/mp3" => Ok(MediaType::Mp3),
        "audio/ogg" => Ok(MediaType::Ogg),
        "audio/wav" => Ok(MediaType::Wav),
        other => Err(PublishError::UnsupportedMediaType(other.to_string())),
    }
}

pub fn content_focus_for(mime: &str) -> ContentFocus {
    if mime.starts_with("image/") {
        ContentFocus::Image
    } else if mime.starts_with("video/") {
        ContentFocus::Video
    } else if mime.starts_with("audio/") {
        ContentFocus::Audio
    } else {
        ContentFocus::TextOnly
    }
}

/// Turn an `ipfs://cid/path` URI into a URL on the public gateway.
///
/// Anything that is not an `ipfs://` URI is returned as is.
pub fn resolve_upload_url(gateway_url: &str, uri: &str) -> String {
    match uri.strip_prefix("ipfs://") {
        Some(rest) => format!("{}/{}", gateway_url.trim_end_matches('/'), rest),
        None => uri.to_string(),
    }
}

/// Creates posts and comments on behalf of the viewer
pub struct PostComposer {
    gateway: SharedGateway,
    notifier: Notifier,
    ipfs_gateway_url: String,
}

impl PostComposer {
    pub fn new(gateway: SharedGateway, notifier: Notifier, ipfs_gateway_url: impl Into<String>) -> Self {
        Self {
            gateway,
            notifier,
            ipfs_gateway_url: ipfs_gateway_url.into(),
        }
    }

    pub async fn create_post(
        &self,
        capability: Option<&Capability>,
        draft: PostDraft,
        feed: &Feed,
    ) -> ActionOutcome {
        let Some(capability) = capability else {
            return self.notifier.suppress(ACTION_POST, SuppressReason::SignedOut);
        };
        if draft.is_empty() {
            return self.notifier.suppress(ACTION_POST, SuppressReason::EmptyDraft);
        }

        match self.publish_post(capability, draft).await {
            Ok(publication) => {
                info!("Created post {}", publication.id);
                feed.append(publication).await;
                self.notifier.confirm(ACTION_POST, "Post created!")
            }
            Err(e) => self.notifier.fail(
                ACTION_POST,
                "Error creating post.",
                Some(format!(
                    "Something went wrong creating your post. Please try again later. ({})",
                    e
                )),
            ),
        }
    }

    /// Comment on `parent`; comments are text only and never collectable
    pub async fn create_comment(
        &self,
        capability: Option<&Capability>,
        parent: &PublicationId,
        text: &str,
        feed: &Feed,
    ) -> ActionOutcome {
        let Some(capability) = capability else {
            return self.notifier.suppress(ACTION_COMMENT, SuppressReason::SignedOut);
        };
        if text.trim().is_empty() {
            return self.notifier.suppress(ACTION_COMMENT, SuppressReason::EmptyDraft);
        }

        let publication = NewPublication {
            kind: PublicationKind::Comment {
                parent_id: parent.clone(),
            },
            content: text.to_string(),
            media: Vec::new(),
            content_focus: ContentFocus::TextOnly,
            gate: GateCriteria::None,
            collect_policy: CollectPolicy::disabled(),
            locale: LOCALE.to_string(),
            content_uri: None,
        };

        match self.submit(capability, publication).await {
            Ok(comment) => {
                info!("Created comment {} on {}", comment.id, parent);
                feed.append(comment).await;
                self.notifier.confirm(ACTION_COMMENT, "Comment created.")
            }
            Err(e) => self
                .notifier
                .fail(ACTION_COMMENT, "Failed to create comment", Some(e.to_string())),
        }
    }

    async fn publish_post(&self, capability: &Capability, draft: PostDraft) -> Result<Publication, PublishError> {
        let (media, content_focus) = match draft.media {
            Some(file) => {
                let mime_type = media_type_for(&file.mime)?;
                let focus = content_focus_for(&file.mime);
                let uri = self
                    .gateway
                    .upload(UploadPayload::Bytes {
                        data: file.bytes,
                        mime: file.mime,
                    })
                    .await?;
                let url = resolve_upload_url(&self.ipfs_gateway_url, &uri);
                debug!("Uploaded media to {}", url);
                (vec![MediaObject { url, mime_type }], focus)
            }
            None => (Vec::new(), ContentFocus::TextOnly),
        };

        let gate = if draft.followers_only {
            GateCriteria::FollowProfile {
                profile_id: capability.profile_id.clone(),
            }
        } else {
            GateCriteria::None
        };

        let publication = NewPublication {
            kind: PublicationKind::Post,
            content: draft.content,
            media,
            content_focus,
            gate,
            collect_policy: CollectPolicy::disabled(),
            locale: LOCALE.to_string(),
            content_uri: None,
        };

        Ok(self.submit(capability, publication).await?)
    }

    /// Upload the metadata document, then create the publication
    async fn submit(
        &self,
        capability: &Capability,
        mut publication: NewPublication,
    ) -> Result<Publication, PublishError> {
        let metadata = json!({
            "version": "2.0.0",
            "locale": publication.locale,
            "content": publication.content,
            "mainContentFocus": publication.content_focus,
            "media": publication.media,
        });
        let uri = self.gateway.upload(UploadPayload::Json { value: metadata }).await?;
        publication.content_uri = Some(resolve_upload_url(&self.ipfs_gateway_url, &uri));

        Ok(self
            .gateway
            .create_publication(&capability.profile_id, &publication)
            .await?)
    }
}
