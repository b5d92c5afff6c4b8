// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use super::{RemoteActionGateway, UploadPayload};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::models::{
    AllowanceGrant, Amount, FollowPolicyUpdate, NewPublication, Profile, ProfileDetails, ProfileId,
    ProfilePage, Publication, PublicationId, PublicationKind, ReactionType,
};

/// Error codes the social node uses for protocol rejections
const NOT_FOUND_CODE: i32 = -32004;
const INSUFFICIENT_FUNDS_CODE: i32 = -32010;
const MIRRORING_DISABLED_CODE: i32 = -32011;

/// Gateway talking JSON-RPC over HTTP to a social node
pub struct RpcGateway {
    client: HttpClient,
}

impl RpcGateway {
    pub fn connect(config: &GatewayConfig) -> Result<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(Duration::from_millis(config.timeout_ms))
            .build(&config.rpc_url)
            .with_context(|| format!("Failed to build RPC client for {}", config.rpc_url))?;

        info!("Connected gateway to social node: {}", config.rpc_url);
        Ok(Self { client })
    }

    async fn call<R: DeserializeOwned>(&self, method: &'static str, params: ArrayParams) -> GatewayResult<R> {
        metrics::record_gateway_call(method);
        debug!("Calling {}", method);

        self.client.request(method, params).await.map_err(|e| {
            error!("{} failed: {}", method, e);
            map_client_error(e)
        })
    }
}

fn follow_params(followee: &ProfileId, follower: &ProfileId, fee: Option<&Amount>) -> ArrayParams {
    rpc_params![followee, follower, fee]
}

/// Posts and comments are created through different methods
fn publication_request(publisher: &ProfileId, publication: &NewPublication) -> (&'static str, ArrayParams) {
    let method = match publication.kind {
        PublicationKind::Post => "social_createPost",
        PublicationKind::Comment { .. } => "social_createComment",
    };
    (method, rpc_params![publisher, publication])
}

fn follow_policy_params(profile: &ProfileId, policy: &FollowPolicyUpdate) -> ArrayParams {
    rpc_params![profile, policy]
}

fn map_client_error(err: ClientError) -> GatewayError {
    match err {
        ClientError::Call(call) => {
            let message = call.message().to_string();
            match call.code() {
                NOT_FOUND_CODE => GatewayError::NotFound(message),
                INSUFFICIENT_FUNDS_CODE => GatewayError::InsufficientFunds { message },
                MIRRORING_DISABLED_CODE => GatewayError::MirroringDisabled,
                _ => GatewayError::Rejected { message },
            }
        }
        other => GatewayError::Transient(other.to_string()),
    }
}

#[async_trait]
impl RemoteActionGateway for RpcGateway {
    async fn get_profile(&self, handle: &str, observer: Option<&ProfileId>) -> GatewayResult<Profile> {
        self.call("social_getProfile", rpc_params![handle, observer]).await
    }

    async fn get_profile_by_id(&self, id: &ProfileId, observer: Option<&ProfileId>) -> GatewayResult<Profile> {
        self.call("social_getProfileById", rpc_params![id, observer]).await
    }

    async fn list_followers(
        &self,
        profile: &ProfileId,
        observer: Option<&ProfileId>,
        cursor: Option<&str>,
        limit: usize,
    ) -> GatewayResult<ProfilePage> {
        self.call("social_getFollowers", rpc_params![profile, observer, cursor, limit])
            .await
    }

    async fn list_following(
        &self,
        profile: &ProfileId,
        observer: Option<&ProfileId>,
        cursor: Option<&str>,
        limit: usize,
    ) -> GatewayResult<ProfilePage> {
        self.call("social_getFollowing", rpc_params![profile, observer, cursor, limit])
            .await
    }

    async fn get_publication(
        &self,
        id: &PublicationId,
        observer: Option<&ProfileId>,
    ) -> GatewayResult<Publication> {
        self.call("social_getPublication", rpc_params![id, observer]).await
    }

    async fn follow(
        &self,
        followee: &ProfileId,
        follower: &ProfileId,
        fee: Option<&Amount>,
    ) -> GatewayResult<()> {
        self.call("social_follow", follow_params(followee, follower, fee)).await
    }

    async fn unfollow(&self, followee: &ProfileId, follower: &ProfileId) -> GatewayResult<()> {
        self.call("social_unfollow", rpc_params![followee, follower]).await
    }

    async fn add_reaction(
        &self,
        publication: &PublicationId,
        profile: &ProfileId,
        reaction: ReactionType,
    ) -> GatewayResult<()> {
        self.call("social_addReaction", rpc_params![publication, profile, reaction])
            .await
    }

    async fn remove_reaction(
        &self,
        publication: &PublicationId,
        profile: &ProfileId,
        reaction: ReactionType,
    ) -> GatewayResult<()> {
        self.call("social_removeReaction", rpc_params![publication, profile, reaction])
            .await
    }

    async fn create_mirror(&self, publisher: &ProfileId, publication: &PublicationId) -> GatewayResult<()> {
        self.call("social_createMirror", rpc_params![publisher, publication]).await
    }

    async fn collect(&self, collector: &ProfileId, publication: &PublicationId) -> GatewayResult<()> {
        self.call("social_collect", rpc_params![collector, publication]).await
    }

    async fn decrypt(&self, viewer: &ProfileId, publication: &Publication) -> GatewayResult<String> {
        self.call("social_decrypt", rpc_params![viewer, &publication.id, &publication.content])
            .await
    }

    async fn approve_allowance(&self, owner: &str, grant: &AllowanceGrant) -> GatewayResult<()> {
        self.call("social_approveAllowance", rpc_params![owner, grant]).await
    }

    async fn upload(&self, payload: UploadPayload) -> GatewayResult<String> {
        match payload {
            UploadPayload::Bytes { data, mime } => {
                let encoded = STANDARD.encode(&data);
                self.call("social_upload", rpc_params![encoded, mime]).await
            }
            UploadPayload::Json { value } => {
                let serialized = value.to_string();
                let encoded = STANDARD.encode(serialized.as_bytes());
                self.call("social_upload", rpc_params![encoded, "application/json"])
                    .await
            }
        }
    }

    async fn create_publication(
        &self,
        publisher: &ProfileId,
        publication: &NewPublication,
    ) -> GatewayResult<Publication> {
        let (method, params) = publication_request(publisher, publication);
        self.call(method, params).await
    }

    async fn update_profile(&self, profile: &ProfileId, details: &ProfileDetails) -> GatewayResult<()> {
        self.call("social_updateProfile", rpc_params![profile, details]).await
    }

    async fn update_profile_image(&self, profile: &ProfileId, image_uri: &str) -> GatewayResult<()> {
        self.call("social_updateProfileImage", rpc_params![profile, image_uri])
            .await
    }

    async fn update_follow_policy(&self, profile: &ProfileId, policy: &FollowPolicyUpdate) -> GatewayResult<()> {
        self.call("social_updateFollowPolicy", follow_policy_params(profile, policy))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectPolicy, ContentFocus, Currency, GateCriteria};
    use jsonrpsee::core::traits::ToRpcParams;
    use jsonrpsee::types::ErrorObjectOwned;
    use serde_json::{json, Value};

    fn wire(params: ArrayParams) -> Value {
        let raw = params
            .to_rpc_params()
            .expect("params serialize")
            .expect("params are not empty");
        serde_json::from_str(raw.get()).expect("params are JSON")
    }

    fn fee() -> Amount {
        Amount::new(5, Currency::new("WMATIC", "0x9c3c9283d3e44854697cd22d3faa240cfb032889", 18))
    }

    #[test]
    fn follow_sends_followee_then_follower_then_fee() {
        let params = wire(follow_params(&"0x02".to_string(), &"0x01".to_string(), Some(&fee())));
        assert_eq!(params[0], "0x02");
        assert_eq!(params[1], "0x01");
        assert_eq!(params[2]["currency"]["symbol"], "WMATIC");

        let free = wire(follow_params(&"0x02".to_string(), &"0x01".to_string(), None));
        assert_eq!(free, json!(["0x02", "0x01", null]));
    }

    #[test]
    fn comments_use_their_own_method() {
        let mut publication = NewPublication {
            kind: PublicationKind::Post,
            content: "gm".into(),
            media: Vec::new(),
            content_focus: ContentFocus::TextOnly,
            gate: GateCriteria::None,
            collect_policy: CollectPolicy::disabled(),
            locale: "en-us".into(),
            content_uri: None,
        };
        let (method, params) = publication_request(&"0x01".to_string(), &publication);
        assert_eq!(method, "social_createPost");
        let params = wire(params);
        assert_eq!(params[0], "0x01");
        assert_eq!(params[1]["content"], "gm");

        publication.kind = PublicationKind::Comment {
            parent_id: "0x02-0x01".into(),
        };
        assert_eq!(publication_request(&"0x01".to_string(), &publication).0, "social_createComment");
    }

    #[test]
    fn charge_policy_is_tagged_on_the_wire() {
        let policy = FollowPolicyUpdate::Charge {
            amount: fee(),
            recipient: "0x1111111111111111111111111111111111111111".into(),
        };
        let params = wire(follow_policy_params(&"0x01".to_string(), &policy));
        assert_eq!(params[0], "0x01");
        assert_eq!(params[1]["type"], "CHARGE");
        assert_eq!(params[1]["recipient"], "0x1111111111111111111111111111111111111111");

        let open = wire(follow_policy_params(&"0x01".to_string(), &FollowPolicyUpdate::Open));
        assert_eq!(open, json!(["0x01", { "type": "OPEN" }]));
    }

    #[test]
    fn call_errors_map_by_code() {
        let err = ClientError::Call(ErrorObjectOwned::owned::<()>(MIRRORING_DISABLED_CODE, "disabled", None));
        assert_eq!(map_client_error(err), GatewayError::MirroringDisabled);

        let err = ClientError::Call(ErrorObjectOwned::owned::<()>(-32000, "Collect denied", None));
        assert_eq!(map_client_error(err), GatewayError::rejected("Collect denied"));
    }

    #[test]
    fn transport_errors_are_transient() {
        assert!(map_client_error(ClientError::RequestTimeout).is_transient());
    }
}
