use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use shared::{
    domain::{AccountId, ItemId},
    error::RemoteErrorBody,
    protocol::{CounterArgs, ItemRecord, LikeRecord, LikedItemRow},
};
use tracing::debug;
use url::Url;

use crate::error::GatewayError;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

const MODELS_PATH: &str = "rest/v1/models";
const LIKES_PATH: &str = "rest/v1/model_likes";
const INCREMENT_DOWNLOADS_PATH: &str = "rest/v1/rpc/increment_model_downloads";
const INCREMENT_VIEWS_PATH: &str = "rest/v1/rpc/increment_model_views";
const MODEL_SELECT: &str = "*,profiles!models_user_id_fkey(username,display_name)";

/// Authoritative catalog store. Implementations own their deadlines: a call
/// that takes too long must come back as an error, never hang.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Public items, newest first.
    async fn fetch_public_items(&self) -> GatewayResult<Vec<ItemRecord>>;
    async fn fetch_liked_ids(&self, viewer: AccountId) -> GatewayResult<HashSet<ItemId>>;
    async fn insert_like(&self, viewer: AccountId, item_id: ItemId) -> GatewayResult<()>;
    async fn delete_like(&self, viewer: AccountId, item_id: ItemId) -> GatewayResult<()>;
    async fn increment_downloads(&self, item_id: ItemId) -> GatewayResult<()>;
    async fn increment_views(&self, item_id: ItemId) -> GatewayResult<()>;
}

pub struct MissingRemoteGateway;

#[async_trait]
impl RemoteGateway for MissingRemoteGateway {
    async fn fetch_public_items(&self) -> GatewayResult<Vec<ItemRecord>> {
        Err(GatewayError::Unavailable("no catalog backend configured".into()))
    }

    async fn fetch_liked_ids(&self, viewer: AccountId) -> GatewayResult<HashSet<ItemId>> {
        Err(GatewayError::Unavailable(format!(
            "no catalog backend configured for viewer {viewer}"
        )))
    }

    async fn insert_like(&self, _viewer: AccountId, item_id: ItemId) -> GatewayResult<()> {
        Err(GatewayError::Unavailable(format!(
            "cannot like item {item_id} without a catalog backend"
        )))
    }

    async fn delete_like(&self, _viewer: AccountId, item_id: ItemId) -> GatewayResult<()> {
        Err(GatewayError::Unavailable(format!(
            "cannot unlike item {item_id} without a catalog backend"
        )))
    }

    async fn increment_downloads(&self, item_id: ItemId) -> GatewayResult<()> {
        Err(GatewayError::Unavailable(format!(
            "cannot count download of item {item_id} without a catalog backend"
        )))
    }

    async fn increment_views(&self, item_id: ItemId) -> GatewayResult<()> {
        Err(GatewayError::Unavailable(format!(
            "cannot count view of item {item_id} without a catalog backend"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub api_key: String,
    /// Session token of the signed-in viewer; the anonymous key is used
    /// as bearer when absent.
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

/// [`RemoteGateway`] over the backend's REST surface.
pub struct RestGateway {
    http: Client,
    config: GatewayConfig,
}

impl RestGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{path}",
            self.config.base_url.as_str().trim_end_matches('/')
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    async fn execute(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let remote = serde_json::from_str::<RemoteErrorBody>(&body).unwrap_or_else(|_| {
            RemoteErrorBody {
                message: Some(body.trim().to_string()).filter(|text| !text.is_empty()),
                ..RemoteErrorBody::default()
            }
        });
        let error = remote.into_api_error(status.as_u16());
        debug!(status = status.as_u16(), message = %error.message, "gateway: request rejected");
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            error,
        })
    }

    async fn call_counter(&self, path: &str, item_id: ItemId) -> GatewayResult<()> {
        self.execute(
            self.http
                .post(self.endpoint(path))
                .json(&CounterArgs { model_id: item_id }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for RestGateway {
    async fn fetch_public_items(&self) -> GatewayResult<Vec<ItemRecord>> {
        let response = self
            .execute(self.http.get(self.endpoint(MODELS_PATH)).query(&[
                ("select", MODEL_SELECT),
                ("is_public", "eq.true"),
                ("order", "created_at.desc"),
            ]))
            .await?;
        Ok(response.json().await?)
    }

    async fn fetch_liked_ids(&self, viewer: AccountId) -> GatewayResult<HashSet<ItemId>> {
        let response = self
            .execute(self.http.get(self.endpoint(LIKES_PATH)).query(&[
                ("select", "model_id".to_string()),
                ("user_id", format!("eq.{viewer}")),
            ]))
            .await?;
        let rows: Vec<LikedItemRow> = response.json().await?;
        Ok(rows.into_iter().map(|row| row.model_id).collect())
    }

    async fn insert_like(&self, viewer: AccountId, item_id: ItemId) -> GatewayResult<()> {
        self.execute(self.http.post(self.endpoint(LIKES_PATH)).json(&LikeRecord {
            user_id: viewer,
            model_id: item_id,
        }))
        .await?;
        Ok(())
    }

    async fn delete_like(&self, viewer: AccountId, item_id: ItemId) -> GatewayResult<()> {
        self.execute(self.http.delete(self.endpoint(LIKES_PATH)).query(&[
            ("user_id", format!("eq.{viewer}")),
            ("model_id", format!("eq.{item_id}")),
        ]))
        .await?;
        Ok(())
    }

    async fn increment_downloads(&self, item_id: ItemId) -> GatewayResult<()> {
        self.call_counter(INCREMENT_DOWNLOADS_PATH, item_id).await
    }

    async fn increment_views(&self, item_id: ItemId) -> GatewayResult<()> {
        self.call_counter(INCREMENT_VIEWS_PATH, item_id).await
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
