use async_trait::async_trait;
use cinedash_contracts::{
    routes::{utils, videos},
    video::{Video, VideoPage, VideoPayload, VideoStreamPayload},
};
use log::debug;
use url::Url;

use crate::domains::player::{
    errors::{MediaError, MediaResult},
    grant::{GrantSource, MediaAccessGrant},
};
use crate::infrastructure::{api_client::ApiClient, errors::ApiResult};

/// Video and stream endpoints over an authorized [`ApiClient`]
#[derive(Debug, Clone)]
pub struct StreamingApiAdapter {
    client: ApiClient,
}

impl StreamingApiAdapter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// One page of the catalogue. Pages are 1-based.
    pub async fn list_videos(&self, page: u32, limit: u32) -> ApiResult<VideoPage> {
        let (page, limit) = (page.to_string(), limit.to_string());
        let path = utils::with_query(
            videos::COLLECTION,
            &[("page", page.as_str()), ("limit", limit.as_str())],
        );
        self.client.get_cached(&path).await
    }

    /// Signed URLs expire, so this is never served from the cache.
    pub async fn stream(&self, video_id: &str) -> ApiResult<VideoStreamPayload> {
        let path = utils::replace_param(videos::STREAM, "{id}", video_id);
        self.client.get(&path).await
    }

    pub async fn video_metadata(&self, video_id: &str) -> ApiResult<Video> {
        let path = utils::replace_param(videos::ITEM, "{id}", video_id);
        let payload: VideoPayload = self.client.get_cached(&path).await?;
        Ok(payload.video)
    }
}

#[async_trait]
impl GrantSource for StreamingApiAdapter {
    async fn fetch_grant(&self, resource_id: &str) -> MediaResult<MediaAccessGrant> {
        let payload = self
            .stream(resource_id)
            .await
            .map_err(|e| MediaError::GrantRefreshFailed(e.to_string()))?;
        let Some(raw) = payload.playable_url() else {
            return Err(MediaError::GrantRefreshFailed(format!(
                "no playable URL for video {resource_id}"
            )));
        };
        // Relative stream paths are served by the API host itself.
        let url = Url::parse(&self.client.build_url(raw))
            .map_err(|e| MediaError::GrantRefreshFailed(format!("invalid stream URL: {e}")))?;

        let grant = MediaAccessGrant::new(resource_id, url);
        debug!(
            "[StreamingApi] grant for {resource_id} expires at {:?}",
            grant.expires_at
        );
        Ok(grant)
    }
}
