// REST collaborator for the one-time chat history fetch.

use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use streamchat_common::types::StoredMessage;

use crate::http::{AuthSession, TokenRefresher};

/// The chat history collaborator. The feed sorts whatever comes back;
/// ordering on the wire is not trusted.
#[allow(async_fn_in_trait)]
pub trait HistoryStore {
    async fn fetch_messages(&self, room_id: &str) -> Result<Vec<StoredMessage>>;
}

/// Production history client against the chat service REST API.
pub struct HistoryClient<R> {
    http: reqwest::Client,
    base_url: Url,
    auth: AuthSession<R>,
}

impl<R: TokenRefresher> HistoryClient<R> {
    pub fn new(base_url: Url, auth: AuthSession<R>) -> Self {
        Self { http: reqwest::Client::new(), base_url, auth }
    }

    fn messages_url(&self, room_id: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/api/chat/thread/{room_id}/messages"))
            .map_err(|error| anyhow!("invalid history url for room `{room_id}`: {error}"))
    }
}

impl<R: TokenRefresher> HistoryStore for HistoryClient<R> {
    async fn fetch_messages(&self, room_id: &str) -> Result<Vec<StoredMessage>> {
        let url = self.messages_url(room_id)?;
        let token = self.auth.token().await;

        let mut response = self
            .http
            .get(url.clone())
            .bearer_auth(&token)
            .send()
            .await
            .context("history request failed")?;

        // One retry after a gated token refresh; anything else is the
        // caller's problem.
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(room = room_id, "history fetch rejected, refreshing token");
            let token = self.auth.refresh_token(&token).await?;
            response = self
                .http
                .get(url)
                .bearer_auth(&token)
                .send()
                .await
                .context("history request failed after token refresh")?;
        }

        let response = response.error_for_status().context("history request rejected")?;
        response.json().await.context("history response was not valid JSON")
    }
}
