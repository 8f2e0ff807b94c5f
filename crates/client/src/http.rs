// Bearer-token session with a single-flight refresh gate.
//
// Concurrent 401 handlers must not stampede the token endpoint: the
// first caller performs the refresh while the rest queue as waiters
// and are all released with the same outcome. The gate is an explicit
// state object (flag + waiter list) rather than module-level statics.

use anyhow::{anyhow, Result};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

/// Exchanges an expired bearer token for a fresh one.
#[allow(async_fn_in_trait)]
pub trait TokenRefresher {
    async fn refresh(&self, expired: &str) -> Result<String>;
}

/// Refresher for deployments without a token endpoint; any 401 is
/// surfaced to the caller instead of retried.
pub struct StaticToken;

impl TokenRefresher for StaticToken {
    async fn refresh(&self, _expired: &str) -> Result<String> {
        Err(anyhow!("token expired and no refresh endpoint is configured"))
    }
}

pub struct AuthSession<R> {
    refresher: R,
    inner: Mutex<SessionState>,
}

struct SessionState {
    token: String,
    refresh_in_flight: bool,
    // Errors cross the channel as strings; anyhow errors don't clone.
    waiters: Vec<oneshot::Sender<Result<String, String>>>,
}

impl<R: TokenRefresher> AuthSession<R> {
    pub fn new(token: impl Into<String>, refresher: R) -> Self {
        Self {
            refresher,
            inner: Mutex::new(SessionState {
                token: token.into(),
                refresh_in_flight: false,
                waiters: Vec::new(),
            }),
        }
    }

    /// Current bearer token.
    pub async fn token(&self) -> String {
        self.inner.lock().await.token.clone()
    }

    /// Refresh the token, collapsing concurrent callers into a single
    /// request. `observed` is the token the caller saw rejected; if a
    /// refresh already replaced it, the newer token is returned
    /// without another round trip.
    pub async fn refresh_token(&self, observed: &str) -> Result<String> {
        let waiter = {
            let mut state = self.inner.lock().await;
            if state.token != observed {
                return Ok(state.token.clone());
            }
            if state.refresh_in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refresh_in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("queued behind an in-flight token refresh");
            return match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(message)) => Err(anyhow!(message)),
                Err(_) => Err(anyhow!("token refresh was abandoned")),
            };
        }

        let outcome = self.refresher.refresh(observed).await;

        let mut state = self.inner.lock().await;
        state.refresh_in_flight = false;
        let shared = match &outcome {
            Ok(token) => {
                state.token = token.clone();
                Ok(token.clone())
            }
            Err(error) => Err(format!("{error:#}")),
        };
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(shared.clone());
        }
        outcome
    }
}
