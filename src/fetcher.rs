//! Client for the upstream consumption API.

use crate::errors::FetchError;
use crate::models::RawPayload;
use moka::future::Cache;
use reqwest::Client;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    device_id: u32,
    include_history: bool,
}

/// Result of a fetch that never fails outright: on error the payload is the
/// all-zero fallback and the error is reported next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub payload: Arc<RawPayload>,
    pub error: Option<FetchError>,
}

#[derive(Clone)]
pub struct ConsumptionApi {
    client: Client,
    base_url: String,
    cache: Cache<CacheKey, Arc<RawPayload>>,
}

impl ConsumptionApi {
    pub fn new(
        base_url: impl Into<String>,
        cache_ttl: Duration,
        request_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, base_url, cache_ttl))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, cache_ttl: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            cache: Cache::builder().time_to_live(cache_ttl).build(),
        }
    }

    /// Cached payload for the device, or one GET against the upstream.
    pub async fn fetch(
        &self,
        device_id: u32,
        include_history: bool,
    ) -> Result<Arc<RawPayload>, FetchError> {
        let key = CacheKey {
            device_id,
            include_history,
        };
        if let Some(payload) = self.cache.get(&key).await {
            debug!(device_id, include_history, "consumption cache hit");
            return Ok(payload);
        }

        let payload = Arc::new(self.request(device_id, include_history).await?);
        self.cache.insert(key, Arc::clone(&payload)).await;
        Ok(payload)
    }

    /// Like [`fetch`](Self::fetch), but resolves to `Cancelled` as soon as
    /// `token` fires. The in-flight request is dropped with it.
    pub async fn fetch_cancellable(
        &self,
        device_id: u32,
        include_history: bool,
        token: &CancellationToken,
    ) -> Result<Arc<RawPayload>, FetchError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(FetchError::Cancelled),
            result = self.fetch(device_id, include_history) => result,
        }
    }

    pub async fn fetch_or_default(&self, device_id: u32, include_history: bool) -> FetchOutcome {
        match self.fetch(device_id, include_history).await {
            Ok(payload) => FetchOutcome {
                payload,
                error: None,
            },
            Err(err) => fallback(device_id, err),
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    async fn request(&self, device_id: u32, include_history: bool) -> Result<RawPayload, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("device_id", device_id.to_string()),
                ("historico", include_history.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let payload = serde_json::from_slice(&bytes).map_err(|err| FetchError::Parse(err.to_string()))?;
        debug!(device_id, include_history, bytes = bytes.len(), "fetched consumption payload");
        Ok(payload)
    }
}

fn fallback(device_id: u32, err: FetchError) -> FetchOutcome {
    warn!(device_id, "consumption fetch failed, using zero payload: {err}");
    FetchOutcome {
        payload: Arc::new(RawPayload::zeroed()),
        error: Some(err),
    }
}

/// A long-lived view on one device's data, like a dashboard panel.
///
/// Each [`refresh`](Self::refresh) cancels the request started by the previous
/// one, so only the most recent response is ever applied.
pub struct Subscription {
    api: ConsumptionApi,
    current: Mutex<CancellationToken>,
    latest: Mutex<Option<FetchOutcome>>,
}

impl Subscription {
    pub fn new(api: ConsumptionApi) -> Self {
        Self {
            api,
            current: Mutex::new(CancellationToken::new()),
            latest: Mutex::new(None),
        }
    }

    /// Returns the applied outcome, or `None` when a newer refresh superseded
    /// this one before it finished.
    pub async fn refresh(&self, device_id: u32, include_history: bool) -> Option<FetchOutcome> {
        let token = CancellationToken::new();
        {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            current.cancel();
            *current = token.clone();
        }

        let outcome = match self
            .api
            .fetch_cancellable(device_id, include_history, &token)
            .await
        {
            Ok(payload) => FetchOutcome {
                payload,
                error: None,
            },
            Err(FetchError::Cancelled) => {
                debug!(device_id, "dropping superseded consumption request");
                return None;
            }
            Err(err) => fallback(device_id, err),
        };

        let mut latest = self.latest.lock().unwrap_or_else(|p| p.into_inner());
        if token.is_cancelled() {
            return None;
        }
        *latest = Some(outcome.clone());
        Some(outcome)
    }

    pub fn latest(&self) -> Option<FetchOutcome> {
        self.latest.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
