//! Price Service
//!
//! Composes the cache and the executor the way callers are expected to:
//! check the cache, on a miss run the executor, store what came back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::{validate_key, TtlCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resilience::{HttpTransport, ResilientExecutor};

/// Steam app ids with a known display name.
pub fn game_name(app_id: u32) -> &'static str {
    match app_id {
        730 => "CS2",
        570 => "Dota 2",
        _ => "Unknown",
    }
}

/// Cache key for one item's price.
pub fn cache_key(app_id: u32, market_hash_name: &str) -> String {
    format!("skin_{}_{}", app_id, market_hash_name)
}

// == Price Quote ==
/// Raw upstream price payload plus where and when it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub key: String,
    pub app_id: u32,
    pub market_hash_name: String,
    pub game: String,
    /// Upstream body, unparsed
    pub payload: String,
    pub fetched_at: DateTime<Utc>,
    /// True when served from the cache
    pub cached: bool,
}

// == Price Service ==
#[derive(Clone)]
pub struct PriceService {
    cache: TtlCache<PriceQuote>,
    executor: Arc<ResilientExecutor>,
    base_url: Url,
}

impl PriceService {
    /// Builds the production wiring: reqwest transport, system clock, tracing telemetry.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let executor_config = config.executor_config();
        let transport = HttpTransport::new(executor_config.request_timeout)?;
        let executor = ResilientExecutor::new(executor_config, Arc::new(transport))?;
        let cache = TtlCache::new(config.cache_config())?;

        Self::new(cache, Arc::new(executor), &config.upstream_base_url)
    }

    pub fn new(
        cache: TtlCache<PriceQuote>,
        executor: Arc<ResilientExecutor>,
        base_url: &str,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidConfig(format!("upstream base URL: {}", e)))?;
        Ok(Self {
            cache,
            executor,
            base_url,
        })
    }

    pub fn cache(&self) -> &TtlCache<PriceQuote> {
        &self.cache
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    /// Upstream URL for one item, with the item name query-encoded.
    pub fn price_url(&self, app_id: u32, market_hash_name: &str) -> Result<String> {
        let endpoint = format!(
            "{}/priceoverview/",
            self.base_url.as_str().trim_end_matches('/')
        );
        let app_id = app_id.to_string();
        let url = Url::parse_with_params(
            &endpoint,
            &[
                ("appid", app_id.as_str()),
                ("currency", "1"),
                ("market_hash_name", market_hash_name),
            ],
        )
        .map_err(|e| Error::InvalidConfig(format!("price URL: {}", e)))?;
        Ok(url.into())
    }

    /// Current price for an item, from the cache when possible.
    pub async fn price(&self, app_id: u32, market_hash_name: &str) -> Result<PriceQuote> {
        self.price_with_cancel(app_id, market_hash_name, &CancellationToken::new())
            .await
    }

    pub async fn price_with_cancel(
        &self,
        app_id: u32,
        market_hash_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PriceQuote> {
        validate_key(market_hash_name)?;
        let key = cache_key(app_id, market_hash_name);

        if let Some(mut quote) = self.cache.get(&key).await {
            quote.cached = true;
            return Ok(quote);
        }

        let url = self.price_url(app_id, market_hash_name)?;
        info!(app_id, market_hash_name, "Fetching price");
        let payload = self.executor.execute_with_cancel(&url, cancel).await?;

        let quote = PriceQuote {
            key: key.clone(),
            app_id,
            market_hash_name: market_hash_name.to_string(),
            game: game_name(app_id).to_string(),
            payload,
            fetched_at: Utc::now(),
            cached: false,
        };
        self.cache.set(&key, quote.clone()).await?;

        Ok(quote)
    }
}
