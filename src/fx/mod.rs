// src/fx/mod.rs
//! Exchange rates from a third-party HTTP API, cached per base currency.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::FxConfig;

/// Currency code → units of that currency per one unit of the base.
pub type Rates = BTreeMap<String, f64>;

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
    #[serde(default, alias = "conversion_rates")]
    rates: Option<Rates>,
}

/// Parse a rates payload. Accepts either a `rates` or a `conversion_rates` object.
pub fn parse_rates(body: &str) -> Result<Rates> {
    let resp: RatesResponse =
        serde_json::from_str(body).context("rate response is not valid JSON")?;
    if resp.result.as_deref() == Some("error") {
        bail!(
            "rate API returned an error: {}",
            resp.error_type.as_deref().unwrap_or("unknown")
        );
    }
    resp.rates
        .ok_or_else(|| anyhow!("rate response has no `rates` object"))
}

/// Time-boxed cache of rates keyed by base currency.
#[derive(Debug)]
pub struct RateCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Arc<Rates>)>>,
}

impl RateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached rates for `base` if they were stored less than the TTL before `now`.
    pub fn get_at(&self, base: &str, now: Instant) -> Option<Arc<Rates>> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(base)
            .filter(|(stored, _)| now.saturating_duration_since(*stored) < self.ttl)
            .map(|(_, rates)| Arc::clone(rates))
    }

    pub fn get(&self, base: &str) -> Option<Arc<Rates>> {
        self.get_at(base, Instant::now())
    }

    pub fn insert_at(&self, base: &str, rates: Rates, now: Instant) -> Arc<Rates> {
        let rates = Arc::new(rates);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(base.to_string(), (now, Arc::clone(&rates)));
        }
        rates
    }

    pub fn insert(&self, base: &str, rates: Rates) -> Arc<Rates> {
        self.insert_at(base, rates, Instant::now())
    }
}

pub struct FxClient {
    client: Client,
    base_url: Url,
    cache: RateCache,
}

impl FxClient {
    pub fn new(client: Client, api_url: &str, ttl: Duration) -> Result<Self> {
        // joining onto a URL without a trailing slash would replace its last segment
        let mut api_url = api_url.to_string();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        let base_url =
            Url::parse(&api_url).with_context(|| format!("invalid rate API url {}", api_url))?;
        Ok(Self {
            client,
            base_url,
            cache: RateCache::new(ttl),
        })
    }

    pub fn from_config(cfg: &FxConfig) -> Result<Self> {
        Self::new(
            Client::new(),
            &cfg.api_url,
            Duration::from_secs(cfg.cache_ttl_secs),
        )
    }

    /// Endpoint queried for `base`.
    pub fn endpoint(&self, base: &str) -> Result<Url> {
        self.base_url
            .join(&base.to_uppercase())
            .with_context(|| format!("building rate url for {}", base))
    }

    /// All rates for `base`, from the cache when fresh.
    #[instrument(level = "debug", skip(self))]
    pub async fn rates(&self, base: &str) -> Result<Arc<Rates>> {
        let base = base.to_uppercase();
        if let Some(rates) = self.cache.get(&base) {
            debug!(base = %base, "rates served from cache");
            return Ok(rates);
        }

        let url = self.endpoint(&base)?;
        let body = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("requesting {}", url))?
            .error_for_status()?
            .text()
            .await?;
        let rates = parse_rates(&body)?;
        info!(base = %base, currencies = rates.len(), "fetched exchange rates");
        Ok(self.cache.insert(&base, rates))
    }

    /// Units of `target` per unit of `base`.
    pub async fn rate(&self, base: &str, target: &str) -> Result<f64> {
        if base.eq_ignore_ascii_case(target) {
            return Ok(1.0);
        }
        let rates = self.rates(base).await?;
        rates
            .get(&target.to_uppercase())
            .copied()
            .ok_or_else(|| anyhow!("no rate from {} to {}", base, target))
    }
}
