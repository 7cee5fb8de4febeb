use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::Config;

/// Classified result of one page fetch. Failures stay in-band so the
/// harvest loop can decide whether to retry or skip; nothing here is
/// raised as an error.
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx with a non-empty offer list.
    Offers(Vec<Value>),
    /// 2xx but the data envelope is missing or carries no offers.
    Empty,
    /// Non-2xx response status.
    HttpStatus(u16),
    /// Network, timeout or body decode failure.
    Transport(String),
}

/// Seam between the harvest loop and the network. Tests drive the loop
/// with scripted outcomes through this trait.
#[async_trait]
pub trait OfferSource {
    async fn fetch_page(&self, page: u32) -> FetchOutcome;
}

pub struct ApiFetcher {
    client: Client,
    cfg: Config,
}

impl ApiFetcher {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            cfg: cfg.clone(),
        })
    }
}

#[async_trait]
impl OfferSource for ApiFetcher {
    async fn fetch_page(&self, page: u32) -> FetchOutcome {
        let response = match self
            .client
            .post(&self.cfg.api_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&build_query(&self.cfg, page))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Transport(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::HttpStatus(status.as_u16());
        }

        match response.json::<Value>().await {
            Ok(body) => classify_envelope(&body),
            Err(e) => FetchOutcome::Transport(e.to_string()),
        }
    }
}

/// Search filter the listings endpoint expects. `for_day: "!1"` excludes
/// daily rentals.
pub fn build_query(cfg: &Config, page: u32) -> Value {
    json!({
        "jsonQuery": {
            "_type": cfg.feed_type,
            "region": { "type": "terms", "value": cfg.region_ids },
            "room": { "type": "terms", "value": cfg.rooms },
            "for_day": { "type": "term", "value": "!1" },
            "page": { "type": "term", "value": page },
        }
    })
}

pub fn classify_envelope(body: &Value) -> FetchOutcome {
    match body
        .pointer("/data/offersSerialized")
        .and_then(Value::as_array)
    {
        Some(offers) if !offers.is_empty() => FetchOutcome::Offers(offers.clone()),
        _ => FetchOutcome::Empty,
    }
}
