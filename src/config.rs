use std::env;
use std::str::FromStr;

use anyhow::{bail, Context};

const DEFAULT_API_URL: &str = "https://api.cian.ru/search-offers/v2/search-offers-desktop/";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub feed_type: String,
    pub region_ids: Vec<u32>,
    pub rooms: Vec<u32>,
    pub start_page: u32,
    pub end_page: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub source_tag: String,
    pub location: String,
    pub deal_type: String,
    pub accommodation_type: String,
    pub listing_url_base: String,
    pub output_dir: String,
}

/// Fixed labels stamped onto every normalized record. The search API does
/// not echo these back per offer, so they are harvest configuration, not
/// derived data.
#[derive(Debug, Clone)]
pub struct ListingScope {
    pub location: String,
    pub deal_type: String,
    pub accommodation_type: String,
    pub listing_url_base: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let cfg = Self {
            api_url: env_or("CIAN_API_URL", DEFAULT_API_URL),
            user_agent: env_or("CIAN_USER_AGENT", DEFAULT_USER_AGENT),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 15)?,
            feed_type: env_or("CIAN_FEED_TYPE", "flatrent"),
            region_ids: parse_id_list(&env_or("CIAN_REGION_IDS", "1"))
                .context("invalid CIAN_REGION_IDS")?,
            rooms: parse_id_list(&env_or("CIAN_ROOMS", "1,2,3,4"))
                .context("invalid CIAN_ROOMS")?,
            start_page: env_parse("START_PAGE", 1)?,
            end_page: env_parse("END_PAGE", 99)?,
            min_delay_ms: env_parse("MIN_DELAY_MS", 1000)?,
            max_delay_ms: env_parse("MAX_DELAY_MS", 3000)?,
            retry_attempts: env_parse("RETRY_ATTEMPTS", 3)?,
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", 500)?,
            source_tag: env_or("SOURCE_TAG", "cian"),
            location: env_or("LISTING_LOCATION", "Москва"),
            deal_type: env_or("LISTING_DEAL_TYPE", "rent_long"),
            accommodation_type: env_or("LISTING_ACCOMMODATION_TYPE", "flat"),
            listing_url_base: env_or("LISTING_URL_BASE", "https://www.cian.ru/rent/flat"),
            output_dir: env_or("OUTPUT_DIR", "."),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations that would make the whole run meaningless.
    /// This is the only place an error aborts before the first fetch.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.api_url
            .parse::<reqwest::Url>()
            .with_context(|| format!("invalid API url: {}", self.api_url))?;

        if self.start_page == 0 {
            bail!("START_PAGE must be at least 1");
        }
        if self.start_page > self.end_page {
            bail!(
                "empty page range: START_PAGE {} > END_PAGE {}",
                self.start_page,
                self.end_page
            );
        }
        if self.min_delay_ms > self.max_delay_ms {
            bail!(
                "inverted pacing range: MIN_DELAY_MS {} > MAX_DELAY_MS {}",
                self.min_delay_ms,
                self.max_delay_ms
            );
        }
        if self.retry_attempts == 0 {
            bail!("RETRY_ATTEMPTS must be at least 1");
        }
        if self.region_ids.is_empty() {
            bail!("CIAN_REGION_IDS must name at least one region");
        }

        Ok(())
    }

    pub fn scope(&self) -> ListingScope {
        ListingScope {
            location: self.location.clone(),
            deal_type: self.deal_type.clone(),
            accommodation_type: self.accommodation_type.clone(),
            listing_url_base: self.listing_url_base.clone(),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}")),
        Err(_) => Ok(default),
    }
}

fn parse_id_list(raw: &str) -> anyhow::Result<Vec<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .with_context(|| format!("invalid id: {part}"))
        })
        .collect()
}
