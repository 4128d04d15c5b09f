use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::cache::FeedCache;
use crate::error::FeedError;
use crate::models::{FinancialFeed, ProgramFeed};
use crate::query::QueryKey;

const FINANCIAL_PATH: &str = "financeiro";
const PROGRAMS_PATH: &str = "programas";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub timeout: StdDuration,
}

pub struct FeedCaches {
    pub financial: FeedCache<FinancialFeed>,
    pub programs: FeedCache<ProgramFeed>,
}

impl FeedCaches {
    pub fn new(ttl: Option<StdDuration>) -> Self {
        Self {
            financial: FeedCache::new("financial", ttl),
            programs: FeedCache::new("programs", ttl),
        }
    }
}

pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
    caches: Arc<FeedCaches>,
}

impl FeedClient {
    pub fn new(config: FeedConfig, caches: Arc<FeedCaches>) -> Result<Self, FeedError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(FeedError::Config("feed base URL is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| FeedError::Config(format!("could not build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url,
            caches,
        })
    }

    pub async fn financial(&self, query: &QueryKey) -> Result<Arc<FinancialFeed>, Arc<FeedError>> {
        self.caches
            .financial
            .get_or_fetch(query, || self.fetch(FINANCIAL_PATH, query))
            .await
    }

    pub async fn programs(&self, query: &QueryKey) -> Result<Arc<ProgramFeed>, Arc<FeedError>> {
        self.caches
            .programs
            .get_or_fetch(query, || self.fetch(PROGRAMS_PATH, query))
            .await
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str, query: &QueryKey) -> Result<T, FeedError> {
        let url = format!("{}/{}", self.base_url, path);
        info!(%url, query = %query.label(), "fetching feed");

        let response = self
            .client
            .get(&url)
            .query(&query.params())
            .send()
            .await
            .map_err(|source| FeedError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| FeedError::Decode { url, source })
    }
}
