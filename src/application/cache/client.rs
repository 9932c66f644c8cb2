//! Query client: the cache plus the backend it is filled from.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::QueryCache;
use crate::domain::{
    Customer, CustomerFilter, KeyFilter, Lead, LeadFilter, LeadId, Page, PipelineSummary,
    QueryKey, QueryValue,
};
use crate::error::{Error, Result};
use crate::port::CrmApi;

/// Stale-while-revalidate reads over a shared [`QueryCache`].
#[derive(Clone)]
pub struct QueryClient {
    cache: Arc<QueryCache>,
    api: Arc<dyn CrmApi>,
}

impl QueryClient {
    pub fn new(cache: Arc<QueryCache>, api: Arc<dyn CrmApi>) -> Self {
        Self { cache, api }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    #[must_use]
    pub fn api(&self) -> &Arc<dyn CrmApi> {
        &self.api
    }

    /// Fetch `key` from the backend and store the result.
    ///
    /// The value is returned even if a concurrent mutation cancelled the
    /// fetch; it is only kept out of the cache.
    pub async fn fetch(&self, key: &QueryKey) -> Result<QueryValue> {
        let ticket = self.cache.begin_fetch(key);
        match self.api.fetch(key).await {
            Ok(value) => {
                self.cache.complete_fetch(ticket, value.clone());
                Ok(value)
            }
            Err(e) => {
                self.cache.abandon_fetch(ticket);
                Err(e)
            }
        }
    }

    /// Cached value if present, refreshing it in the background when stale.
    /// Falls back to an awaited fetch on a miss.
    pub async fn read(&self, key: &QueryKey) -> Result<QueryValue> {
        match self.cache.entry(key) {
            Some(entry) => {
                if entry.is_stale(self.cache.stale_after()) {
                    self.refetch_in_background(key.clone());
                }
                Ok(entry.value().clone())
            }
            None => self.fetch(key).await,
        }
    }

    /// Start a background refetch of `key` unless one is already running or
    /// fetches for it are paused.
    pub fn refetch_in_background(&self, key: QueryKey) -> Option<JoinHandle<()>> {
        let ticket = self.cache.try_begin_fetch(&key)?;
        let cache = Arc::clone(&self.cache);
        let api = Arc::clone(&self.api);
        debug!(key = %key, "Background refetch");
        Some(tokio::spawn(async move {
            match api.fetch(&key).await {
                Ok(value) => {
                    cache.complete_fetch(ticket, value);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Background refetch failed");
                    cache.abandon_fetch(ticket);
                }
            }
        }))
    }

    /// Start background refetches for every stale entry.
    pub fn refetch_stale(&self) -> Vec<JoinHandle<()>> {
        self.cache
            .stale_keys()
            .into_iter()
            .filter_map(|key| self.refetch_in_background(key))
            .collect()
    }

    /// Refetch stale entries matching `filter` and wait for them.
    ///
    /// Returns how many entries were refreshed.
    pub async fn refresh(&self, filter: &KeyFilter) -> usize {
        let keys: Vec<QueryKey> = self
            .cache
            .stale_keys()
            .into_iter()
            .filter(|k| filter.matches(k))
            .collect();
        let results = join_all(keys.iter().map(|key| self.fetch(key))).await;
        results
            .into_iter()
            .zip(&keys)
            .filter(|(result, key)| match result {
                Ok(_) => true,
                Err(e) => {
                    warn!(key = %key, error = %e, "Refresh failed");
                    false
                }
            })
            .count()
    }

    /// Periodically refetch stale entries until the returned handle is aborted.
    pub fn spawn_refresher(&self, interval: Duration) -> JoinHandle<()> {
        let client = self.clone();
        info!(interval_secs = interval.as_secs(), "Starting cache refresher");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let started = client.refetch_stale().len();
                if started > 0 {
                    debug!(started, "Refresher started refetches");
                }
            }
        })
    }

    /// Lead list page.
    pub async fn leads(&self, filter: &LeadFilter) -> Result<Page<Lead>> {
        let key = QueryKey::lead_list(filter);
        match self.read(&key).await? {
            QueryValue::LeadPage(page) => Ok(page),
            other => Err(unexpected(&key, &other)),
        }
    }

    /// Single lead.
    pub async fn lead(&self, id: &LeadId) -> Result<Lead> {
        let key = QueryKey::lead(id);
        match self.read(&key).await? {
            QueryValue::Lead(lead) => Ok(lead),
            other => Err(unexpected(&key, &other)),
        }
    }

    /// Customer list page.
    pub async fn customers(&self, filter: &CustomerFilter) -> Result<Page<Customer>> {
        let key = QueryKey::customer_list(filter);
        match self.read(&key).await? {
            QueryValue::CustomerPage(page) => Ok(page),
            other => Err(unexpected(&key, &other)),
        }
    }

    /// Pipeline summary.
    pub async fn pipeline_summary(&self) -> Result<PipelineSummary> {
        let key = QueryKey::pipeline_summary();
        match self.read(&key).await? {
            QueryValue::PipelineSummary(summary) => Ok(summary),
            other => Err(unexpected(&key, &other)),
        }
    }
}

fn unexpected(key: &QueryKey, value: &QueryValue) -> Error {
    let kind = match value {
        QueryValue::LeadPage(_) => "lead page",
        QueryValue::Lead(_) => "lead",
        QueryValue::CustomerPage(_) => "customer page",
        QueryValue::Customer(_) => "customer",
        QueryValue::PipelineSummary(_) => "pipeline summary",
    };
    Error::UnexpectedValue(format!("{key} holds a {kind}"))
}
