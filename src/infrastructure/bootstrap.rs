//! Composition root: builds the cache, the REST client, the mutation
//! coordinator and the realtime hub from a [`Config`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::adapter::outbound::rest::RestClient;
use crate::adapter::outbound::stomp::StompTransport;
use crate::application::cache::{QueryCache, QueryClient};
use crate::application::mutation::MutationCoordinator;
use crate::application::realtime::{EventDispatcher, PushConnection, RealtimeHub};
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::port::CrmApi;

/// Everything a command needs to read and write CRM data.
pub struct Services {
    pub client: QueryClient,
    pub mutations: MutationCoordinator,
}

impl Services {
    /// Wire services around an existing backend.
    pub fn with_api(config: &Config, api: Arc<dyn CrmApi>) -> Self {
        let cache = Arc::new(QueryCache::with_capacity(
            config.cache.stale_after(),
            config.cache.notify_capacity,
        ));
        let client = QueryClient::new(cache, api);
        let mutations = MutationCoordinator::for_client(&client);
        Self { client, mutations }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<QueryCache> {
        self.client.cache()
    }
}

/// Build services backed by the REST adapter.
///
/// # Errors
///
/// Returns a config error if `api.base_url` is unusable.
pub fn build_services(config: &Config) -> Result<Services> {
    let api = RestClient::from_config(&config.api, config.api_token.clone())?;
    info!(base_url = %config.api.base_url, backend = api.backend_name(), "REST client ready");
    Ok(Services::with_api(config, Arc::new(api)))
}

/// Start the realtime hub over STOMP, merging into `cache`.
pub fn spawn_realtime(
    config: &Config,
    cache: Arc<QueryCache>,
) -> (RealtimeHub, MergedEvents, JoinHandle<()>) {
    let transport = StompTransport::from_config(&config.realtime, config.api_token.clone());
    let connection = PushConnection::new(transport, config.reconnection.clone());
    let dispatcher = EventDispatcher::with_capacity(cache, config.realtime.event_capacity);
    let events = dispatcher.subscribe();
    let (hub, task) = RealtimeHub::spawn(connection, dispatcher);
    (hub, events, task)
}

/// Receiver of events merged by the hub.
pub type MergedEvents = tokio::sync::broadcast::Receiver<crate::domain::StudioEvent>;
