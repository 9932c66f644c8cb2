use std::sync::Arc;
use std::time::Duration;

use studiosync::application::cache::{QueryCache, QueryClient};
use studiosync::application::mutation::MutationCoordinator;
use studiosync::domain::{Customer, Lead, QueryKey};
use studiosync::testkit::api::InMemoryApi;

/// Client, coordinator and backend sharing one cache.
pub struct Harness {
    pub api: Arc<InMemoryApi>,
    pub client: QueryClient,
    pub mutations: MutationCoordinator,
}

impl Harness {
    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self::over(InMemoryApi::with_leads(leads))
    }

    pub fn with_customers(customers: Vec<Customer>) -> Self {
        Self::over(InMemoryApi::with_customers(customers))
    }

    fn over(api: InMemoryApi) -> Self {
        let api = Arc::new(api);
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
        let client = QueryClient::new(cache, api.clone());
        let mutations = MutationCoordinator::for_client(&client);
        Self {
            api,
            client,
            mutations,
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        self.client.cache()
    }

    /// Serialized cached value for `key`, for byte-for-byte comparisons.
    pub fn serialized(&self, key: &QueryKey) -> String {
        let value = self.cache().read(key).expect("key is cached");
        serde_json::to_string(&value).expect("cache values serialize")
    }
}
