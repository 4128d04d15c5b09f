use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::query::QueryKey;

pub struct FeedCache<V> {
    name: &'static str,
    cache: Cache<QueryKey, Arc<V>>,
}

impl<V> FeedCache<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Option<Duration>) -> Self {
        let builder = Cache::builder().name(name);
        let cache = match ttl {
            Some(ttl) => builder.time_to_live(ttl).build(),
            None => builder.build(),
        };
        Self { name, cache }
    }

    pub async fn get(&self, key: &QueryKey) -> Option<Arc<V>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: QueryKey, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.cache.insert(key, Arc::clone(&value)).await;
        value
    }

    // Errors reach every waiter and are never cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &QueryKey, fetch: F) -> Result<Arc<V>, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        let name = self.name;
        self.cache
            .try_get_with(key.clone(), async move {
                debug!(cache = name, key = %key.label(), "cache miss");
                fetch().await.map(Arc::new)
            })
            .await
    }

    pub async fn invalidate(&self, key: &QueryKey) -> bool {
        self.cache.remove(key).await.is_some()
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
