use std::sync::Arc;

use crate::application::reads::ReadService;
use crate::application::repos::EntityStore;
use crate::application::writes::WriteService;
use crate::cache::{
    CacheClient, CacheConfig, CacheTrigger, CounterMaintainer, IdListCache, Invalidator,
    ObjectCache, SnapshotLoader,
};

/// Every service wired over one store and one cache backend.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn EntityStore>,
    pub cache: CacheClient,
    pub loader: SnapshotLoader,
    pub lists: IdListCache,
    pub counters: CounterMaintainer,
    pub trigger: Arc<CacheTrigger>,
    pub reads: ReadService,
    pub writes: WriteService,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn EntityStore>,
        backend: Arc<dyn ObjectCache>,
        config: CacheConfig,
    ) -> Self {
        let cache = CacheClient::new(backend, config.clone());
        let loader = SnapshotLoader::new(store.clone(), cache.clone());
        let lists = IdListCache::new(store.clone(), cache.clone());
        let counters = CounterMaintainer::new(loader.clone());
        let trigger = Arc::new(CacheTrigger::new(
            config,
            counters.clone(),
            Invalidator::new(lists.clone()),
        ));

        Self {
            reads: ReadService::new(loader.clone(), lists.clone()),
            writes: WriteService::new(loader.clone(), trigger.clone()),
            store,
            cache,
            loader,
            lists,
            counters,
            trigger,
        }
    }
}
