//! YouYou Cache System
//!
//! Read-through caching for the review platform:
//!
//! - **Snapshots**: one cached JSON snapshot per entity, `one_<type>_<id>`
//! - **Id lists**: ordered ids of composite queries, `list_<family>:<params>`
//! - **Counters**: denormalized counts recomputed after every write
//! - **Invalidation**: id lists evicted through a reverse-dependency table
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `youyou.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "redis"
//! redis_url = "redis://127.0.0.1/"
//! default_ttl_secs = 900
//! # ... see config.rs for all options
//! ```

mod backend;
mod client;
mod config;
mod counters;
pub mod deps;
mod events;
mod invalidator;
mod keys;
mod lists;
mod loader;
pub(crate) mod lock;
mod memory;
mod planner;
mod redis;
mod trigger;

pub use self::redis::RedisCache;
pub use backend::{CacheError, ObjectCache};
pub use client::CacheClient;
pub use self::config::{CacheBackendKind, CacheConfig};
pub use counters::{CounterMaintainer, Recount, RecountReport, distinct_images, mean_stars};
pub use events::{ChangeEvent, ChangeKind, CommentFacets, Epoch, EventClock, ReviewFacets};
pub use invalidator::Invalidator;
pub use keys::{CommentScope, ListFamily, ListQuery, ReviewScope, SnapshotKey};
pub use lists::IdListCache;
pub use loader::{SnapshotLoader, StoredSnapshot};
pub use memory::MemoryCache;
pub use planner::InvalidationPlan;
pub use trigger::{CacheTrigger, TriggerOutcome};
