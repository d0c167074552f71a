//! Feed cache system
//!
//! Keeps a bounded, newest-first list of serialized records per owner in a
//! shared key-value store, in front of the durable feed table:
//!
//! - **Store**: [`KeyValueStore`] is the narrow interface to the shared store
//!   (Redis in production, [`MemoryStore`] for single-process use and tests).
//! - **Serializer**: [`ObjectSerializer`] turns records into self-describing
//!   blobs so the list cache never needs to know concrete schemas.
//! - **List cache**: [`ListCache`] implements cache-aside `load` and
//!   push-if-present `push` over those blobs.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enable_list_cache = true
//! list_limit = 200
//! ```

mod config;
mod keys;
mod kv;
mod list;
mod lock;
mod memory;
mod serializer;

pub use config::CacheConfig;
pub use keys::{
    FEED_NAMESPACE, FOLLOWINGS_NAMESPACE, GATE_NAMESPACE, ListKey, followings_key, gate_key,
};
pub use kv::{CacheError, KeyValueStore};
pub use list::{ListCache, PushOutcome};
pub use memory::MemoryStore;
pub use serializer::{CacheableRecord, DeserializationError, ObjectSerializer, SerializeError};
