pub mod entry;
pub mod error;
pub mod pg;
pub mod store;
pub mod ttl;

pub use entry::{CacheEntry, CacheHit, CacheKind, CachePayload, EntryStatus, PutOptions};
pub use error::{CacheError, Result};
pub use pg::PgBackend;
pub use store::{CacheBackend, CacheStore, MemoryBackend};
pub use ttl::TtlPolicy;
