//! playground-services — the collaborators the gateway talks to: the
//! cache store and the compile backend.

pub mod backend;
pub mod cache;
pub mod entry;

pub use backend::{Backend, BackendRequest, BackendResponse, HttpBackend};
pub use cache::{CacheStore, CacheUsage, FsCacheStore, MemoryCacheStore};
pub use entry::{CacheEntry, EntryError};
