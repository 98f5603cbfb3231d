// Cache module.
// Versioned cache partitions, their storage backends and on-disk layout.

pub mod disk;
pub mod manager;
pub mod memory;
pub mod paths;
pub mod storage;
pub mod store;

pub use disk::DiskStorage;
pub use manager::{CacheManager, CacheVersion, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_VERSION};
pub use memory::MemoryStorage;
pub use storage::{CacheStorage, Partition, StoredResponse};
