// Offline caching worker for the KL timetable viewer.
// Versioned cache partitions, fetch routing, caching strategies and push notifications.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod notify;
pub mod router;
pub mod strategy;
pub mod worker;

pub use cache::{CacheManager, CacheStorage, CacheVersion, DiskStorage, MemoryStorage};
pub use config::Config;
pub use error::{Result, WorkerError};
pub use http::{Destination, HttpNetwork, Method, Network, Request, Response};
pub use notify::{LogNotifier, Notification, Notifier, PushEvent};
pub use router::{Route, Router};
pub use worker::{BACKGROUND_SYNC_TAG, Event, Outcome, ServiceWorker, SyncEvent, WorkerState};
