// Worker lifecycle and event dispatch.
// Install/activate gating, fetch interception, push and background sync.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::cache::{CacheManager, CacheStorage, paths, store};
use crate::config::Config;
use crate::error::{Result, WorkerError};
use crate::http::{Network, Request, Response};
use crate::notify::{Notification, Notifier, PushEvent};
use crate::router::{Route, Router};
use crate::strategy::Strategies;

/// Tag the page registers for flushing offline actions.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker never takes control.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

/// Background sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub tag: String,
}

impl SyncEvent {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

/// Events delivered to the worker.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Push(PushEvent),
    Sync(SyncEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::Activate => "activate",
            Event::Fetch(_) => "fetch",
            Event::Push(_) => "push",
            Event::Sync(_) => "sync",
        }
    }
}

/// Result of handling one event.
#[derive(Debug)]
pub enum Outcome {
    Installed { cached: usize },
    Activated { deleted: Vec<String> },
    /// The worker answered the fetch.
    Responded { route: Route, response: Response },
    /// Not intercepted; the caller performs a plain network request.
    Passthrough,
    Notified(Notification),
    Synced { tag: String },
    /// Event accepted but nothing to do.
    Ignored,
}

pub struct ServiceWorker {
    config: Config,
    cache: Arc<CacheManager>,
    network: Arc<dyn Network>,
    notifier: Arc<dyn Notifier>,
    router: Router,
    strategies: Strategies,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl ServiceWorker {
    pub fn new(
        config: Config,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let cache = Arc::new(CacheManager::new(storage, config.cache_version()));
        let strategies = Strategies::new(
            Arc::clone(&cache),
            Arc::clone(&network),
            config.offline_document_url()?,
        );

        Ok(Self {
            router: Router::new(&config.origin),
            config,
            cache,
            network,
            notifier,
            strategies,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        })
    }

    /// Resume from a previously persisted state.
    pub fn with_state(self, state: WorkerState) -> Self {
        Self {
            state: RwLock::new(state),
            ..self
        }
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether install asked to activate without waiting for old clients.
    pub fn skipped_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn claimed_clients(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    /// Dispatch one event to its handler.
    pub async fn handle(&self, event: Event) -> Result<Outcome> {
        tracing::debug!(kind = event.kind(), "event");
        match event {
            Event::Install => self.install().await,
            Event::Activate => self.activate().await,
            Event::Fetch(request) => self.fetch(request).await,
            Event::Push(push) => self.push(push).await,
            Event::Sync(sync) => self.sync(sync).await,
        }
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(WorkerError::InvalidState {
                expected: from.as_str(),
                actual: state.as_str(),
            });
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }

    async fn install(&self) -> Result<Outcome> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)
            .await?;
        tracing::info!("service worker installing");

        match self.cache_static_files().await {
            Ok(cached) => {
                self.set_state(WorkerState::Installed).await;
                self.skip_waiting.store(true, Ordering::SeqCst);
                tracing::info!(cached, "static files cached");
                Ok(Outcome::Installed { cached })
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::error!(error = %e, "cache installation failed");
                Err(e)
            }
        }
    }

    async fn cache_static_files(&self) -> Result<usize> {
        let urls: Vec<Url> = self.config.static_urls()?;
        let partition = self.cache.static_partition().await?;
        self.cache
            .add_all(&partition, &urls, self.network.as_ref())
            .await
    }

    async fn activate(&self) -> Result<Outcome> {
        self.transition(WorkerState::Installed, WorkerState::Activating)
            .await?;
        tracing::info!("service worker activating");

        let deleted = match self.cache.evict_stale().await {
            Ok(deleted) => deleted,
            Err(e) => {
                // Still installed; activation can be retried.
                self.set_state(WorkerState::Installed).await;
                return Err(e);
            }
        };

        self.clients_claimed.store(true, Ordering::SeqCst);
        self.set_state(WorkerState::Activated).await;
        tracing::info!(deleted = deleted.len(), "service worker activated");
        Ok(Outcome::Activated { deleted })
    }

    async fn fetch(&self, request: Request) -> Result<Outcome> {
        if self.state().await != WorkerState::Activated {
            return Ok(Outcome::Passthrough);
        }

        let route = self.router.classify(&request);
        tracing::debug!(url = %request.url, route = route.as_str(), "fetch");

        match self.strategies.respond(route, &request).await? {
            Some(response) => Ok(Outcome::Responded { route, response }),
            None => Ok(Outcome::Passthrough),
        }
    }

    async fn push(&self, push: PushEvent) -> Result<Outcome> {
        self.ensure_not_redundant().await?;
        let notification = Notification::from_push(&push);
        self.notifier.show(&notification).await?;
        Ok(Outcome::Notified(notification))
    }

    async fn sync(&self, sync: SyncEvent) -> Result<Outcome> {
        self.ensure_not_redundant().await?;
        if sync.tag != BACKGROUND_SYNC_TAG {
            tracing::debug!(tag = %sync.tag, "unknown sync tag");
            return Ok(Outcome::Ignored);
        }

        tracing::info!("background sync triggered");
        self.flush_pending_actions().await?;
        Ok(Outcome::Synced { tag: sync.tag })
    }

    /// Offline actions are queued page-side; nothing is queued in the worker yet.
    async fn flush_pending_actions(&self) -> Result<()> {
        tracing::info!("performing background sync");
        Ok(())
    }

    async fn ensure_not_redundant(&self) -> Result<()> {
        let state = self.state().await;
        if state == WorkerState::Redundant {
            return Err(WorkerError::InvalidState {
                expected: "not redundant",
                actual: state.as_str(),
            });
        }
        Ok(())
    }
}

/// Worker states saved between CLI runs, one per cache version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub versions: BTreeMap<String, WorkerState>,
}

/// Load the saved state for `cache_version`. A version with no entry, or one
/// left redundant by a failed install, is a new worker starting from `Parsed`.
pub async fn load_state(root: &Path, cache_version: &str) -> Result<WorkerState> {
    let saved = read_persisted(root).await?;
    Ok(match saved.versions.get(cache_version) {
        Some(&state) if state != WorkerState::Redundant => state,
        _ => WorkerState::Parsed,
    })
}

/// Record the state of `cache_version` without touching other versions,
/// except that a new activation drops the versions whose partitions it evicted.
pub async fn save_state(root: &Path, cache_version: &str, state: WorkerState) -> Result<()> {
    let mut saved = read_persisted(root).await?;
    let was_active = saved.versions.get(cache_version) == Some(&WorkerState::Activated);
    match state {
        WorkerState::Parsed | WorkerState::Redundant => {
            saved.versions.remove(cache_version);
        }
        WorkerState::Activated if !was_active => {
            saved.versions.clear();
            saved.versions.insert(cache_version.to_string(), state);
        }
        _ => {
            saved.versions.insert(cache_version.to_string(), state);
        }
    }
    store::write_cached(&paths::state_path(root), &saved).await
}

async fn read_persisted(root: &Path) -> Result<PersistedState> {
    let saved: Option<store::CachedData<PersistedState>> =
        store::read_cached(&paths::state_path(root)).await?;
    Ok(saved.map(|cached| cached.data).unwrap_or_default())
}
