use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FlowError, Result};

/// One wizard session held in memory
#[derive(Debug, Clone)]
pub struct Session<S> {
    pub id: String,
    pub state: S,
    /// Bumped every time the session is reset; pending operations carry the
    /// epoch they were issued under.
    pub epoch: u64,
    /// Last time the session was created, saved or updated
    pub last_touched: Instant,
    pub(crate) pending: Option<AbortHandle>,
}

impl<S> Session<S> {
    pub fn new(state: S) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state,
            epoch: 0,
            last_touched: Instant::now(),
            pending: None,
        }
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_touched)
    }

    /// True while an operation spawned for the current epoch has not reported back
    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Invalidate the current epoch and abort whatever is still running for it
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

/// In-place mutation applied under the storage's per-entry lock
pub type SessionUpdate<'a, S> = Box<dyn FnOnce(&mut Session<S>) -> Result<()> + Send + 'a>;

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage<S>: Send + Sync
where
    S: Clone + Send + Sync + 'static,
{
    async fn save(&self, session: Session<S>) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session<S>>>;
    async fn delete(&self, id: &str) -> Result<()>;

    /// Atomically apply `apply` to the stored session and return the result.
    ///
    /// If `apply` fails the stored session is left exactly as it was.
    async fn update(&self, id: &str, apply: SessionUpdate<'_, S>) -> Result<Session<S>>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage<S> {
    sessions: Arc<DashMap<String, Session<S>>>,
}

impl<S> InMemorySessionStorage<S> {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every session untouched for at least `ttl`, aborting its pending
    /// operation. Returns how many sessions were evicted.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.sessions.retain(|_, session| {
            if session.idle_for(now) < ttl {
                return true;
            }
            session.invalidate();
            evicted += 1;
            false
        });
        evicted
    }
}

impl<S> InMemorySessionStorage<S>
where
    S: Send + Sync + 'static,
{
    /// Run [`evict_idle`](Self::evict_idle) every `period` until the storage is dropped
    pub fn spawn_idle_sweeper(
        self: &Arc<Self>,
        ttl: Duration,
        period: Duration,
    ) -> JoinHandle<()> {
        let storage: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(storage) = storage.upgrade() else {
                    break;
                };
                let evicted = storage.evict_idle(ttl);
                if evicted > 0 {
                    debug!(evicted, remaining = storage.len(), "Evicted idle sessions");
                }
            }
        })
    }
}

impl<S> Default for InMemorySessionStorage<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S> SessionStorage<S> for InMemorySessionStorage<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn save(&self, mut session: Session<S>) -> Result<()> {
        session.last_touched = Instant::now();
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session<S>>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if let Some((_, mut session)) = self.sessions.remove(id) {
            session.invalidate();
        }
        Ok(())
    }

    async fn update(&self, id: &str, apply: SessionUpdate<'_, S>) -> Result<Session<S>> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| FlowError::SessionNotFound(id.to_string()))?;

        // Work on a copy so a failed update leaves the stored session intact
        let mut draft = entry.clone();
        apply(&mut draft)?;
        draft.last_touched = Instant::now();
        *entry = draft.clone();
        Ok(draft)
    }
}
