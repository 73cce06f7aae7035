use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mindful_chat_core::{ChatSession, SessionHandle};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use uuid::Uuid;

/// Sessions untouched for this long are discarded.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    session: SessionHandle,
    last_seen: Instant,
}

/// Keeps one [`ChatSession`] per connected client.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionRegistry {
    /// Creates a fresh session under a random id.
    pub async fn create(&self) -> (Uuid, SessionHandle) {
        let id = Uuid::new_v4();
        let session = ChatSession::new().into_handle();
        let entry = Entry {
            session: Arc::clone(&session),
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        debug!("session {id} created");
        (id, session)
    }

    /// Looks up a session and marks it as recently used.
    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// Discards a session. A turn still running on it finishes detached.
    pub async fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            debug!("session {id} removed");
        }
        removed.map(|entry| entry.session)
    }

    /// Returns the number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Discards every session unused for longer than `max_idle`, unless a
    /// reply is still being generated for it. Returns how many were removed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            if now.duration_since(entry.last_seen) <= max_idle {
                return true;
            }
            let busy = match entry.session.try_lock() {
                Ok(session) => session.is_busy(),
                Err(_) => true,
            };
            if !busy {
                debug!("session {id} expired");
            }
            busy
        });
        before - sessions.len()
    }

    /// Spawns a task that periodically calls [`Self::evict_idle`].
    pub fn spawn_sweeper(&self, max_idle: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(SWEEP_INTERVAL.min(max_idle));
            loop {
                interval.tick().await;
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    info!("discarded {evicted} idle sessions");
                }
            }
        })
    }
}
