use crate::assistant::{ AssistantConfig, ChatAssistant, PendingFlag };
use crate::llm::chat::ChatClient;
use crate::locale::Locale;
use crate::models::chat::Message;
use log::info;
use std::collections::HashMap;
use std::sync::{ Arc, PoisonError };
use std::time::{ Duration, Instant };
use thiserror::Error;
use tokio::sync::{ Mutex, RwLock };
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Sessions untouched for this long are dropped.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Settled state of a session, readable while a turn holds the lock.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub locale: Locale,
    pub messages: Vec<Message>,
}

/// A registered conversation. `pending` mirrors the assistant's typing
/// flag so it can be read while a turn holds the lock.
pub struct Session {
    pub assistant: Mutex<ChatAssistant>,
    pub pending: PendingFlag,
    snapshot: std::sync::RwLock<Snapshot>,
    last_active: std::sync::Mutex<Instant>,
}

impl Session {
    fn new(assistant: ChatAssistant) -> Self {
        Self {
            pending: assistant.pending_flag(),
            snapshot: std::sync::RwLock::new(Snapshot {
                locale: assistant.locale(),
                messages: assistant.messages().to_vec(),
            }),
            last_active: std::sync::Mutex::new(Instant::now()),
            assistant: Mutex::new(assistant),
        }
    }

    /// Stores what `assistant` looks like now. Call it before releasing the lock.
    pub fn record(&self, assistant: &ChatAssistant) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.locale = assistant.locale();
        snapshot.messages = assistant.messages().to_vec();
        drop(snapshot);
        self.touch();
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.lock().unwrap_or_else(PoisonError::into_inner).elapsed()
    }
}

pub type SharedSession = Arc<Session>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error("session limit of {0} reached")]
    LimitReached(usize),
}

/// In-memory registry of live widget sessions. Nothing is persisted; a
/// restart forgets every conversation.
pub struct SessionStore {
    client: Option<Arc<dyn ChatClient>>,
    config: AssistantConfig,
    max_sessions: usize,
    idle_ttl: Duration,
    sessions: RwLock<HashMap<String, SharedSession>>,
}

fn evict_expired(sessions: &mut HashMap<String, SharedSession>, ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|id, session| {
        let keep = session.pending.is_set() || session.idle_for() < ttl;
        if !keep {
            info!("Evicting idle session {}", id);
        }
        keep
    });
    before - sessions.len()
}

impl SessionStore {
    pub fn new(
        client: Option<Arc<dyn ChatClient>>,
        config: AssistantConfig,
        max_sessions: usize
    ) -> Self {
        Self {
            client,
            config,
            max_sessions,
            idle_ttl: DEFAULT_IDLE_TTL,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    /// A fresh assistant that is not registered in the store, for
    /// connection-scoped conversations.
    pub fn detached(&self, locale: Locale) -> ChatAssistant {
        let mut assistant = ChatAssistant::new(self.client.clone(), self.config.clone());
        assistant.initialize(locale);
        assistant
    }

    pub async fn create(&self, locale: Locale) -> Result<(String, SharedSession), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            evict_expired(&mut sessions, self.idle_ttl);
        }
        if sessions.len() >= self.max_sessions {
            return Err(SessionError::LimitReached(self.max_sessions));
        }
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(self.detached(locale)));
        sessions.insert(id.clone(), Arc::clone(&session));
        info!("Created session {} ({} active)", id, sessions.len());
        Ok((id, session))
    }

    pub async fn get(&self, id: &str) -> Result<SharedSession, SessionError> {
        let session = self.sessions
            .read().await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    pub async fn remove(&self, id: &str) -> Result<(), SessionError> {
        match self.sessions.write().await.remove(id) {
            Some(_) => {
                info!("Closed session {}", id);
                Ok(())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// Drops every session idle for longer than the TTL. Sessions with a
    /// turn in flight are kept.
    pub async fn evict_idle(&self) -> usize {
        evict_expired(&mut *self.sessions.write().await, self.idle_ttl)
    }

    /// Periodically evicts idle sessions for as long as the store lives.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let period = self.idle_ttl.min(Duration::from_secs(60)).max(Duration::from_secs(1));
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let evicted = store.evict_idle().await;
                if evicted > 0 {
                    info!("Evicted {} idle session(s), {} active", evicted, store.len().await);
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
