use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::snapshot::{SnapshotFile, StoreError};

/// Exchanges kept per session before the oldest are evicted.
pub const DEFAULT_MAX_EXCHANGES: usize = 20;

/// One heard utterance and, once logged, the reply the user tapped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exchange {
    pub timestamp: DateTime<Utc>,
    pub transcript: String,
    #[serde(default)]
    pub chosen_reply: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionHistory {
    /// Context of the most recent request in this session.
    pub context: String,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionHistory {
    fn new(context: &str, now: DateTime<Utc>) -> Self {
        Self {
            context: context.to_owned(),
            exchanges: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-session conversation log, persisted as one JSON snapshot.
pub struct HistoryStore {
    file: SnapshotFile,
    max_exchanges: usize,
    sessions: Mutex<BTreeMap<String, SessionHistory>>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, max_exchanges: usize) -> Self {
        Self {
            file: SnapshotFile::new(path),
            max_exchanges: max_exchanges.max(1),
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn open(path: impl Into<PathBuf>, max_exchanges: usize) -> Self {
        let store = Self::new(path, max_exchanges);
        store.load().await;
        store
    }

    pub async fn load(&self) {
        let loaded: BTreeMap<String, SessionHistory> = self.file.load().await;
        info!(
            path = %self.file.path().display(),
            sessions = loaded.len(),
            "loaded conversation history"
        );
        *self.sessions.lock().await = loaded;
    }

    /// Appends an exchange, creating the session if needed. The session's context
    /// is always overwritten with `context`.
    pub async fn add_exchange(
        &self,
        session_id: &str,
        context: &str,
        transcript: &str,
        chosen_reply: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| SessionHistory::new(context, now));

        session.exchanges.push(Exchange {
            timestamp: now,
            transcript: transcript.to_owned(),
            chosen_reply: chosen_reply.map(ToOwned::to_owned),
        });
        session.context = context.to_owned();
        session.updated_at = now;

        if session.exchanges.len() > self.max_exchanges {
            let excess = session.exchanges.len() - self.max_exchanges;
            session.exchanges.drain(..excess);
        }

        self.file.save(&*sessions).await
    }

    /// Attaches `chosen_reply` to the session's latest exchange. Returns `false`
    /// without touching anything when the session is unknown or empty.
    pub async fn update_last_choice(
        &self,
        session_id: &str,
        chosen_reply: &str,
    ) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(session_id) else {
            return Ok(false);
        };
        let Some(last) = session.exchanges.last_mut() else {
            return Ok(false);
        };

        last.chosen_reply = Some(chosen_reply.to_owned());
        session.updated_at = Utc::now();
        self.file.save(&*sessions).await?;
        Ok(true)
    }

    /// Recent exchanges rendered for a prompt, oldest first:
    ///
    /// ```text
    /// [Heard]: <transcript>
    /// [User replied]: <reply>
    /// ```
    ///
    /// Empty fields are skipped; unknown or empty sessions render as "".
    pub async fn history_for_prompt(&self, session_id: &str, max_exchanges: usize) -> String {
        let sessions = self.sessions.lock().await;
        let Some(session) = sessions.get(session_id) else {
            return String::new();
        };

        let start = session.exchanges.len().saturating_sub(max_exchanges);
        let mut lines = Vec::new();
        for exchange in &session.exchanges[start..] {
            if !exchange.transcript.is_empty() {
                lines.push(format!("[Heard]: {}", exchange.transcript));
            }
            if let Some(reply) = exchange.chosen_reply.as_deref().filter(|r| !r.is_empty()) {
                lines.push(format!("[User replied]: {reply}"));
            }
        }
        lines.join("\n")
    }

    /// Most frequently chosen replies across every session whose current context
    /// is `context`. Equal counts keep first-seen order, with sessions visited by
    /// creation time and exchanges chronologically.
    pub async fn common_replies(&self, context: &str, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }

        let sessions = self.sessions.lock().await;
        let mut matching: Vec<(&String, &SessionHistory)> = sessions
            .iter()
            .filter(|(_, session)| session.context == context)
            .collect();
        matching.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then_with(|| a.0.cmp(b.0)));

        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (_, session) in matching {
            for reply in session
                .exchanges
                .iter()
                .filter_map(|ex| ex.chosen_reply.as_deref())
                .filter(|r| !r.is_empty())
            {
                match index.get(reply) {
                    Some(&i) => counts[i].1 += 1,
                    None => {
                        index.insert(reply, counts.len());
                        counts.push((reply, 1));
                    }
                }
            }
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .take(limit)
            .map(|(reply, _)| reply.to_owned())
            .collect()
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionHistory> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Removes a session. Returns `false` when it did not exist.
    pub async fn clear_session(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(session_id).is_none() {
            return Ok(false);
        }
        self.file.save(&*sessions).await?;
        Ok(true)
    }

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        sessions.clear();
        self.file.save(&*sessions).await
    }
}
