use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::snapshot::{SnapshotFile, StoreError};

const KEY_SEPARATOR: &str = "||";
const ESCAPE: char = '\\';

/// Identity of a learned weight. Fields are compared exactly: no case folding,
/// trimming or punctuation normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightKey<'a> {
    pub context: &'a str,
    pub intent: &'a str,
    pub text: &'a str,
}

impl<'a> WeightKey<'a> {
    pub fn new(context: &'a str, intent: &'a str, text: &'a str) -> Self {
        Self {
            context,
            intent,
            text,
        }
    }

    /// The on-disk key, `<context>||<intent>||<text>`. Backslashes and pipes in
    /// context and intent are escaped so the first two separators stay
    /// unambiguous; the text is written as is.
    pub fn storage_key(&self) -> String {
        format!(
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            escape_field(self.context),
            escape_field(self.intent),
            self.text
        )
    }

    fn to_owned_key(self) -> OwnedKey {
        (
            self.context.to_owned(),
            self.intent.to_owned(),
            self.text.to_owned(),
        )
    }
}

impl fmt::Display for WeightKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

type OwnedKey = (String, String, String);

fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c == ESCAPE || c == '|' {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Inverse of [`WeightKey::storage_key`]. `None` when the key lacks two
/// unescaped separators or ends in a dangling escape.
fn parse_storage_key(raw: &str) -> Option<OwnedKey> {
    let mut fields: Vec<String> = Vec::with_capacity(2);
    let mut current = String::new();
    let mut chars = raw.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            ESCAPE => current.push(chars.next()?.1),
            '|' if raw[idx..].starts_with(KEY_SEPARATOR) => {
                chars.next();
                fields.push(std::mem::take(&mut current));
                if fields.len() == 2 {
                    let text = raw[idx + KEY_SEPARATOR.len()..].to_owned();
                    let intent = fields.pop()?;
                    let context = fields.pop()?;
                    return Some((context, intent, text));
                }
            }
            _ => current.push(c),
        }
    }
    None
}

/// A stored weight with its key split back into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightEntry {
    pub context: String,
    pub intent: String,
    pub text: String,
    pub weight: u64,
}

/// Count of how often each (context, intent, reply) was chosen.
///
/// All access goes through one async mutex, so a bump and the snapshot that
/// follows it cannot interleave with another writer.
pub struct WeightStore {
    file: SnapshotFile,
    weights: Mutex<HashMap<OwnedKey, u64>>,
}

impl WeightStore {
    /// An empty store backed by `path`. Nothing is read until [`WeightStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: SnapshotFile::new(path),
            weights: Mutex::new(HashMap::new()),
        }
    }

    /// Convenience for startup: construct and load in one step.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self::new(path);
        store.load().await;
        store
    }

    /// Replaces the in-memory table with the durable snapshot. Keys that do not
    /// split into three fields are dropped with a warning.
    pub async fn load(&self) {
        let raw: HashMap<String, u64> = self.file.load().await;
        let mut loaded = HashMap::with_capacity(raw.len());
        for (key, weight) in raw {
            match parse_storage_key(&key) {
                Some(owned) => {
                    loaded.insert(owned, weight);
                }
                None => warn!(key = %key, "skipping malformed weight key"),
            }
        }
        info!(
            path = %self.file.path().display(),
            entries = loaded.len(),
            "loaded weight store"
        );
        *self.weights.lock().await = loaded;
    }

    /// Stored weight, or 0 for a key never bumped.
    pub async fn get_weight(&self, key: WeightKey<'_>) -> u64 {
        self.weights
            .lock()
            .await
            .get(&key.to_owned_key())
            .copied()
            .unwrap_or(0)
    }

    /// Weights for several reply texts under one (context, intent), read under a
    /// single lock so the result is a consistent view.
    pub async fn get_weights<S: AsRef<str>>(
        &self,
        context: &str,
        intent: &str,
        texts: &[S],
    ) -> Vec<u64> {
        let weights = self.weights.lock().await;
        texts
            .iter()
            .map(|text| {
                let key = WeightKey::new(context, intent, text.as_ref()).to_owned_key();
                weights.get(&key).copied().unwrap_or(0)
            })
            .collect()
    }

    /// Adds `delta` to the weight in memory and returns the new value. Not durable
    /// until [`WeightStore::persist`].
    pub async fn bump(&self, key: WeightKey<'_>, delta: u64) -> u64 {
        let mut weights = self.weights.lock().await;
        let entry = weights.entry(key.to_owned_key()).or_insert(0);
        *entry = entry.saturating_add(delta);
        *entry
    }

    /// Writes the whole table, overwriting the previous snapshot.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let weights = self.weights.lock().await;
        self.file.save(&snapshot(&weights)).await
    }

    /// Bump then persist while holding the lock. The in-memory increment stands
    /// even if the write fails.
    pub async fn bump_and_persist(
        &self,
        key: WeightKey<'_>,
        delta: u64,
    ) -> Result<u64, StoreError> {
        let mut weights = self.weights.lock().await;
        let entry = weights.entry(key.to_owned_key()).or_insert(0);
        *entry = entry.saturating_add(delta);
        let value = *entry;
        self.file.save(&snapshot(&weights)).await?;
        Ok(value)
    }

    /// All entries, heaviest first, ties by (context, intent, text).
    pub async fn entries(&self) -> Vec<WeightEntry> {
        let weights = self.weights.lock().await;
        let mut entries: Vec<WeightEntry> = weights
            .iter()
            .map(|((context, intent, text), weight)| WeightEntry {
                context: context.clone(),
                intent: intent.clone(),
                text: text.clone(),
                weight: *weight,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.weight
                .cmp(&a.weight)
                .then_with(|| a.context.cmp(&b.context))
                .then_with(|| a.intent.cmp(&b.intent))
                .then_with(|| a.text.cmp(&b.text))
        });
        entries
    }

    pub async fn len(&self) -> usize {
        self.weights.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.weights.lock().await.is_empty()
    }
}

fn snapshot(weights: &HashMap<OwnedKey, u64>) -> BTreeMap<String, u64> {
    weights
        .iter()
        .map(|((context, intent, text), weight)| {
            (WeightKey::new(context, intent, text).storage_key(), *weight)
        })
        .collect()
}
