pub mod history;
pub mod snapshot;
pub mod weights;

pub use history::{Exchange, HistoryStore, SessionHistory, DEFAULT_MAX_EXCHANGES};
pub use snapshot::{SnapshotFile, StoreError};
pub use weights::{WeightEntry, WeightKey, WeightStore};
