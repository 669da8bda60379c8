// src/diff.rs
use anyhow::Result;

use crate::store::SnapshotStore;
use crate::watch::WatchId;

/// New content differing from the stored snapshot. Consumed once by the
/// dispatcher, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub watch: WatchId,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffResult {
    /// `first_run` is set when no snapshot existed yet; that run never alerts.
    Unchanged { first_run: bool },
    Changed(ChangeEvent),
}

/// Byte-wise comparison of `new` against the stored snapshot for `id`.
pub async fn diff(store: &dyn SnapshotStore, id: &WatchId, new: &str) -> Result<DiffResult> {
    let Some(prev) = store.get(id).await? else {
        return Ok(DiffResult::Unchanged { first_run: true });
    };
    if prev.content == new {
        return Ok(DiffResult::Unchanged { first_run: false });
    }
    Ok(DiffResult::Changed(ChangeEvent {
        watch: id.clone(),
        old: prev.content,
        new: new.to_string(),
    }))
}
