use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::identity::ArticleId;

/// Operator decision recorded for an article. Both values are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Posted,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub status: ArticleStatus,
}

impl ArticleRecord {
    pub fn posted(title: impl Into<String>) -> Self {
        Self { title: title.into(), status: ArticleStatus::Posted }
    }

    pub fn skipped(title: impl Into<String>) -> Self {
        Self { title: title.into(), status: ArticleStatus::Skipped }
    }
}

/// Every article an operator has decided on, keyed by identity.
///
/// Serialized as one JSON object: `{"<id>": {"title": "...", "status": "posted"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedState {
    records: BTreeMap<ArticleId, ArticleRecord>,
}

impl PersistedState {
    pub fn get(&self, id: &ArticleId) -> Option<&ArticleRecord> {
        self.records.get(id)
    }

    /// Insert or overwrite.
    pub fn put(&mut self, id: ArticleId, record: ArticleRecord) {
        self.records.insert(id, record);
    }

    pub fn contains(&self, id: &ArticleId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArticleId, &ArticleRecord)> {
        self.records.iter()
    }
}

/// File-backed store for [`PersistedState`]. Single writer assumed.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state file. A missing, unreadable or corrupt file yields an
    /// empty state; history is lost but the run goes on.
    pub async fn load(&self) -> PersistedState {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet, starting empty");
                return PersistedState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), %e, "failed to read state file, starting empty");
                return PersistedState::default();
            }
        };

        match serde_json::from_str::<PersistedState>(&data) {
            Ok(state) => {
                info!(path = %self.path.display(), records = state.len(), "state loaded");
                state
            }
            Err(e) => {
                warn!(path = %self.path.display(), %e, "state file is not valid, starting empty");
                PersistedState::default()
            }
        }
    }

    /// Overwrite the state file with `state`.
    ///
    /// The JSON is written to a sibling `.tmp` file first and renamed over
    /// the target, so readers see either the old or the new content.
    pub async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(state).context("failed to serialize state")?;
        let tmp_path = self.tmp_path();

        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .with_context(|| format!("Failed to write state file: {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        info!(path = %self.path.display(), records = state.len(), "state saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
