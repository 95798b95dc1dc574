// ABOUTME: Directory-backed session store keeping one JSON document per id
// ABOUTME: Writes go through a temp file and rename so readers never see partial documents

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{validate_id, SessionStore, StorageResult};
use crate::state::{is_checkpoint_id_of, CheckpointSummary, SessionState};

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn initialize(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        debug!("JSON session store ready at {}", self.dir.display());
        Ok(())
    }

    async fn save(&self, state: &SessionState) -> StorageResult<()> {
        validate_id(&state.session_id)?;
        let document = serde_json::to_vec_pretty(state)?;

        let path = self.document_path(&state.session_id);
        let tmp = self.dir.join(format!(".{}.json.tmp", state.session_id));
        tokio::fs::write(&tmp, &document).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Saved session document {}", path.display());
        Ok(())
    }

    async fn load(&self, id: &str) -> StorageResult<Option<SessionState>> {
        validate_id(id)?;
        match tokio::fs::read(self.document_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_checkpoints(&self, session_id: &str) -> StorageResult<Vec<CheckpointSummary>> {
        validate_id(session_id)?;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(id) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".json"))
            else {
                continue;
            };
            if !is_checkpoint_id_of(id, session_id) {
                continue;
            }

            match self.load(id).await {
                Ok(Some(state)) => summaries.extend(CheckpointSummary::from_state(&state)),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable checkpoint {}: {}", id, e),
            }
        }

        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.checkpoint_id.cmp(&b.checkpoint_id))
        });
        Ok(summaries)
    }
}
