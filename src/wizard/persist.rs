//! Local snapshot of the wizard so a reload resumes on the same step.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::SessionError;

use super::sequencer::WizardSequencer;

/// JSON file holding one serialized [`WizardSequencer`].
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot. The file is replaced atomically so a crash never
    /// leaves half a snapshot behind.
    pub async fn save(&self, sequencer: &WizardSequencer) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(sequencer)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!(
            path = %self.path.display(),
            step = sequencer.current_index(),
            "Session saved"
        );
        Ok(())
    }

    /// Read the snapshot. `Ok(None)` when there is no file yet.
    pub async fn load(&self) -> Result<Option<WizardSequencer>, SessionError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let sequencer: WizardSequencer = serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        if !sequencer.is_well_formed() {
            warn!(path = %self.path.display(), "Session file is inconsistent");
            return Err(SessionError::Serialization(
                "session file does not describe a valid wizard".to_string(),
            ));
        }
        Ok(Some(sequencer))
    }

    /// Remove the snapshot, if any.
    pub async fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
