// Which saved pipeline is currently active

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Result;

const STATUS_FILE: &str = "status.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    #[serde(default)]
    active_pipeline_id: Option<String>,
}

/// Persisted "active pipeline id"
#[derive(Debug, Clone)]
pub struct StatusTracker {
    path: PathBuf,
}

impl StatusTracker {
    pub fn new(library_dir: &Path) -> Self {
        Self {
            path: library_dir.join(STATUS_FILE),
        }
    }

    fn read(&self) -> Status {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Status::default();
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            log::warn!("Failed to parse pipeline status: {}", e);
            Status::default()
        })
    }

    fn write(&self, status: &Status) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(status)?)?;
        Ok(())
    }

    pub fn set_active(&self, id: &str) -> Result<()> {
        self.write(&Status {
            active_pipeline_id: Some(id.to_string()),
        })
    }

    pub fn active(&self) -> Option<String> {
        self.read().active_pipeline_id
    }

    pub fn clear(&self) -> Result<()> {
        self.write(&Status::default())
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active().as_deref() == Some(id)
    }
}
