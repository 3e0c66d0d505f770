// Pipeline library persistence: JSON index plus optional `.gstpipe` backups

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::item::{now_millis, PipelineItem};
use super::{LibraryError, Result};

const INDEX_FILE: &str = "pipelines.json";
const BACKUP_EXTENSION: &str = "gstpipe";

/// Ordering for [`PipelineLibrary::sorted`]; favourites always come first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Case-insensitive by name
    Name,
    /// Most recently used first
    #[default]
    Recent,
    /// Newest first
    Created,
}

impl std::str::FromStr for SortOrder {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "recent" => Ok(Self::Recent),
            "created" => Ok(Self::Created),
            other => Err(LibraryError::Invalid(format!("unknown sort order '{}'", other))),
        }
    }
}

/// Single-pipeline backup file contents
#[derive(Debug, Serialize, Deserialize)]
struct BackupEntry {
    name: String,
    pipeline: String,
}

/// Entry accepted by [`PipelineLibrary::import_json`]: only name and pipeline
/// are required
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportEntry {
    id: Option<String>,
    name: Option<String>,
    pipeline: Option<String>,
    created_time: Option<i64>,
    last_used_time: Option<i64>,
    #[serde(default)]
    is_favorite: bool,
}

/// Saved pipelines, persisted as a JSON array index file
#[derive(Debug, Clone)]
pub struct PipelineLibrary {
    index_path: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl PipelineLibrary {
    /// Open (creating if needed) the library stored in `library_dir`
    pub fn open(library_dir: &Path, backup_dir: Option<&Path>) -> Result<Self> {
        std::fs::create_dir_all(library_dir)?;
        if let Some(dir) = backup_dir {
            match std::fs::create_dir_all(dir) {
                Ok(()) => log::debug!("Backup directory ready: {}", dir.display()),
                Err(e) => log::error!("Failed to create backup directory {}: {}", dir.display(), e),
            }
        }
        Ok(Self {
            index_path: library_dir.join(INDEX_FILE),
            backup_dir: backup_dir.map(Path::to_path_buf),
        })
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn backup_dir(&self) -> Option<&Path> {
        self.backup_dir.as_deref()
    }

    /// All saved pipelines in stored order; empty if nothing was saved yet
    pub fn load(&self) -> Result<Vec<PipelineItem>> {
        if !self.index_path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.index_path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Replace the stored list and refresh the backup files
    pub fn save(&self, items: &[PipelineItem]) -> Result<()> {
        let contents = serde_json::to_string(items)?;
        std::fs::write(&self.index_path, contents)?;
        self.write_backups(items);
        Ok(())
    }

    pub fn add(&self, item: PipelineItem) -> Result<()> {
        let mut items = self.load()?;
        log::debug!("Adding pipeline '{}' ({})", item.name, item.id);
        items.push(item);
        self.save(&items)
    }

    /// Replace the entry with the same id. Returns false if there is none.
    pub fn update(&self, item: PipelineItem) -> Result<bool> {
        let mut items = self.load()?;
        let Some(slot) = items.iter_mut().find(|existing| existing.id == item.id) else {
            return Ok(false);
        };
        *slot = item;
        self.save(&items)?;
        Ok(true)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut items = self.load()?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(false);
        }
        self.save(&items)?;
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Result<Option<PipelineItem>> {
        Ok(self.load()?.into_iter().find(|item| item.id == id))
    }

    /// Stamp the entry as used now and return it
    pub fn touch(&self, id: &str) -> Result<PipelineItem> {
        let mut item = self
            .get(id)?
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
        item.mark_used();
        self.update(item.clone())?;
        Ok(item)
    }

    pub fn set_favorite(&self, id: &str, favorite: bool) -> Result<bool> {
        let Some(mut item) = self.get(id)? else {
            return Ok(false);
        };
        item.is_favorite = favorite;
        self.update(item)
    }

    pub fn sorted(&self, order: SortOrder) -> Result<Vec<PipelineItem>> {
        let mut items = self.load()?;
        match order {
            SortOrder::Name => items.sort_by_key(|item| item.name.to_lowercase()),
            SortOrder::Recent => items.sort_by_key(|item| Reverse(item.last_used_time)),
            SortOrder::Created => items.sort_by_key(|item| Reverse(item.created_time)),
        }
        // Stable, so the order above holds within each group
        items.sort_by_key(|item| !item.is_favorite);
        Ok(items)
    }

    /// The stored index as a JSON array string
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.load()?)?)
    }

    /// Replace the library with the entries in `json`.
    ///
    /// Every entry must carry a string `name` and `pipeline`; nothing is
    /// written if any entry is invalid. Missing ids and times are filled in.
    pub fn import_json(&self, json: &str) -> Result<usize> {
        let entries: Vec<ImportEntry> = serde_json::from_str(json)?;
        let now = now_millis();

        let mut items = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let name = entry
                .name
                .ok_or_else(|| LibraryError::Invalid(format!("entry {} has no name", index)))?;
            let pipeline = entry
                .pipeline
                .ok_or_else(|| LibraryError::Invalid(format!("entry {} has no pipeline", index)))?;
            items.push(PipelineItem {
                id: entry.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name,
                pipeline,
                created_time: entry.created_time.unwrap_or(now),
                last_used_time: entry.last_used_time.unwrap_or(now),
                is_favorite: entry.is_favorite,
            });
        }

        self.save(&items)?;
        log::info!("Imported {} pipelines", items.len());
        Ok(items.len())
    }

    fn write_backups(&self, items: &[PipelineItem]) {
        let Some(dir) = self.backup_dir.as_deref() else {
            return;
        };
        if !dir.exists() {
            log::warn!("Backup directory not available");
            return;
        }
        for item in items {
            if let Err(e) = write_backup(dir, item) {
                log::error!("Failed to save pipeline to file: {}: {}", item.name, e);
            }
        }
    }

    /// Backup files present in the backup directory, sorted by path
    pub fn list_pipeline_files(&self) -> Result<Vec<PathBuf>> {
        let Some(dir) = self.backup_dir.as_deref().filter(|d| d.exists()) else {
            return Ok(Vec::new());
        };
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(BACKUP_EXTENSION)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Add the pipeline stored in a backup file as a new, non-favourite entry
    pub fn import_pipeline_file(&self, path: &Path) -> Result<PipelineItem> {
        let contents = std::fs::read_to_string(path)?;
        let entry: BackupEntry = serde_json::from_str(&contents)?;
        let item = PipelineItem::new(entry.name, entry.pipeline);
        self.add(item.clone())?;
        log::info!("Pipeline imported from: {}", path.display());
        Ok(item)
    }
}

fn write_backup(dir: &Path, item: &PipelineItem) -> Result<()> {
    let path = dir.join(format!("{}.{}", sanitize_file_name(&item.name), BACKUP_EXTENSION));
    let entry = BackupEntry {
        name: item.name.clone(),
        pipeline: item.pipeline.clone(),
    };
    std::fs::write(&path, serde_json::to_string_pretty(&entry)?)?;
    log::debug!("Pipeline saved to: {}", path.display());
    Ok(())
}

/// Replace everything outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
