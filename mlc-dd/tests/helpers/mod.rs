//! Shared fixtures for mlc-dd integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mlc_common::LibraryItem;
use mlc_dd::clients::{ImportRequest, LibraryError, MediaLibrary};
use mlc_dd::config::EngineConfig;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A state change made through the library API
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    UpdateTags { item_id: String, tags: Vec<String> },
    Trash { item_ids: Vec<String> },
    Import { path: PathBuf, name: String },
}

#[derive(Debug, Default)]
struct State {
    active: PathBuf,
    libraries: HashMap<PathBuf, Vec<LibraryItem>>,
    trashed: HashSet<String>,
    mutations: Vec<Mutation>,
    switches: Vec<PathBuf>,
    fail_trash: HashSet<String>,
    fail_import: HashSet<String>,
    next_id: usize,
}

/// In-memory media library recording every mutation
pub struct InMemoryLibrary {
    state: Mutex<State>,
}

impl InMemoryLibrary {
    pub fn new(active: impl Into<PathBuf>, items: Vec<LibraryItem>) -> Self {
        let active = active.into();
        let mut libraries = HashMap::new();
        libraries.insert(active.clone(), items);
        Self {
            state: Mutex::new(State {
                active,
                libraries,
                ..Default::default()
            }),
        }
    }

    pub fn with_library(self, root: impl Into<PathBuf>, items: Vec<LibraryItem>) -> Self {
        self.state.lock().unwrap().libraries.insert(root.into(), items);
        self
    }

    /// Make `move_to_trash` reject this item id
    pub fn fail_trash(self, item_id: &str) -> Self {
        self.state.lock().unwrap().fail_trash.insert(item_id.to_string());
        self
    }

    /// Make `import_item` time out for this item name
    pub fn fail_import(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_import.insert(name.to_string());
        self
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn switches(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().switches.clone()
    }

    pub fn active(&self) -> PathBuf {
        self.state.lock().unwrap().active.clone()
    }

    pub fn trashed(&self) -> HashSet<String> {
        self.state.lock().unwrap().trashed.clone()
    }

    /// Items of a library as currently stored (trashed items included)
    pub fn snapshot(&self, root: &Path) -> Vec<LibraryItem> {
        self.state
            .lock()
            .unwrap()
            .libraries
            .get(root)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MediaLibrary for InMemoryLibrary {
    async fn list_items(&self) -> Result<Vec<LibraryItem>, LibraryError> {
        let state = self.state.lock().unwrap();
        let items = state
            .libraries
            .get(&state.active)
            .ok_or_else(|| LibraryError::Unreachable("no active library".to_string()))?;
        Ok(items
            .iter()
            .filter(|item| !state.trashed.contains(&item.id))
            .cloned()
            .collect())
    }

    async fn update_tags(&self, item_id: &str, tags: &[String]) -> Result<bool, LibraryError> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(Mutation::UpdateTags {
            item_id: item_id.to_string(),
            tags: tags.to_vec(),
        });
        let active = state.active.clone();
        let Some(item) = state
            .libraries
            .get_mut(&active)
            .and_then(|items| items.iter_mut().find(|i| i.id == item_id))
        else {
            return Ok(false);
        };
        item.tags = tags.to_vec();
        item.fingerprint = item.tag_fingerprint();
        Ok(true)
    }

    async fn move_to_trash(&self, item_ids: &[String]) -> Result<bool, LibraryError> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(Mutation::Trash {
            item_ids: item_ids.to_vec(),
        });
        if item_ids.iter().any(|id| state.fail_trash.contains(id)) {
            return Err(LibraryError::Timeout("moveToTrash".to_string()));
        }
        state.trashed.extend(item_ids.iter().cloned());
        Ok(true)
    }

    async fn switch_library(&self, library_path: &Path) -> Result<bool, LibraryError> {
        let mut state = self.state.lock().unwrap();
        if !state.libraries.contains_key(library_path) {
            return Ok(false);
        }
        state.active = library_path.to_path_buf();
        state.switches.push(library_path.to_path_buf());
        Ok(true)
    }

    async fn import_item(&self, request: &ImportRequest) -> Result<Option<String>, LibraryError> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(Mutation::Import {
            path: request.path.clone(),
            name: request.name.clone(),
        });
        if state.fail_import.contains(&request.name) {
            return Err(LibraryError::Timeout("addFromPath".to_string()));
        }

        state.next_id += 1;
        let id = format!("IMPORTED{}", state.next_id);
        let size = std::fs::metadata(&request.path).map(|m| m.len()).unwrap_or(0);
        let ext = request
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let item = LibraryItem::new(
            id.clone(),
            request.name.clone(),
            ext,
            size,
            Utc::now(),
            request.tags.clone(),
            Some(request.path.clone()),
        );
        let active = state.active.clone();
        state.libraries.entry(active).or_default().push(item);
        Ok(Some(id))
    }

    async fn library_path(&self) -> Result<PathBuf, LibraryError> {
        Ok(self.state.lock().unwrap().active.clone())
    }
}

pub const FP_A: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
pub const FP_B: &str = "60303ae22b998861bce3b28f33eec1be758a213c86c93c076dbe9f558c11c752";

pub fn fp_tag(seed: &str) -> String {
    format!("fingerprint:{}", seed)
}

/// Distinct valid fingerprint tag per index
pub fn unique_fp_tag(index: usize) -> String {
    fp_tag(&format!("{:064x}", index + 1))
}

/// Item builder with sensible defaults
pub struct ItemBuilder {
    id: String,
    name: String,
    ext: String,
    size: u64,
    modified_at: DateTime<Utc>,
    tags: Vec<String>,
    file_path: Option<PathBuf>,
}

impl ItemBuilder {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ext: "wav".to_string(),
            size: 1_000,
            modified_at: Utc::now() - Duration::days(365),
            tags: Vec::new(),
            file_path: Some(PathBuf::from(format!("/nonexistent/{}.wav", id))),
        }
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn url_only(mut self) -> Self {
        self.file_path = None;
        self.ext = String::new();
        self
    }

    pub fn build(self) -> LibraryItem {
        LibraryItem::new(
            self.id,
            self.name,
            self.ext,
            self.size,
            self.modified_at,
            self.tags,
            self.file_path,
        )
    }
}

/// Write a short mono 16-bit WAV whose samples depend on `seed`
pub fn write_wav(dir: &Path, file_name: &str, seed: i16) -> PathBuf {
    let path = dir.join(file_name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..800i16 {
        writer.write_sample(i.wrapping_mul(seed)).unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Engine config for tests: reports into `report_dir`, no ledger
pub fn test_config(report_dir: &Path, live: bool, cleanup: bool) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.execution.dry_run = !live;
    config.execution.cleanup = cleanup;
    config.report_dir = report_dir.to_path_buf();
    config.ledger_path = None;
    config
}
