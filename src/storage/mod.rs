//! Artifact storage
//!
//! Models and manifests are addressed by locator strings. [`LocalArtifactStore`]
//! resolves relative locators against its root directory; absolute locators
//! are used as-is so records written by another process still resolve.

use crate::error::{PlatformError, Result};
use crate::training::{Algorithm, ModelArtifact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A stored file with its modification time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub locator: String,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Path-addressed byte store
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` under `name`, returning the locator
    fn write(&self, name: &str, bytes: &[u8]) -> Result<String>;

    fn read(&self, locator: &str) -> Result<Vec<u8>>;

    fn exists(&self, locator: &str) -> bool;

    /// Files whose name matches a `*`/`?` wildcard pattern
    fn list_matching(&self, pattern: &str) -> Result<Vec<StoredArtifact>>;
}

/// Directory-rooted store on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Create `root` if needed. The root is canonicalized so the locators
    /// handed out stay valid whatever the working directory later is.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let root = fs::canonicalize(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        self.root.join(locator)
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<String> {
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(PlatformError::Storage(format!("invalid artifact name '{}'", name)));
        }
        let path = self.resolve(name);
        // Write-then-rename so readers never observe a partial file
        let tmp = self.root.join(format!(".{}.tmp", name));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), size = bytes.len(), "Artifact written");
        Ok(path.to_string_lossy().into_owned())
    }

    fn read(&self, locator: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(locator))?)
    }

    fn exists(&self, locator: &str) -> bool {
        !locator.is_empty() && self.resolve(locator).is_file()
    }

    fn list_matching(&self, pattern: &str) -> Result<Vec<StoredArtifact>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !wildcard_match(pattern, &name) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            found.push(StoredArtifact {
                locator: entry.path().to_string_lossy().into_owned(),
                modified: DateTime::<Utc>::from(meta.modified()?),
                size_bytes: meta.len(),
            });
        }
        found.sort_by(|a, b| a.locator.cmp(&b.locator));
        Ok(found)
    }
}

/// Match `name` against a pattern where `*` is any run and `?` any one char
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Identifier of one training run: a microsecond UTC timestamp plus a
/// process-local sequence number. Digits only, so it never contains `_`.
pub fn new_run_id() -> String {
    let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("{}{:03}", Utc::now().format("%Y%m%d%H%M%S%6f"), seq)
}

/// File name of a candidate persisted by run `run_id`
pub fn model_file_name(model_id: i64, run_id: &str, algorithm: Algorithm) -> String {
    format!("model_{}_{}_{}.bin", model_id, run_id, algorithm.tag())
}

/// Pattern matching every persisted candidate of a model, across runs
pub fn model_file_pattern(model_id: i64) -> String {
    format!("model_{}_*.bin", model_id)
}

/// Most recently modified candidate of a model, if any
pub fn latest_model_file(store: &dyn ArtifactStore, model_id: i64) -> Result<Option<StoredArtifact>> {
    Ok(store
        .list_matching(&model_file_pattern(model_id))?
        .into_iter()
        .max_by_key(|a| a.modified))
}

/// Persist a candidate under its own run-scoped name; earlier runs are never overwritten
pub fn save_model(
    store: &dyn ArtifactStore,
    model_id: i64,
    run_id: &str,
    artifact: &ModelArtifact,
) -> Result<String> {
    store.write(&model_file_name(model_id, run_id, artifact.algorithm), &artifact.to_bytes()?)
}

pub fn load_model(store: &dyn ArtifactStore, locator: &str) -> Result<ModelArtifact> {
    if !store.exists(locator) {
        return Err(PlatformError::ModelFileMissing(locator.to_string()));
    }
    ModelArtifact::from_bytes(&store.read(locator)?)
}
