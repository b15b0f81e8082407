//! Fingerprint-keyed artifact cache
//!
//! Entries live under `<cache_dir>/<fingerprint>/`:
//! - `graph.gv` - the graph description
//! - `image.<format>` - the converted image, if any
//! - `meta.json` - written last; an entry without it is incomplete
//!
//! Nothing is ever evicted. Read failures count as misses.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use callvis_core::{Error, Fingerprint, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const DESCRIPTION_FILE: &str = "graph.gv";
const META_FILE: &str = "meta.json";

/// A rendered pipeline result.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub fingerprint: Fingerprint,
    pub description: String,
    pub image: Option<Vec<u8>>,
    pub format: String,
    pub created_at: DateTime<Utc>,
}

/// Metadata stored alongside a cached artifact.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    version: u32,
    fingerprint: Fingerprint,
    format: String,
    has_image: bool,
    created_at: DateTime<Utc>,
}

impl EntryMeta {
    const CURRENT_VERSION: u32 = 1;
}

type Flight = Arc<OnceCell<Result<Artifact>>>;

/// Disk-backed artifact store with at most one computation in flight per
/// fingerprint.
#[derive(Debug)]
pub struct ArtifactCache {
    dir: Option<PathBuf>,
    in_flight: DashMap<Fingerprint, Flight>,
}

impl ArtifactCache {
    /// Cache rooted at `dir`; `None` disables storage but keeps the
    /// in-flight deduplication.
    pub fn new(dir: Option<PathBuf>) -> Self {
        ArtifactCache {
            dir,
            in_flight: DashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn entry_dir(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(fingerprint.as_str()))
    }

    /// Return the stored artifact for `fingerprint`, or run `compute`.
    ///
    /// With `force_refresh` (or a disabled cache) stored entries are never
    /// read and the fresh result overwrites them. Concurrent callers for the
    /// same fingerprint share one computation.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        compute: F,
        force_refresh: bool,
    ) -> Result<Artifact>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Artifact>>,
    {
        if !force_refresh {
            if let Some(artifact) = self.load(fingerprint).await {
                debug!("Artifact cache hit for {}", fingerprint.short());
                return Ok(artifact);
            }
        }

        let flight: Flight = self
            .in_flight
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let result = flight
            .get_or_init(|| async {
                // A flight that finished between our lookup and now may
                // already have stored the entry.
                if !force_refresh {
                    if let Some(artifact) = self.load(fingerprint).await {
                        return Ok(artifact);
                    }
                }
                debug!("Artifact cache miss for {}, computing", fingerprint.short());
                let result = compute().await;
                if let Ok(artifact) = &result {
                    self.store(artifact).await;
                }
                result
            })
            .await
            .clone();

        self.in_flight
            .remove_if(fingerprint, |_, current| Arc::ptr_eq(current, &flight));
        result
    }

    /// Read a stored entry. Any failure is logged and reported as a miss.
    pub async fn load(&self, fingerprint: &Fingerprint) -> Option<Artifact> {
        let dir = self.entry_dir(fingerprint)?;
        match read_entry(&dir).await {
            Ok(artifact) if artifact.fingerprint == *fingerprint => Some(artifact),
            Ok(_) => {
                warn!("Cache entry {} has mismatched metadata, ignoring", dir.display());
                None
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", dir.display(), e);
                None
            }
        }
    }

    /// Persist an artifact. Failures are logged and otherwise ignored.
    pub async fn store(&self, artifact: &Artifact) {
        let Some(dir) = self.entry_dir(&artifact.fingerprint) else {
            return;
        };
        match write_entry(&dir, artifact).await {
            Ok(()) => debug!("Cached artifact at {}", dir.display()),
            Err(e) => warn!("Failed to write cache entry {}: {}", dir.display(), e),
        }
    }

    /// Fingerprints of every complete stored entry, sorted.
    pub async fn entries(&self) -> Vec<Fingerprint> {
        let Some(dir) = &self.dir else {
            return Vec::new();
        };
        let mut found = Vec::new();
        let Ok(mut reader) = tokio::fs::read_dir(dir).await else {
            return found;
        };
        while let Ok(Some(entry)) = reader.next_entry().await {
            let name = entry.file_name();
            if let Some(fp) = name.to_str().and_then(Fingerprint::parse) {
                if tokio::fs::try_exists(entry.path().join(META_FILE)).await.unwrap_or(false) {
                    found.push(fp);
                }
            }
        }
        found.sort();
        found
    }

    /// Remove every stored entry. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        let mut reader = match tokio::fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io(dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = reader.next_entry().await.map_err(|e| Error::io(dir, e))? {
            let is_entry = entry.file_name().to_str().and_then(Fingerprint::parse).is_some();
            if is_entry {
                let path = entry.path();
                tokio::fs::remove_dir_all(&path)
                    .await
                    .map_err(|e| Error::io(&path, e))?;
                removed += 1;
            }
        }

        info!("Cleared {} cached artifacts from {}", removed, dir.display());
        Ok(removed)
    }
}

fn image_file(format: &str) -> String {
    format!("image.{format}")
}

async fn read_entry(dir: &Path) -> std::io::Result<Artifact> {
    let meta = tokio::fs::read(dir.join(META_FILE)).await?;
    let meta: EntryMeta = serde_json::from_slice(&meta)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
    if meta.version != EntryMeta::CURRENT_VERSION {
        return Err(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("unsupported cache entry version {}", meta.version),
        ));
    }

    let description = tokio::fs::read_to_string(dir.join(DESCRIPTION_FILE)).await?;
    let image = if meta.has_image {
        Some(tokio::fs::read(dir.join(image_file(&meta.format))).await?)
    } else {
        None
    };

    Ok(Artifact {
        fingerprint: meta.fingerprint,
        description,
        image,
        format: meta.format,
        created_at: meta.created_at,
    })
}

async fn write_entry(dir: &Path, artifact: &Artifact) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    // Drop stale metadata first so a half-written entry reads as a miss.
    match tokio::fs::remove_file(dir.join(META_FILE)).await {
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    tokio::fs::write(dir.join(DESCRIPTION_FILE), &artifact.description).await?;
    if let Some(image) = &artifact.image {
        tokio::fs::write(dir.join(image_file(&artifact.format)), image).await?;
    }

    let meta = EntryMeta {
        version: EntryMeta::CURRENT_VERSION,
        fingerprint: artifact.fingerprint.clone(),
        format: artifact.format.clone(),
        has_image: artifact.image.is_some(),
        created_at: artifact.created_at,
    };
    let meta = serde_json::to_vec_pretty(&meta)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
    tokio::fs::write(dir.join(META_FILE), meta).await
}
