//! The build-directory cache: one analyzer-info file per TU, an index
//! mapping source paths to them, and the atomic-write primitive every
//! persistent artifact goes through.
//!
//! Analyzer files let a later run skip TUs whose checksum is unchanged
//! and let the whole-program phase run from summaries alone.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ctu::CtuInfo;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `data` to `path` via a temp sibling and rename, so a concurrent
/// reader never observes a partial file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let counter = TEMP_FILE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let pid = std::process::id();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("analyzerinfo");
    let temp = path.with_file_name(format!(".{file_name}.tmp.{pid}.{counter}"));
    std::fs::write(&temp, data)
        .with_context(|| format!("failed to write temporary file {}", temp.display()))?;
    std::fs::rename(&temp, path).with_context(|| {
        let _ = std::fs::remove_file(&temp);
        format!("failed to move {} into place", path.display())
    })?;
    Ok(())
}

/// One row of the build-dir index.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub source_file: String,
    pub file_size: u64,
    pub analyzer_file: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// All per-TU summaries of a run plus their on-disk layout.
#[derive(Debug, Default)]
pub struct AnalyzerInformation {
    ctus: Vec<CtuInfo>,
    build_dir: Option<PathBuf>,
}

impl AnalyzerInformation {
    pub fn new(build_dir: Option<PathBuf>) -> AnalyzerInformation {
        AnalyzerInformation {
            ctus: Vec::new(),
            build_dir,
        }
    }

    pub fn build_dir(&self) -> Option<&Path> {
        self.build_dir.as_deref()
    }

    /// Create the CTU records for the given `(source, size)` pairs,
    /// assigning deterministic analyzer-file names inside the build dir.
    pub fn create_ctus(&mut self, sourcefiles: &[(String, u64)]) -> Result<()> {
        if let Some(dir) = &self.build_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create build dir {}", dir.display()))?;
        }
        for (source, size) in sourcefiles {
            let analyzer_file = self
                .build_dir
                .as_ref()
                .map(|dir| dir.join(analyzer_file_name(source)));
            self.ctus
                .push(CtuInfo::new(source.clone(), *size, analyzer_file));
        }
        Ok(())
    }

    pub fn add_ctu(&mut self, ctu: CtuInfo) {
        self.ctus.push(ctu);
    }

    pub fn ctus(&self) -> &[CtuInfo] {
        &self.ctus
    }

    pub fn ctus_mut(&mut self) -> &mut [CtuInfo] {
        &mut self.ctus
    }

    /// Persist the index after every TU has been flushed.
    pub fn write_index(&self) -> Result<()> {
        let Some(dir) = &self.build_dir else {
            return Ok(());
        };
        let entries: Vec<IndexEntry> = self
            .ctus
            .iter()
            .filter_map(|ctu| {
                ctu.analyzer_file.as_ref().map(|af| IndexEntry {
                    source_file: ctu.source_file.clone(),
                    file_size: ctu.file_size,
                    analyzer_file: af.clone(),
                    timestamp: Utc::now(),
                })
            })
            .collect();
        let json = serde_json::to_string_pretty(&entries).context("failed to serialize index")?;
        write_atomic(&dir.join("files.json"), json.as_bytes())?;
        debug!(entries = entries.len(), "wrote build-dir index");
        Ok(())
    }

    /// Load the previous run's index, if any.
    pub fn load_index(build_dir: &Path) -> Result<im::Vector<IndexEntry>> {
        let path = build_dir.join("files.json");
        if !path.exists() {
            return Ok(im::Vector::new());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries: Vec<IndexEntry> = serde_json::from_str(&text)
            .with_context(|| format!("malformed index {}", path.display()))?;
        Ok(entries.into_iter().collect())
    }
}

/// Deterministic analyzer-file name for a source path: the stem plus a
/// short hash of the full path, so same-named files in different
/// directories never collide.
pub fn analyzer_file_name(source: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tu");
    format!("{stem}.a{:02x}{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2], digest[3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.xml");
        write_atomic(&target, b"first").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"first");
        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        // No temp siblings left behind.
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn analyzer_file_names_are_deterministic_and_distinct() {
        let a = analyzer_file_name("src/a.c");
        let b = analyzer_file_name("other/a.c");
        assert_eq!(a, analyzer_file_name("src/a.c"));
        assert_ne!(a, b);
        assert!(a.starts_with("a.a"));
    }

    #[test]
    fn create_ctus_assigns_files_inside_build_dir() {
        let dir = TempDir::new().unwrap();
        let mut info = AnalyzerInformation::new(Some(dir.path().to_path_buf()));
        info.create_ctus(&[("x.c".to_string(), 10), ("y.c".to_string(), 20)])
            .unwrap();
        assert_eq!(info.ctus().len(), 2);
        for ctu in info.ctus() {
            let af = ctu.analyzer_file.as_ref().unwrap();
            assert!(af.starts_with(dir.path()));
        }
    }

    #[test]
    fn index_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut info = AnalyzerInformation::new(Some(dir.path().to_path_buf()));
        info.create_ctus(&[("x.c".to_string(), 10)]).unwrap();
        info.write_index().unwrap();
        let loaded = AnalyzerInformation::load_index(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].source_file, "x.c");
        assert_eq!(loaded[0].file_size, 10);
    }

    #[test]
    fn no_build_dir_means_no_analyzer_files() {
        let mut info = AnalyzerInformation::new(None);
        info.create_ctus(&[("x.c".to_string(), 1)]).unwrap();
        assert!(info.ctus()[0].analyzer_file.is_none());
        info.write_index().unwrap();
    }
}
