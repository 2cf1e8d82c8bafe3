//! FILENAME: report-engine/src/cache.rs
//! PURPOSE: On-disk cache of parsed templates.
//! CONTEXT: A cache entry is the bincode encoding of a parsed `Report`, one file
//! per source path. It is used only while it is newer than the source file;
//! otherwise the template is parsed again and the entry rewritten. Writes are
//! not locked: concurrent writers of the same entry must coordinate themselves.

use crate::error::CacheError;
use crate::log_debug;
use crate::logging::CACHE;
use crate::model::Report;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TemplateCache {
    dir: PathBuf,
}

impl TemplateCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        TemplateCache { dir: dir.into() }
    }

    /// Cache file for a source template: `<stem>.<path digest>.bin`. The
    /// digest is the first 8 bytes of the SHA-256 of the path, so entry names
    /// survive toolchain upgrades.
    pub fn entry_path(&self, source: &Path) -> PathBuf {
        let digest = Sha256::digest(source.to_string_lossy().as_bytes());
        let key: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("template");
        self.dir.join(format!("{}.{}.bin", stem, key))
    }

    /// True when the entry exists and was written after the source last changed.
    pub fn is_fresh(&self, source: &Path) -> Result<bool, CacheError> {
        let entry = self.entry_path(source);
        if !entry.exists() {
            return Ok(false);
        }
        let source_time = fs::metadata(source)?.modified()?;
        let entry_time = fs::metadata(&entry)?.modified()?;
        Ok(entry_time > source_time)
    }

    /// The cached template, or None when there is no fresh entry.
    pub fn load(&self, source: &Path) -> Result<Option<Report>, CacheError> {
        if !self.is_fresh(source)? {
            log_debug!(CACHE, "no fresh entry for {}", source.display());
            return Ok(None);
        }
        let reader = BufReader::new(File::open(self.entry_path(source))?);
        let report: Report = bincode::deserialize_from(reader)?;
        log_debug!(CACHE, "loaded {} from cache", source.display());
        Ok(Some(report))
    }

    pub fn store(&self, source: &Path, report: &Report) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let writer = BufWriter::new(File::create(self.entry_path(source))?);
        bincode::serialize_into(writer, report)?;
        log_debug!(CACHE, "stored {}", source.display());
        Ok(())
    }

    /// Removes the entry for `source`, if any.
    pub fn invalidate(&self, source: &Path) -> Result<(), CacheError> {
        let entry = self.entry_path(source);
        if entry.exists() {
            fs::remove_file(entry)?;
        }
        Ok(())
    }
}
