//! FIFO row buffer that spills its oldest rows to a temporary file.
//!
//! Rows are appended to an in-memory deque. Once the deque holds more than
//! `threshold` rows, each push moves the single oldest row to the tail of
//! a spill file. Pops read from the spill file while it still holds rows
//! and then continue from memory. Every row on disk is older than every row
//! in memory, so FIFO order holds across the split.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use grpby_error::{GroupByError, Result};
use grpby_types::{Row, read_row, write_row};
use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::path::{LocalPathResolver, PathResolver};

/// Rows kept in memory before the queue starts spilling.
pub const DEFAULT_SPILL_THRESHOLD: usize = 5000;
/// File name prefix of spill files.
pub const DEFAULT_SPILL_PREFIX: &str = "grp";
/// File name suffix of spill files.
pub const SPILL_SUFFIX: &str = ".tmp";

/// Where and when the queue spills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpillConfig {
    /// Spill directory; may use `${VAR}` / `%%VAR%%`. Empty means the
    /// system temporary directory.
    pub directory: String,
    pub prefix: String,
    /// Maximum rows held in memory once spilling has begun.
    pub threshold: usize,
}

impl Default for SpillConfig {
    fn default() -> Self {
        Self {
            directory: String::new(),
            prefix: DEFAULT_SPILL_PREFIX.to_owned(),
            threshold: DEFAULT_SPILL_THRESHOLD,
        }
    }
}

/// Spill activity over the queue's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpillStats {
    /// Rows written to disk, summed over all spill files.
    pub rows_spilled: u64,
    /// Largest in-memory length observed.
    pub peak_in_memory: usize,
    pub files_created: u64,
}

/// The open spill file. Write and read sides are independent handles on
/// the same file; the read side is opened on the first disk pop.
struct SpillFile {
    path: TempPath,
    writer: BufWriter<File>,
    reader: Option<BufReader<File>>,
    dirty: bool,
}

impl SpillFile {
    fn write(&mut self, row: &Row) -> Result<()> {
        write_row(&mut self.writer, row).map_err(|source| GroupByError::SpillWrite {
            path: self.path.to_path_buf(),
            source,
        })?;
        self.dirty = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Row> {
        let path = self.path.to_path_buf();
        if self.dirty {
            self.writer.flush().map_err(|source| GroupByError::SpillWrite {
                path: path.clone(),
                source,
            })?;
            self.dirty = false;
        }
        if self.reader.is_none() {
            let file = File::open(&self.path).map_err(|source| GroupByError::SpillRead {
                path: path.clone(),
                source,
            })?;
            self.reader = Some(BufReader::new(file));
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(GroupByError::internal("spill reader missing after open"));
        };
        match read_row(reader) {
            Ok(Some(row)) => Ok(row),
            Ok(None) => Err(GroupByError::SpillCorrupt {
                path,
                detail: "spill file ended before all spilled rows were read".to_owned(),
            }),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
                ) =>
            {
                Err(GroupByError::SpillCorrupt {
                    path,
                    detail: e.to_string(),
                })
            }
            Err(source) => Err(GroupByError::SpillRead { path, source }),
        }
    }

    /// Close both handles and delete the file. Failure to delete is logged.
    fn close(self) {
        let Self {
            path,
            writer,
            reader,
            ..
        } = self;
        drop(reader);
        drop(writer);
        let shown = path.to_path_buf();
        match path.close() {
            Ok(()) => debug!(path = %shown.display(), "spill file deleted"),
            Err(e) => warn!(path = %shown.display(), error = %e, "unable to delete spill file"),
        }
    }
}

/// Constant-memory FIFO of rows backed by a temporary file.
pub struct OverflowQueue {
    memory: VecDeque<Row>,
    config: SpillConfig,
    resolver: Arc<dyn PathResolver>,
    spill: Option<SpillFile>,
    on_disk: u64,
    stats: SpillStats,
}

impl std::fmt::Debug for OverflowQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverflowQueue")
            .field("in_memory", &self.memory.len())
            .field("on_disk", &self.on_disk)
            .field("spill_path", &self.spill_path())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OverflowQueue {
    /// Queue resolving its spill directory on the local filesystem.
    pub fn new(config: SpillConfig) -> Self {
        Self::with_resolver(config, Arc::new(LocalPathResolver))
    }

    pub fn with_resolver(config: SpillConfig, resolver: Arc<dyn PathResolver>) -> Self {
        Self {
            memory: VecDeque::new(),
            config,
            resolver,
            spill: None,
            on_disk: 0,
            stats: SpillStats::default(),
        }
    }

    /// Append a row at the tail, moving the oldest in-memory row to disk
    /// when memory is over the threshold.
    pub fn push(&mut self, row: Row) -> Result<()> {
        self.memory.push_back(row);
        if self.memory.len() > self.config.threshold {
            self.spill_oldest()?;
        }
        self.stats.peak_in_memory = self.stats.peak_in_memory.max(self.memory.len());
        Ok(())
    }

    /// Remove and return the head row, or `None` when the queue is empty.
    pub fn pop(&mut self) -> Result<Option<Row>> {
        if self.on_disk > 0 {
            let Some(spill) = self.spill.as_mut() else {
                return Err(GroupByError::internal("rows on disk without a spill file"));
            };
            let row = spill.read()?;
            self.on_disk -= 1;
            return Ok(Some(row));
        }
        Ok(self.memory.pop_front())
    }

    /// Rows held, in memory and on disk.
    pub fn len(&self) -> usize {
        self.memory.len() + usize::try_from(self.on_disk).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.on_disk == 0
    }

    pub fn in_memory(&self) -> usize {
        self.memory.len()
    }

    pub fn on_disk(&self) -> u64 {
        self.on_disk
    }

    /// Path of the current spill file, if one is open.
    pub fn spill_path(&self) -> Option<&Path> {
        self.spill.as_ref().map(|s| &*s.path)
    }

    pub fn stats(&self) -> SpillStats {
        self.stats
    }

    /// Drop all buffered rows and delete the spill file. The queue stays
    /// usable; the next spill creates a fresh file.
    pub fn teardown(&mut self) {
        self.memory.clear();
        self.on_disk = 0;
        if let Some(spill) = self.spill.take() {
            spill.close();
        }
    }

    fn spill_oldest(&mut self) -> Result<()> {
        if self.spill.is_none() {
            self.spill = Some(self.create_spill_file()?);
            self.stats.files_created += 1;
        }
        if let (Some(spill), Some(oldest)) = (self.spill.as_mut(), self.memory.pop_front()) {
            spill.write(&oldest)?;
            self.on_disk += 1;
            self.stats.rows_spilled += 1;
        }
        Ok(())
    }

    fn create_spill_file(&self) -> Result<SpillFile> {
        let directory: PathBuf = self.resolver.resolve(&self.config.directory)?;
        let named = tempfile::Builder::new()
            .prefix(&self.config.prefix)
            .suffix(SPILL_SUFFIX)
            .tempfile_in(&directory)
            .map_err(|source| GroupByError::SpillCreate {
                path: directory.clone(),
                source,
            })?;
        let (file, path) = named.into_parts();
        debug!(
            path = %path.display(),
            threshold = self.config.threshold,
            "spill file created"
        );
        Ok(SpillFile {
            path,
            writer: BufWriter::new(file),
            reader: None,
            dirty: false,
        })
    }
}

impl Drop for OverflowQueue {
    fn drop(&mut self) {
        self.teardown();
    }
}
