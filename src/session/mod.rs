//! The multi-file session layer.
//!
//! An [`Environment`] owns a bounded table of open files: the sessions the
//! caller opened explicitly, plus read-only files pulled in on demand by
//! cross-file link resolution. Every node handle carries its file's serial
//! number, so one environment can route operations across files without
//! the caller tracking which file a resolved handle landed in.

pub mod file;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::data;
use crate::error::{Error, Result};
use crate::facade::{compact, paths};
use crate::format::{self, Format, FormatHint};
use crate::store::{Entry, FileStore};
use crate::types::{A_LABEL, A_NAME, A_TYPE, DataType, D_FORMAT, D_OLDVERS, D_VERSION};

pub use file::File;

/// Root node name stamped into every new file
pub const ROOT_NODE_NAME: &str = "MotherNode";

/// Root node label stamped into every new file
pub const ROOT_NODE_LABEL: &str = "Root Node of ArborDB File";

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create a new file; fails if the path already exists
    Create,
    /// Open an existing file for reading and writing
    Modify,
    /// Open an existing file for reading only
    ReadOnly,
}

// =============================================================================
// Open-file table
// =============================================================================

struct OpenFile {
    serial: u32,
    path: PathBuf,
    canonical: PathBuf,
    mode: Mode,
    format: &'static dyn Format,
    store: Arc<RwLock<FileStore>>,
    /// Opened behind the caller's back to satisfy a cross-file link
    implicit: bool,
    /// Explicit handle count; always 0 for implicit slots
    refs: usize,
}

struct FileTable {
    slots: Vec<OpenFile>,
    next_serial: u32,
}

/// A borrowed view of one table slot, cheap to clone out of the lock
pub(crate) struct SlotRef {
    pub store: Arc<RwLock<FileStore>>,
    pub format: &'static dyn Format,
    pub mode: Mode,
    pub path: PathBuf,
}

// =============================================================================
// Environment
// =============================================================================

struct EnvInner {
    config: Config,
    table: Mutex<FileTable>,
    search_paths: Mutex<Vec<PathBuf>>,
    abort: AtomicBool,
}

/// Shared session state: configuration, the open-file table, and the
/// registered link search paths. Clones share the same state.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvInner>,
}

impl Environment {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let abort = config.abort_on_error;
        Environment {
            inner: Arc::new(EnvInner {
                config,
                table: Mutex::new(FileTable {
                    slots: Vec::new(),
                    next_serial: 1,
                }),
                search_paths: Mutex::new(Vec::new()),
                abort: AtomicBool::new(abort),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Open a database file, sniffing the format of existing files
    pub fn open(&self, path: impl AsRef<Path>, mode: Mode) -> Result<File> {
        self.open_as(path, mode, FormatHint::Auto)
    }

    /// Open a database file with an explicit format request.
    ///
    /// For `Create` the hint picks the codec of the new file. For existing
    /// files the on-disk signature decides; a non-`Auto` hint that
    /// contradicts it is refused rather than reinterpreted.
    pub fn open_as(
        &self,
        path: impl AsRef<Path>,
        mode: Mode,
        hint: FormatHint,
    ) -> Result<File> {
        let r = self.do_open(path.as_ref(), mode, hint);
        self.finish(r)
    }

    fn do_open(&self, path: &Path, mode: Mode, hint: FormatHint) -> Result<File> {
        let exists = path.exists();
        match mode {
            Mode::Create if exists => return Err(Error::FileExists),
            Mode::Modify | Mode::ReadOnly if !exists => return Err(Error::FileNotFound),
            _ => {}
        }

        if mode == Mode::Create {
            // Check the ceiling before touching the filesystem; the
            // authoritative check happens again under the table lock, and a
            // create refused there must not leave the new file behind.
            if self.inner.table.lock().slots.len() >= self.inner.config.max_open_files {
                return Err(Error::TooManyOpenFiles);
            }
            let backend = format::for_hint(hint);
            let mut store = FileStore::new();
            stamp_root(&mut store, backend);
            backend.save(&store, path, self.inner.config.compression)?;
            store.dirty = false;
            let canonical = fs::canonicalize(path)?;
            let serial = match self.insert_slot(path, canonical, mode, backend, store, false) {
                Ok(serial) => serial,
                Err(e) => {
                    let _ = fs::remove_file(path);
                    return Err(e);
                }
            };
            info!(path = %path.display(), format = %backend.kind(), "created database file");
            return Ok(File::new(self.clone(), serial));
        }

        let canonical = fs::canonicalize(path)?;

        // An already-open file is shared rather than loaded twice: both
        // handles must see one copy of its state. Asking to modify a slot
        // someone explicitly opened read-only is refused; a slot pulled in
        // implicitly for link resolution is promoted instead.
        {
            let mut table = self.inner.table.lock();
            if let Some(slot) = table.slots.iter_mut().find(|s| s.canonical == canonical) {
                if mode == Mode::Modify && slot.mode == Mode::ReadOnly && !slot.implicit {
                    return Err(Error::ReadOnlyFile);
                }
                if mode == Mode::Modify {
                    slot.mode = Mode::Modify;
                }
                slot.implicit = false;
                slot.refs += 1;
                return Ok(File::new(self.clone(), slot.serial));
            }
        }

        let backend = format::detect(path)?;
        if hint != FormatHint::Auto && format::for_hint(hint).kind() != backend.kind() {
            return Err(Error::UnrecognizedFormat(path.display().to_string()));
        }
        let store = backend.load(path)?;
        let serial = self.insert_slot(path, canonical, mode, backend, store, false)?;
        debug!(path = %path.display(), format = %backend.kind(), ?mode, "opened database file");
        Ok(File::new(self.clone(), serial))
    }

    fn insert_slot(
        &self,
        path: &Path,
        canonical: PathBuf,
        mode: Mode,
        format: &'static dyn Format,
        store: FileStore,
        implicit: bool,
    ) -> Result<u32> {
        let mut table = self.inner.table.lock();
        if table.slots.len() >= self.inner.config.max_open_files {
            return Err(Error::TooManyOpenFiles);
        }
        let serial = table.next_serial;
        table.next_serial += 1;
        table.slots.push(OpenFile {
            serial,
            path: path.to_path_buf(),
            canonical,
            mode,
            format,
            store: Arc::new(RwLock::new(store)),
            implicit,
            refs: if implicit { 0 } else { 1 },
        });
        Ok(serial)
    }

    /// Number of files in the table, implicit link-target files included
    pub fn open_count(&self) -> usize {
        self.inner.table.lock().slots.len()
    }

    /// Register a directory probed by cross-file link resolution, after
    /// the environment-variable paths
    pub fn add_search_path(&self, dir: impl Into<PathBuf>) -> Result<()> {
        let mut paths = self.inner.search_paths.lock();
        if paths.len() >= self.inner.config.max_search_paths {
            return self.finish(Err(Error::SearchPathsFull));
        }
        paths.push(dir.into());
        Ok(())
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.inner.search_paths.lock().clone()
    }

    /// Toggle the legacy die-on-error behavior at runtime
    pub fn set_abort_on_error(&self, enabled: bool) {
        self.inner.abort.store(enabled, Ordering::Relaxed);
    }

    /// Delete a database file from disk.
    ///
    /// Refused while the file is open in this environment, and refused for
    /// paths that are not recognized database files.
    pub fn delete_database(&self, path: impl AsRef<Path>) -> Result<()> {
        let r = self.do_delete(path.as_ref());
        self.finish(r)
    }

    fn do_delete(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::FileNotFound);
        }
        let canonical = fs::canonicalize(path)?;
        if self
            .inner
            .table
            .lock()
            .slots
            .iter()
            .any(|s| s.canonical == canonical)
        {
            return Err(Error::FileInUse);
        }
        format::detect(path)?;
        fs::remove_file(path)?;
        info!(path = %path.display(), "deleted database file");
        Ok(())
    }

    /// Rewrite a closed database file in place, dropping dead space
    pub fn compact(&self, path: impl AsRef<Path>) -> Result<()> {
        let r = self.do_compact(path.as_ref());
        self.finish(r)
    }

    fn do_compact(&self, path: &Path) -> Result<()> {
        let canonical = fs::canonicalize(path)?;
        if self
            .inner
            .table
            .lock()
            .slots
            .iter()
            .any(|s| s.canonical == canonical)
        {
            return Err(Error::FileInUse);
        }
        compact::rewrite(path, self.inner.config.compression)
    }

    // -------------------------------------------------------------------------
    // Internal plumbing
    // -------------------------------------------------------------------------

    pub(crate) fn slot(&self, serial: u32) -> Result<SlotRef> {
        let table = self.inner.table.lock();
        table
            .slots
            .iter()
            .find(|s| s.serial == serial)
            .map(|s| SlotRef {
                store: Arc::clone(&s.store),
                format: s.format,
                mode: s.mode,
                path: s.path.clone(),
            })
            .ok_or(Error::FileNotOpen)
    }

    /// Open (or reuse) the file a cross-file link names. Implicit opens are
    /// read-only and live until the last explicit session closes.
    pub(crate) fn open_linked(&self, file: &str, referrer_dir: &Path) -> Result<u32> {
        let registered = self.search_paths();
        let found = paths::find_file(file, referrer_dir, &registered)?;
        let canonical = fs::canonicalize(&found)?;
        {
            let table = self.inner.table.lock();
            if let Some(slot) = table.slots.iter().find(|s| s.canonical == canonical) {
                return Ok(slot.serial);
            }
        }
        let backend = format::detect(&found)?;
        let store = backend.load(&found)?;
        debug!(file, path = %found.display(), "opened link-target file");
        self.insert_slot(&found, canonical, Mode::ReadOnly, backend, store, true)
    }

    /// Release one explicit handle on `serial`, flushing its slot when the
    /// last handle goes. When no explicit session remains, the implicit
    /// link-target slots are released too.
    pub(crate) fn release(&self, serial: u32) -> Result<()> {
        let mut table = self.inner.table.lock();
        let idx = table
            .slots
            .iter()
            .position(|s| s.serial == serial)
            .ok_or(Error::FileNotOpen)?;
        let mut flush_result = Ok(());
        if table.slots[idx].refs <= 1 {
            let slot = table.slots.remove(idx);
            if slot.mode != Mode::ReadOnly {
                let store = slot.store.read();
                if store.dirty {
                    flush_result = slot.format.save(
                        &store,
                        &slot.path,
                        self.inner.config.compression,
                    );
                }
            }
        } else {
            table.slots[idx].refs -= 1;
        }
        if !table.slots.is_empty() && table.slots.iter().all(|s| s.implicit) {
            debug!(count = table.slots.len(), "releasing link-target files");
            table.slots.clear();
        }
        flush_result
    }

    /// Funnel for every fallible public operation: under abort-on-error
    /// the error is logged with its numeric code and the process exits.
    pub(crate) fn finish<T>(&self, r: Result<T>) -> Result<T> {
        if let Err(e) = &r {
            if self.inner.abort.load(Ordering::Relaxed) {
                error!(code = e.code(), "{e}");
                std::process::exit(1);
            }
        }
        r
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

/// Stamp the bookkeeping a fresh file carries on its root: identity
/// attributes, the byte-order string, and the version marker whose name
/// records which storage-order convention the file uses.
fn stamp_root(store: &mut FileStore, backend: &'static dyn Format) {
    let byte_order = if cfg!(target_endian = "little") {
        "IEEE_LITTLE_64"
    } else {
        "IEEE_BIG_64"
    };
    let version = format!("ArborDB Version {}", env!("CARGO_PKG_VERSION"));
    let marker = if backend.transposed_storage() {
        D_VERSION
    } else {
        D_OLDVERS
    };
    let root = store.root;
    if let Ok(c) = store.container_mut(root) {
        c.set_attr_str(A_NAME, ROOT_NODE_NAME);
        c.set_attr_str(A_LABEL, ROOT_NODE_LABEL);
        c.set_attr_str(A_TYPE, DataType::Empty.code());
        c.set_entry(D_FORMAT, Entry::Data(data::text_dataset(byte_order)));
        c.set_entry(marker, Entry::Data(data::text_dataset(&version)));
    }
}
