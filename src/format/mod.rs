//! On-disk format backends.
//!
//! Two codecs persist the same in-memory [`FileStore`]: the native format
//! (creation-order tracking, reversed-dimension storage, optional extent
//! compression) and the legacy flat format (alphabetical enumeration,
//! untransposed storage). The backend is sniffed or forced once at open
//! time and bound to the open file for its whole lifetime.

mod flat;
mod native;

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::store::FileStore;

pub use flat::Flat;
pub use native::Native;

/// Which backend a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Native,
    Flat,
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatKind::Native => f.write_str("native"),
            FormatKind::Flat => f.write_str("flat"),
        }
    }
}

/// Caller's format request at open time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatHint {
    /// Sniff existing files; create new files in the native format
    #[default]
    Auto,
    Native,
    Flat,
}

/// A persistence backend for one database file.
///
/// Implementations are stateless; per-file state lives in the [`FileStore`].
pub trait Format: Send + Sync {
    fn kind(&self) -> FormatKind;

    /// Whether child enumeration follows creation order (else alphabetical,
    /// falling back to stored order attributes)
    fn tracks_creation_order(&self) -> bool;

    /// Whether payload dimensions are stored reversed on disk
    fn transposed_storage(&self) -> bool;

    /// Read the whole file into memory
    fn load(&self, path: &Path) -> Result<FileStore>;

    /// Atomically replace `path` with the serialized store
    fn save(&self, store: &FileStore, path: &Path, compression: Option<u32>) -> Result<()>;
}

pub static NATIVE: Native = Native;
pub static FLAT: Flat = Flat;

/// Identify the backend of an existing file by its signature bytes.
///
/// Reads at most 32 bytes. A file matching neither signature is refused
/// rather than guessed at.
pub fn detect(path: &Path) -> Result<&'static dyn Format> {
    let mut file = fs::File::open(path)?;
    let mut head = [0u8; 32];
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled >= native::MAGIC.len() && head[..native::MAGIC.len()] == native::MAGIC {
        return Ok(&NATIVE);
    }
    let flat_end = flat::MAGIC_OFFSET + flat::MAGIC.len();
    if filled >= flat_end && &head[flat::MAGIC_OFFSET..flat_end] == flat::MAGIC.as_bytes() {
        return Ok(&FLAT);
    }
    Err(Error::UnrecognizedFormat(path.display().to_string()))
}

/// Backend for a newly created file under the given hint
pub fn for_hint(hint: FormatHint) -> &'static dyn Format {
    match hint {
        FormatHint::Auto | FormatHint::Native => &NATIVE,
        FormatHint::Flat => &FLAT,
    }
}
