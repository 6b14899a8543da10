//! The legacy flat format.
//!
//! Layout: a fixed preamble of `[version: u32][blob crc: u32][magic]`
//! followed by one bincode blob holding the whole store. Everything is
//! inline; the compact/block split and extent compression are native-only.
//!
//! Flat files do not track creation order and store payloads untransposed,
//! so child enumeration is alphabetical (with a stored-order fallback) and
//! multidimensional partial I/O is refused at the data layer.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::store::FileStore;

use super::{Format, FormatKind};

/// Signature string, at a fixed offset past the preamble words
pub(super) const MAGIC: &str = "ArborDB Flat Format";
pub(super) const MAGIC_OFFSET: usize = 8;

const FORMAT_VERSION: u32 = 1;

/// Stateless flat-format backend
pub struct Flat;

impl Format for Flat {
    fn kind(&self) -> FormatKind {
        FormatKind::Flat
    }

    fn tracks_creation_order(&self) -> bool {
        false
    }

    fn transposed_storage(&self) -> bool {
        false
    }

    fn load(&self, path: &Path) -> Result<FileStore> {
        let buf = fs::read(path)?;
        let preamble = MAGIC_OFFSET + MAGIC.len();
        if buf.len() < preamble || &buf[MAGIC_OFFSET..preamble] != MAGIC.as_bytes() {
            return Err(Error::Corrupt("bad signature".to_string()));
        }
        let version = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if version != FORMAT_VERSION {
            return Err(Error::Corrupt(format!("unsupported format version {version}")));
        }
        let crc = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let blob = &buf[preamble..];
        if crc32fast::hash(blob) != crc {
            return Err(Error::Corrupt("checksum mismatch".to_string()));
        }
        let mut store: FileStore =
            bincode::deserialize(blob).map_err(|e| Error::Serialization(e.to_string()))?;
        if !store.objects.contains_key(&store.root) {
            return Err(Error::Corrupt("root object missing".to_string()));
        }
        store.dirty = false;
        debug!(path = %path.display(), objects = store.objects.len(), "loaded flat file");
        Ok(store)
    }

    fn save(&self, store: &FileStore, path: &Path, _compression: Option<u32>) -> Result<()> {
        let blob = bincode::serialize(store).map_err(|e| Error::Serialization(e.to_string()))?;
        let mut out = Vec::with_capacity(MAGIC_OFFSET + MAGIC.len() + blob.len());
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&crc32fast::hash(&blob).to_le_bytes());
        out.extend_from_slice(MAGIC.as_bytes());
        out.extend_from_slice(&blob);

        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        let tmp = path.with_file_name(name);
        fs::write(&tmp, &out)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), bytes = out.len(), "saved flat file");
        Ok(())
    }
}
