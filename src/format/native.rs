//! The native on-disk format.
//!
//! File layout:
//!
//! ```text
//! +----------------------------+
//! | header (16 bytes)          |  magic, format version, reserved
//! +----------------------------+
//! | block extents              |  raw or deflated payload bytes
//! +----------------------------+
//! | catalog (bincode)          |  containers, attrs, inline payloads
//! +----------------------------+
//! | footer (16 bytes)          |  catalog offset, catalog CRC32, pad
//! +----------------------------+
//! ```
//!
//! Large payloads are written as extents in the body and referenced from
//! the catalog by offset; small payloads ride inline in the catalog. The
//! footer CRC covers the catalog bytes only; extent corruption surfaces as
//! a length mismatch on inflate.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{AttrValue, Container, Dataset, Entry, FileStore, Layout};
use crate::types::DataType;

use super::{Format, FormatKind};

/// Signature bytes at offset 0
pub(super) const MAGIC: [u8; 8] = [0x89, b'A', b'D', b'B', 0x0d, 0x0a, 0x1a, 0x0a];

const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 16;
const FOOTER_LEN: usize = 16;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize, Deserialize)]
struct WireCatalog {
    root: u32,
    next_obj: u32,
    objects: Vec<(u32, WireContainer)>,
}

#[derive(Serialize, Deserialize)]
struct WireContainer {
    attrs: Vec<(String, AttrValue)>,
    entries: Vec<(String, WireEntry)>,
}

#[derive(Serialize, Deserialize)]
enum WireEntry {
    Child(u32),
    Inline {
        dtype: DataType,
        dims: Vec<u64>,
        bytes: Vec<u8>,
    },
    Extent {
        dtype: DataType,
        dims: Vec<u64>,
        offset: u64,
        stored_len: u64,
        raw_len: u64,
        compressed: bool,
    },
    SoftLink(String),
    ExternalLink {
        file: String,
        path: String,
    },
}

// =============================================================================
// Backend
// =============================================================================

/// Stateless native-format backend
pub struct Native;

impl Format for Native {
    fn kind(&self) -> FormatKind {
        FormatKind::Native
    }

    fn tracks_creation_order(&self) -> bool {
        true
    }

    fn transposed_storage(&self) -> bool {
        true
    }

    fn load(&self, path: &Path) -> Result<FileStore> {
        let buf = fs::read(path)?;
        if buf.len() < HEADER_LEN + FOOTER_LEN || buf[..MAGIC.len()] != MAGIC {
            return Err(Error::Corrupt("bad signature".to_string()));
        }
        let version = u16::from_le_bytes([buf[8], buf[9]]);
        if version != FORMAT_VERSION {
            return Err(Error::Corrupt(format!("unsupported format version {version}")));
        }

        // Footer: catalog offset, catalog CRC, 4 pad bytes.
        let footer = &buf[buf.len() - FOOTER_LEN..];
        let mut off = [0u8; 8];
        off.copy_from_slice(&footer[..8]);
        let catalog_offset = u64::from_le_bytes(off) as usize;
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&footer[8..12]);
        let catalog_crc = u32::from_le_bytes(crc);

        if catalog_offset < HEADER_LEN || catalog_offset > buf.len() - FOOTER_LEN {
            return Err(Error::Corrupt("catalog offset out of bounds".to_string()));
        }
        let catalog_bytes = &buf[catalog_offset..buf.len() - FOOTER_LEN];
        if crc32fast::hash(catalog_bytes) != catalog_crc {
            return Err(Error::Corrupt("catalog checksum mismatch".to_string()));
        }

        let catalog: WireCatalog = bincode::deserialize(catalog_bytes)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let mut store = FileStore {
            objects: Default::default(),
            root: catalog.root,
            next_obj: catalog.next_obj,
            dirty: false,
        };
        for (obj, wire) in catalog.objects {
            let mut container = Container::default();
            for (name, value) in wire.attrs {
                container.attrs.insert(name, value);
            }
            for (name, entry) in wire.entries {
                let entry = match entry {
                    WireEntry::Child(child) => Entry::Child(child),
                    WireEntry::Inline { dtype, dims, bytes } => {
                        Entry::Data(Dataset::new(dtype, dims, Layout::Compact, bytes))
                    }
                    WireEntry::Extent {
                        dtype,
                        dims,
                        offset,
                        stored_len,
                        raw_len,
                        compressed,
                    } => {
                        let bytes = read_extent(&buf, offset, stored_len, raw_len, compressed)?;
                        Entry::Data(Dataset::new(dtype, dims, Layout::Block, bytes))
                    }
                    WireEntry::SoftLink(target) => Entry::SoftLink(target),
                    WireEntry::ExternalLink { file, path } => Entry::ExternalLink { file, path },
                };
                container.entries.push((name, entry));
            }
            store.objects.insert(obj, container);
        }
        if !store.objects.contains_key(&store.root) {
            return Err(Error::Corrupt("root object missing".to_string()));
        }
        debug!(path = %path.display(), objects = store.objects.len(), "loaded native file");
        Ok(store)
    }

    fn save(&self, store: &FileStore, path: &Path, compression: Option<u32>) -> Result<()> {
        let tmp = sibling_tmp(path);
        let mut out = Vec::with_capacity(HEADER_LEN + 1024);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&[0u8; HEADER_LEN - MAGIC.len() - 2]);

        // Body pass: write block extents, building the catalog as we go.
        // Objects are emitted in index order so output is deterministic.
        let mut objects: Vec<u32> = store.objects.keys().copied().collect();
        objects.sort_unstable();
        let mut catalog = WireCatalog {
            root: store.root,
            next_obj: store.next_obj,
            objects: Vec::with_capacity(objects.len()),
        };
        for obj in objects {
            let container = &store.objects[&obj];
            let mut attrs: Vec<(String, AttrValue)> = container
                .attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            attrs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut entries = Vec::with_capacity(container.entries.len());
            for (name, entry) in &container.entries {
                let wire = match entry {
                    Entry::Child(child) => WireEntry::Child(*child),
                    Entry::SoftLink(target) => WireEntry::SoftLink(target.clone()),
                    Entry::ExternalLink { file, path } => WireEntry::ExternalLink {
                        file: file.clone(),
                        path: path.clone(),
                    },
                    Entry::Data(ds) => match ds.layout {
                        Layout::Compact => WireEntry::Inline {
                            dtype: ds.dtype,
                            dims: ds.dims.clone(),
                            bytes: ds.bytes.clone(),
                        },
                        Layout::Block => {
                            let offset = out.len() as u64;
                            let (stored, compressed) = encode_extent(&ds.bytes, compression)?;
                            out.extend_from_slice(&stored);
                            WireEntry::Extent {
                                dtype: ds.dtype,
                                dims: ds.dims.clone(),
                                offset,
                                stored_len: stored.len() as u64,
                                raw_len: ds.bytes.len() as u64,
                                compressed,
                            }
                        }
                    },
                };
                entries.push((name.clone(), wire));
            }
            catalog.objects.push((obj, WireContainer { attrs, entries }));
        }

        let catalog_offset = out.len() as u64;
        let catalog_bytes =
            bincode::serialize(&catalog).map_err(|e| Error::Serialization(e.to_string()))?;
        let catalog_crc = crc32fast::hash(&catalog_bytes);
        out.extend_from_slice(&catalog_bytes);
        out.extend_from_slice(&catalog_offset.to_le_bytes());
        out.extend_from_slice(&catalog_crc.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);

        fs::write(&tmp, &out)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), bytes = out.len(), "saved native file");
        Ok(())
    }
}

fn sibling_tmp(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn encode_extent(raw: &[u8], compression: Option<u32>) -> Result<(Vec<u8>, bool)> {
    match compression {
        Some(level) => {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(level));
            enc.write_all(raw)?;
            let stored = enc.finish()?;
            // Incompressible data can grow; keep it raw in that case.
            if stored.len() < raw.len() {
                Ok((stored, true))
            } else {
                Ok((raw.to_vec(), false))
            }
        }
        None => Ok((raw.to_vec(), false)),
    }
}

fn read_extent(
    buf: &[u8],
    offset: u64,
    stored_len: u64,
    raw_len: u64,
    compressed: bool,
) -> Result<Vec<u8>> {
    let start = offset as usize;
    let end = start
        .checked_add(stored_len as usize)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| Error::Corrupt("extent out of bounds".to_string()))?;
    let stored = &buf[start..end];
    if !compressed {
        return Ok(stored.to_vec());
    }
    let mut raw = Vec::with_capacity(raw_len as usize);
    ZlibDecoder::new(stored).read_to_end(&mut raw)?;
    if raw.len() as u64 != raw_len {
        return Err(Error::Corrupt("extent length mismatch".to_string()));
    }
    Ok(raw)
}
