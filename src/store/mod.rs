//! In-memory object store for one open database file.
//!
//! A file is a flat table of containers addressed by 32-bit object index.
//! Each container carries its attribute set plus an ordered list of named
//! entries: child references, hidden datasets, and link descriptors. The
//! entry list preserves insertion order, which is what gives the native
//! format its creation-order child enumeration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{DataType, D_LINK, D_OLDVERS, HIDDEN_PREFIX};

// =============================================================================
// Datasets
// =============================================================================

/// Physical placement of a payload inside the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    /// Stored inline with the node catalog
    Compact,
    /// Stored as a separate extent in the file body
    Block,
}

/// A typed, dimensioned payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub dtype: DataType,
    /// Logical dimensions, in the order the caller declared them
    pub dims: Vec<u64>,
    pub layout: Layout,
    /// Raw little-endian element bytes, logical (untransposed) order
    pub bytes: Vec<u8>,
}

impl Dataset {
    pub fn new(dtype: DataType, dims: Vec<u64>, layout: Layout, bytes: Vec<u8>) -> Self {
        Dataset {
            dtype,
            dims,
            layout,
            bytes,
        }
    }

    /// Total element count across all dimensions
    pub fn npoints(&self) -> u64 {
        self.dims.iter().product()
    }
}

// =============================================================================
// Container entries
// =============================================================================

/// One named entry inside a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entry {
    /// A child node, by object index
    Child(u32),
    /// A hidden bookkeeping dataset
    Data(Dataset),
    /// Same-file link target path
    SoftLink(String),
    /// Cross-file link target
    ExternalLink { file: String, path: String },
}

/// Attribute value, either a short string or a 32-bit integer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    Int(i32),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            AttrValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Str(_) => None,
        }
    }
}

// =============================================================================
// Containers
// =============================================================================

/// One node: attributes plus ordered named entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    /// Attribute set, keyed by attribute name
    pub attrs: HashMap<String, AttrValue>,
    /// Named entries in insertion order
    pub entries: Vec<(String, Entry)>,
}

impl Container {
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_str)
    }

    pub fn attr_int(&self, name: &str) -> Option<i32> {
        self.attrs.get(name).and_then(AttrValue::as_int)
    }

    pub fn set_attr_str(&mut self, name: &str, value: impl Into<String>) {
        self.attrs.insert(name.to_string(), AttrValue::Str(value.into()));
    }

    pub fn set_attr_int(&mut self, name: &str, value: i32) {
        self.attrs.insert(name.to_string(), AttrValue::Int(value));
    }

    /// Look up an entry by name
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    pub fn entry_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    /// Insert or replace an entry, keeping its original position on replace
    pub fn set_entry(&mut self, name: &str, entry: Entry) {
        if let Some(slot) = self.entry_mut(name) {
            *slot = entry;
        } else {
            self.entries.push((name.to_string(), entry));
        }
    }

    /// Remove an entry by name, returning it if present
    pub fn remove_entry(&mut self, name: &str) -> Option<Entry> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Child entries in stored order, skipping hidden names
    pub fn visible_children(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().filter_map(|(name, entry)| {
            if name.starts_with(HIDDEN_PREFIX) {
                return None;
            }
            match entry {
                Entry::Child(obj) => Some((name.as_str(), *obj)),
                _ => None,
            }
        })
    }

    /// Whether this container is a link node
    pub fn is_link(&self) -> bool {
        self.entry(D_LINK).is_some()
    }

    /// Element type recorded in the type attribute; MT when unset
    pub fn node_type(&self) -> DataType {
        self.attr_str(crate::types::A_TYPE)
            .and_then(|c| DataType::from_code(c).ok())
            .unwrap_or(DataType::Empty)
    }

    /// Payload dataset, if any
    pub fn data(&self) -> Option<&Dataset> {
        match self.entry(crate::types::D_DATA) {
            Some(Entry::Data(ds)) => Some(ds),
            _ => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut Dataset> {
        match self.entry_mut(crate::types::D_DATA) {
            Some(Entry::Data(ds)) => Some(ds),
            _ => None,
        }
    }
}

// =============================================================================
// File store
// =============================================================================

/// The full in-memory state of one database file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStore {
    /// All live containers, keyed by object index
    pub objects: HashMap<u32, Container>,
    /// Object index of the root node
    pub root: u32,
    /// Next object index to hand out; indices are never reused
    pub next_obj: u32,
    /// Unsaved changes since load
    #[serde(skip)]
    pub dirty: bool,
}

impl FileStore {
    /// A store containing only an empty root container
    pub fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert(0, Container::default());
        FileStore {
            objects,
            root: 0,
            next_obj: 1,
            dirty: true,
        }
    }

    pub fn container(&self, obj: u32) -> Result<&Container> {
        self.objects.get(&obj).ok_or(Error::StaleNodeHandle)
    }

    pub fn container_mut(&mut self, obj: u32) -> Result<&mut Container> {
        self.dirty = true;
        self.objects.get_mut(&obj).ok_or(Error::StaleNodeHandle)
    }

    /// Allocate a fresh empty container and return its object index
    pub fn alloc(&mut self) -> u32 {
        let obj = self.next_obj;
        self.next_obj += 1;
        self.objects.insert(obj, Container::default());
        self.dirty = true;
        obj
    }

    /// Remove `obj` and every node reachable through its child entries.
    ///
    /// Link nodes are removed themselves but never recursed into, so a link
    /// target living elsewhere in the tree is untouched.
    pub fn remove_recursive(&mut self, obj: u32) {
        let Some(container) = self.objects.remove(&obj) else {
            return;
        };
        self.dirty = true;
        if container.is_link() {
            return;
        }
        for (_, entry) in container.entries {
            if let Entry::Child(child) = entry {
                self.remove_recursive(child);
            }
        }
    }

    /// Whether payloads in this file are stored with reversed dimension
    /// order. True unless the root carries the legacy version marker.
    pub fn transposed(&self) -> bool {
        self.objects
            .get(&self.root)
            .map(|root| root.entry(D_OLDVERS).is_none())
            .unwrap_or(true)
    }
}

impl Default for FileStore {
    fn default() -> Self {
        FileStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_insertion_order() {
        let mut c = Container::default();
        c.set_entry("b", Entry::Child(1));
        c.set_entry(" data", Entry::Data(Dataset::new(DataType::I4, vec![1], Layout::Compact, vec![0; 4])));
        c.set_entry("a", Entry::Child(2));
        let names: Vec<&str> = c.visible_children().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn recursive_removal_skips_link_targets() {
        let mut store = FileStore::new();
        let target = store.alloc();
        let parent = store.alloc();
        let link = store.alloc();
        store
            .container_mut(link)
            .unwrap()
            .set_entry(D_LINK, Entry::SoftLink("/target".into()));
        store
            .container_mut(parent)
            .unwrap()
            .set_entry("link", Entry::Child(link));
        store.remove_recursive(parent);
        assert!(store.objects.contains_key(&target));
        assert!(!store.objects.contains_key(&link));
        assert!(!store.objects.contains_key(&parent));
    }

    #[test]
    fn stale_handle_detected() {
        let mut store = FileStore::new();
        let obj = store.alloc();
        store.remove_recursive(obj);
        assert!(matches!(store.container(obj), Err(Error::StaleNodeHandle)));
    }
}
