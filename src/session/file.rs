//! One open database session.
//!
//! A [`File`] is the caller's handle on an explicitly opened file and the
//! entry point for every node and data operation. Operations take
//! [`NodeId`] arguments and dispatch on the serial embedded in the handle,
//! so a node handle that link resolution landed in another open file keeps
//! working through the same session.

use std::path::{Path, PathBuf};

use crate::data::{self, Selection, Slab};
use crate::error::{Error, Result};
use crate::format::FormatKind;
use crate::node;
use crate::store::{Entry, FileStore};
use crate::types::{
    A_LABEL, A_NAME, DataType, NodeId, Scalar, A_FLAGS, A_TYPE, D_DATA, D_FILE, D_FORMAT,
    D_LINK, D_OLDVERS, D_PATH, D_VERSION, NAME_LENGTH,
};

use super::{Environment, Mode, SlotRef};

/// An open database file
pub struct File {
    env: Environment,
    serial: u32,
    closed: bool,
}

impl File {
    pub(crate) fn new(env: Environment, serial: u32) -> Self {
        File {
            env,
            serial,
            closed: false,
        }
    }

    /// The environment this session belongs to
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Handle of this file's root node
    pub fn root(&self) -> Result<NodeId> {
        let r = self.with_store(self.serial, |store, _| {
            Ok(NodeId::new(self.serial, store.root))
        });
        self.env.finish(r)
    }

    /// Path the file was opened under
    pub fn path(&self) -> Result<PathBuf> {
        let r = self.env.slot(self.serial).map(|s| s.path);
        self.env.finish(r)
    }

    /// Which codec backs this file
    pub fn format(&self) -> Result<FormatKind> {
        let r = self.env.slot(self.serial).map(|s| s.format.kind());
        self.env.finish(r)
    }

    /// Version string stamped on the root at creation time
    pub fn version(&self) -> Result<String> {
        let r = self.with_store(self.serial, |store, _| {
            let root = store.container(store.root)?;
            for marker in [D_VERSION, D_OLDVERS] {
                if let Some(Entry::Data(ds)) = root.entry(marker) {
                    return Ok(data::dataset_text(ds));
                }
            }
            Err(Error::NoData)
        });
        self.env.finish(r)
    }

    /// Byte-order string stamped on the root at creation time
    pub fn format_string(&self) -> Result<String> {
        let r = self.with_store(self.serial, |store, _| {
            match store.container(store.root)?.entry(D_FORMAT) {
                Some(Entry::Data(ds)) => Ok(data::dataset_text(ds)),
                _ => Err(Error::NoData),
            }
        });
        self.env.finish(r)
    }

    /// Write unsaved changes back to disk
    pub fn flush(&self) -> Result<()> {
        let r = self.do_flush();
        self.env.finish(r)
    }

    fn do_flush(&self) -> Result<()> {
        let slot = self.env.slot(self.serial)?;
        if slot.mode == Mode::ReadOnly {
            return Ok(());
        }
        let mut store = slot.store.write();
        if store.dirty {
            slot.format
                .save(&store, &slot.path, self.env.config().compression)?;
            store.dirty = false;
        }
        Ok(())
    }

    /// Flush and release this session. Dropping the handle does the same,
    /// swallowing any flush error; closing explicitly reports it.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        let r = self.env.release(self.serial);
        self.env.finish(r)
    }

    // -------------------------------------------------------------------------
    // Node structure
    // -------------------------------------------------------------------------

    /// Create an empty child node under `parent`
    pub fn create(&self, parent: NodeId, name: &str) -> Result<NodeId> {
        let r = self.with_store_mut(parent.serial(), |store, slot| {
            let obj = node::create(
                store,
                parent.obj(),
                name,
                !slot.format.tracks_creation_order(),
                self.env.config().default_flags,
            )?;
            Ok(NodeId::new(parent.serial(), obj))
        });
        self.env.finish(r)
    }

    /// Delete `child` and its subtree from under `parent`
    pub fn delete(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let r = if parent.serial() != child.serial() {
            Err(Error::ChildNotOfParent)
        } else {
            self.with_store_mut(parent.serial(), |store, slot| {
                node::delete(
                    store,
                    parent.obj(),
                    child.obj(),
                    !slot.format.tracks_creation_order(),
                )
            })
        };
        self.env.finish(r)
    }

    /// Reparent `child` from `parent` to `new_parent`.
    ///
    /// All three handles must live in the same file; moves never cross a
    /// file boundary.
    pub fn move_node(&self, parent: NodeId, child: NodeId, new_parent: NodeId) -> Result<()> {
        let r = if parent.serial() != child.serial() || parent.serial() != new_parent.serial() {
            Err(Error::CrossFile)
        } else {
            self.with_store_mut(parent.serial(), |store, slot| {
                node::move_child(
                    store,
                    parent.obj(),
                    child.obj(),
                    new_parent.obj(),
                    !slot.format.tracks_creation_order(),
                )
            })
        };
        self.env.finish(r)
    }

    /// Rename `child` under `parent`, keeping its handle valid
    pub fn rename(&self, parent: NodeId, child: NodeId, new_name: &str) -> Result<()> {
        let r = if parent.serial() != child.serial() {
            Err(Error::ChildNotOfParent)
        } else {
            self.with_store_mut(parent.serial(), |store, _| {
                node::rename(store, parent.obj(), child.obj(), new_name)
            })
        };
        self.env.finish(r)
    }

    /// Create a link node under `parent`.
    ///
    /// An empty `target_file` makes a same-file link; otherwise the target
    /// lives in the named file, located through the search paths when the
    /// link is first followed. The target need not exist yet.
    pub fn link(
        &self,
        parent: NodeId,
        name: &str,
        target_file: &str,
        target_path: &str,
    ) -> Result<NodeId> {
        let r = self.with_store_mut(parent.serial(), |store, slot| {
            let obj = node::create(
                store,
                parent.obj(),
                name,
                !slot.format.tracks_creation_order(),
                self.env.config().default_flags,
            )?;
            let c = store.container_mut(obj)?;
            c.set_attr_str(A_TYPE, DataType::Link.code());
            c.set_entry(D_PATH, Entry::Data(data::text_dataset(target_path)));
            if target_file.is_empty() {
                c.set_entry(D_LINK, Entry::SoftLink(target_path.to_string()));
            } else {
                c.set_entry(D_FILE, Entry::Data(data::text_dataset(target_file)));
                c.set_entry(
                    D_LINK,
                    Entry::ExternalLink {
                        file: target_file.to_string(),
                        path: target_path.to_string(),
                    },
                );
            }
            Ok(NodeId::new(parent.serial(), obj))
        });
        self.env.finish(r)
    }

    /// Whether `node` is a link node
    pub fn is_link(&self, node: NodeId) -> Result<bool> {
        let r = self.with_store(node.serial(), |store, _| {
            Ok(store.container(node.obj())?.is_link())
        });
        self.env.finish(r)
    }

    /// Target of a link node: the file it points into (when cross-file)
    /// and the absolute node path inside it
    pub fn link_target(&self, node: NodeId) -> Result<(Option<String>, String)> {
        let r = self.with_store(node.serial(), |store, _| {
            match store.container(node.obj())?.entry(D_LINK) {
                Some(Entry::SoftLink(path)) => Ok((None, path.clone())),
                Some(Entry::ExternalLink { file, path }) => {
                    Ok((Some(file.clone()), path.clone()))
                }
                _ => Err(Error::NotALink),
            }
        });
        self.env.finish(r)
    }

    /// Follow `node` through any chain of links to the real node.
    ///
    /// Resolution is recomputed on every call; nothing about a link target
    /// is cached on the handle. Non-link nodes resolve to themselves.
    pub fn resolve(&self, node: NodeId) -> Result<NodeId> {
        let mut depth = 0;
        let r = self.resolve_inner(node, &mut depth);
        self.env.finish(r)
    }

    /// Find a node by path. Absolute paths walk from the root of the
    /// file holding `parent`; relative paths walk from `parent` itself.
    /// Links along the way are followed; a terminal link is returned as
    /// the link node, unresolved.
    pub fn node_id(&self, parent: NodeId, path: &str) -> Result<NodeId> {
        let mut depth = 0;
        let r = if path.starts_with('/') {
            self.walk_from_root(parent.serial(), path, &mut depth)
        } else {
            self.walk(parent, path, &mut depth)
        };
        self.env.finish(r)
    }

    // -------------------------------------------------------------------------
    // Node attributes
    // -------------------------------------------------------------------------

    /// Name of `node` itself; a link reports its own name
    pub fn name(&self, node: NodeId) -> Result<String> {
        let r = self.with_store(node.serial(), |store, _| {
            Ok(store
                .container(node.obj())?
                .attr_str(A_NAME)
                .unwrap_or_default()
                .to_string())
        });
        self.env.finish(r)
    }

    /// Label of `node`, following links
    pub fn label(&self, node: NodeId) -> Result<String> {
        let r = self.resolved(node).and_then(|node| {
            self.with_store(node.serial(), |store, _| {
                Ok(store
                    .container(node.obj())?
                    .attr_str(A_LABEL)
                    .unwrap_or_default()
                    .to_string())
            })
        });
        self.env.finish(r)
    }

    /// Set the label of `node`. Links are refused, not followed.
    pub fn set_label(&self, node: NodeId, label: &str) -> Result<()> {
        let r = if label.len() > NAME_LENGTH {
            Err(Error::NameTooLong)
        } else {
            self.with_store_mut(node.serial(), |store, _| {
                let c = store.container_mut(node.obj())?;
                if c.is_link() {
                    return Err(Error::LinkData);
                }
                c.set_attr_str(A_LABEL, label);
                Ok(())
            })
        };
        self.env.finish(r)
    }

    /// Element type of `node`, following links
    pub fn node_type(&self, node: NodeId) -> Result<DataType> {
        let r = self.resolved(node).and_then(|node| {
            self.with_store(node.serial(), |store, _| {
                Ok(store.container(node.obj())?.node_type())
            })
        });
        self.env.finish(r)
    }

    /// Flags of `node`, following links
    pub fn flags(&self, node: NodeId) -> Result<i32> {
        let r = self.resolved(node).and_then(|node| {
            self.with_store(node.serial(), |store, _| {
                Ok(store.container(node.obj())?.attr_int(A_FLAGS).unwrap_or(0))
            })
        });
        self.env.finish(r)
    }

    /// Set the flags of `node`. Links are refused, not followed.
    pub fn set_flags(&self, node: NodeId, flags: i32) -> Result<()> {
        let r = self.with_store_mut(node.serial(), |store, _| {
            let c = store.container_mut(node.obj())?;
            if c.is_link() {
                return Err(Error::LinkData);
            }
            c.set_attr_int(A_FLAGS, flags);
            Ok(())
        });
        self.env.finish(r)
    }

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    /// Visible children of `parent`, following links, as a page of the
    /// enumeration: `start` is the 0-based ordinal of the first child,
    /// `count` caps the page size. Disjoint windows partition the children
    /// exactly once each.
    pub fn children(
        &self,
        parent: NodeId,
        start: usize,
        count: usize,
    ) -> Result<Vec<(String, NodeId)>> {
        let r = self.resolved(parent).and_then(|parent| {
            self.with_store(parent.serial(), |store, slot| {
                let all = node::children_ordered(
                    store,
                    parent.obj(),
                    slot.format.tracks_creation_order(),
                )?;
                Ok(all
                    .into_iter()
                    .skip(start)
                    .take(count)
                    .map(|(name, obj)| (name, NodeId::new(parent.serial(), obj)))
                    .collect())
            })
        });
        self.env.finish(r)
    }

    /// Handle page of the children enumeration, same windowing as
    /// [`File::children`]
    pub fn child_ids(&self, parent: NodeId, start: usize, count: usize) -> Result<Vec<NodeId>> {
        Ok(self
            .children(parent, start, count)?
            .into_iter()
            .map(|(_, id)| id)
            .collect())
    }

    /// Number of visible children of `parent`, following links
    pub fn child_count(&self, parent: NodeId) -> Result<usize> {
        let r = self.resolved(parent).and_then(|parent| {
            self.with_store(parent.serial(), |store, _| {
                node::child_count(store, parent.obj())
            })
        });
        self.env.finish(r)
    }

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------

    /// Declare the element type and dimensions of `node`, replacing any
    /// previous payload with zeroed storage. Declaring `Empty` drops the
    /// payload entirely.
    pub fn set_dimensions(&self, node: NodeId, dtype: DataType, dims: &[u64]) -> Result<()> {
        let r = self.with_store_mut(node.serial(), |store, _| {
            if store.container(node.obj())?.is_link() {
                return Err(Error::LinkData);
            }
            if dtype == DataType::Link {
                return Err(Error::InvalidDataType(dtype.code().to_string()));
            }
            if dtype == DataType::Empty {
                let c = store.container_mut(node.obj())?;
                c.remove_entry(D_DATA);
                c.set_attr_str(A_TYPE, DataType::Empty.code());
                return Ok(());
            }
            let ds = data::zeroed_dataset(dtype, dims, self.env.config().compact_threshold)?;
            let c = store.container_mut(node.obj())?;
            c.set_attr_str(A_TYPE, dtype.code());
            c.set_entry(D_DATA, Entry::Data(ds));
            Ok(())
        });
        self.env.finish(r)
    }

    /// Dimensions of `node`'s payload, following links; empty when the
    /// node carries no data
    pub fn dimensions(&self, node: NodeId) -> Result<Vec<u64>> {
        let r = self.resolved(node).and_then(|node| {
            self.with_store(node.serial(), |store, _| {
                Ok(store
                    .container(node.obj())?
                    .data()
                    .map(|ds| ds.dims.clone())
                    .unwrap_or_default())
            })
        });
        self.env.finish(r)
    }

    /// Payload rank, following links; 0 when the node carries no data
    pub fn rank(&self, node: NodeId) -> Result<usize> {
        Ok(self.dimensions(node)?.len())
    }

    /// Read the whole payload, coerced to `T`, following links
    pub fn read_all<T: Scalar>(&self, node: NodeId) -> Result<Vec<T>> {
        let r = self.resolved(node).and_then(|node| {
            self.with_store(node.serial(), |store, _| {
                let ds = store.container(node.obj())?.data().ok_or(Error::NoData)?;
                Ok(data::read_all(ds))
            })
        });
        self.env.finish(r)
    }

    /// Overwrite the whole payload, coercing `values` into the stored
    /// type. Links are refused, not followed.
    pub fn write_all<T: Scalar>(&self, node: NodeId, values: &[T]) -> Result<()> {
        let r = self.with_store_mut(node.serial(), |store, _| {
            let c = store.container_mut(node.obj())?;
            if c.is_link() {
                return Err(Error::LinkData);
            }
            let ds = c.data_mut().ok_or(Error::NoData)?;
            data::write_all(ds, values)
        });
        self.env.finish(r)
    }

    /// Read a C1 payload as text, following links. Trailing NULs are
    /// stripped, matching how string payloads are conventionally stored.
    pub fn read_string(&self, node: NodeId) -> Result<String> {
        let r = self.resolved(node).and_then(|node| {
            self.with_store(node.serial(), |store, _| {
                let ds = store.container(node.obj())?.data().ok_or(Error::NoData)?;
                if ds.dtype != DataType::C1 {
                    return Err(Error::InvalidDataType(ds.dtype.code().to_string()));
                }
                Ok(data::dataset_text(ds))
            })
        });
        self.env.finish(r)
    }

    /// Read the 1-based inclusive linear element range, coerced to `T`,
    /// following links
    pub fn read_block<T: Scalar>(
        &self,
        node: NodeId,
        b_start: u64,
        b_end: u64,
        out: &mut [T],
    ) -> Result<()> {
        let r = self.resolved(node).and_then(|node| {
            self.with_store(node.serial(), |store, _| {
                let ds = store.container(node.obj())?.data().ok_or(Error::NoData)?;
                data::read_block(ds, b_start, b_end, out)
            })
        });
        self.env.finish(r)
    }

    /// Overwrite the 1-based inclusive linear element range. The element
    /// type must match the stored type; links are refused.
    pub fn write_block<T: Scalar>(
        &self,
        node: NodeId,
        b_start: u64,
        b_end: u64,
        values: &[T],
    ) -> Result<()> {
        let r = self.with_store_mut(node.serial(), |store, _| {
            let c = store.container_mut(node.obj())?;
            if c.is_link() {
                return Err(Error::LinkData);
            }
            let ds = c.data_mut().ok_or(Error::NoData)?;
            data::write_block(ds, b_start, b_end, values)
        });
        self.env.finish(r)
    }

    /// Read a hyperslab of the payload into a selection of the memory
    /// array `out`, following links. The complement of the memory
    /// selection is left untouched.
    pub fn read_slab<T: Scalar>(
        &self,
        node: NodeId,
        disk: &[Slab],
        mem_dims: &[u64],
        mem: &[Slab],
        out: &mut [T],
    ) -> Result<()> {
        let r = self.resolved(node).and_then(|node| {
            self.with_store(node.serial(), |store, _| {
                let ds = store.container(node.obj())?.data().ok_or(Error::NoData)?;
                if !store.transposed() && ds.dims.len() > 1 {
                    return Err(Error::NeedsTranspose);
                }
                let disk_sel = Selection::validate(disk, &ds.dims)?;
                let mem_sel = Selection::validate(mem, mem_dims)?;
                data::read_slab(ds, &disk_sel, mem_dims, &mem_sel, out)
            })
        });
        self.env.finish(r)
    }

    /// Write a selection of the memory array `values` into a hyperslab of
    /// the payload, coercing elements into the stored type. The complement
    /// of the disk selection keeps its values; links are refused.
    pub fn write_slab<T: Scalar>(
        &self,
        node: NodeId,
        disk: &[Slab],
        mem_dims: &[u64],
        mem: &[Slab],
        values: &[T],
    ) -> Result<()> {
        let r = self.with_store_mut(node.serial(), |store, _| {
            let transposed = store.transposed();
            let c = store.container_mut(node.obj())?;
            if c.is_link() {
                return Err(Error::LinkData);
            }
            let ds = c.data_mut().ok_or(Error::NoData)?;
            if !transposed && ds.dims.len() > 1 {
                return Err(Error::NeedsTranspose);
            }
            let disk_sel = Selection::validate(disk, &ds.dims)?;
            let mem_sel = Selection::validate(mem, mem_dims)?;
            data::write_slab(ds, &disk_sel, mem_dims, &mem_sel, values)
        });
        self.env.finish(r)
    }

    // -------------------------------------------------------------------------
    // Internal plumbing
    // -------------------------------------------------------------------------

    fn with_store<T>(
        &self,
        serial: u32,
        f: impl FnOnce(&FileStore, &SlotRef) -> Result<T>,
    ) -> Result<T> {
        let slot = self.env.slot(serial)?;
        let store = slot.store.read();
        f(&store, &slot)
    }

    fn with_store_mut<T>(
        &self,
        serial: u32,
        f: impl FnOnce(&mut FileStore, &SlotRef) -> Result<T>,
    ) -> Result<T> {
        let slot = self.env.slot(serial)?;
        if slot.mode == Mode::ReadOnly {
            return Err(Error::ReadOnlyFile);
        }
        let mut store = slot.store.write();
        f(&mut store, &slot)
    }

    fn resolved(&self, node: NodeId) -> Result<NodeId> {
        let mut depth = 0;
        self.resolve_inner(node, &mut depth)
    }

    /// Follow the link chain starting at `id`, bounded by the configured
    /// depth across same-file and cross-file hops combined
    fn resolve_inner(&self, id: NodeId, depth: &mut usize) -> Result<NodeId> {
        let mut current = id;
        loop {
            let slot = self.env.slot(current.serial())?;
            let link = {
                let store = slot.store.read();
                match store.container(current.obj())?.entry(D_LINK) {
                    Some(Entry::SoftLink(path)) => Some((None, path.clone())),
                    Some(Entry::ExternalLink { file, path }) => {
                        Some((Some(file.clone()), path.clone()))
                    }
                    _ => None,
                }
            };
            let Some((file, target)) = link else {
                return Ok(current);
            };
            *depth += 1;
            if *depth > self.env.config().max_link_depth {
                return Err(Error::LinkDepthExceeded);
            }
            let target_serial = match file {
                None => current.serial(),
                Some(name) => {
                    let dir = slot
                        .path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    self.env.open_linked(&name, &dir)?
                }
            };
            current = self
                .walk_from_root(target_serial, &target, depth)
                .map_err(|e| match e {
                    Error::ChildNotFound(_) => Error::LinkTargetNotFound,
                    other => other,
                })?;
        }
    }

    fn walk_from_root(&self, serial: u32, path: &str, depth: &mut usize) -> Result<NodeId> {
        let slot = self.env.slot(serial)?;
        let root = slot.store.read().root;
        self.walk(NodeId::new(serial, root), path, depth)
    }

    /// Walk `path` segment by segment, resolving interior links. The
    /// terminal node is returned as-is, link or not.
    fn walk(&self, start: NodeId, path: &str, depth: &mut usize) -> Result<NodeId> {
        let mut current = start;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self.resolve_inner(current, depth)?;
            current = self.with_store(current.serial(), |store, _| {
                let obj = node::find_child(store, current.obj(), segment)?;
                Ok(NodeId::new(current.serial(), obj))
            })?;
        }
        Ok(current)
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.env.release(self.serial);
        }
    }
}
