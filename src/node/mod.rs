//! Tree operations over one in-memory store: create, delete, move, rename,
//! and child enumeration.
//!
//! All functions take object indices inside a single [`FileStore`]; the
//! session layer is responsible for resolving handles, following links, and
//! refusing cross-file moves before calling in here.

pub mod name;

use crate::error::{Error, Result};
use crate::store::{Entry, FileStore};
use crate::types::{A_FLAGS, A_LABEL, A_NAME, A_ORDER, A_TYPE, DataType};

pub use name::check_name;

/// Create an empty child under `parent` and return its object index.
///
/// When `maintain_order` is set (legacy-format files) the new child gets an
/// order attribute recording its creation rank, which enumeration uses in
/// place of the catalog order the legacy codec cannot preserve.
pub fn create(
    store: &mut FileStore,
    parent: u32,
    name: &str,
    maintain_order: bool,
    default_flags: i32,
) -> Result<u32> {
    let name = check_name(name)?;
    let parent_c = store.container(parent)?;
    if parent_c.is_link() {
        return Err(Error::ParentIsLink);
    }
    if parent_c.visible_children().any(|(n, _)| n == name) {
        return Err(Error::DuplicateChildName(name));
    }
    let rank = parent_c.visible_children().count() as i32 + 1;

    let child = store.alloc();
    let c = store.container_mut(child)?;
    c.set_attr_str(A_NAME, name.clone());
    c.set_attr_str(A_LABEL, "");
    c.set_attr_str(A_TYPE, DataType::Empty.code());
    c.set_attr_int(A_FLAGS, default_flags);
    if maintain_order {
        c.set_attr_int(A_ORDER, rank);
    }
    store
        .container_mut(parent)?
        .set_entry(&name, Entry::Child(child));
    Ok(child)
}

/// Find a direct child of `parent` by name
pub fn find_child(store: &FileStore, parent: u32, name: &str) -> Result<u32> {
    store
        .container(parent)?
        .visible_children()
        .find(|(n, _)| *n == name)
        .map(|(_, obj)| obj)
        .ok_or_else(|| Error::ChildNotFound(name.to_string()))
}

/// Delete `child` and its whole subtree from under `parent`.
///
/// The child must be identified by object identity, not by name, so stale
/// handles cannot delete an unrelated node that reused the name. Link
/// children are removed without touching their targets.
pub fn delete(store: &mut FileStore, parent: u32, child: u32, maintain_order: bool) -> Result<()> {
    let parent_c = store.container(parent)?;
    if parent_c.is_link() {
        return Err(Error::LinkDelete);
    }
    let name = child_entry_name(parent_c, child)?;
    store.container_mut(parent)?.remove_entry(&name);
    store.remove_recursive(child);
    if maintain_order {
        renumber(store, parent)?;
    }
    Ok(())
}

/// Reparent `child` from `old_parent` to `new_parent` within one file
pub fn move_child(
    store: &mut FileStore,
    old_parent: u32,
    child: u32,
    new_parent: u32,
    maintain_order: bool,
) -> Result<()> {
    if store.container(old_parent)?.is_link() || store.container(new_parent)?.is_link() {
        return Err(Error::LinkMove);
    }
    let name = child_entry_name(store.container(old_parent)?, child)?;
    if old_parent != new_parent
        && store
            .container(new_parent)?
            .visible_children()
            .any(|(n, _)| n == name)
    {
        return Err(Error::DuplicateChildName(name));
    }
    store.container_mut(old_parent)?.remove_entry(&name);
    store
        .container_mut(new_parent)?
        .set_entry(&name, Entry::Child(child));
    if maintain_order {
        renumber(store, old_parent)?;
        // The moved node enumerates after the new parent's existing
        // children, as if freshly created there.
        store.container_mut(child)?.set_attr_int(A_ORDER, i32::MAX);
        renumber(store, new_parent)?;
    }
    Ok(())
}

/// Rename `child` under `parent`
pub fn rename(store: &mut FileStore, parent: u32, child: u32, new_name: &str) -> Result<()> {
    let new_name = check_name(new_name)?;
    let parent_c = store.container(parent)?;
    if parent_c.is_link() {
        return Err(Error::ParentIsLink);
    }
    let old_name = child_entry_name(parent_c, child)?;
    if old_name == new_name {
        return Ok(());
    }
    if parent_c.visible_children().any(|(n, _)| n == new_name) {
        return Err(Error::DuplicateChildName(new_name));
    }
    let parent_c = store.container_mut(parent)?;
    parent_c.remove_entry(&old_name);
    // Re-append under the new name; catalog position changes, the order
    // attribute (when maintained) does not.
    parent_c.entries.push((new_name.clone(), Entry::Child(child)));
    store.container_mut(child)?.set_attr_str(A_NAME, new_name);
    Ok(())
}

/// Visible children of `parent` in enumeration order.
///
/// Creation-order files enumerate in catalog order. Other files sort by
/// the stored order attribute, falling back to name for children that
/// never got one.
pub fn children_ordered(
    store: &FileStore,
    parent: u32,
    creation_order: bool,
) -> Result<Vec<(String, u32)>> {
    let parent_c = store.container(parent)?;
    let mut out: Vec<(String, u32)> = parent_c
        .visible_children()
        .map(|(n, obj)| (n.to_string(), obj))
        .collect();
    if !creation_order {
        out.sort_by(|a, b| {
            let oa = order_of(store, a.1);
            let ob = order_of(store, b.1);
            oa.cmp(&ob).then_with(|| a.0.cmp(&b.0))
        });
    }
    Ok(out)
}

/// Number of visible children of `parent`
pub fn child_count(store: &FileStore, parent: u32) -> Result<usize> {
    Ok(store.container(parent)?.visible_children().count())
}

fn order_of(store: &FileStore, obj: u32) -> i32 {
    store
        .objects
        .get(&obj)
        .and_then(|c| c.attr_int(A_ORDER))
        .unwrap_or(i32::MAX)
}

/// Entry name of `child` under `parent_c`, by object identity
fn child_entry_name(parent_c: &crate::store::Container, child: u32) -> Result<String> {
    parent_c
        .visible_children()
        .find(|(_, obj)| *obj == child)
        .map(|(n, _)| n.to_string())
        .ok_or(Error::ChildNotOfParent)
}

/// Reassign order attributes 1..=n over the current enumeration, closing
/// any gap a removal left behind
fn renumber(store: &mut FileStore, parent: u32) -> Result<()> {
    let children = children_ordered(store, parent, false)?;
    for (rank, (_, obj)) in children.into_iter().enumerate() {
        store
            .container_mut(obj)?
            .set_attr_int(A_ORDER, rank as i32 + 1);
    }
    Ok(())
}
