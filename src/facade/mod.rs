//! File-level services shared by every session: locating link-target files
//! through the search paths, and in-place compaction of database files.

pub mod compact;
pub mod paths;
