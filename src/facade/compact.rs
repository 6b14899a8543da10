//! Offline compaction: rewrite a database file so it contains only its
//! live contents.
//!
//! The file is decoded with its own backend and written back through the
//! same codec, which drops any slack an earlier writer left behind. When
//! the path is a symlink the rewrite lands on the resolved target so the
//! symlink itself survives.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::format;

/// Rewrite `path` in place, preserving its format.
///
/// `compression` applies to block extents of native files; the flat codec
/// ignores it.
pub fn rewrite(path: &Path, compression: Option<u32>) -> Result<()> {
    let backend = format::detect(path)?;
    let store = backend.load(path)?;
    let target = fs::canonicalize(path)?;
    let before = fs::metadata(&target)?.len();
    backend.save(&store, &target, compression)?;
    let after = fs::metadata(&target)?.len();
    info!(
        path = %path.display(),
        format = %backend.kind(),
        before,
        after,
        "compacted database file"
    );
    Ok(())
}
