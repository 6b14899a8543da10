//! Link-target file lookup.
//!
//! A cross-file link names its target file as free text. Resolution probes,
//! in order: the name as given (absolute paths short-circuit), the
//! directory of the referring file, the process working directory, each
//! directory in `ARBORDB_LINK_PATH`, then `DATA_LINK_PATH`, then the
//! directories registered on the environment. First hit wins.

use std::env;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{Error, Result};

/// Environment variable holding primary search directories
pub const LINK_PATH_VAR: &str = "ARBORDB_LINK_PATH";

/// Secondary, historically named search variable
pub const DATA_PATH_VAR: &str = "DATA_LINK_PATH";

/// Locate the file a link names, relative to the referring file's directory
pub fn find_file(name: &str, referrer_dir: &Path, registered: &[PathBuf]) -> Result<PathBuf> {
    let given = Path::new(name);
    if given.is_absolute() {
        if given.is_file() {
            return Ok(given.to_path_buf());
        }
        return Err(Error::LinkFileNotFound(name.to_string()));
    }

    let mut candidates: Vec<PathBuf> = vec![referrer_dir.to_path_buf()];
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd);
    }
    for var in [LINK_PATH_VAR, DATA_PATH_VAR] {
        if let Some(value) = env::var_os(var) {
            candidates.extend(env::split_paths(&value));
        }
    }
    candidates.extend(registered.iter().cloned());

    for dir in candidates {
        let probe = dir.join(given);
        trace!(file = name, probe = %probe.display(), "link file probe");
        if probe.is_file() {
            return Ok(probe);
        }
    }
    Err(Error::LinkFileNotFound(name.to_string()))
}
