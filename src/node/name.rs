//! Node name validation.

use crate::error::{Error, Result};
use crate::types::NAME_LENGTH;

/// Validate a caller-supplied node name and return its canonical form.
///
/// Surrounding whitespace is stripped before any other check, so a stored
/// name can never begin with the hidden-name prefix.
pub fn check_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyName);
    }
    if trimmed.len() > NAME_LENGTH {
        return Err(Error::NameTooLong);
    }
    if trimmed.contains('/') || trimmed == "." || trimmed == ".." {
        return Err(Error::InvalidNodeName(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}
