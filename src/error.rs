//! Error types for ArborDB
//!
//! Provides a unified error type for all operations. Every variant carries a
//! stable numeric code (see [`Error::code`]) so callers that speak the
//! historical numeric-error-code protocol can translate losslessly.

use thiserror::Error;

/// Result type alias using Error
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for ArborDB operations
#[derive(Debug, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Validation Errors (detected before any engine call)
    // -------------------------------------------------------------------------
    #[error("String length of zero or blank string detected")]
    EmptyName,

    #[error("String length longer than maximum allowable length")]
    NameTooLong,

    #[error("Node name contains invalid characters: {0:?}")]
    InvalidNodeName(String),

    #[error("Invalid data-type: {0:?}")]
    InvalidDataType(String),

    #[error("Node's number-of-dimensions is not in legal range: {0}")]
    BadRank(usize),

    #[error("Bad dimension value")]
    BadDimensionValue,

    #[error("Dimensions exceed the addressable payload size")]
    DimensionsTooLarge,

    #[error("Bad start value")]
    StartOutOfRange,

    #[error("Bad end value")]
    EndOutOfRange,

    #[error("Bad stride value")]
    BadStride,

    #[error("Minimum value is greater than the maximum value")]
    MinimumGreaterThanMaximum,

    #[error("Unequal dimensional specifications for disk and memory")]
    UnequalMemoryAndDiskDims,

    // -------------------------------------------------------------------------
    // Resource Errors
    // -------------------------------------------------------------------------
    #[error("Too many files opened")]
    TooManyOpenFiles,

    #[error("Search path registry is full")]
    SearchPathsFull,

    // -------------------------------------------------------------------------
    // Structural Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate child name under a parent node: {0:?}")]
    DuplicateChildName(String),

    #[error("Specified child is NOT a child of the specified parent")]
    ChildNotOfParent,

    #[error("No child named {0:?} under the parent node")]
    ChildNotFound(String),

    #[error("Node handle no longer refers to a live node")]
    StaleNodeHandle,

    #[error("Node has no data associated with it")]
    NoData,

    #[error("The node is not a link; it was expected to be a link")]
    NotALink,

    #[error("The linked-to node does not exist")]
    LinkTargetNotFound,

    #[error("The file of a linked-to node is not accessible: {0:?}")]
    LinkFileNotFound(String),

    #[error("Link chain exceeds the configured maximum depth")]
    LinkDepthExceeded,

    #[error("Parent of node is a link")]
    ParentIsLink,

    #[error("Can't delete a linked-to node")]
    LinkDelete,

    #[error("Can't move a linked-to node")]
    LinkMove,

    #[error("Can't change the data for a linked-to node")]
    LinkData,

    #[error("Operation endpoints are in different files")]
    CrossFile,

    #[error("Dimensions need transposing - file uses the legacy storage order")]
    NeedsTranspose,

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("File Open Error: NEW - File already exists")]
    FileExists,

    #[error("File Open Error: OLD - File does not exist")]
    FileNotFound,

    #[error("File is not open")]
    FileNotOpen,

    #[error("File is currently in use by an open session")]
    FileInUse,

    #[error("File opened in read-only mode")]
    ReadOnlyFile,

    // -------------------------------------------------------------------------
    // Engine Errors (carry engine diagnostics)
    // -------------------------------------------------------------------------
    #[error("File does not exist or is not a recognized database file: {0}")]
    UnrecognizedFormat(String),

    #[error("Database file is corrupt: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable numeric code for the historical error-code protocol.
    ///
    /// Codes are unique per variant; 0 is reserved for "no error".
    pub fn code(&self) -> i32 {
        match self {
            Error::EmptyName => 1,
            Error::NameTooLong => 2,
            Error::InvalidNodeName(_) => 3,
            Error::InvalidDataType(_) => 4,
            Error::BadRank(_) => 5,
            Error::BadDimensionValue => 6,
            Error::DimensionsTooLarge => 7,
            Error::StartOutOfRange => 8,
            Error::EndOutOfRange => 9,
            Error::BadStride => 10,
            Error::MinimumGreaterThanMaximum => 11,
            Error::UnequalMemoryAndDiskDims => 12,
            Error::TooManyOpenFiles => 13,
            Error::SearchPathsFull => 14,
            Error::DuplicateChildName(_) => 15,
            Error::ChildNotOfParent => 16,
            Error::ChildNotFound(_) => 17,
            Error::StaleNodeHandle => 18,
            Error::NoData => 19,
            Error::NotALink => 20,
            Error::LinkTargetNotFound => 21,
            Error::LinkFileNotFound(_) => 22,
            Error::LinkDepthExceeded => 23,
            Error::ParentIsLink => 24,
            Error::LinkDelete => 25,
            Error::LinkMove => 26,
            Error::LinkData => 27,
            Error::CrossFile => 28,
            Error::NeedsTranspose => 29,
            Error::FileExists => 30,
            Error::FileNotFound => 31,
            Error::FileNotOpen => 32,
            Error::FileInUse => 33,
            Error::ReadOnlyFile => 34,
            Error::UnrecognizedFormat(_) => 35,
            Error::Corrupt(_) => 36,
            Error::Serialization(_) => 37,
            Error::Io(_) => 38,
        }
    }
}
