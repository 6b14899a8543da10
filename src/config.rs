//! Configuration for ArborDB
//!
//! Centralized configuration with sensible defaults. One `Config` is bound
//! to an [`crate::Environment`] at construction and shared by every session
//! opened through it.

/// Main configuration for an ArborDB environment
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Max number of concurrently open files (explicit sessions plus files
    /// pulled in by cross-file link resolution)
    pub max_open_files: usize,

    /// Max number of link hops followed before resolution gives up
    pub max_link_depth: usize,

    /// Max number of registered link search-path directories
    pub max_search_paths: usize,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Payloads below this byte size use the compact inline layout;
    /// larger ones get a block extent of their own
    pub compact_threshold: u64,

    /// Deflate level (0-9) applied to block extents at write time.
    /// `None` stores extents raw.
    pub compression: Option<u32>,

    // -------------------------------------------------------------------------
    // Node Configuration
    // -------------------------------------------------------------------------
    /// Flags stamped on every newly created node. Bit 0 is the
    /// legacy-indexing convention flag.
    pub default_flags: i32,

    // -------------------------------------------------------------------------
    // Error Handling
    // -------------------------------------------------------------------------
    /// Legacy debugging aid: log and terminate the process on any error
    /// instead of propagating it. Off by default.
    pub abort_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            max_link_depth: 100,
            max_search_paths: 64,
            compact_threshold: 64 * 1024,
            compression: None,
            default_flags: 1,
            abort_on_error: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the open-file ceiling
    pub fn max_open_files(mut self, count: usize) -> Self {
        self.config.max_open_files = count;
        self
    }

    /// Set the link-chain depth limit
    pub fn max_link_depth(mut self, depth: usize) -> Self {
        self.config.max_link_depth = depth;
        self
    }

    /// Set the search-path registry capacity
    pub fn max_search_paths(mut self, count: usize) -> Self {
        self.config.max_search_paths = count;
        self
    }

    /// Set the compact-storage threshold (in bytes)
    pub fn compact_threshold(mut self, bytes: u64) -> Self {
        self.config.compact_threshold = bytes;
        self
    }

    /// Set the deflate level for block extents (clamped to 0-9)
    pub fn compression(mut self, level: u32) -> Self {
        self.config.compression = Some(level.min(9));
        self
    }

    /// Set the flags stamped on new nodes
    pub fn default_flags(mut self, flags: i32) -> Self {
        self.config.default_flags = flags;
        self
    }

    /// Enable the legacy abort-on-error behavior
    pub fn abort_on_error(mut self, enabled: bool) -> Self {
        self.config.abort_on_error = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
