//! # ArborDB
//!
//! An embedded hierarchical node database in Rust, featuring:
//!
//! - Trees of named, typed nodes with multidimensional payloads
//! - Whole-array, linear-block, and hyperslab I/O with element coercion
//! - Same-file and cross-file links, resolved on every access
//! - Two on-disk codecs behind one trait: the native format and a legacy
//!   flat format, sniffed by signature at open time
//! - A bounded multi-file session table with RAII handles
//!
//! ## Quick Start
//!
//! ```no_run
//! use arbordb::{DataType, Environment, Mode};
//!
//! # fn main() -> arbordb::Result<()> {
//! let env = Environment::new();
//! let db = env.open("flow.adb", Mode::Create)?;
//! let root = db.root()?;
//!
//! let zone = db.create(root, "Zone 1")?;
//! db.set_label(zone, "Zone_t")?;
//! db.set_dimensions(zone, DataType::R8, &[8, 3])?;
//! db.write_all(zone, &[0.0f64; 24])?;
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod facade;
pub mod format;
pub mod node;
pub mod session;
pub mod store;
pub mod types;

pub use config::{Config, ConfigBuilder};
pub use data::{Selection, Slab};
pub use error::{Error, Result};
pub use format::{FormatHint, FormatKind};
pub use session::{Environment, File, Mode};
pub use types::{DataType, NodeId, Scalar, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
