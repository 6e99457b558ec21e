//! Filesystem primitives for docsync
//!
//! Provides normalized path handling, atomic locked writes, content
//! checksums, and format-agnostic config persistence shared by the
//! content and core crates.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;

pub use checksum::{compute_bytes_checksum, compute_content_checksum};
pub use config::{ConfigFormat, ConfigStore};
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use path::NormalizedPath;
