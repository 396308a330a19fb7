//! Decoder for WDB5 (`.db2`) client database tables.
//!
//! Three-layer architecture:
//! - **Layer 1** (`source`/`chunk`/`loader`/`cursor`): byte sources with named
//!   chunks, loader backends, bounds-checked little-endian decoding
//! - **Layer 2** (`header`/`fields`/`index`/`structure`): typed table metadata
//!   and caller-supplied column descriptions
//! - **Layer 3** (`table`): opened table with on-demand row decoding

pub mod chunk;
pub mod cursor;
pub mod error;
pub mod fields;
pub mod header;
pub mod index;
pub mod loader;
pub mod source;
pub mod structure;
pub mod table;
pub mod value;

pub use error::{Error, Result};
pub use header::{Header, TableFlags};
pub use loader::{open_source, DirectoryLoader, FileLoader, GameFile, MemoryLoader};
pub use source::{ByteSource, ChunkedBuffer};
pub use structure::{FieldSpec, FieldType, TableStructure};
pub use table::{OpenOptions, Wdb5File};
pub use value::Value;
