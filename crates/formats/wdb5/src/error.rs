use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid magic: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("truncated data at offset {offset:#x} (need {need} bytes, have {have})")]
    Truncated {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("chunk {name:?} not found")]
    ChunkNotFound { name: String },

    #[error("region {offset:#x}+{len} lies outside the {size}-byte buffer")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("row index {index} out of range ({count} rows)")]
    RowIndexOutOfRange { index: usize, count: usize },

    #[error("copy table row {new_id} references unknown row {copied_id}")]
    UnresolvedCopyReference { new_id: u32, copied_id: u32 },

    #[error("no field descriptor at byte position {position}")]
    UnknownField { position: u16 },

    #[error("id column {index} out of range ({field_count} fields)")]
    InvalidIdColumn { index: u16, field_count: u32 },

    #[error("byte source has been closed")]
    Closed,

    #[error("file {name:?} not found")]
    FileNotFound { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid table structure: {0}")]
    Structure(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
