use crate::cursor::Cursor;
use crate::error::Result;

/// Magic bytes of a WDB5 table.
pub const WDB5_MAGIC: [u8; 4] = *b"WDB5";

/// Header flags of a WDB5 table.
///
/// Known bits:
/// - `0x01`: sparse table; records are addressed through an offset map and
///   `string_table_size` holds the map's absolute offset
/// - `0x04`: an explicit ID block follows the record and string blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TableFlags(pub u16);

impl TableFlags {
    pub const SPARSE: Self = Self(0x01);
    pub const EXPLICIT_IDS: Self = Self(0x04);

    /// Whether records live behind an offset map instead of a dense array.
    pub fn is_sparse(self) -> bool {
        self.0 & Self::SPARSE.0 != 0
    }

    /// Whether row IDs come from a trailing ID block rather than a record
    /// column.
    pub fn has_explicit_ids(self) -> bool {
        self.0 & Self::EXPLICIT_IDS.0 != 0
    }
}

impl std::ops::BitOr for TableFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Display for TableFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Fixed-size WDB5 file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 4],
    pub record_count: u32,
    /// Number of field descriptors; array columns count once.
    pub field_count: u32,
    pub record_size: u32,
    /// Size of the string block. For sparse tables this is the absolute
    /// offset of the offset map instead.
    pub string_table_size: u32,
    pub table_hash: u32,
    pub layout_hash: u32,
    pub min_id: u32,
    pub max_id: u32,
    pub locale: u32,
    pub copy_table_size: u32,
    pub flags: TableFlags,
    /// Index of the field holding row IDs; ignored with explicit IDs.
    pub id_index: u16,
}

impl Header {
    /// Encoded size in bytes.
    pub const SIZE: usize = 48;

    /// Parse the header from the first [`Header::SIZE`] bytes of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut c = Cursor::new(data);
        Ok(Self {
            magic: c.read_magic()?,
            record_count: c.read_u32()?,
            field_count: c.read_u32()?,
            record_size: c.read_u32()?,
            string_table_size: c.read_u32()?,
            table_hash: c.read_u32()?,
            layout_hash: c.read_u32()?,
            min_id: c.read_u32()?,
            max_id: c.read_u32()?,
            locale: c.read_u32()?,
            copy_table_size: c.read_u32()?,
            flags: TableFlags(c.read_u16()?),
            id_index: c.read_u16()?,
        })
    }

    /// Magic as a string (for display).
    pub fn magic_str(&self) -> &str {
        std::str::from_utf8(&self.magic).unwrap_or("????")
    }

    /// Number of slots in a sparse table's offset map.
    pub fn id_range_len(&self) -> usize {
        if self.max_id < self.min_id {
            0
        } else {
            (self.max_id - self.min_id) as usize + 1
        }
    }

    /// Combined size of the dense record block.
    pub fn record_block_size(&self) -> usize {
        self.record_size as usize * self.record_count as usize
    }
}
