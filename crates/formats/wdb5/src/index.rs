//! Record indexes: which bytes belong to which row, and which ID each row has.

use std::collections::HashMap;
use std::ops::Range;

use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// One present row of a sparse table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseEntry {
    /// Offset of the record blob from the start of the table.
    pub offset: u32,
    /// Length of the record blob in bytes.
    pub length: u16,
    /// Row ID (`min_id` plus the slot number).
    pub id: u32,
}

impl SparseEntry {
    /// Encoded size of an offset-map slot (`u32 offset`, `u16 length`).
    pub const SLOT_SIZE: usize = 6;

    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// Copy table entry: `new_row_id` shares the record bytes of `copied_row_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyTableEntry {
    pub new_row_id: u32,
    pub copied_row_id: u32,
}

impl CopyTableEntry {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;
}

/// Row lookup structure of an opened table.
#[derive(Debug, Clone)]
pub enum RowIndex {
    /// Fixed-size records. `ids[i]` is row `i`'s ID and `offsets[i]` the
    /// offset of its record from the start of the table.
    Dense { ids: Vec<u32>, offsets: Vec<usize> },
    /// Variable-size records behind an offset map, absent rows skipped.
    Sparse(Vec<SparseEntry>),
}

impl RowIndex {
    /// Number of addressable rows.
    pub fn len(&self) -> usize {
        match self {
            RowIndex::Dense { ids, .. } => ids.len(),
            RowIndex::Sparse(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, RowIndex::Sparse(_))
    }

    /// ID of row `row`.
    pub fn id(&self, row: usize) -> Option<u32> {
        match self {
            RowIndex::Dense { ids, .. } => ids.get(row).copied(),
            RowIndex::Sparse(entries) => entries.get(row).map(|e| e.id),
        }
    }

    /// Byte range of row `row`'s record. Dense records are `record_size` long.
    pub fn record_range(&self, row: usize, record_size: usize) -> Option<Range<usize>> {
        match self {
            RowIndex::Dense { offsets, .. } => {
                let start = *offsets.get(row)?;
                Some(start..start + record_size)
            }
            RowIndex::Sparse(entries) => entries.get(row).map(SparseEntry::range),
        }
    }

    /// First row whose ID is `id`.
    pub fn find(&self, id: u32) -> Option<usize> {
        match self {
            RowIndex::Dense { ids, .. } => ids.iter().position(|&i| i == id),
            RowIndex::Sparse(entries) => entries.iter().position(|e| e.id == id),
        }
    }
}

/// Parse a sparse offset map of `slots` entries, keeping only slots with a
/// nonzero offset and a nonzero length.
pub fn parse_sparse_map(data: &[u8], min_id: u32, slots: usize) -> Result<Vec<SparseEntry>> {
    let mut c = Cursor::new(data);
    let mut entries = Vec::new();
    for slot in 0..slots {
        let offset = c.read_u32()?;
        let length = c.read_u16()?;
        if offset == 0 || length == 0 {
            continue;
        }
        entries.push(SparseEntry {
            offset,
            length,
            id: min_id.wrapping_add(slot as u32),
        });
    }
    Ok(entries)
}

/// Parse `count` explicit little-endian row IDs.
pub fn parse_id_block(data: &[u8], count: usize) -> Result<Vec<u32>> {
    let mut c = Cursor::new(data);
    (0..count).map(|_| c.read_u32()).collect()
}

/// Extract each record's ID from the `width`-byte column at `position`.
///
/// `records` is the dense record block; the value is masked to `width`
/// bytes.
pub fn ids_from_column(
    records: &[u8],
    count: usize,
    record_size: usize,
    position: usize,
    width: usize,
) -> Result<Vec<u32>> {
    let c = Cursor::new(records);
    (0..count)
        .map(|i| c.at_offset(i * record_size + position).read_uint(width))
        .collect()
}

/// Parse a copy table occupying all of `data`. Trailing bytes that do not
/// form a whole entry are ignored.
pub fn parse_copy_table(data: &[u8]) -> Result<Vec<CopyTableEntry>> {
    let mut c = Cursor::new(data);
    let count = data.len() / CopyTableEntry::SIZE;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(CopyTableEntry {
            new_row_id: c.read_u32()?,
            copied_row_id: c.read_u32()?,
        });
    }
    Ok(entries)
}

/// Append one row per copy entry, aliasing the record of the copied row.
///
/// The ID lookup covers only rows present before the copy table; a copied ID
/// that is not among them is an [`Error::UnresolvedCopyReference`]. When an
/// ID occurs more than once, the last row with it wins.
pub fn apply_copy_table(
    ids: &mut Vec<u32>,
    offsets: &mut Vec<usize>,
    entries: &[CopyTableEntry],
) -> Result<()> {
    let by_id: HashMap<u32, usize> = ids.iter().copied().zip(offsets.iter().copied()).collect();

    ids.reserve(entries.len());
    offsets.reserve(entries.len());
    for entry in entries {
        let offset = *by_id
            .get(&entry.copied_row_id)
            .ok_or(Error::UnresolvedCopyReference {
                new_id: entry.new_row_id,
                copied_id: entry.copied_row_id,
            })?;
        ids.push(entry.new_row_id);
        offsets.push(offset);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Writer;

    #[test]
    fn sparse_map_skips_empty_slots() {
        let mut w = Writer::new();
        for (offset, length) in [(100u32, 8u16), (0, 8), (120, 0), (140, 4)] {
            w.write_u32(offset);
            w.write_u16(length);
        }
        let entries = parse_sparse_map(&w.into_bytes(), 50, 4).unwrap();
        assert_eq!(
            entries,
            vec![
                SparseEntry { offset: 100, length: 8, id: 50 },
                SparseEntry { offset: 140, length: 4, id: 53 },
            ]
        );
        assert!(entries.iter().all(|e| e.offset != 0 && e.length != 0));
    }

    #[test]
    fn sparse_map_shorter_than_range_is_truncated() {
        assert!(matches!(
            parse_sparse_map(&[1, 0, 0, 0, 1, 0], 0, 2),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn column_ids_are_masked() {
        // Two 4-byte records with a 2-byte ID column at position 1.
        let records = [0xAA, 0x34, 0x12, 0xBB, 0xAA, 0xFF, 0xFF, 0xBB];
        let ids = ids_from_column(&records, 2, 4, 1, 2).unwrap();
        assert_eq!(ids, vec![0x1234, 0xFFFF]);
    }

    #[test]
    fn copy_rows_alias_existing_offsets() {
        let mut ids = vec![5, 7];
        let mut offsets = vec![100, 200];
        let entries = [
            CopyTableEntry { new_row_id: 6, copied_row_id: 5 },
            CopyTableEntry { new_row_id: 8, copied_row_id: 7 },
        ];
        apply_copy_table(&mut ids, &mut offsets, &entries).unwrap();
        assert_eq!(ids, vec![5, 7, 6, 8]);
        assert_eq!(offsets, vec![100, 200, 100, 200]);
    }

    #[test]
    fn copy_of_copy_is_unresolved() {
        // Copy entries only see rows that existed before the copy table.
        let mut ids = vec![5];
        let mut offsets = vec![100];
        let entries = [
            CopyTableEntry { new_row_id: 6, copied_row_id: 5 },
            CopyTableEntry { new_row_id: 7, copied_row_id: 6 },
        ];
        let err = apply_copy_table(&mut ids, &mut offsets, &entries).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedCopyReference { new_id: 7, copied_id: 6 }
        ));
    }

    #[test]
    fn copy_table_ignores_partial_entry() {
        let mut w = Writer::new();
        w.write_u32(2);
        w.write_u32(1);
        w.write_u16(0);
        let entries = parse_copy_table(&w.into_bytes()).unwrap();
        assert_eq!(entries, vec![CopyTableEntry { new_row_id: 2, copied_row_id: 1 }]);
    }

    #[test]
    fn dense_lookup() {
        let index = RowIndex::Dense {
            ids: vec![10, 11],
            offsets: vec![52, 60],
        };
        assert_eq!(index.len(), 2);
        assert_eq!(index.id(1), Some(11));
        assert_eq!(index.record_range(1, 8), Some(60..68));
        assert_eq!(index.find(10), Some(0));
        assert_eq!(index.record_range(2, 8), None);
        assert!(!index.is_sparse());
    }
}
