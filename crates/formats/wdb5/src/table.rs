use std::ops::Range;

use log::{debug, warn};

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::fields::{FieldDescriptor, FieldLayout};
use crate::header::{Header, WDB5_MAGIC};
use crate::index::{
    apply_copy_table, ids_from_column, parse_copy_table, parse_id_block, parse_sparse_map,
    CopyTableEntry, RowIndex, SparseEntry,
};
use crate::source::ByteSource;
use crate::structure::{FieldType, TableStructure};
use crate::value::Value;

/// Options controlling [`Wdb5File::open_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Reject tables whose magic is not `WDB5` instead of logging a warning.
    pub strict_magic: bool,
}

/// An opened WDB5 table.
///
/// Opening parses the header, field table and record index up front; rows are
/// decoded on demand from the source's active window, which the table owns
/// for as long as it lives. Row decoding only borrows `self`, so a table can
/// be shared between threads when its source can.
pub struct Wdb5File<S> {
    source: S,
    header: Header,
    layout: FieldLayout,
    index: RowIndex,
    /// Dense string block within the active window. Empty for sparse tables.
    strings: Range<usize>,
}

impl<S: ByteSource> Wdb5File<S> {
    /// Open a table starting at the source's cursor.
    pub fn open(source: S) -> Result<Self> {
        Self::open_with(source, OpenOptions::default())
    }

    pub fn open_with(mut source: S, options: OpenOptions) -> Result<Self> {
        let header = Header::parse(&source.read_vec(Header::SIZE)?)?;
        if header.magic != WDB5_MAGIC {
            if options.strict_magic {
                return Err(Error::InvalidMagic {
                    expected: WDB5_MAGIC,
                    found: header.magic,
                });
            }
            warn!("unexpected table magic {:?}, decoding as WDB5", header.magic_str());
        }
        debug!(
            "WDB5 header: {} records x {} bytes, {} fields, strings {}, ids {}..={}, locale {}, copy table {}, flags {}, id index {}",
            header.record_count,
            header.record_size,
            header.field_count,
            header.string_table_size,
            header.min_id,
            header.max_id,
            header.locale,
            header.copy_table_size,
            header.flags,
            header.id_index,
        );

        let field_count = header.field_count as usize;
        let field_table = source.read_vec(field_count.saturating_mul(FieldDescriptor::SIZE))?;
        let layout = FieldLayout::parse(&field_table, field_count)?;

        let data_start = source.position();
        let (index, strings) = if header.flags.is_sparse() {
            (Self::read_sparse_index(&mut source, &header)?, 0..0)
        } else {
            Self::read_dense_index(&mut source, &header, &layout, data_start)?
        };
        debug!("indexed {} rows ({})", index.len(), if index.is_sparse() { "sparse" } else { "dense" });

        Ok(Self {
            source,
            header,
            layout,
            index,
            strings,
        })
    }

    fn read_sparse_index(source: &mut S, header: &Header) -> Result<RowIndex> {
        source.seek(header.string_table_size as usize);
        let slots = header.id_range_len();
        let map = source.read_vec(slots.saturating_mul(SparseEntry::SLOT_SIZE))?;
        let entries = parse_sparse_map(&map, header.min_id, slots)?;
        debug!(
            "sparse offset map: {} of {} slots present (header declared {} records)",
            entries.len(),
            slots,
            header.record_count
        );
        if header.copy_table_size > 0 {
            warn!(
                "ignoring {}-byte copy table on a sparse table",
                header.copy_table_size
            );
        }
        Ok(RowIndex::Sparse(entries))
    }

    fn read_dense_index(
        source: &mut S,
        header: &Header,
        layout: &FieldLayout,
        data_start: usize,
    ) -> Result<(RowIndex, Range<usize>)> {
        let count = header.record_count as usize;
        let record_size = header.record_size as usize;
        let records = data_start..data_start + header.record_block_size();
        let strings = records.end..records.end + header.string_table_size as usize;
        if strings.end > source.size() {
            return Err(Error::Truncated {
                offset: data_start,
                need: strings.end - data_start,
                have: source.size().saturating_sub(data_start),
            });
        }

        source.seek(strings.end);
        let mut ids = if header.flags.has_explicit_ids() {
            parse_id_block(&source.read_vec(count.saturating_mul(4))?, count)?
        } else {
            let id_field = layout
                .get(header.id_index as usize)
                .ok_or(Error::InvalidIdColumn {
                    index: header.id_index,
                    field_count: header.field_count,
                })?;
            debug!(
                "ids from column {} (position {}, {} bytes)",
                header.id_index,
                id_field.position,
                id_field.byte_width()
            );
            ids_from_column(
                &source.active()[records.clone()],
                count,
                record_size,
                id_field.position as usize,
                id_field.byte_width(),
            )?
        };
        let mut offsets: Vec<usize> = (0..count).map(|i| records.start + i * record_size).collect();
        debug_assert_eq!(ids.len(), offsets.len());

        if header.copy_table_size > 0 {
            let size = header.copy_table_size as usize;
            if size % CopyTableEntry::SIZE != 0 {
                warn!("copy table size {size} is not a multiple of {}", CopyTableEntry::SIZE);
            }
            let entries = parse_copy_table(&source.read_vec(size)?)?;
            apply_copy_table(&mut ids, &mut offsets, &entries)?;
            debug!("copy table added {} rows", entries.len());
        }

        Ok((RowIndex::Dense { ids, offsets }, strings))
    }

    /// Number of addressable rows, including rows added by the copy table.
    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    /// ID of row `row`.
    pub fn row_id(&self, row: usize) -> Option<u32> {
        self.index.id(row)
    }

    /// Row index of the first row with ID `id`.
    pub fn find_row(&self, id: u32) -> Option<usize> {
        self.index.find(id)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn field_layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    pub fn is_sparse(&self) -> bool {
        self.index.is_sparse()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Give the byte source back, e.g. to select another chunk.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Decode row `row` as text, one string per value in `structure` order.
    pub fn get(&self, row: usize, structure: &TableStructure) -> Result<Vec<String>> {
        Ok(self
            .get_values(row, structure)?
            .iter()
            .map(Value::to_string)
            .collect())
    }

    /// Decode row `row` into typed values.
    ///
    /// Key columns yield the row ID. Every other column yields `array_size`
    /// values, element `i` starting `i * width` bytes after the column's
    /// position.
    pub fn get_values(&self, row: usize, structure: &TableStructure) -> Result<Vec<Value>> {
        let out_of_range = || Error::RowIndexOutOfRange {
            index: row,
            count: self.index.len(),
        };
        let id = self.index.id(row).ok_or_else(out_of_range)?;
        let range = self
            .index
            .record_range(row, self.header.record_size as usize)
            .ok_or_else(out_of_range)?;
        let data = self.source.active();
        let record = data.get(range.clone()).ok_or(Error::OutOfBounds {
            offset: range.start,
            len: range.len(),
            size: data.len(),
        })?;

        let mut values = Vec::new();
        for field in &structure.fields {
            if field.is_key {
                values.push(Value::Key(id));
                continue;
            }
            let width = self
                .layout
                .width_at(field.byte_position)
                .ok_or(Error::UnknownField {
                    position: field.byte_position,
                })?;
            self.check_column_span(
                record,
                field.byte_position as usize,
                field.array_size as usize,
                width,
                &field.ty,
            )?;
            for i in 0..field.array_size as usize {
                let at = field.byte_position as usize + i * width;
                let value = match field.ty {
                    FieldType::Text => {
                        Value::text(&self.read_text(record, field.byte_position as usize, at, width)?)
                    }
                    FieldType::Float => {
                        Value::Float(f32::from_bits(Cursor::new(record).at_offset(at).read_uint(width)?))
                    }
                    FieldType::Int | FieldType::Other(_) => {
                        Value::UInt(Cursor::new(record).at_offset(at).read_uint(width)?)
                    }
                };
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Decode every row in index order.
    pub fn rows<'a>(
        &'a self,
        structure: &'a TableStructure,
    ) -> impl Iterator<Item = Result<Vec<String>>> + 'a {
        (0..self.row_count()).map(move |row| self.get(row, structure))
    }

    /// Every element of a column must start inside the record. Dense and
    /// numeric elements must also end inside it; inline sparse strings run
    /// to their terminator instead.
    fn check_column_span(
        &self,
        record: &[u8],
        position: usize,
        count: usize,
        width: usize,
        ty: &FieldType,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let stride = width.max(1);
        let span = if self.index.is_sparse() && *ty == FieldType::Text {
            (count - 1).checked_mul(stride).map(|n| n + 1)
        } else {
            count.checked_mul(stride)
        };
        if span
            .and_then(|n| n.checked_add(position))
            .is_none_or(|end| end > record.len())
        {
            return Err(Error::OutOfBounds {
                offset: position,
                len: span.unwrap_or(usize::MAX),
                size: record.len(),
            });
        }
        Ok(())
    }

    /// Dense tables store a string-block offset in element `at`; sparse
    /// tables store the string inline at the column's `position`, shared by
    /// every element.
    fn read_text(&self, record: &[u8], position: usize, at: usize, width: usize) -> Result<String> {
        if self.index.is_sparse() {
            return Cursor::new(record).at_offset(position).read_cstr();
        }
        let offset = Cursor::new(record).at_offset(at).read_uint(width)? as usize;
        let strings = &self.source.active()[self.strings.clone()];
        if offset >= strings.len() {
            return Err(Error::OutOfBounds {
                offset,
                len: 1,
                size: strings.len(),
            });
        }
        Cursor::new(strings).at_offset(offset).read_cstr()
    }
}

impl<S: ByteSource> std::fmt::Debug for Wdb5File<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wdb5File")
            .field("rows", &self.index.len())
            .field("fields", &self.layout.len())
            .field("sparse", &self.index.is_sparse())
            .finish()
    }
}
