use crate::cursor::Cursor;
use crate::error::Result;

/// Per-column metadata from the field table that follows the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Bits of a 32-bit value the column does not use.
    pub unused_bits: u16,
    /// Byte offset of the column inside a record.
    pub position: u16,
}

impl FieldDescriptor {
    /// Encoded size in bytes.
    pub const SIZE: usize = 4;

    /// Byte width of one column element: `(32 - unused_bits) / 8`.
    pub fn byte_width(&self) -> usize {
        32usize.saturating_sub(self.unused_bits as usize) / 8
    }
}

/// Immutable field table, built once while opening a table.
///
/// Descriptors keep their declared order (the header's `id_index` refers to
/// it); lookups by byte position go through a sorted side index.
#[derive(Debug, Clone, Default)]
pub struct FieldLayout {
    descriptors: Vec<FieldDescriptor>,
    /// `(position, index into descriptors)`, sorted by position.
    by_position: Vec<(u16, usize)>,
}

impl FieldLayout {
    pub fn new(descriptors: Vec<FieldDescriptor>) -> Self {
        let mut by_position: Vec<(u16, usize)> = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.position, i))
            .collect();
        // Stable sort keeps declared order among duplicates; the last one
        // declared is the one looked up.
        by_position.sort_by_key(|&(pos, _)| pos);
        by_position.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = later.1;
                true
            } else {
                false
            }
        });
        Self {
            descriptors,
            by_position,
        }
    }

    /// Parse `count` descriptors (`u16 unused_bits`, `u16 position`).
    pub fn parse(data: &[u8], count: usize) -> Result<Self> {
        let mut c = Cursor::new(data);
        let mut descriptors = Vec::with_capacity(count);
        for _ in 0..count {
            let unused_bits = c.read_u16()?;
            let position = c.read_u16()?;
            descriptors.push(FieldDescriptor {
                unused_bits,
                position,
            });
        }
        Ok(Self::new(descriptors))
    }

    /// Descriptors in declared order.
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    /// Descriptor by declared index.
    pub fn get(&self, index: usize) -> Option<&FieldDescriptor> {
        self.descriptors.get(index)
    }

    /// Descriptor of the column starting at byte `position`.
    pub fn at_position(&self, position: u16) -> Option<&FieldDescriptor> {
        let slot = self
            .by_position
            .binary_search_by_key(&position, |&(pos, _)| pos)
            .ok()?;
        Some(&self.descriptors[self.by_position[slot].1])
    }

    /// Byte width of the column starting at byte `position`.
    pub fn width_at(&self, position: u16) -> Option<usize> {
        self.at_position(position).map(FieldDescriptor::byte_width)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Writer;

    #[test]
    fn byte_width_from_unused_bits() {
        let width = |unused_bits| FieldDescriptor { unused_bits, position: 0 }.byte_width();
        assert_eq!(width(0), 4);
        assert_eq!(width(8), 3);
        assert_eq!(width(16), 2);
        assert_eq!(width(24), 1);
        assert_eq!(width(40), 0);
    }

    #[test]
    fn lookup_by_position() {
        let mut w = Writer::new();
        for (unused, pos) in [(0u16, 0u16), (24, 8), (16, 4)] {
            w.write_u16(unused);
            w.write_u16(pos);
        }
        let layout = FieldLayout::parse(&w.into_bytes(), 3).unwrap();
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.get(1).map(|d| d.position), Some(8));
        assert_eq!(layout.width_at(0), Some(4));
        assert_eq!(layout.width_at(4), Some(2));
        assert_eq!(layout.width_at(8), Some(1));
        assert_eq!(layout.width_at(2), None);
    }

    #[test]
    fn duplicate_position_uses_last_declared() {
        let layout = FieldLayout::new(vec![
            FieldDescriptor { unused_bits: 0, position: 4 },
            FieldDescriptor { unused_bits: 24, position: 4 },
        ]);
        assert_eq!(layout.width_at(4), Some(1));
    }

    #[test]
    fn short_field_table_is_truncated() {
        assert!(FieldLayout::parse(&[0, 0, 0, 0, 0, 0], 2).is_err());
    }
}
