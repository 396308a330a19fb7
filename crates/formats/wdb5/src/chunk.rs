/// A named sub-region of a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    /// Name the chunk is selected by (usually a 4-byte ASCII tag).
    pub name: String,
    /// Absolute byte offset of the chunk's first byte in the owning buffer.
    pub start: usize,
    /// Size of the chunk's content in bytes.
    pub size: usize,
}

impl ChunkEntry {
    pub fn new(name: impl Into<String>, start: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            start,
            size,
        }
    }

    /// Absolute offset one past the chunk's last byte.
    pub fn end(&self) -> usize {
        self.start + self.size
    }
}

/// Ordered table of named chunks.
///
/// Lookups are linear and return the first entry with a matching name, so a
/// chunk registered earlier shadows a later one with the same name.
#[derive(Debug, Clone, Default)]
pub struct ChunkTable {
    chunks: Vec<ChunkEntry>,
}

impl ChunkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChunkEntry) {
        self.chunks.push(entry);
    }

    /// All chunks in registration order.
    pub fn chunks(&self) -> &[ChunkEntry] {
        &self.chunks
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Find a chunk by name. Returns the first match.
    pub fn find(&self, name: &str) -> Option<&ChunkEntry> {
        self.chunks.iter().find(|c| c.name == name)
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registered_chunk_wins() {
        let mut table = ChunkTable::new();
        table.push(ChunkEntry::new("WDB5", 16, 100));
        table.push(ChunkEntry::new("WDB5", 200, 4));
        assert_eq!(table.len(), 2);
        assert_eq!(table.find("WDB5").map(|c| c.start), Some(16));
        assert!(table.find("WDC1").is_none());
    }

    #[test]
    fn clear_empties_the_table() {
        let mut table = ChunkTable::new();
        table.push(ChunkEntry::new("A", 0, 1));
        table.clear();
        assert!(table.is_empty());
    }
}
