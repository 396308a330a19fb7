use crate::error::{Error, Result};

/// Mask keeping the low `width` bytes of a little-endian value.
///
/// Widths of 4 or more (and the degenerate width 0) keep all 32 bits.
pub fn mask_for_width(width: usize) -> u32 {
    match width {
        1 => 0x0000_00FF,
        2 => 0x0000_FFFF,
        3 => 0x00FF_FFFF,
        _ => 0xFFFF_FFFF,
    }
}

/// Read cursor over a byte slice. All reads are little-endian.
#[derive(Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of underlying data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Remaining bytes from current position.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Read a slice of `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a 4-byte magic/tag.
    pub fn read_magic(&mut self) -> Result<[u8; 4]> {
        let bytes = self.read_bytes(4)?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(bytes);
        Ok(magic)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a `width`-byte little-endian unsigned value, zero-extended to 32
    /// bits and masked to `width` bytes. Widths above 4 are clamped to 4.
    pub fn read_uint(&mut self, width: usize) -> Result<u32> {
        let width = width.min(4);
        let bytes = self.read_bytes(width)?;
        let mut raw = [0u8; 4];
        raw[..width].copy_from_slice(bytes);
        Ok(u32::from_le_bytes(raw) & mask_for_width(width))
    }

    /// Read a NUL-terminated string at the current position.
    ///
    /// A missing terminator ends the string at the end of the data. Invalid
    /// UTF-8 is replaced rather than rejected. The cursor moves past the
    /// terminator.
    pub fn read_cstr(&mut self) -> Result<String> {
        self.ensure(0)?;
        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let value = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos = (self.pos + len + 1).min(self.data.len());
        Ok(value)
    }

    /// Create a cursor positioned at an absolute offset into the same data.
    pub fn at_offset(&self, offset: usize) -> Self {
        Self {
            data: self.data,
            pos: offset,
        }
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos.checked_add(n).is_none_or(|end| end > self.data.len()) {
            return Err(Error::Truncated {
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Writer that builds a byte buffer. All writes are little-endian.
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_magic(&mut self, magic: &[u8; 4]) {
        self.buf.extend_from_slice(magic);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write the low `width` bytes of `v` (at most 4).
    pub fn write_uint(&mut self, v: u32, width: usize) {
        self.buf.extend_from_slice(&v.to_le_bytes()[..width.min(4)]);
    }

    /// Patch a u32 at a specific position (for backpatching sizes).
    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        let bytes = v.to_le_bytes();
        self.buf[pos..pos + 4].copy_from_slice(&bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_read_reports_truncation() {
        let mut c = Cursor::new(&[1, 2, 3]);
        let err = c.read_u32().unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                offset: 0,
                need: 4,
                have: 3
            }
        ));
        // Position is untouched by a failed read.
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn uint_reads_are_masked_to_width() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(Cursor::new(&data).read_uint(1).unwrap(), 0xFF);
        assert_eq!(Cursor::new(&data).read_uint(2).unwrap(), 0xFFFF);
        assert_eq!(Cursor::new(&data).read_uint(3).unwrap(), 0xFF_FFFF);
        assert_eq!(Cursor::new(&data).read_uint(4).unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn three_byte_uint_does_not_over_read() {
        // Only three bytes exist; a 4-byte read would fail.
        let mut c = Cursor::new(&[0x01, 0x02, 0x03]);
        assert_eq!(c.read_uint(3).unwrap(), 0x030201);
        assert!(c.is_empty());
    }

    #[test]
    fn cstr_stops_at_nul_or_end() {
        let data = b"hi\0world";
        let mut c = Cursor::new(data);
        assert_eq!(c.read_cstr().unwrap(), "hi");
        assert_eq!(c.position(), 3);
        assert_eq!(c.read_cstr().unwrap(), "world");
        assert!(c.is_empty());
    }

    #[test]
    fn cstr_past_end_is_truncated() {
        let mut c = Cursor::new(b"abc").at_offset(10);
        assert!(matches!(c.read_cstr(), Err(Error::Truncated { .. })));
    }

    #[test]
    fn writer_round_trips_through_cursor() {
        let mut w = Writer::new();
        w.write_magic(b"WDB5");
        w.write_u16(7);
        w.write_uint(0x00AB_CDEF, 3);
        w.write_u32(1.5f32.to_bits());
        let bytes = w.into_bytes();

        let mut c = Cursor::new(&bytes);
        assert_eq!(&c.read_magic().unwrap(), b"WDB5");
        assert_eq!(c.read_u16().unwrap(), 7);
        assert_eq!(c.read_uint(3).unwrap(), 0x00AB_CDEF);
        assert_eq!(f32::from_bits(c.read_uint(4).unwrap()), 1.5);
    }
}
