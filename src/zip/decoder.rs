//! Little-endian field decoding over an in-memory window.
//!
//! ZIP records are runs of fixed-width little-endian integers followed by
//! variable-length byte strings. [`FieldReader`] walks such a record,
//! advancing past each field as it's consumed, and refuses to read past the
//! end of the window instead of panicking.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

/// A read needed more bytes than were left in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("needed {needed} bytes but only {remaining} remain")]
pub struct OutOfBounds {
    pub needed: usize,
    pub remaining: usize,
}

/// Cursor over a byte window that yields little-endian fields.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    fn ensure(&self, needed: usize) -> Result<(), OutOfBounds> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(OutOfBounds { needed, remaining });
        }
        Ok(())
    }

    // The explicit length check above makes the byteorder reads infallible;
    // mapping their error keeps us honest if that ever stops being true.
    fn short(&self, needed: usize) -> OutOfBounds {
        OutOfBounds {
            needed,
            remaining: self.remaining(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, OutOfBounds> {
        self.ensure(1)?;
        self.cursor.read_u8().map_err(|_| self.short(1))
    }

    pub fn read_u16(&mut self) -> Result<u16, OutOfBounds> {
        self.ensure(2)?;
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| self.short(2))
    }

    pub fn read_u32(&mut self) -> Result<u32, OutOfBounds> {
        self.ensure(4)?;
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| self.short(4))
    }

    pub fn read_u64(&mut self) -> Result<u64, OutOfBounds> {
        self.ensure(8)?;
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| self.short(8))
    }

    pub fn skip(&mut self, n: usize) -> Result<&mut Self, OutOfBounds> {
        self.ensure(n)?;
        self.cursor.set_position((self.position() + n) as u64);
        Ok(self)
    }

    /// Split off the next `n` bytes as their own reader.
    pub fn sub(&mut self, n: usize) -> Result<FieldReader<'a>, OutOfBounds> {
        let bytes = self.take(n)?;
        Ok(FieldReader::new(bytes))
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], OutOfBounds> {
        self.ensure(n)?;
        let start = self.position();
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + n) as u64);
        Ok(&data[start..start + n])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_little_endian_and_advances() {
        let data = [
            0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 1, 0, 0, 0, 0, 0, 0, 0x80,
        ];
        let mut r = FieldReader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(r.read_u64().unwrap(), 0x8000_0000_0000_0001);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn short_reads_fail_without_moving() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut r = FieldReader::new(&data);
        assert_eq!(
            r.read_u32().unwrap_err(),
            OutOfBounds {
                needed: 4,
                remaining: 3
            }
        );
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u16().unwrap(), 0xBBAA);
        assert!(r.read_u16().is_err());
        assert_eq!(r.read_u8().unwrap(), 0xCC);
        assert!(r.read_u8().is_err());
    }

    #[test]
    fn skip_and_sub() {
        let data = [1, 2, 3, 4, 5, 6];
        let mut r = FieldReader::new(&data);
        r.skip(1).unwrap();
        let mut inner = r.sub(3).unwrap();
        assert_eq!(inner.read_u8().unwrap(), 2);
        assert_eq!(inner.remaining(), 2);
        assert_eq!(r.take(2).unwrap(), &[5, 6]);
        assert!(r.skip(1).is_err());
        assert!(r.sub(1).is_err());
    }
}
