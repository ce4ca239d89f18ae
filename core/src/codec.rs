//! Fixed-offset binary encode/decode helpers.
//!
//! `bincode`'s default configuration is convenient for storage blobs but
//! does not guarantee the exact byte layout the header and transaction
//! formats require for stable hashing and signing across versions. These
//! helpers write/read primitives at the caller-specified offsets instead.

use crate::error::CoreError;

pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CoreError> {
        if self.remaining() < len {
            return Err(CoreError::InvalidSize {
                expected: self.pos + len,
                actual: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, CoreError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_i64(&mut self) -> Result<i64, CoreError> {
        let slice = self.take(8)?;
        Ok(i64::from_le_bytes(slice.try_into().unwrap()))
    }

    pub fn get_u32(&mut self) -> Result<u32, CoreError> {
        let slice = self.take(4)?;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], CoreError> {
        self.take(len)
    }

    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N], CoreError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn expect_exhausted(&self) -> Result<(), CoreError> {
        if self.remaining() != 0 {
            return Err(CoreError::InvalidSize {
                expected: self.pos,
                actual: self.buf.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_fields() {
        let mut w = Writer::with_capacity(32);
        w.put_u8(7);
        w.put_i64(-42);
        w.put_u32(1000);
        w.put_bytes(&[1, 2, 3]);
        let bytes = w.into_vec();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.get_u8().unwrap(), 7);
        assert_eq!(r.get_i64().unwrap(), -42);
        assert_eq!(r.get_u32().unwrap(), 1000);
        assert_eq!(r.get_bytes(3).unwrap(), &[1, 2, 3]);
        r.expect_exhausted().unwrap();
    }

    #[test]
    fn reading_past_end_errors() {
        let bytes = [0u8; 2];
        let mut r = Reader::new(&bytes);
        assert!(r.get_i64().is_err());
    }
}
