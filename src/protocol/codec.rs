//! Byte level reader and writer.
//!
//! Fixed-width integers are big-endian. Varints carry 7 bits per byte, least significant group
//! first, with the high bit as continuation flag. The two conventions are unrelated.
// https://kafka.apache.org/protocol.html#protocol_types

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::{ProtocolError, Result};

/// Maps a signed value onto an unsigned one so small magnitudes stay small.
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Cursor over an immutable byte source.
///
/// Every read consumes exactly the bytes it decodes or fails with
/// [`ProtocolError::UnexpectedEndOfInput`]. Fixed-width reads consume nothing on failure.
#[derive(Debug, Clone, Default)]
pub struct ByteReader {
    src: Bytes,
}

impl ByteReader {
    pub fn new(src: impl Into<Bytes>) -> Self {
        Self { src: src.into() }
    }

    pub fn remaining(&self) -> usize {
        self.src.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.src.has_remaining()
    }

    /// The unread part of the source, without consuming it.
    pub fn peek_remaining(&self) -> &[u8] {
        self.src.chunk()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.src.remaining() < needed {
            return Err(ProtocolError::UnexpectedEndOfInput {
                needed,
                remaining: self.src.remaining(),
            });
        }
        Ok(())
    }

    /// Fails with [`ProtocolError::DecodeSchemaMismatch`] if anything is left unread.
    pub fn expect_consumed(&self, what: &'static str) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::DecodeSchemaMismatch {
                what,
                residual: self.remaining(),
            })
        }
    }

    /// Splits off the next `len` bytes as a reader of their own.
    pub fn scope(&mut self, len: usize) -> Result<ByteReader> {
        Ok(ByteReader::new(self.read_raw(len)?))
    }

    pub fn read_raw(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(len)?;
        Ok(self.src.split_to(len))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.src.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        Ok(self.src.get_i8())
    }

    /// Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.src.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.src.get_i32())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.src.get_u32())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.src.get_i64())
    }

    pub fn read_uuid_bytes(&mut self) -> Result<[u8; 16]> {
        self.ensure(16)?;
        let mut uuid = [0u8; 16];
        self.src.copy_to_slice(&mut uuid);
        Ok(uuid)
    }

    /// UNSIGNED_VARINT of up to 64 bits.
    pub fn read_unsigned_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;

        loop {
            let byte = self.read_u8()?;
            // the tenth byte holds only bit 63
            if shift == 63 && byte & 0x7F > 1 {
                return Err(ProtocolError::MalformedVarint);
            }
            value |= u64::from(byte & 0x7F) << shift;

            if byte & 0x80 == 0 {
                return Ok(value);
            }

            shift += 7;
            if shift >= 64 {
                return Err(ProtocolError::MalformedVarint);
            }
        }
    }

    /// Zigzag encoded VARINT / VARLONG.
    pub fn read_signed_varint(&mut self) -> Result<i64> {
        Ok(zigzag_decode(self.read_unsigned_varint()?))
    }
}

/// Growable output buffer. Writes append exactly the encoded bytes, no padding.
#[derive(Debug, Default)]
pub struct ByteWriter {
    dst: BytesMut,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dst.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.dst
    }

    pub fn freeze(self) -> Bytes {
        self.dst.freeze()
    }

    pub fn write_raw(&mut self, src: &[u8]) {
        self.dst.put_slice(src);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.dst.put_u8(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.dst.put_i8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.dst.put_u8(v.into());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.dst.put_i16(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.dst.put_i32(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.dst.put_u32(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.dst.put_i64(v);
    }

    pub fn write_uuid_bytes(&mut self, uuid: &[u8; 16]) {
        self.dst.put_slice(uuid);
    }

    pub fn write_unsigned_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.dst.put_u8((value as u8) | 0x80);
            value >>= 7;
        }
        self.dst.put_u8(value as u8);
    }

    pub fn write_signed_varint(&mut self, value: i64) {
        self.write_unsigned_varint(zigzag_encode(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varint_bytes(n: u64) -> Bytes {
        let mut w = ByteWriter::new();
        w.write_unsigned_varint(n);
        w.freeze()
    }

    #[test]
    fn unsigned_varint_round_trip() {
        for n in [0, 1, 127, 128, 300, u32::MAX as u64, i64::MAX as u64, u64::MAX] {
            let mut r = ByteReader::new(varint_bytes(n));
            assert_eq!(r.read_unsigned_varint().unwrap(), n);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn unsigned_varint_layout() {
        assert_eq!(&varint_bytes(0)[..], &[0x00]);
        assert_eq!(&varint_bytes(127)[..], &[0x7f]);
        assert_eq!(&varint_bytes(128)[..], &[0x80, 0x01]);
        assert_eq!(&varint_bytes(300)[..], &[0xac, 0x02]);
        assert_eq!(varint_bytes(u64::MAX).len(), 10);
    }

    #[test]
    fn overlong_varint_is_malformed() {
        let mut r = ByteReader::new(vec![0xff; 10]);
        assert!(matches!(
            r.read_unsigned_varint(),
            Err(ProtocolError::MalformedVarint)
        ));

        let mut r = ByteReader::new(vec![0x80; 12]);
        assert!(matches!(
            r.read_unsigned_varint(),
            Err(ProtocolError::MalformedVarint)
        ));
    }

    #[test]
    fn tenth_byte_overflow_is_malformed() {
        let mut src = vec![0xff; 9];
        src.push(0x7f);
        let mut r = ByteReader::new(src);
        assert!(matches!(
            r.read_unsigned_varint(),
            Err(ProtocolError::MalformedVarint)
        ));

        let mut src = vec![0xff; 9];
        src.push(0x01);
        let mut r = ByteReader::new(src);
        assert_eq!(r.read_unsigned_varint().unwrap(), u64::MAX);
    }

    #[test]
    fn varint_cut_short() {
        let mut r = ByteReader::new(vec![0x80, 0x80]);
        assert!(matches!(
            r.read_unsigned_varint(),
            Err(ProtocolError::UnexpectedEndOfInput { needed: 1, remaining: 0 })
        ));
    }

    #[test]
    fn zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);

        for v in [0, -1, 1, -64, 64, i64::MIN, i64::MIN + 1, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);

            let mut w = ByteWriter::new();
            w.write_signed_varint(v);
            let mut r = ByteReader::new(w.freeze());
            assert_eq!(r.read_signed_varint().unwrap(), v);
        }
    }

    #[test]
    fn fixed_width_is_big_endian() {
        let mut w = ByteWriter::new();
        w.write_i16(0x0102);
        w.write_i32(-2);
        w.write_i64(7);
        assert_eq!(
            w.as_bytes(),
            &[1, 2, 0xff, 0xff, 0xff, 0xfe, 0, 0, 0, 0, 0, 0, 0, 7]
        );

        let mut r = ByteReader::new(w.freeze());
        assert_eq!(r.read_i16().unwrap(), 0x0102);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert_eq!(r.read_i64().unwrap(), 7);
        assert!(r.is_empty());
    }

    #[test]
    fn short_read_consumes_nothing() {
        let mut r = ByteReader::new(vec![0, 1, 2]);
        assert!(matches!(
            r.read_i32(),
            Err(ProtocolError::UnexpectedEndOfInput { needed: 4, remaining: 3 })
        ));
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.read_i16().unwrap(), 1);
    }

    #[test]
    fn scope_and_residual() {
        let mut r = ByteReader::new(vec![0, 0, 0, 9, 0xaa, 0xbb]);
        let mut inner = r.scope(4).unwrap();
        assert_eq!(r.remaining(), 2);
        assert_eq!(inner.read_i16().unwrap(), 0);
        assert!(matches!(
            inner.expect_consumed("test"),
            Err(ProtocolError::DecodeSchemaMismatch { residual: 2, .. })
        ));
        assert_eq!(inner.read_i16().unwrap(), 9);
        assert!(inner.expect_consumed("test").is_ok());
        assert!(r.scope(3).is_err());
    }
}
