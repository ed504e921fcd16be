use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use super::codec::{ByteReader, ByteWriter};
use super::error::{ProtocolError, Result};

// https://kafka.apache.org/protocol.html#protocol_types

pub trait Serialize {
    fn serialize(&self, dst: &mut ByteWriter);
}

pub trait Deserialize: Sized {
    fn deserialize(src: &mut ByteReader) -> Result<Self>;
}

impl Serialize for i32 {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i32(*self);
    }
}

impl Deserialize for i32 {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        src.read_i32()
    }
}

/// Converts a wire length into an in-memory one.
fn to_len(len: u64) -> Result<usize> {
    usize::try_from(len).map_err(|_| ProtocolError::InvalidLength(len as i64))
}

/// Represents a sequence of characters or null. For non-null strings, first the length N is given
/// as an INT16. Then N bytes follow which are the UTF-8 encoding of the character sequence.
/// A null value is encoded with length of -1 and there are no following bytes.
pub struct NullableString;

impl NullableString {
    /// Fails with [`ProtocolError::InvalidLength`], writing nothing, if `s` is longer than
    /// `i16::MAX` bytes.
    pub fn serialize(dst: &mut ByteWriter, s: Option<&str>) -> Result<()> {
        match s {
            Some(s) => {
                let len = i16::try_from(s.len())
                    .map_err(|_| ProtocolError::InvalidLength(s.len() as i64))?;
                dst.write_i16(len);
                dst.write_raw(s.as_bytes());
            }
            None => dst.write_i16(-1),
        }
        Ok(())
    }

    pub fn deserialize(src: &mut ByteReader) -> Result<Option<String>> {
        let len = src.read_i16()?;
        match len {
            -1 => Ok(None),
            0.. => {
                let bytes = src.read_raw(len as usize)?;
                Ok(Some(String::from_utf8(bytes.to_vec())?))
            }
            _ => Err(ProtocolError::InvalidLength(len.into())),
        }
    }
}

/// Represents a sequence of characters. First the length N + 1 is given as an UNSIGNED_VARINT.
/// Then N bytes follow which are the UTF-8 encoding of the character sequence.
/// A null string is represented with a length of 0.
pub struct CompactString;

impl CompactString {
    pub fn serialize(dst: &mut ByteWriter, s: Option<&str>) {
        CompactBytes::serialize(dst, s.map(str::as_bytes));
    }

    pub fn deserialize(src: &mut ByteReader) -> Result<Option<String>> {
        CompactBytes::deserialize(src)?
            .map(|bytes| String::from_utf8(bytes.to_vec()).map_err(ProtocolError::from))
            .transpose()
    }
}

/// Raw bytes with an N + 1 UNSIGNED_VARINT length; 0 is null.
/// Used for record keys, header values and the `records` field of fetch responses.
pub struct CompactBytes;

impl CompactBytes {
    pub fn serialize(dst: &mut ByteWriter, b: Option<&[u8]>) {
        match b {
            Some(b) => {
                dst.write_unsigned_varint(b.len() as u64 + 1);
                dst.write_raw(b);
            }
            None => dst.write_unsigned_varint(0),
        }
    }

    pub fn deserialize(src: &mut ByteReader) -> Result<Option<Bytes>> {
        match src.read_unsigned_varint()? {
            0 => Ok(None),
            len => Ok(Some(src.read_raw(to_len(len - 1)?)?)),
        }
    }
}

/// Represents a sequence of objects of a given type T. Type T can be either a primitive type
/// (e.g. STRING) or a structure. First, the length N + 1 is given as an UNSIGNED_VARINT.
/// Then N instances of type T follow. A null array is represented with a length of 0.
pub struct CompactArray;

impl CompactArray {
    pub fn serialize<T>(
        dst: &mut ByteWriter,
        items: Option<&[T]>,
        mut item: impl FnMut(&T, &mut ByteWriter),
    ) {
        // N+1, because null array is represented as 0, empty array (actual length of 0) is represented as 1
        let Some(items) = items else {
            dst.write_unsigned_varint(0);
            return;
        };

        dst.write_unsigned_varint(items.len() as u64 + 1);
        for i in items {
            item(i, dst);
        }
    }

    pub fn deserialize<T>(
        src: &mut ByteReader,
        item: impl FnMut(&mut ByteReader) -> Result<T>,
    ) -> Result<Option<Vec<T>>> {
        match src.read_unsigned_varint()? {
            0 => Ok(None),
            len => read_items(src, to_len(len - 1)?, item).map(Some),
        }
    }
}

/// Legacy array with an INT32 count, -1 meaning null. Only the log format still uses it.
pub struct Array;

impl Array {
    /// Fails with [`ProtocolError::InvalidLength`], writing nothing, if there are more than
    /// `i32::MAX` items.
    pub fn serialize<T>(
        dst: &mut ByteWriter,
        items: Option<&[T]>,
        mut item: impl FnMut(&T, &mut ByteWriter),
    ) -> Result<()> {
        let Some(items) = items else {
            dst.write_i32(-1);
            return Ok(());
        };

        let len = i32::try_from(items.len())
            .map_err(|_| ProtocolError::InvalidLength(items.len() as i64))?;
        dst.write_i32(len);
        for i in items {
            item(i, dst);
        }
        Ok(())
    }

    pub fn deserialize<T>(
        src: &mut ByteReader,
        item: impl FnMut(&mut ByteReader) -> Result<T>,
    ) -> Result<Option<Vec<T>>> {
        match src.read_i32()? {
            -1 => Ok(None),
            len @ 0.. => read_items(src, len as usize, item).map(Some),
            len => Err(ProtocolError::InvalidLength(len.into())),
        }
    }
}

fn read_items<T>(
    src: &mut ByteReader,
    count: usize,
    mut item: impl FnMut(&mut ByteReader) -> Result<T>,
) -> Result<Vec<T>> {
    // every item takes at least one byte, so a bogus count cannot make us allocate more than the input
    let mut items = Vec::with_capacity(count.min(src.remaining()));
    for _ in 0..count {
        items.push(item(src)?);
    }
    Ok(items)
}

/// Tagged fields are optional fields introduced over time
/// (https://cwiki.apache.org/confluence/display/KAFKA/KIP-482%3A+The+Kafka+Protocol+should+Support+Optional+Tagged+Fields).
/// Only the empty tagged field array, a single 0x00 byte, is supported.
pub struct TaggedFields;

impl TaggedFields {
    pub fn skip(src: &mut ByteReader) -> Result<()> {
        match src.read_unsigned_varint()? {
            0 => Ok(()),
            count => Err(ProtocolError::UnsupportedTaggedFields { count }),
        }
    }

    pub fn write_empty(dst: &mut ByteWriter) {
        dst.write_unsigned_varint(0);
    }
}

/// 16 raw bytes, no length prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Uuid([u8; 16]);

impl Uuid {
    pub const NIL: Uuid = Uuid([0; 16]);

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl Serialize for Uuid {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_uuid_bytes(&self.0);
    }
}

impl Deserialize for Uuid {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        src.read_uuid_bytes().map(Self)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..]
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Uuid {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s.replace('-', ""), &mut bytes)?;
        Ok(Self(bytes))
    }
}
