// Serialization utilities for Bitcoin data structures

use crate::error::{Result, WireError};
use std::io::{self, Cursor, Read, Write};

/// Upper bound on speculative allocation driven by a length read off the wire
const MAX_PREALLOC: usize = 64 * 1024;

/// Trait for types with a consensus byte encoding
pub trait Serializable: Sized {
    fn serialize(&self) -> Vec<u8>;
    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self>;

    /// Decode a complete buffer. Bytes left over after the value are an error.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let value = Self::deserialize(&mut cursor)?;
        let consumed = cursor.position() as usize;
        if consumed != data.len() {
            return Err(WireError::UnexpectedData {
                context: "payload",
                detail: format!("{} trailing bytes", data.len() - consumed),
            });
        }
        Ok(value)
    }
}

/// Read exactly `len` bytes, reporting a short read against `field`
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, len: usize, field: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    Read::take(&mut *reader, len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(WireError::Length {
            field,
            expected: len,
            actual: buf.len(),
        });
    }
    Ok(buf)
}

/// Read a fixed-size array
pub fn read_array<const N: usize, R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<[u8; N]> {
    let bytes = read_bytes(reader, N, field)?;
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes);
    Ok(array)
}

pub fn read_u32_le<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(reader, field)?))
}

pub fn read_i32_le<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<i32> {
    Ok(i32::from_le_bytes(read_array(reader, field)?))
}

pub fn read_u64_le<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(reader, field)?))
}

pub fn read_i64_le<R: Read + ?Sized>(reader: &mut R, field: &'static str) -> Result<i64> {
    Ok(i64::from_le_bytes(read_array(reader, field)?))
}

/// Interpret 1 to 8 bytes as a little-endian unsigned integer
pub fn little_endian_to_int(bytes: &[u8]) -> Result<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(WireError::Length {
            field: "little-endian integer",
            expected: 8,
            actual: bytes.len(),
        });
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

/// Encode `value` as exactly `width` little-endian bytes
pub fn int_to_little_endian(value: u64, width: usize) -> Result<Vec<u8>> {
    if width == 0 || width > 8 {
        return Err(WireError::Encode {
            field: "little-endian integer",
            detail: format!("unsupported width {}", width),
        });
    }
    if width < 8 && value >> (8 * width) != 0 {
        return Err(WireError::Encode {
            field: "little-endian integer",
            detail: format!("{} does not fit in {} bytes", value, width),
        });
    }
    Ok(value.to_le_bytes()[..width].to_vec())
}

/// Write a variable-length integer (VarInt)
/// Bitcoin uses a compact format for integers
pub fn write_varint<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&encode_varint(value))
}

/// VarInt encoding of `value` using the smallest prefix class
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(varint_size(value));
    match value {
        0..=0xfc => buf.push(value as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x10000..=0xffffffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
    buf
}

/// Encoded size of `value` as a VarInt
pub fn varint_size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffffffff => 5,
        _ => 9,
    }
}

/// Read a variable-length integer (VarInt)
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let [first_byte] = read_array::<1, _>(reader, "varint")?;

    match first_byte {
        0..=0xfc => Ok(first_byte as u64),
        0xfd => Ok(u16::from_le_bytes(read_array(reader, "varint")?) as u64),
        0xfe => Ok(u32::from_le_bytes(read_array(reader, "varint")?) as u64),
        0xff => Ok(u64::from_le_bytes(read_array(reader, "varint")?)),
    }
}

/// Read a VarInt count and reject it if it exceeds `max`
pub fn read_count<R: Read + ?Sized>(reader: &mut R, field: &'static str, max: usize) -> Result<usize> {
    let count = read_varint(reader)?;
    if count > max as u64 {
        return Err(WireError::invalid(field, format!("count {} exceeds limit {}", count, max)));
    }
    Ok(count as usize)
}

/// Write bytes with length prefix (VarInt length + data)
pub fn write_var_bytes<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    write_varint(writer, data.len() as u64)?;
    writer.write_all(data)?;
    Ok(())
}

/// Append a VarInt length and `data` to an in-memory buffer
pub fn push_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend(encode_varint(data.len() as u64));
    buf.extend_from_slice(data);
}

/// Read bytes with length prefix, at most `max` long
pub fn read_var_bytes<R: Read + ?Sized>(reader: &mut R, field: &'static str, max: usize) -> Result<Vec<u8>> {
    let len = read_count(reader, field, max)?;
    read_bytes(reader, len, field)
}

/// Read a length-prefixed UTF-8 string
pub fn read_var_string<R: Read + ?Sized>(reader: &mut R, field: &'static str, max: usize) -> Result<String> {
    let bytes = read_var_bytes(reader, field, max)?;
    String::from_utf8(bytes).map_err(|e| WireError::invalid(field, e.to_string()))
}

/// Pack bits LSB-first into bytes. The bit count must be a multiple of 8.
pub fn bit_field_to_bytes(bits: &[bool]) -> Result<Vec<u8>> {
    if bits.len() % 8 != 0 {
        return Err(WireError::Length {
            field: "bit field",
            expected: bits.len().next_multiple_of(8),
            actual: bits.len(),
        });
    }

    Ok(bits
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit as u8) << i))
        })
        .collect())
}

/// Unpack bytes into bits, LSB-first within each byte
pub fn bytes_to_bit_field(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_small() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 100).unwrap();
        assert_eq!(buf, vec![100]);

        let mut cursor = Cursor::new(buf);
        let value = read_varint(&mut cursor).unwrap();
        assert_eq!(value, 100);
    }

    #[test]
    fn test_varint_medium() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 1000).unwrap();
        assert_eq!(buf, vec![0xfd, 0xe8, 0x03]);

        let mut cursor = Cursor::new(buf);
        let value = read_varint(&mut cursor).unwrap();
        assert_eq!(value, 1000);
    }

    #[test]
    fn test_varint_large() {
        let buf = encode_varint(100000);
        assert_eq!(buf.len(), 5); // 0xfe + 4 bytes

        let mut cursor = Cursor::new(buf);
        let value = read_varint(&mut cursor).unwrap();
        assert_eq!(value, 100000);
    }

    #[test]
    fn test_varint_prefix_boundaries() {
        let cases: [(u64, usize); 8] = [
            (0xfc, 1),
            (0xfd, 3),
            (0xffff, 3),
            (0x10000, 5),
            (0xffff_ffff, 5),
            (0x1_0000_0000, 9),
            (u64::MAX, 9),
            (0, 1),
        ];
        for (value, size) in cases {
            let encoded = encode_varint(value);
            assert_eq!(encoded.len(), size, "size of {:#x}", value);
            assert_eq!(varint_size(value), size);
            assert_eq!(read_varint(&mut Cursor::new(encoded)).unwrap(), value);
        }
    }

    #[test]
    fn test_varint_truncated() {
        let err = read_varint(&mut Cursor::new(vec![0xfe, 0x01, 0x02])).unwrap_err();
        assert!(matches!(
            err,
            WireError::Length {
                field: "varint",
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_var_bytes() {
        let data = b"hello world";
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, data).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = read_var_bytes(&mut cursor, "data", 64).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_push_var_bytes_matches_writer() {
        let data = vec![0x5a; 300];
        let mut written = Vec::new();
        write_var_bytes(&mut written, &data).unwrap();

        let mut pushed = vec![0x01];
        push_var_bytes(&mut pushed, &data);
        assert_eq!(pushed[0], 0x01);
        assert_eq!(&pushed[1..4], &[0xfd, 0x2c, 0x01]);
        assert_eq!(pushed[1..], written[..]);
    }

    #[test]
    fn test_var_bytes_over_limit() {
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, &[0u8; 10]).unwrap();
        assert!(read_var_bytes(&mut Cursor::new(buf), "data", 9).is_err());
    }

    #[test]
    fn test_little_endian_round_trip() {
        let bytes = int_to_little_endian(1_000_000, 4).unwrap();
        assert_eq!(bytes, vec![0x40, 0x42, 0x0f, 0x00]);
        assert_eq!(little_endian_to_int(&bytes).unwrap(), 1_000_000);

        assert_eq!(little_endian_to_int(&[0x01, 0x00]).unwrap(), 1);
        assert_eq!(little_endian_to_int(&[0x00, 0x01]).unwrap(), 256);
    }

    #[test]
    fn test_int_to_little_endian_overflow() {
        assert!(int_to_little_endian(256, 1).is_err());
        assert!(int_to_little_endian(255, 1).is_ok());
        assert!(int_to_little_endian(1, 9).is_err());
        assert!(little_endian_to_int(&[0u8; 9]).is_err());
    }

    #[test]
    fn test_bit_field_packing() {
        let bits = [
            true, false, false, false, false, false, false, false, // 0x01
            false, true, false, true, false, false, false, true, // 0x8a
        ];
        let bytes = bit_field_to_bytes(&bits).unwrap();
        assert_eq!(bytes, vec![0x01, 0x8a]);
        assert_eq!(bytes_to_bit_field(&bytes), bits.to_vec());
    }

    #[test]
    fn test_bit_field_not_aligned() {
        let err = bit_field_to_bytes(&[true; 9]).unwrap_err();
        assert!(matches!(
            err,
            WireError::Length {
                expected: 16,
                actual: 9,
                ..
            }
        ));
    }

    #[test]
    fn test_from_bytes_rejects_trailing() {
        struct Byte(u8);
        impl Serializable for Byte {
            fn serialize(&self) -> Vec<u8> {
                vec![self.0]
            }
            fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
                let [b] = read_array::<1, _>(reader, "byte")?;
                Ok(Byte(b))
            }
        }

        assert_eq!(Byte::from_bytes(&[7]).unwrap().0, 7);
        assert!(matches!(
            Byte::from_bytes(&[7, 8]),
            Err(WireError::UnexpectedData { .. })
        ));
    }
}
