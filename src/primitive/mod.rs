//! Byte-order-aware primitive codec.
//!
//! [`BinaryReader`] and [`BinaryWriter`] wrap any `Read`/`Write` and move
//! strictly forward: no buffering, no seeking.  They work the same over an
//! in-memory slice, a `File`, or a socket.
//!
//! # Byte order
//! The Cross-Spectrum format is big-endian throughout.  The other orders exist
//! so the codec stays usable as a general utility.
//!
//! # Errors
//! A short read is always [`DecodeError::TruncatedInput`] carrying the offset
//! of the field that could not be completed, never a silent short value.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use serde::{Serialize, Serializer};

use crate::error::{DecodeError, EncodeError, ShapeError};

/// Byte order applied to every multi-byte scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
    /// Network order; identical to `Big`.
    Network,
    /// Host order of the running machine.
    Native,
}

// ── Dispatch helpers ─────────────────────────────────────────────────────────

macro_rules! with_order {
    ($order:expr, $method:ident ( $($arg:expr),* )) => {
        match $order {
            Endianness::Big | Endianness::Network => BigEndian::$method($($arg),*),
            Endianness::Little                    => LittleEndian::$method($($arg),*),
            Endianness::Native                    => NativeEndian::$method($($arg),*),
        }
    };
}

macro_rules! read_numeric {
    ($ty:ty, $width:expr, $scalar:ident, $vec:ident, $read:ident, $read_into:ident) => {
        #[doc = concat!("Read one `", stringify!($ty), "`.")]
        pub fn $scalar(&mut self) -> Result<$ty, DecodeError> {
            let mut buf = [0u8; $width];
            self.fill(&mut buf)?;
            Ok(with_order!(self.order, $read(&buf)))
        }

        #[doc = concat!("Read `count` contiguous `", stringify!($ty), "` values.")]
        pub fn $vec(&mut self, count: usize) -> Result<Vec<$ty>, DecodeError> {
            let len = count
                .checked_mul($width)
                .ok_or(ShapeError::Overflow { rows: count, columns: $width })?;
            let raw = self.read_bytes(len)?;
            let mut out = vec![<$ty>::default(); count];
            with_order!(self.order, $read_into(&raw, &mut out));
            Ok(out)
        }
    };
}

macro_rules! write_numeric {
    ($ty:ty, $width:expr, $scalar:ident, $slice:ident, $write:ident, $write_into:ident) => {
        #[doc = concat!("Write one `", stringify!($ty), "`.")]
        pub fn $scalar(&mut self, value: $ty) -> Result<(), EncodeError> {
            let mut buf = [0u8; $width];
            with_order!(self.order, $write(&mut buf, value));
            self.put(&buf)
        }

        #[doc = concat!("Write a contiguous run of `", stringify!($ty), "` values.")]
        pub fn $slice(&mut self, values: &[$ty]) -> Result<(), EncodeError> {
            let mut buf = vec![0u8; values.len() * $width];
            with_order!(self.order, $write_into(values, &mut buf));
            self.put(&buf)
        }
    };
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Sequential decoder over any byte source.
pub struct BinaryReader<R> {
    inner:    R,
    order:    Endianness,
    position: u64,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R, order: Endianness) -> Self {
        Self { inner, order, position: 0 }
    }

    /// Absolute number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn order(&self) -> Endianness {
        self.order
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(DecodeError::TruncatedInput { offset: self.position, needed: buf.len() })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    /// One byte; any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8_vec(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        self.read_bytes(count)
    }

    pub fn read_i8_vec(&mut self, count: usize) -> Result<Vec<i8>, DecodeError> {
        Ok(self.read_bytes(count)?.into_iter().map(|b| b as i8).collect())
    }

    pub fn read_bool_vec(&mut self, count: usize) -> Result<Vec<bool>, DecodeError> {
        Ok(self.read_bytes(count)?.into_iter().map(|b| b != 0).collect())
    }

    read_numeric!(i16, 2, read_i16, read_i16_vec, read_i16, read_i16_into);
    read_numeric!(u16, 2, read_u16, read_u16_vec, read_u16, read_u16_into);
    read_numeric!(i32, 4, read_i32, read_i32_vec, read_i32, read_i32_into);
    read_numeric!(u32, 4, read_u32, read_u32_vec, read_u32, read_u32_into);
    read_numeric!(i64, 8, read_i64, read_i64_vec, read_i64, read_i64_into);
    read_numeric!(u64, 8, read_u64, read_u64_vec, read_u64, read_u64_into);
    read_numeric!(f32, 4, read_f32, read_f32_vec, read_f32, read_f32_into);
    read_numeric!(f64, 8, read_f64, read_f64_vec, read_f64, read_f64_into);

    /// Read exactly `len` raw bytes.
    ///
    /// The buffer grows with what the source actually yields, so a corrupt
    /// length field cannot force a huge allocation up front.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        let offset = self.position;
        let mut out = Vec::new();
        let got = (&mut self.inner).take(len as u64).read_to_end(&mut out)?;
        self.position += got as u64;
        if got < len {
            return Err(DecodeError::TruncatedInput { offset, needed: len });
        }
        Ok(out)
    }

    /// Read a fixed-width ASCII string of `len` bytes.
    pub fn read_string(&mut self, len: usize) -> Result<String, DecodeError> {
        let offset = self.position;
        let raw = self.read_bytes(len)?;
        if !raw.is_ascii() {
            return Err(DecodeError::Encoding { offset, bytes: raw });
        }
        // ASCII is always valid UTF-8.
        String::from_utf8(raw).map_err(|e| DecodeError::Encoding {
            offset,
            bytes: e.into_bytes(),
        })
    }

    pub fn read_fourcc(&mut self) -> Result<FourCc, DecodeError> {
        let offset = self.position;
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        FourCc::from_bytes(buf).ok_or_else(|| DecodeError::Encoding {
            offset,
            bytes: buf.to_vec(),
        })
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Sequential encoder over any byte sink.
pub struct BinaryWriter<W> {
    inner:    W,
    order:    Endianness,
    position: u64,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W, order: Endianness) -> Self {
        Self { inner, order, position: 0 }
    }

    /// Absolute number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn order(&self) -> Endianness {
        self.order
    }

    pub fn flush(&mut self) -> Result<(), EncodeError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn put(&mut self, buf: &[u8]) -> Result<(), EncodeError> {
        self.inner.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), EncodeError> {
        self.put(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<(), EncodeError> {
        self.put(&[value as u8])
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), EncodeError> {
        self.put(&[u8::from(value)])
    }

    pub fn write_i8_slice(&mut self, values: &[i8]) -> Result<(), EncodeError> {
        let raw: Vec<u8> = values.iter().map(|&v| v as u8).collect();
        self.put(&raw)
    }

    pub fn write_bool_slice(&mut self, values: &[bool]) -> Result<(), EncodeError> {
        let raw: Vec<u8> = values.iter().map(|&v| u8::from(v)).collect();
        self.put(&raw)
    }

    write_numeric!(i16, 2, write_i16, write_i16_slice, write_i16, write_i16_into);
    write_numeric!(u16, 2, write_u16, write_u16_slice, write_u16, write_u16_into);
    write_numeric!(i32, 4, write_i32, write_i32_slice, write_i32, write_i32_into);
    write_numeric!(u32, 4, write_u32, write_u32_slice, write_u32, write_u32_into);
    write_numeric!(i64, 8, write_i64, write_i64_slice, write_i64, write_i64_into);
    write_numeric!(u64, 8, write_u64, write_u64_slice, write_u64, write_u64_into);
    write_numeric!(f32, 4, write_f32, write_f32_slice, write_f32, write_f32_into);
    write_numeric!(f64, 8, write_f64, write_f64_slice, write_f64, write_f64_into);

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.put(bytes)
    }

    /// Write `value` as exactly `width` ASCII bytes.
    pub fn write_string(&mut self, value: &str, width: usize) -> Result<(), EncodeError> {
        if !value.is_ascii() || value.len() != width {
            return Err(EncodeError::Encoding { value: value.to_string(), width });
        }
        self.put(value.as_bytes())
    }

    pub fn write_fourcc(&mut self, code: FourCc) -> Result<(), EncodeError> {
        self.put(code.as_bytes())
    }
}

// ── FourCc ───────────────────────────────────────────────────────────────────

/// Four ASCII characters: site codes, type codes and block keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// `None` unless all four bytes are ASCII.
    pub const fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        if bytes[0].is_ascii() && bytes[1].is_ascii() && bytes[2].is_ascii() && bytes[3].is_ascii() {
            Some(Self(bytes))
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for FourCc {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| EncodeError::Encoding { value: s.to_string(), width: 4 })?;
        Self::from_bytes(bytes).ok_or_else(|| EncodeError::Encoding { value: s.to_string(), width: 4 })
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({:?})", self.as_str())
    }
}

impl Serialize for FourCc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_scalars() {
        let data = [0x00, 0x06, 0xFF, 0xFF, 0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00];
        let mut r = BinaryReader::new(&data[..], Endianness::Big);
        assert_eq!(r.read_i16().unwrap(), 6);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert_eq!(r.read_f32().unwrap(), 1.0);
        assert_eq!(r.position(), 10);
    }

    #[test]
    fn little_endian_and_network() {
        let data = [0x01, 0x00, 0x00, 0x00];
        let mut le = BinaryReader::new(&data[..], Endianness::Little);
        assert_eq!(le.read_u32().unwrap(), 1);
        let mut net = BinaryReader::new(&data[..], Endianness::Network);
        assert_eq!(net.read_u32().unwrap(), 0x0100_0000);
    }

    #[test]
    fn vector_read_matches_scalars() {
        let mut buf = Vec::new();
        {
            let mut w = BinaryWriter::new(&mut buf, Endianness::Big);
            w.write_f32_slice(&[1.5, -2.0, 3.25]).unwrap();
            w.write_u16_slice(&[7, 8]).unwrap();
            assert_eq!(w.position(), 16);
        }
        let mut r = BinaryReader::new(&buf[..], Endianness::Big);
        assert_eq!(r.read_f32_vec(3).unwrap(), vec![1.5, -2.0, 3.25]);
        assert_eq!(r.read_u16_vec(2).unwrap(), vec![7, 8]);
    }

    #[test]
    fn truncated_scalar_reports_offset() {
        let data = [0x00, 0x06, 0x00];
        let mut r = BinaryReader::new(&data[..], Endianness::Big);
        r.read_i16().unwrap();
        match r.read_u32() {
            Err(DecodeError::TruncatedInput { offset, needed }) => {
                assert_eq!(offset, 2);
                assert_eq!(needed, 4);
            }
            other => panic!("expected TruncatedInput, got {other:?}"),
        }
    }

    #[test]
    fn truncated_bytes_do_not_overallocate() {
        let data = [1u8, 2, 3];
        let mut r = BinaryReader::new(&data[..], Endianness::Big);
        let err = r.read_bytes(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedInput { offset: 0, .. }));
    }

    #[test]
    fn strings_must_be_ascii() {
        let data = [b'A', b'S', 0xC3, b'A'];
        let mut r = BinaryReader::new(&data[..], Endianness::Big);
        assert!(matches!(r.read_string(4), Err(DecodeError::Encoding { offset: 0, .. })));

        let mut out = Vec::new();
        let mut w = BinaryWriter::new(&mut out, Endianness::Big);
        assert!(w.write_string("ASSA", 4).is_ok());
        assert!(matches!(w.write_string("ASS", 4), Err(EncodeError::Encoding { .. })));
        assert!(matches!(w.write_string("ÅSSA", 4), Err(EncodeError::Encoding { .. })));
    }

    #[test]
    fn fourcc_parse_and_display() {
        let code: FourCc = "CSSW".parse().unwrap();
        assert_eq!(code.to_string(), "CSSW");
        assert_eq!(code.as_bytes(), b"CSSW");
        assert!("CSS".parse::<FourCc>().is_err());
        assert!(FourCc::from_bytes([b'a', b'b', b'c', 0xFF]).is_none());
    }

    #[test]
    fn bools_and_bytes() {
        let data = [0x00, 0x02, 0xAB, 0xCD];
        let mut r = BinaryReader::new(&data[..], Endianness::Big);
        assert_eq!(r.read_bool_vec(2).unwrap(), vec![false, true]);
        assert_eq!(r.read_bytes(2).unwrap(), vec![0xAB, 0xCD]);
    }
}
