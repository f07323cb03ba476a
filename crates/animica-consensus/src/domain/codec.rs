//! # Canonical CBOR Codec
//!
//! A hand-rolled reader/writer over the small subset of CBOR major types
//! the consensus wire format actually uses (unsigned integers, byte
//! strings, text strings, definite-length arrays and maps). A generic CBOR
//! library round-trips correctly but does not reject non-canonical
//! encodings of the *same* value on decode (indefinite-length arrays,
//! non-minimal integers, duplicate or unsorted map keys all decode to an
//! identical Rust value through `serde`). Since every node must derive the
//! same header hash from the same logical header, canonicalness has to be
//! a decode-time invariant, not an encode-time habit — so decode here is
//! total only over the canonical subset and rejects everything else with
//! [`ConsensusError::MalformedEncoding`].
//!
//! Major type bytes: `0` = unsigned int, `2` = byte string, `3` = text
//! string, `4` = array, `5` = map. No floats, no tags (major type 6), no
//! indefinite lengths (additional info `31`).

use crate::domain::error::ConsensusError;

/// A cursor over canonical CBOR bytes.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ConsensusError> {
        if self.remaining() < n {
            return Err(ConsensusError::MalformedEncoding(
                "unexpected end of input".into(),
            ));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read one major-type header byte and its canonical length/value,
    /// rejecting indefinite lengths and non-minimal encodings.
    fn read_head(&mut self, expected_major: u8) -> Result<u64, ConsensusError> {
        let byte = *self.take(1)?.first().unwrap();
        let major = byte >> 5;
        let info = byte & 0x1f;

        if major != expected_major {
            return Err(ConsensusError::MalformedEncoding(format!(
                "expected major type {expected_major}, got {major}"
            )));
        }

        let value = match info {
            0..=23 => info as u64,
            24 => {
                let b = self.take(1)?[0];
                if b < 24 {
                    return Err(ConsensusError::MalformedEncoding(
                        "non-minimal 1-byte length".into(),
                    ));
                }
                b as u64
            }
            25 => {
                let bytes = self.take(2)?;
                let v = u16::from_be_bytes(bytes.try_into().unwrap()) as u64;
                if v <= u8::MAX as u64 {
                    return Err(ConsensusError::MalformedEncoding(
                        "non-minimal 2-byte length".into(),
                    ));
                }
                v
            }
            26 => {
                let bytes = self.take(4)?;
                let v = u32::from_be_bytes(bytes.try_into().unwrap()) as u64;
                if v <= u16::MAX as u64 {
                    return Err(ConsensusError::MalformedEncoding(
                        "non-minimal 4-byte length".into(),
                    ));
                }
                v
            }
            27 => {
                let bytes = self.take(8)?;
                let v = u64::from_be_bytes(bytes.try_into().unwrap());
                if v <= u32::MAX as u64 {
                    return Err(ConsensusError::MalformedEncoding(
                        "non-minimal 8-byte length".into(),
                    ));
                }
                v
            }
            31 => {
                return Err(ConsensusError::MalformedEncoding(
                    "indefinite length is not canonical".into(),
                ))
            }
            _ => {
                return Err(ConsensusError::MalformedEncoding(format!(
                    "reserved additional info {info}"
                )))
            }
        };

        Ok(value)
    }

    pub fn read_uint(&mut self) -> Result<u64, ConsensusError> {
        self.read_head(0)
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8], ConsensusError> {
        let len = self.read_head(2)? as usize;
        self.take(len)
    }

    pub fn read_fixed_bytes<const N: usize>(&mut self) -> Result<[u8; N], ConsensusError> {
        let slice = self.read_bytes()?;
        if slice.len() != N {
            return Err(ConsensusError::MalformedEncoding(format!(
                "expected {N}-byte string, got {}",
                slice.len()
            )));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_text(&mut self) -> Result<&'a str, ConsensusError> {
        let len = self.read_head(3)? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map_err(|_| ConsensusError::MalformedEncoding("text string is not UTF-8".into()))
    }

    pub fn read_array_header(&mut self) -> Result<u64, ConsensusError> {
        self.read_head(4)
    }

    pub fn read_map_header(&mut self) -> Result<u64, ConsensusError> {
        self.read_head(5)
    }
}

/// An append-only canonical CBOR writer.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_head(&mut self, major: u8, value: u64) {
        let prefix = major << 5;
        match value {
            0..=23 => self.buf.push(prefix | value as u8),
            24..=0xff => {
                self.buf.push(prefix | 24);
                self.buf.push(value as u8);
            }
            0x100..=0xffff => {
                self.buf.push(prefix | 25);
                self.buf.extend_from_slice(&(value as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buf.push(prefix | 26);
                self.buf.extend_from_slice(&(value as u32).to_be_bytes());
            }
            _ => {
                self.buf.push(prefix | 27);
                self.buf.extend_from_slice(&value.to_be_bytes());
            }
        }
    }

    pub fn write_uint(&mut self, value: u64) -> &mut Self {
        self.write_head(0, value);
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_head(2, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_text(&mut self, text: &str) -> &mut Self {
        self.write_head(3, text.len() as u64);
        self.buf.extend_from_slice(text.as_bytes());
        self
    }

    pub fn write_array_header(&mut self, len: u64) -> &mut Self {
        self.write_head(4, len);
        self
    }

    pub fn write_map_header(&mut self, len: u64) -> &mut Self {
        self.write_head(5, len);
        self
    }
}
