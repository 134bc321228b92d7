//! Byte-level helpers shared by the component files.
//!
//! Every file starts with:
//!
//! ```text
//! [magic: 8 bytes][version: u32 LE]
//! ```
//!
//! All integers and floats are little-endian.

use crate::error::{Error, Result};

/// Current on-disk format version of every component.
pub(crate) const FORMAT_VERSION: u32 = 1;

pub(crate) const PROPERTY_MAGIC: &[u8; 8] = b"PRXPROP\0";
pub(crate) const OBJECTS_MAGIC: &[u8; 8] = b"PRXOBJS\0";
pub(crate) const GRAPH_MAGIC: &[u8; 8] = b"PRXGRPH\0";
pub(crate) const TREE_MAGIC: &[u8; 8] = b"PRXTREE\0";

/// Append-only encoder for one component file.
pub(crate) struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub(crate) fn new(magic: &[u8; 8]) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(magic);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        Self { buf }
    }

    pub(crate) fn reserve(&mut self, additional: usize) -> Result<()> {
        self.buf.try_reserve(additional)?;
        Ok(())
    }

    pub(crate) fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked reader over a whole component file.
///
/// Every failure is a [`Error::CorruptIndex`] naming the file.
pub(crate) struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    file: &'static str,
}

impl<'a> Decoder<'a> {
    /// Checks the header and positions the decoder on the body.
    pub(crate) fn open(bytes: &'a [u8], magic: &[u8; 8], file: &'static str) -> Result<Self> {
        let mut decoder = Self {
            bytes,
            pos: 0,
            file,
        };
        if decoder.take(magic.len())? != magic {
            return Err(decoder.corrupt("unknown file magic"));
        }
        let version = decoder.u32()?;
        if version != FORMAT_VERSION {
            return Err(decoder.corrupt(&format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        Ok(decoder)
    }

    pub(crate) fn corrupt(&self, message: &str) -> Error {
        Error::CorruptIndex(format!("{}: {message}", self.file))
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| self.corrupt("unexpected end of file"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub(crate) fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Unread remainder of the file.
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails if bytes remain after the body.
    pub(crate) fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(self.corrupt(&format!("{} trailing bytes", self.remaining())));
        }
        Ok(())
    }
}

/// Decodes a `bincode` body that must span the rest of the file exactly.
pub(crate) fn decode_bincode<T>(decoder: &mut Decoder<'_>) -> Result<T>
where
    T: serde::de::DeserializeOwned + serde::Serialize,
{
    let body = decoder.rest();
    let value: T = bincode::deserialize(body)
        .map_err(|e| decoder.corrupt(&format!("malformed body: {e}")))?;
    let used = bincode::serialized_size(&value)
        .map_err(|e| decoder.corrupt(&format!("malformed body: {e}")))?;
    if used != body.len() as u64 {
        return Err(decoder.corrupt(&format!(
            "{} trailing bytes",
            body.len() as u64 - used.min(body.len() as u64)
        )));
    }
    Ok(value)
}

/// Appends a `bincode` body.
pub(crate) fn encode_bincode<T: serde::Serialize>(encoder: &mut Encoder, value: &T) -> Result<()> {
    bincode::serialize_into(encoder.buffer_mut(), value)
        .map_err(|e| Error::Internal(format!("bincode encoding failed: {e}")))
}
