//! Value codec contract
//!
//! Every concrete value type stored in a header implements [`AttributeValue`]:
//! a stable wire type name plus a deterministic little-endian encoding.
//! [`ByteReader`] is the bounds-checked cursor codecs decode with.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ImfError, Result};

/// A value type that can live inside a header attribute
///
/// `encode` must be deterministic: the same logical value always produces
/// the same bytes. `decode` receives exactly the payload bytes declared by
/// the attribute and must reject payloads that are malformed for the type.
pub trait AttributeValue:
    Clone + PartialEq + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Wire type name, e.g. `"box2i"` or `"float"`
    const TYPE_NAME: &'static str;

    /// Append the encoded payload to `out`
    fn encode(&self, out: &mut Vec<u8>);

    /// Decode a complete payload
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Fixed-size little-endian numbers used as value components
pub trait Scalar:
    Copy + PartialEq + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const SIZE: usize;
    const ZERO: Self;
    const ONE: Self;

    fn put(self, out: &mut Vec<u8>);
    fn get(reader: &mut ByteReader<'_>) -> Result<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $zero:expr, $one:expr;)*) => {
        $(
            impl Scalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                const ZERO: Self = $zero;
                const ONE: Self = $one;

                fn put(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn get(reader: &mut ByteReader<'_>) -> Result<Self> {
                    let bytes = reader.take(Self::SIZE)?;
                    let mut buffer = [0u8; std::mem::size_of::<$ty>()];
                    buffer.copy_from_slice(bytes);
                    Ok(<$ty>::from_le_bytes(buffer))
                }
            }
        )*
    };
}

impl_scalar! {
    i32 => 0, 1;
    u32 => 0, 1;
    f32 => 0.0, 1.0;
    f64 => 0.0, 1.0;
}

/// Bounds-checked cursor over one attribute payload
#[derive(Debug)]
pub struct ByteReader<'a> {
    type_name: &'a str,
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader over the payload of an attribute of type `type_name`
    pub fn new(type_name: &'a str, data: &'a [u8]) -> Self {
        Self {
            type_name,
            data,
            position: 0,
        }
    }

    /// Number of bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Consume exactly `count` bytes
    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(self.error(format!(
                "payload truncated: needed {} more bytes at offset {}, {} left",
                count,
                self.position,
                self.remaining()
            )));
        }
        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    /// Consume everything that is left
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.position..];
        self.position = self.data.len();
        slice
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read<S: Scalar>(&mut self) -> Result<S> {
        S::get(self)
    }

    /// Read an `i32` length that must be non-negative
    pub fn read_len(&mut self) -> Result<usize> {
        let len: i32 = self.read()?;
        usize::try_from(len).map_err(|_| self.error(format!("negative length {len}")))
    }

    /// Fail if any payload bytes were left unread
    pub fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(self.error(format!(
                "{} trailing bytes after value",
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Build a decode error for the type being read
    pub fn error(&self, reason: impl Into<String>) -> ImfError {
        ImfError::decode(self.type_name, reason)
    }
}

/// Write an `i32` length prefix
///
/// Lengths above `i32::MAX` saturate. The payload around such a string is
/// itself larger than `i32::MAX` bytes, which `Header::write_to` rejects
/// with [`ImfError::AttributeTooLarge`], so no truncated prefix is ever
/// written to a stream.
pub(crate) fn put_len(len: usize, out: &mut Vec<u8>) {
    i32::try_from(len).unwrap_or(i32::MAX).put(out);
}

/// Decode a payload that must hold exactly `N` scalars
pub(crate) fn decode_scalars<S: Scalar, const N: usize>(
    type_name: &str,
    bytes: &[u8],
) -> Result<[S; N]> {
    if bytes.len() != S::SIZE * N {
        return Err(ImfError::decode(
            type_name,
            format!(
                "expected {} bytes ({} elements), got {}",
                S::SIZE * N,
                N,
                bytes.len()
            ),
        ));
    }
    let mut reader = ByteReader::new(type_name, bytes);
    let mut values = [S::ZERO; N];
    for value in &mut values {
        *value = reader.read()?;
    }
    Ok(values)
}
