//! Attribute block encoding
//!
//! Block layout (all integers little-endian):
//! - Per attribute, in header order:
//!   - name, NUL-terminated
//!   - type name, NUL-terminated
//!   - payload size (i32)
//!   - payload (exactly `size` bytes)
//! - Terminator: a single NUL byte, i.e. an empty name
//!
//! The explicit size lets a reader skip and preserve payloads it cannot
//! interpret without losing its place in the stream.

use std::io::{Read, Write};

use log::{debug, warn};

use crate::attribute::{Attribute, OpaqueAttribute};
use crate::error::{ImfError, Result};
use crate::header::Header;
use crate::registry::TypeRegistry;

/// Settings for reading attribute blocks
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Abort on the first attribute that cannot be decoded instead of
    /// recording it and continuing
    pub pedantic: bool,
    /// Largest payload accepted, in bytes
    pub max_attribute_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            pedantic: false,
            max_attribute_size: crate::DEFAULT_MAX_ATTRIBUTE_SIZE,
        }
    }
}

impl ReadOptions {
    /// Options that fail on any malformed attribute
    pub fn pedantic() -> Self {
        Self {
            pedantic: true,
            ..Self::default()
        }
    }
}

/// A decoded header together with the per-attribute errors met on the way
#[derive(Debug)]
pub struct HeaderRead {
    pub header: Header,
    /// Attributes that could not be decoded; their bytes are kept in the
    /// header as opaque attributes whenever a name was available
    pub errors: Vec<ImfError>,
}

impl HeaderRead {
    /// True if every attribute decoded cleanly
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_header(self) -> Header {
        self.header
    }
}

/// Read a NUL-terminated string of at most `max_len` bytes
///
/// Returns the raw bytes without the terminator; an empty result means the
/// terminator came first.
fn read_terminated<R: Read>(reader: &mut R, max_len: usize, what: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ImfError::InvalidFormat(format!("stream ended inside {what}"))
            } else {
                ImfError::Io(e)
            }
        })?;
        if byte[0] == 0 {
            return Ok(bytes);
        }
        if bytes.len() == max_len {
            return Err(ImfError::InvalidFormat(format!(
                "{what} is longer than {max_len} bytes"
            )));
        }
        bytes.push(byte[0]);
    }
}

fn read_payload<R: Read>(reader: &mut R, name: &str, options: &ReadOptions) -> Result<Vec<u8>> {
    let mut size = [0u8; 4];
    reader.read_exact(&mut size).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ImfError::InvalidFormat(format!("stream ended before size of {name}"))
        } else {
            ImfError::Io(e)
        }
    })?;
    let size = i32::from_le_bytes(size);
    let Ok(len) = usize::try_from(size) else {
        return Err(ImfError::InvalidFormat(format!(
            "attribute {name} declares negative size {size}"
        )));
    };
    if len > options.max_attribute_size {
        return Err(ImfError::AttributeTooLarge {
            name: name.to_string(),
            size: i64::from(size),
            limit: options.max_attribute_size,
        });
    }

    let mut payload = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut payload)?;
    if payload.len() != len {
        return Err(ImfError::InvalidFormat(format!(
            "attribute {name} truncated: {} of {len} bytes",
            payload.len()
        )));
    }
    Ok(payload)
}

fn record(errors: &mut Vec<ImfError>, error: ImfError, options: &ReadOptions) -> Result<()> {
    if options.pedantic {
        return Err(error);
    }
    warn!("{}", error);
    errors.push(error);
    Ok(())
}

impl Header {
    /// Encode the header as an attribute block
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut payload = Vec::new();
        for entry in self {
            payload.clear();
            entry.attribute.encode(&mut payload);
            let size = i32::try_from(payload.len()).map_err(|_| ImfError::AttributeTooLarge {
                name: entry.name.to_string(),
                size: payload.len() as i64,
                limit: i32::MAX as usize,
            })?;

            writer.write_all(entry.name.as_bytes())?;
            writer.write_all(&[0])?;
            writer.write_all(entry.attribute.type_name_bytes())?;
            writer.write_all(&[0])?;
            writer.write_all(&size.to_le_bytes())?;
            writer.write_all(&payload)?;
        }
        writer.write_all(&[0])?;
        Ok(())
    }

    /// Encode the header into a new buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Decode one attribute block
    ///
    /// Framing problems (truncated stream, negative or oversized payload
    /// sizes, overlong names) abort the read because the position of the
    /// next attribute is unknown. Problems confined to one payload are
    /// recorded in [`HeaderRead::errors`] and reading continues, unless
    /// `options.pedantic` is set. Unregistered type names are not errors:
    /// their payloads are kept as [`OpaqueAttribute`]s.
    ///
    /// The reader is consumed one byte at a time while scanning names, so
    /// pass a buffered reader when reading from a file.
    pub fn read_from<R: Read>(
        reader: &mut R,
        registry: &TypeRegistry,
        options: &ReadOptions,
    ) -> Result<HeaderRead> {
        let mut header = Header::new();
        let mut errors = Vec::new();

        loop {
            let name = read_terminated(reader, crate::MAX_NAME_LENGTH, "attribute name")?;
            if name.is_empty() {
                break;
            }
            let type_name = read_terminated(reader, crate::MAX_NAME_LENGTH, "type name")?;
            let display_name = String::from_utf8_lossy(&name).into_owned();
            let payload = read_payload(reader, &display_name, options)?;

            // Header names are strings, so such an attribute cannot be kept
            let Ok(name) = String::from_utf8(name) else {
                let error = ImfError::InvalidName {
                    name: display_name,
                    reason: "name is not valid UTF-8".to_string(),
                };
                record(&mut errors, error, options)?;
                continue;
            };
            if type_name.is_empty() {
                let error = ImfError::InvalidName {
                    name,
                    reason: "type name is empty".to_string(),
                };
                record(&mut errors, error, options)?;
                continue;
            }

            let attribute = match String::from_utf8(type_name) {
                Ok(type_name) => {
                    decode_attribute(&name, type_name, payload, registry, &mut errors, options)?
                }
                Err(e) => {
                    let opaque = OpaqueAttribute::with_raw_type_name(e.into_bytes(), payload);
                    warn!(
                        "Keeping attribute {} with non UTF-8 type name {:?} as opaque",
                        name,
                        opaque.type_name()
                    );
                    Box::new(opaque)
                }
            };
            if let Err(error) = header.insert_attribute(&name, attribute) {
                record(&mut errors, error, options)?;
            }
        }

        Ok(HeaderRead { header, errors })
    }

    /// Decode an attribute block held in memory
    ///
    /// Bytes after the terminator are ignored, or rejected in pedantic mode.
    pub fn from_bytes(
        bytes: &[u8],
        registry: &TypeRegistry,
        options: &ReadOptions,
    ) -> Result<HeaderRead> {
        let mut cursor = bytes;
        let read = Self::read_from(&mut cursor, registry, options)?;
        if !cursor.is_empty() {
            if options.pedantic {
                return Err(ImfError::InvalidFormat(format!(
                    "{} bytes after the header terminator",
                    cursor.len()
                )));
            }
            debug!("Ignoring {} bytes after the header terminator", cursor.len());
        }
        Ok(read)
    }
}

fn decode_attribute(
    name: &str,
    type_name: String,
    payload: Vec<u8>,
    registry: &TypeRegistry,
    errors: &mut Vec<ImfError>,
    options: &ReadOptions,
) -> Result<Box<dyn Attribute>> {
    let Some(mut holder) = registry.construct(&type_name) else {
        warn!(
            "Keeping attribute {} of unrecognized type {} ({} bytes) as opaque",
            name,
            type_name,
            payload.len()
        );
        return Ok(Box::new(OpaqueAttribute::new(type_name, payload)));
    };

    match holder.decode_from(&payload) {
        Ok(()) => {
            debug!("Decoded attribute {} ({}, {} bytes)", name, type_name, payload.len());
            Ok(holder)
        }
        Err(error) => {
            let error = match error {
                ImfError::Decode { type_name, reason } => ImfError::Decode {
                    type_name,
                    reason: format!("attribute {name}: {reason}"),
                },
                other => other,
            };
            record(errors, error, options)?;
            Ok(Box::new(OpaqueAttribute::new(type_name, payload)))
        }
    }
}
