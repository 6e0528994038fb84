#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! exrmeta - self-describing image header attributes
//!
//! This library stores, encodes and decodes the metadata attributes of
//! OpenEXR-style image headers. A [`Header`] holds strongly typed values of
//! many different types in one ordered, name-keyed collection. Its binary
//! form can be read back without knowing every value type: attributes of
//! unrecognized types are kept as opaque bytes and written out unchanged.
//!
//! ```
//! use exrmeta::{Header, ReadOptions, TypeRegistry};
//! use exrmeta::types::Rational;
//!
//! let mut header = Header::new();
//! header.insert("captureRate", Rational::new(24, 1))?;
//! header.insert("owner", "alice".to_string())?;
//!
//! let bytes = header.to_bytes()?;
//! let registry = TypeRegistry::with_standard_types();
//! let read = Header::from_bytes(&bytes, &registry, &ReadOptions::default())?;
//! assert!(read.is_clean());
//! assert_eq!(read.header, header);
//! # Ok::<(), exrmeta::ImfError>(())
//! ```

pub mod attribute;
pub mod codec;
pub mod error;
pub mod file;
pub mod header;
pub mod registry;
pub mod standard;
pub mod types;
pub mod validate;
pub mod wire;

pub use attribute::{Attribute, OpaqueAttribute, TypedAttribute};
pub use codec::AttributeValue;
pub use error::{ImfError, Result};
pub use file::{read_file_headers, FileHeaders, FileVersion};
pub use header::{AttributeRef, Header};
pub use registry::{AttributeFactory, TypeRegistry};
pub use standard::AttributeKey;
pub use validate::{check_header, Advisory};
pub use wire::{HeaderRead, ReadOptions};

/// Longest attribute or type name, in bytes
pub const MAX_NAME_LENGTH: usize = 255;

/// Longest name allowed in files without the long-names flag
pub const SHORT_NAME_LENGTH: usize = 31;

/// Default limit on a single attribute payload
pub const DEFAULT_MAX_ATTRIBUTE_SIZE: usize = 1 << 28;

/// Magic number at the start of every EXR file (20000630, little-endian)
pub const EXR_MAGIC: [u8; 4] = [0x76, 0x2f, 0x31, 0x01];

/// File format version understood by [`read_file_headers`]
pub const EXR_VERSION: u32 = 2;

/// Version flag: single-part tiled file
pub const TILED_FLAG: u32 = 0x200;

/// Version flag: names may be longer than [`SHORT_NAME_LENGTH`]
pub const LONG_NAMES_FLAG: u32 = 0x400;

/// Version flag: file holds deep data
pub const NON_IMAGE_FLAG: u32 = 0x800;

/// Version flag: file holds several parts, each with its own header
pub const MULTI_PART_FLAG: u32 = 0x1000;
