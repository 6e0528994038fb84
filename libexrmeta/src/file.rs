//! EXR file prologue
//!
//! An EXR file starts with the magic number, a version field and then one
//! attribute block per part. Multi-part files end their list of headers
//! with an empty header. Offset tables and pixel data follow; they are
//! never read here.

use std::fmt;
use std::io::Read;

use log::{debug, info};

use crate::error::{ImfError, Result};
use crate::header::Header;
use crate::registry::TypeRegistry;
use crate::wire::{HeaderRead, ReadOptions};
use crate::{
    EXR_MAGIC, EXR_VERSION, LONG_NAMES_FLAG, MULTI_PART_FLAG, NON_IMAGE_FLAG, SHORT_NAME_LENGTH,
    TILED_FLAG,
};

const VERSION_MASK: u32 = 0xff;
const KNOWN_FLAGS: u32 = TILED_FLAG | LONG_NAMES_FLAG | NON_IMAGE_FLAG | MULTI_PART_FLAG;

/// The version field of an EXR file: format version plus feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVersion(u32);

impl FileVersion {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Version 2 field with the given flag bits
    pub const fn with_flags(flags: u32) -> Self {
        Self(EXR_VERSION | flags)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn version(self) -> u32 {
        self.0 & VERSION_MASK
    }

    pub const fn flags(self) -> u32 {
        self.0 & !VERSION_MASK
    }

    pub const fn is_tiled(self) -> bool {
        self.0 & TILED_FLAG != 0
    }

    pub const fn has_long_names(self) -> bool {
        self.0 & LONG_NAMES_FLAG != 0
    }

    pub const fn is_non_image(self) -> bool {
        self.0 & NON_IMAGE_FLAG != 0
    }

    pub const fn is_multi_part(self) -> bool {
        self.0 & MULTI_PART_FLAG != 0
    }

    /// Longest attribute name allowed by the flags
    pub const fn max_name_length(self) -> usize {
        if self.has_long_names() {
            crate::MAX_NAME_LENGTH
        } else {
            SHORT_NAME_LENGTH
        }
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version())?;
        for (flag, label) in [
            (TILED_FLAG, "tiled"),
            (LONG_NAMES_FLAG, "long names"),
            (NON_IMAGE_FLAG, "deep"),
            (MULTI_PART_FLAG, "multi-part"),
        ] {
            if self.0 & flag != 0 {
                write!(f, ", {label}")?;
            }
        }
        Ok(())
    }
}

/// Headers read from the start of an EXR file
#[derive(Debug)]
pub struct FileHeaders {
    pub version: FileVersion,
    /// One entry per part, in file order
    pub parts: Vec<HeaderRead>,
}

impl FileHeaders {
    /// True if no part reported an error
    pub fn is_clean(&self) -> bool {
        self.parts.iter().all(HeaderRead::is_clean)
    }

    pub fn into_headers(self) -> Vec<Header> {
        self.parts.into_iter().map(HeaderRead::into_header).collect()
    }
}

/// True if `bytes` start with the EXR magic number
pub fn is_exr(bytes: &[u8]) -> bool {
    bytes.starts_with(&EXR_MAGIC)
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<[u8; 4]> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ImfError::InvalidFormat(format!("file ends before the {what}"))
        } else {
            ImfError::Io(e)
        }
    })?;
    Ok(bytes)
}

/// Read the magic number, the version field and every part header
///
/// Files without the long-names flag should keep names within
/// [`SHORT_NAME_LENGTH`] bytes; longer names are reported in the part's
/// errors, or fail the read in pedantic mode.
pub fn read_file_headers<R: Read>(
    reader: &mut R,
    registry: &TypeRegistry,
    options: &ReadOptions,
) -> Result<FileHeaders> {
    let magic = read_u32(reader, "magic number")?;
    if magic != EXR_MAGIC {
        return Err(ImfError::InvalidFormat(format!(
            "not an EXR file (magic {magic:02x?})"
        )));
    }

    let version = FileVersion::from_raw(u32::from_le_bytes(read_u32(reader, "version field")?));
    if version.version() != EXR_VERSION {
        return Err(ImfError::InvalidFormat(format!(
            "unsupported file version {}",
            version.version()
        )));
    }
    if version.flags() & !KNOWN_FLAGS != 0 {
        return Err(ImfError::InvalidFormat(format!(
            "unknown version flags {:#x}",
            version.flags() & !KNOWN_FLAGS
        )));
    }
    debug!("EXR version field {:#x} ({})", version.raw(), version);

    let mut parts = Vec::new();
    loop {
        let mut part = Header::read_from(reader, registry, options)?;
        if version.is_multi_part() && part.header.is_empty() && part.errors.is_empty() {
            break;
        }
        check_name_lengths(&mut part, version, options)?;
        parts.push(part);
        if !version.is_multi_part() {
            break;
        }
    }

    info!(
        "Read {} header(s) from EXR file ({})",
        parts.len(),
        version
    );
    Ok(FileHeaders { version, parts })
}

fn check_name_lengths(
    part: &mut HeaderRead,
    version: FileVersion,
    options: &ReadOptions,
) -> Result<()> {
    let limit = version.max_name_length();
    let long: Vec<String> = part
        .header
        .iter()
        .filter(|attribute| {
            attribute.name.len() > limit || attribute.attribute.type_name_bytes().len() > limit
        })
        .map(|attribute| attribute.name.to_string())
        .collect();
    for name in long {
        let error = ImfError::InvalidName {
            name,
            reason: format!("longer than {limit} bytes without the long-names flag"),
        };
        if options.pedantic {
            return Err(error);
        }
        part.errors.push(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Box2i, V2i};

    fn prologue(flags: u32) -> Vec<u8> {
        let mut bytes = EXR_MAGIC.to_vec();
        bytes.extend_from_slice(&FileVersion::with_flags(flags).raw().to_le_bytes());
        bytes
    }

    fn part(name: &str) -> Header {
        let mut header = Header::new();
        header
            .insert("dataWindow", Box2i::new(V2i::new(0, 0), V2i::new(63, 31)))
            .unwrap();
        header.insert("name", name.to_string()).unwrap();
        header
    }

    #[test]
    fn test_magic_detection() {
        assert!(is_exr(&[0x76, 0x2f, 0x31, 0x01, 2, 0, 0, 0]));
        assert!(!is_exr(b"RIFF"));
        assert!(!is_exr(&[0x76]));
    }

    #[test]
    fn test_version_flags() {
        let version = FileVersion::with_flags(TILED_FLAG | LONG_NAMES_FLAG);
        assert_eq!(version.version(), 2);
        assert!(version.is_tiled());
        assert!(version.has_long_names());
        assert!(!version.is_multi_part());
        assert_eq!(version.to_string(), "2, tiled, long names");
        assert_eq!(FileVersion::with_flags(0).max_name_length(), SHORT_NAME_LENGTH);
    }

    #[test]
    fn test_single_part() {
        let header = part("beauty");
        let mut bytes = prologue(0);
        header.write_to(&mut bytes).unwrap();
        // Offset table and pixels follow; they must not be read
        bytes.extend_from_slice(&[0xff; 16]);

        let registry = TypeRegistry::with_standard_types();
        let read =
            read_file_headers(&mut bytes.as_slice(), &registry, &ReadOptions::default()).unwrap();
        assert_eq!(read.version, FileVersion::with_flags(0));
        assert!(read.is_clean());
        assert_eq!(read.into_headers(), vec![header]);
    }

    #[test]
    fn test_multi_part() {
        let mut bytes = prologue(MULTI_PART_FLAG);
        part("left").write_to(&mut bytes).unwrap();
        part("right").write_to(&mut bytes).unwrap();
        bytes.push(0);

        let registry = TypeRegistry::with_standard_types();
        let read =
            read_file_headers(&mut bytes.as_slice(), &registry, &ReadOptions::default()).unwrap();
        assert_eq!(read.parts.len(), 2);
        assert_eq!(
            read.parts[1].header.typed::<String>("name").unwrap(),
            "right"
        );
    }

    #[test]
    fn test_rejects_bad_prologue() {
        let registry = TypeRegistry::with_standard_types();
        let options = ReadOptions::default();

        let err = read_file_headers(&mut &b"RIFF\x02\0\0\0"[..], &registry, &options).unwrap_err();
        assert!(matches!(err, ImfError::InvalidFormat(_)));

        let mut bytes = EXR_MAGIC.to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        assert!(read_file_headers(&mut bytes.as_slice(), &registry, &options).is_err());

        let mut bytes = prologue(0x10_0000);
        bytes.push(0);
        assert!(read_file_headers(&mut bytes.as_slice(), &registry, &options).is_err());

        assert!(read_file_headers(&mut &EXR_MAGIC[..], &registry, &options).is_err());
    }

    #[test]
    fn test_long_names_need_flag() {
        let mut header = Header::new();
        header.insert(&"n".repeat(40), 1i32).unwrap();
        let mut bytes = prologue(0);
        header.write_to(&mut bytes).unwrap();

        let registry = TypeRegistry::with_standard_types();
        let read =
            read_file_headers(&mut bytes.as_slice(), &registry, &ReadOptions::default()).unwrap();
        assert_eq!(read.parts[0].errors.len(), 1);
        assert_eq!(read.parts[0].header.len(), 1);

        assert!(
            read_file_headers(&mut bytes.as_slice(), &registry, &ReadOptions::pedantic()).is_err()
        );

        let mut bytes = prologue(LONG_NAMES_FLAG);
        header.write_to(&mut bytes).unwrap();
        let read =
            read_file_headers(&mut bytes.as_slice(), &registry, &ReadOptions::default()).unwrap();
        assert!(read.is_clean());
    }
}
