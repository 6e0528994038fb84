//! Concrete attribute value types and their wire codecs
//!
//! Layouts follow the OpenEXR file format: all numbers are little-endian,
//! vectors and matrices are written component by component in row-major
//! order, strings are raw bytes without a terminator.

use std::fmt;
use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::codec::{decode_scalars, put_len, AttributeValue, ByteReader, Scalar};
use crate::error::{ImfError, Result};

macro_rules! scalar_value {
    ($($ty:ty => $name:literal;)*) => {
        $(
            impl AttributeValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn encode(&self, out: &mut Vec<u8>) {
                    Scalar::put(*self, out);
                }

                fn decode(bytes: &[u8]) -> Result<Self> {
                    let [value]: [Self; 1] = decode_scalars(Self::TYPE_NAME, bytes)?;
                    Ok(value)
                }
            }
        )*
    };
}

scalar_value! {
    i32 => "int";
    f32 => "float";
    f64 => "double";
}

impl AttributeValue for String {
    const TYPE_NAME: &'static str = "string";

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ImfError::decode(Self::TYPE_NAME, e.to_string()))
    }
}

/// List of strings, e.g. the view names of a multi-view image
pub type StringVector = Vec<String>;

impl AttributeValue for StringVector {
    const TYPE_NAME: &'static str = "stringvector";

    fn encode(&self, out: &mut Vec<u8>) {
        for value in self {
            put_len(value.len(), out);
            out.extend_from_slice(value.as_bytes());
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(Self::TYPE_NAME, bytes);
        let mut values = Vec::new();
        while reader.remaining() > 0 {
            let len = reader.read_len()?;
            let raw = reader.take(len)?;
            let value = std::str::from_utf8(raw)
                .map_err(|e| reader.error(format!("entry {}: {}", values.len(), e)))?;
            values.push(value.to_string());
        }
        Ok(values)
    }
}

/// 2D vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2<T> {
    pub x: T,
    pub y: T,
}

impl<T: Scalar> Vec2<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    fn to_array(self) -> [T; 2] {
        [self.x, self.y]
    }

    fn from_array([x, y]: [T; 2]) -> Self {
        Self { x, y }
    }
}

/// 3D vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T: Scalar> Vec3<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }

    fn to_array(self) -> [T; 3] {
        [self.x, self.y, self.z]
    }

    fn from_array([x, y, z]: [T; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Axis-aligned 2D box with inclusive corners
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Box2<T> {
    pub min: Vec2<T>,
    pub max: Vec2<T>,
}

impl<T: Scalar> Box2<T> {
    pub const fn new(min: Vec2<T>, max: Vec2<T>) -> Self {
        Self { min, max }
    }

    fn to_array(self) -> [T; 4] {
        [self.min.x, self.min.y, self.max.x, self.max.y]
    }

    fn from_array([min_x, min_y, max_x, max_y]: [T; 4]) -> Self {
        Self {
            min: Vec2::new(min_x, min_y),
            max: Vec2::new(max_x, max_y),
        }
    }
}

impl Box2<i32> {
    /// Width in pixels; zero for an empty box
    pub fn width(&self) -> u64 {
        (i64::from(self.max.x) - i64::from(self.min.x) + 1).max(0) as u64
    }

    /// Height in pixels; zero for an empty box
    pub fn height(&self) -> u64 {
        (i64::from(self.max.y) - i64::from(self.min.y) + 1).max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y
    }
}

/// 3x3 matrix, row-major
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix33<T>(pub [[T; 3]; 3]);

/// 4x4 matrix, row-major
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix44<T>(pub [[T; 4]; 4]);

macro_rules! square_matrix {
    ($matrix:ident, $dim:literal, $len:literal) => {
        impl<T: Scalar> $matrix<T> {
            /// Identity matrix
            pub fn identity() -> Self {
                let mut rows = [[T::ZERO; $dim]; $dim];
                for (i, row) in rows.iter_mut().enumerate() {
                    row[i] = T::ONE;
                }
                Self(rows)
            }

            fn to_array(self) -> [T; $len] {
                let mut values = [T::ZERO; $len];
                for (slot, value) in values.iter_mut().zip(self.0.iter().flatten()) {
                    *slot = *value;
                }
                values
            }

            fn from_array(values: [T; $len]) -> Self {
                let mut rows = [[T::ZERO; $dim]; $dim];
                for (i, value) in values.into_iter().enumerate() {
                    rows[i / $dim][i % $dim] = value;
                }
                Self(rows)
            }
        }

        impl<T: Scalar> Default for $matrix<T> {
            fn default() -> Self {
                Self::identity()
            }
        }
    };
}

square_matrix!(Matrix33, 3, 9);
square_matrix!(Matrix44, 4, 16);

macro_rules! component_value {
    ($($ty:ty => $name:literal;)*) => {
        $(
            impl AttributeValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn encode(&self, out: &mut Vec<u8>) {
                    for component in self.to_array() {
                        component.put(out);
                    }
                }

                fn decode(bytes: &[u8]) -> Result<Self> {
                    Ok(Self::from_array(decode_scalars(Self::TYPE_NAME, bytes)?))
                }
            }
        )*
    };
}

pub type V2i = Vec2<i32>;
pub type V2f = Vec2<f32>;
pub type V2d = Vec2<f64>;
pub type V3i = Vec3<i32>;
pub type V3f = Vec3<f32>;
pub type V3d = Vec3<f64>;
pub type Box2i = Box2<i32>;
pub type Box2f = Box2<f32>;
pub type M33f = Matrix33<f32>;
pub type M33d = Matrix33<f64>;
pub type M44f = Matrix44<f32>;
pub type M44d = Matrix44<f64>;

component_value! {
    V2i => "v2i";
    V2f => "v2f";
    V2d => "v2d";
    V3i => "v3i";
    V3f => "v3f";
    V3d => "v3d";
    Box2i => "box2i";
    Box2f => "box2f";
    M33f => "m33f";
    M33d => "m33d";
    M44f => "m44f";
    M44d => "m44d";
}

/// Rational number `numerator / denominator`, e.g. a frame rate
///
/// Lowest terms and positivity are documented conventions for some
/// attributes but are not enforced here; see [`crate::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: u32,
}

impl Rational {
    pub const fn new(numerator: i32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl AttributeValue for Rational {
    const TYPE_NAME: &'static str = "rational";

    fn encode(&self, out: &mut Vec<u8>) {
        self.numerator.put(out);
        self.denominator.put(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(Self::TYPE_NAME, bytes);
        let numerator = reader.read()?;
        let denominator = reader.read()?;
        reader.finish()?;
        Ok(Self::new(numerator, denominator))
    }
}

/// CIE (x, y) chromaticities of the RGB primaries and the white point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chromaticities {
    pub red: V2f,
    pub green: V2f,
    pub blue: V2f,
    pub white: V2f,
}

impl Default for Chromaticities {
    /// ITU-R BT.709 primaries with a D65 white point
    fn default() -> Self {
        Self {
            red: V2f::new(0.6400, 0.3300),
            green: V2f::new(0.3000, 0.6000),
            blue: V2f::new(0.1500, 0.0600),
            white: V2f::new(0.3127, 0.3290),
        }
    }
}

impl AttributeValue for Chromaticities {
    const TYPE_NAME: &'static str = "chromaticities";

    fn encode(&self, out: &mut Vec<u8>) {
        for point in [self.red, self.green, self.blue, self.white] {
            point.x.put(out);
            point.y.put(out);
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let [rx, ry, gx, gy, bx, by, wx, wy]: [f32; 8] = decode_scalars(Self::TYPE_NAME, bytes)?;
        Ok(Self {
            red: V2f::new(rx, ry),
            green: V2f::new(gx, gy),
            blue: V2f::new(bx, by),
            white: V2f::new(wx, wy),
        })
    }
}

/// Motion picture film key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCode {
    pub film_mfc_code: i32,
    pub film_type: i32,
    pub prefix: i32,
    pub count: i32,
    pub perf_offset: i32,
    pub perfs_per_frame: i32,
    pub perfs_per_count: i32,
}

impl Default for KeyCode {
    fn default() -> Self {
        Self {
            film_mfc_code: 0,
            film_type: 0,
            prefix: 0,
            count: 0,
            perf_offset: 0,
            perfs_per_frame: 4,
            perfs_per_count: 64,
        }
    }
}

impl AttributeValue for KeyCode {
    const TYPE_NAME: &'static str = "keycode";

    fn encode(&self, out: &mut Vec<u8>) {
        for field in [
            self.film_mfc_code,
            self.film_type,
            self.prefix,
            self.count,
            self.perf_offset,
            self.perfs_per_frame,
            self.perfs_per_count,
        ] {
            field.put(out);
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let [
            film_mfc_code,
            film_type,
            prefix,
            count,
            perf_offset,
            perfs_per_frame,
            perfs_per_count,
        ] = decode_scalars::<i32, 7>(Self::TYPE_NAME, bytes)?;
        Ok(Self {
            film_mfc_code,
            film_type,
            prefix,
            count,
            perf_offset,
            perfs_per_frame,
            perfs_per_count,
        })
    }
}

/// SMPTE time and control code, packed as in SMPTE 12M (60 Hz layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeCode {
    pub time_and_flags: u32,
    pub user_data: u32,
}

const FRAME_SHIFT: u32 = 0;
const SECONDS_SHIFT: u32 = 8;
const MINUTES_SHIFT: u32 = 16;
const HOURS_SHIFT: u32 = 24;
const DROP_FRAME_BIT: u32 = 1 << 6;

fn read_bcd(word: u32, shift: u32, tens_bits: u32) -> u32 {
    let units = (word >> shift) & 0xf;
    let tens = (word >> (shift + 4)) & ((1 << tens_bits) - 1);
    tens * 10 + units
}

fn write_bcd(word: u32, shift: u32, tens_bits: u32, value: u32) -> u32 {
    let mask = ((1u32 << (4 + tens_bits)) - 1) << shift;
    let packed = ((value / 10) << 4 | (value % 10)) << shift;
    (word & !mask) | (packed & mask)
}

impl TimeCode {
    /// Pack a time code; returns `None` if a field is out of range
    pub fn from_hmsf(hours: u32, minutes: u32, seconds: u32, frame: u32) -> Option<Self> {
        if hours > 23 || minutes > 59 || seconds > 59 || frame > 59 {
            return None;
        }
        let mut word = 0;
        word = write_bcd(word, FRAME_SHIFT, 2, frame);
        word = write_bcd(word, SECONDS_SHIFT, 3, seconds);
        word = write_bcd(word, MINUTES_SHIFT, 3, minutes);
        word = write_bcd(word, HOURS_SHIFT, 2, hours);
        Some(Self {
            time_and_flags: word,
            user_data: 0,
        })
    }

    pub fn hours(&self) -> u32 {
        read_bcd(self.time_and_flags, HOURS_SHIFT, 2)
    }

    pub fn minutes(&self) -> u32 {
        read_bcd(self.time_and_flags, MINUTES_SHIFT, 3)
    }

    pub fn seconds(&self) -> u32 {
        read_bcd(self.time_and_flags, SECONDS_SHIFT, 3)
    }

    pub fn frame(&self) -> u32 {
        read_bcd(self.time_and_flags, FRAME_SHIFT, 2)
    }

    pub fn drop_frame(&self) -> bool {
        self.time_and_flags & DROP_FRAME_BIT != 0
    }

    pub fn set_drop_frame(&mut self, drop_frame: bool) {
        if drop_frame {
            self.time_and_flags |= DROP_FRAME_BIT;
        } else {
            self.time_and_flags &= !DROP_FRAME_BIT;
        }
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if self.drop_frame() { ';' } else { ':' };
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:02}",
            self.hours(),
            self.minutes(),
            self.seconds(),
            separator,
            self.frame()
        )
    }
}

impl AttributeValue for TimeCode {
    const TYPE_NAME: &'static str = "timecode";

    fn encode(&self, out: &mut Vec<u8>) {
        self.time_and_flags.put(out);
        self.user_data.put(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let [time_and_flags, user_data]: [u32; 2] = decode_scalars(Self::TYPE_NAME, bytes)?;
        Ok(Self {
            time_and_flags,
            user_data,
        })
    }
}

fn decode_tag(type_name: &str, bytes: &[u8]) -> Result<u8> {
    let mut reader = ByteReader::new(type_name, bytes);
    let tag = reader.read_u8()?;
    reader.finish()?;
    Ok(tag)
}

/// Environment map projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Envmap {
    #[default]
    LatLong,
    Cube,
}

impl AttributeValue for Envmap {
    const TYPE_NAME: &'static str = "envmap";

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(match self {
            Self::LatLong => 0,
            Self::Cube => 1,
        });
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        match decode_tag(Self::TYPE_NAME, bytes)? {
            0 => Ok(Self::LatLong),
            1 => Ok(Self::Cube),
            other => Err(ImfError::decode(
                Self::TYPE_NAME,
                format!("unknown projection {other}"),
            )),
        }
    }
}

/// Sorting and overlap state of the samples in a deep image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeepImageState {
    #[default]
    Messy,
    Sorted,
    NonOverlapping,
    Tidy,
}

impl AttributeValue for DeepImageState {
    const TYPE_NAME: &'static str = "deepImageState";

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        match decode_tag(Self::TYPE_NAME, bytes)? {
            0 => Ok(Self::Messy),
            1 => Ok(Self::Sorted),
            2 => Ok(Self::NonOverlapping),
            3 => Ok(Self::Tidy),
            other => Err(ImfError::decode(
                Self::TYPE_NAME,
                format!("unknown state {other}"),
            )),
        }
    }
}

/// Zlib-compressed ID manifest
///
/// The manifest body is kept compressed; [`CompressedIdManifest::decompress`]
/// recovers the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompressedIdManifest {
    pub uncompressed_size: i32,
    pub data: Vec<u8>,
}

impl CompressedIdManifest {
    /// Compress a serialized manifest
    pub fn compress(raw: &[u8]) -> Result<Self> {
        let uncompressed_size = i32::try_from(raw.len()).map_err(|_| {
            ImfError::InvalidFormat(format!("ID manifest of {} bytes is too large", raw.len()))
        })?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw)?;
        Ok(Self {
            uncompressed_size,
            data: encoder.finish()?,
        })
    }

    /// Decompress and check the size recorded in the attribute
    pub fn decompress(&self) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        ZlibDecoder::new(self.data.as_slice())
            .read_to_end(&mut raw)
            .map_err(|e| ImfError::decode(Self::TYPE_NAME, e.to_string()))?;
        if raw.len() as i64 != i64::from(self.uncompressed_size) {
            return Err(ImfError::decode(
                Self::TYPE_NAME,
                format!(
                    "manifest inflated to {} bytes, header says {}",
                    raw.len(),
                    self.uncompressed_size
                ),
            ));
        }
        Ok(raw)
    }
}

impl AttributeValue for CompressedIdManifest {
    const TYPE_NAME: &'static str = "idmanifest";

    fn encode(&self, out: &mut Vec<u8>) {
        self.uncompressed_size.put(out);
        out.extend_from_slice(&self.data);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(Self::TYPE_NAME, bytes);
        let uncompressed_size = reader.read()?;
        Ok(Self {
            uncompressed_size,
            data: reader.rest().to_vec(),
        })
    }
}
