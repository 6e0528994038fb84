//! Optional standard attributes
//!
//! These attributes are not present in every header, but when they are, they
//! use the names and types below. Each one is exposed as a typed
//! [`AttributeKey`]:
//!
//! ```
//! use exrmeta::standard::{CAPTURE_RATE, OWNER};
//! use exrmeta::types::Rational;
//! use exrmeta::Header;
//!
//! let mut header = Header::new();
//! CAPTURE_RATE.add(&mut header, Rational::new(24, 1))?;
//! OWNER.add(&mut header, "alice".to_string())?;
//!
//! assert!(OWNER.has(&header));
//! assert_eq!(CAPTURE_RATE.get(&header)?.to_f64(), 24.0);
//! # Ok::<(), exrmeta::ImfError>(())
//! ```
//!
//! Names are case-sensitive and part of the file format.

use std::fmt;
use std::marker::PhantomData;

use crate::codec::AttributeValue;
use crate::error::Result;
use crate::header::Header;
use crate::types::{
    Box2i, Chromaticities, CompressedIdManifest, DeepImageState, Envmap, KeyCode, M44f, Rational,
    StringVector, TimeCode, V2f,
};

/// Name of an attribute together with its value type
pub struct AttributeKey<T> {
    name: &'static str,
    marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: AttributeValue> AttributeKey<T> {
    /// Insert or replace the value, as [`Header::insert`]
    pub fn add(&self, header: &mut Header, value: T) -> Result<()> {
        header.insert(self.name, value)
    }

    /// True if the header holds an attribute with this name
    pub fn has(&self, header: &Header) -> bool {
        header.contains(self.name)
    }

    pub fn get<'h>(&self, header: &'h Header) -> Result<&'h T> {
        header.typed(self.name)
    }

    pub fn get_mut<'h>(&self, header: &'h mut Header) -> Result<&'h mut T> {
        header.typed_mut(self.name)
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T: AttributeValue> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeKey({}: {})", self.name, T::TYPE_NAME)
    }
}

/// Catalogue entry for tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardAttribute {
    pub name: &'static str,
    pub type_name: &'static str,
    pub deprecated: Option<&'static str>,
}

/// Look up a standard attribute by name
pub fn lookup(name: &str) -> Option<&'static StandardAttribute> {
    STANDARD_ATTRIBUTES.iter().find(|entry| entry.name == name)
}

macro_rules! standard_attributes {
    (@deprecated) => { None };
    (@deprecated $note:literal) => { Some($note) };
    ($(
        $(#[doc = $doc:literal])*
        $key:ident: $ty:ty = $name:literal $(, deprecated $note:literal)?;
    )*) => {
        $(
            $(#[doc = $doc])*
            $(#[deprecated(note = $note)])?
            pub const $key: AttributeKey<$ty> = AttributeKey::new($name);
        )*

        /// Every standard attribute, in catalogue order
        pub const STANDARD_ATTRIBUTES: &[StandardAttribute] = &[
            $(
                StandardAttribute {
                    name: $name,
                    type_name: <$ty as AttributeValue>::TYPE_NAME,
                    deprecated: standard_attributes!(@deprecated $($note)?),
                },
            )*
        ];
    };
}

standard_attributes! {
    /// Data window of the original image before it was cropped
    ORIGINAL_DATA_WINDOW: Box2i = "originalDataWindow";
    /// World to camera space transform of a rendered image
    WORLD_TO_CAMERA: M44f = "worldToCamera";
    /// World to normalized device coordinate transform of a rendered image
    WORLD_TO_NDC: M44f = "worldToNDC";
    /// JSON-encoded ASC framing decision list
    ASC_FRAMING_DECISION_LIST: String = "ascFramingDecisionList";
    /// Horizontal output density, in pixels per inch
    X_DENSITY: f32 = "xDensity";
    /// Degrees east of Greenwich
    LONGITUDE: f32 = "longitude";
    /// Degrees north of the equator
    LATITUDE: f32 = "latitude";
    /// Meters above sea level
    ALTITUDE: f32 = "altitude";
    CAMERA_MAKE: String = "cameraMake";
    CAMERA_MODEL: String = "cameraModel";
    CAMERA_SERIAL_NUMBER: String = "cameraSerialNumber";
    CAMERA_FIRMWARE_VERSION: String = "cameraFirmwareVersion";
    CAMERA_UUID: String = "cameraUuid";
    CAMERA_LABEL: String = "cameraLabel";
    /// Correlated color temperature setting, in Kelvin
    CAMERA_CCT_SETTING: f32 = "cameraCCTSetting";
    /// Green/magenta tint setting; positive values shift towards green
    CAMERA_TINT_SETTING: f32 = "cameraTintSetting";
    /// CIE 1960 UCS chromaticity the camera treats as neutral
    CAMERA_COLOR_BALANCE: V2f = "cameraColorBalance";
    ISO_SPEED: f32 = "isoSpeed";
    /// Exposure time, in seconds
    EXP_TIME: f32 = "expTime";
    /// Shutter angle, in degrees
    SHUTTER_ANGLE: f32 = "shutterAngle";
    /// Capture rate of the image sequence, in frames per second
    CAPTURE_RATE: Rational = "captureRate";
    LENS_MAKE: String = "lensMake";
    LENS_MODEL: String = "lensModel";
    LENS_SERIAL_NUMBER: String = "lensSerialNumber";
    LENS_FIRMWARE_VERSION: String = "lensFirmwareVersion";
    /// Focal length printed on the lens barrel, in millimeters
    NOMINAL_FOCAL_LENGTH: f32 = "nominalFocalLength";
    /// Pinhole model focal length, in millimeters
    PINHOLE_FOCAL_LENGTH: f32 = "pinholeFocalLength";
    /// Thick lens model focal length, in millimeters
    EFFECTIVE_FOCAL_LENGTH: f32 = "effectiveFocalLength";
    /// Axial distance from the image plane to the entrance pupil, in millimeters
    ENTRANCE_PUPIL_OFFSET: f32 = "entrancePupilOffset";
    /// Lens f-number
    APERTURE: f32 = "aperture";
    /// Lens T-number
    T_STOP: f32 = "tStop";
    /// Focus distance, in meters
    FOCUS: f32 = "focus";
    OWNER: String = "owner";
    COMMENTS: String = "comments";
    /// Local capture time, formatted `YYYY:MM:DD hh:mm:ss`
    CAP_DATE: String = "capDate";
    /// Seconds to add to `capDate` to get UTC
    UTC_OFFSET: f32 = "utcOffset";
    KEY_CODE: KeyCode = "keyCode";
    TIME_CODE: TimeCode = "timeCode";
    /// Nominal playback rate of the sequence
    FRAMES_PER_SECOND: Rational = "framesPerSecond";
    /// Timecodes per second
    TIMECODE_RATE: i32 = "timecodeRate";
    IMAGE_COUNTER: i32 = "imageCounter";
    REEL_NAME: String = "reelName";
    CHROMATICITIES: Chromaticities = "chromaticities";
    /// Luminance of RGB (1, 1, 1), in nits
    WHITE_LUMINANCE: f32 = "whiteLuminance";
    ADOPTED_NEUTRAL: V2f = "adoptedNeutral";
    RENDERING_TRANSFORM: String = "renderingTransform";
    LOOK_MOD_TRANSFORM: String = "lookModTransform";
    ENVMAP: Envmap = "envmap";
    /// Texture extrapolation modes, e.g. `"clamp,periodic"`
    WRAPMODES: String = "wrapmodes";
    MULTI_VIEW: StringVector = "multiView";
    DEEP_IMAGE_STATE: DeepImageState = "deepImageState";
    DWA_COMPRESSION_LEVEL: f32 = "dwaCompressionLevel",
        deprecated "use the compression settings of the header";
    ID_MANIFEST: CompressedIdManifest = "idManifest";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImfError;
    use crate::types::Rational;

    #[test]
    fn test_catalogue_names_unique() {
        let mut names: Vec<_> = STANDARD_ATTRIBUTES.iter().map(|entry| entry.name).collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
        assert_eq!(count, 53);
    }

    #[test]
    fn test_lookup() {
        let entry = lookup("worldToCamera").unwrap();
        assert_eq!(entry.type_name, "m44f");
        assert!(entry.deprecated.is_none());

        assert!(lookup("dwaCompressionLevel").unwrap().deprecated.is_some());
        assert!(lookup("WorldToCamera").is_none());
    }

    #[test]
    fn test_key_accessors_match_header_operations() {
        let mut header = Header::new();
        assert!(!CAPTURE_RATE.has(&header));
        assert!(matches!(
            CAPTURE_RATE.get(&header).unwrap_err(),
            ImfError::NotFound { .. }
        ));

        CAPTURE_RATE.add(&mut header, Rational::new(24, 1)).unwrap();
        assert!(CAPTURE_RATE.has(&header));
        assert_eq!(
            header.typed::<Rational>("captureRate").unwrap(),
            CAPTURE_RATE.get(&header).unwrap()
        );

        CAPTURE_RATE.get_mut(&mut header).unwrap().numerator = 48;
        assert_eq!(CAPTURE_RATE.get(&header).unwrap().numerator, 48);
    }

    #[test]
    fn test_key_type_mismatch() {
        let mut header = Header::new();
        header.insert("aperture", 4i32).unwrap();
        assert!(matches!(
            APERTURE.get(&header).unwrap_err(),
            ImfError::TypeMismatch { .. }
        ));
        assert!(APERTURE.add(&mut header, 2.8).is_err());
    }

    #[test]
    #[allow(deprecated)]
    fn test_deprecated_key_still_usable() {
        let mut header = Header::new();
        DWA_COMPRESSION_LEVEL.add(&mut header, 45.0).unwrap();
        assert_eq!(*DWA_COMPRESSION_LEVEL.get(&header).unwrap(), 45.0);
        assert_eq!(
            format!("{:?}", DWA_COMPRESSION_LEVEL),
            "AttributeKey(dwaCompressionLevel: float)"
        );
    }
}
