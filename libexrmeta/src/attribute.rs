//! Type-erased attribute holders
//!
//! A [`Header`](crate::Header) stores every attribute as a
//! `Box<dyn Attribute>`. Values of known types live in a
//! [`TypedAttribute<T>`]; payloads whose type name no registry recognised
//! live in an [`OpaqueAttribute`] that carries the raw bytes unchanged.

use std::any::Any;
use std::fmt::Debug;

use serde::ser::Error as _;

use crate::codec::AttributeValue;
use crate::error::{ImfError, Result};

/// Runtime interface shared by every attribute holder
pub trait Attribute: Any + Debug + Send + Sync + 'static {
    /// Wire type name of the payload; never changes for a given holder
    fn type_name(&self) -> &str;

    /// Type name exactly as written to the wire
    ///
    /// Differs from [`Attribute::type_name`] only for opaque payloads whose
    /// type name was not valid UTF-8.
    fn type_name_bytes(&self) -> &[u8] {
        self.type_name().as_bytes()
    }

    /// Append the encoded payload to `out`
    fn encode(&self, out: &mut Vec<u8>);

    /// Replace the held value with one decoded from `bytes`
    ///
    /// On error the previous value is left untouched.
    fn decode_from(&mut self, bytes: &[u8]) -> Result<()>;

    /// Deep copy of the holder
    fn copy(&self) -> Box<dyn Attribute>;

    /// Same holder type and equal value
    fn equals(&self, other: &dyn Attribute) -> bool;

    /// JSON view of the value, used by tools
    fn to_json(&self) -> Result<serde_json::Value>;

    /// Replace the value from its JSON view
    fn set_json(&mut self, value: serde_json::Value) -> Result<()>;

    /// True for holders of unrecognized payloads
    fn is_opaque(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Encoded payload as a fresh buffer
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// CRC-32 of the encoded payload
    fn checksum(&self) -> u32 {
        crc32fast::hash(&self.to_bytes())
    }
}

impl Clone for Box<dyn Attribute> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl PartialEq for dyn Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

/// Holder for a value whose type is known at compile time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedAttribute<T> {
    value: T,
}

impl<T: AttributeValue> TypedAttribute<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T: AttributeValue> Attribute for TypedAttribute<T> {
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn encode(&self, out: &mut Vec<u8>) {
        self.value.encode(out);
    }

    fn decode_from(&mut self, bytes: &[u8]) -> Result<()> {
        self.value = T::decode(bytes)?;
        Ok(())
    }

    fn copy(&self) -> Box<dyn Attribute> {
        Box::new(self.clone())
    }

    fn equals(&self, other: &dyn Attribute) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .map_or(false, |other| other.value == self.value)
    }

    /// Fails for values holding a non-finite float, which JSON has no
    /// number for
    fn to_json(&self) -> Result<serde_json::Value> {
        let json = serde_json::to_value(&self.value)?;
        if contains_null(&json) {
            return Err(ImfError::Json(serde_json::Error::custom(format!(
                "{} value {:?} holds a non-finite float",
                T::TYPE_NAME,
                self.value
            ))));
        }
        Ok(json)
    }

    fn set_json(&mut self, value: serde_json::Value) -> Result<()> {
        self.value = serde_json::from_value(value)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// Value types never serialize to null, so a null can only come from NaN or inf
fn contains_null(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Array(items) => items.iter().any(contains_null),
        serde_json::Value::Object(fields) => fields.values().any(contains_null),
        _ => false,
    }
}

/// Holder for a payload of an unrecognized type
///
/// The bytes are kept exactly as read so that writing the header again
/// reproduces them. That includes the type name: one that is not valid
/// UTF-8 is kept as raw bytes next to a lossy display form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueAttribute {
    type_name: String,
    raw_type_name: Option<Vec<u8>>,
    data: Vec<u8>,
}

impl OpaqueAttribute {
    pub fn new(type_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            raw_type_name: None,
            data,
        }
    }

    /// Opaque payload whose type name may not be valid UTF-8
    pub fn with_raw_type_name(type_name: Vec<u8>, data: Vec<u8>) -> Self {
        match String::from_utf8(type_name) {
            Ok(type_name) => Self::new(type_name, data),
            Err(e) => Self {
                type_name: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                raw_type_name: Some(e.into_bytes()),
                data,
            },
        }
    }

    /// False if [`Attribute::type_name`] is only a lossy rendering
    pub fn has_utf8_type_name(&self) -> bool {
        self.raw_type_name.is_none()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl Attribute for OpaqueAttribute {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn type_name_bytes(&self) -> &[u8] {
        self.raw_type_name
            .as_deref()
            .unwrap_or_else(|| self.type_name.as_bytes())
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data);
    }

    fn decode_from(&mut self, bytes: &[u8]) -> Result<()> {
        self.data = bytes.to_vec();
        Ok(())
    }

    fn copy(&self) -> Box<dyn Attribute> {
        Box::new(self.clone())
    }

    fn equals(&self, other: &dyn Attribute) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .map_or(false, |other| other == self)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.data)?)
    }

    fn set_json(&mut self, value: serde_json::Value) -> Result<()> {
        self.data = serde_json::from_value(value)
            .map_err(|e| ImfError::decode(&self.type_name, format!("expected a byte array: {e}")))?;
        Ok(())
    }

    fn is_opaque(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
