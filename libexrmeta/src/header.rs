//! Ordered, name-keyed attribute store

use std::collections::HashMap;

use log::debug;

use crate::attribute::{Attribute, OpaqueAttribute, TypedAttribute};
use crate::codec::AttributeValue;
use crate::error::{ImfError, Result};
use crate::registry::TypeRegistry;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    attribute: Box<dyn Attribute>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.attribute.equals(other.attribute.as_ref())
    }
}

/// The metadata attributes of one image header
///
/// Attributes keep the order in which their names were first inserted; that
/// order is the serialization order. Each name holds at most one attribute
/// and keeps its type name for as long as it is present: replacing a value
/// with one of another type fails with [`ImfError::TypeMismatch`].
///
/// A `Header` is mutated through `&mut self` only, so sharing one between
/// threads is safe once it is fully built.
#[derive(Debug, Clone, Default)]
pub struct Header {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

/// One attribute visited by [`Header::iter`]
#[derive(Debug, Clone, Copy)]
pub struct AttributeRef<'a> {
    pub name: &'a str,
    pub type_name: &'a str,
    pub attribute: &'a dyn Attribute,
}

/// Iterator over the attributes of a header in insertion order
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, Entry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = AttributeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| AttributeRef {
            name: &entry.name,
            type_name: entry.attribute.type_name(),
            attribute: entry.attribute.as_ref(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a Header {
    type Item = AttributeRef<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Check that `name` can be stored and written
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty".to_string()
    } else if name.as_bytes().contains(&0) {
        "name contains a NUL byte".to_string()
    } else if name.len() > crate::MAX_NAME_LENGTH {
        format!("name is longer than {} bytes", crate::MAX_NAME_LENGTH)
    } else {
        return Ok(());
    };
    Err(ImfError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

fn type_mismatch(name: &str, expected: &str, found: &str) -> ImfError {
    ImfError::TypeMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

impl Header {
    /// Create an empty header
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if an attribute called `name` is present, whatever its type
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Insert or replace the value stored under `name`
    ///
    /// A new name is appended at the end of the order. Replacing keeps the
    /// original position; an opaque attribute with the same type name is
    /// upgraded to a typed holder in place. A typed holder of another Rust
    /// type is never replaced, even if both share the type name.
    pub fn insert<T: AttributeValue>(&mut self, name: &str, value: T) -> Result<()> {
        validate_name(name)?;
        let Some(&position) = self.index.get(name) else {
            self.push(name, Box::new(TypedAttribute::new(value)));
            return Ok(());
        };

        let existing = &mut self.entries[position].attribute;
        if let Some(typed) = existing.as_any_mut().downcast_mut::<TypedAttribute<T>>() {
            *typed.value_mut() = value;
            return Ok(());
        }
        if existing.is_opaque() && existing.type_name() == T::TYPE_NAME {
            *existing = Box::new(TypedAttribute::new(value));
            return Ok(());
        }
        Err(type_mismatch(name, T::TYPE_NAME, existing.type_name()))
    }

    /// Insert or replace a type-erased attribute under `name`
    ///
    /// Follows the same rules as [`Header::insert`]: the type names must
    /// match, and two typed holders must also hold the same Rust type.
    pub fn insert_attribute(&mut self, name: &str, attribute: Box<dyn Attribute>) -> Result<()> {
        validate_name(name)?;
        match self.index.get(name) {
            Some(&position) => {
                let existing = &mut self.entries[position].attribute;
                let other_holder = !existing.is_opaque()
                    && !attribute.is_opaque()
                    && existing.as_any().type_id() != attribute.as_any().type_id();
                if existing.type_name() != attribute.type_name() || other_holder {
                    return Err(type_mismatch(
                        name,
                        attribute.type_name(),
                        existing.type_name(),
                    ));
                }
                *existing = attribute;
            }
            None => self.push(name, attribute),
        }
        Ok(())
    }

    fn push(&mut self, name: &str, attribute: Box<dyn Attribute>) {
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(Entry {
            name: name.to_string(),
            attribute,
        });
    }

    /// Untyped access to the attribute stored under `name`
    pub fn get(&self, name: &str) -> Option<&dyn Attribute> {
        let position = *self.index.get(name)?;
        Some(self.entries[position].attribute.as_ref())
    }

    /// Untyped mutable access; the holder's type cannot be changed through it
    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn Attribute> {
        let position = *self.index.get(name)?;
        Some(self.entries[position].attribute.as_mut())
    }

    /// Value stored under `name`, if it has exactly the type `T`
    pub fn typed<T: AttributeValue>(&self, name: &str) -> Result<&T> {
        let attribute = self.get(name).ok_or_else(|| ImfError::not_found(name))?;
        attribute
            .as_any()
            .downcast_ref::<TypedAttribute<T>>()
            .map(TypedAttribute::value)
            .ok_or_else(|| type_mismatch(name, T::TYPE_NAME, attribute.type_name()))
    }

    /// Mutable value stored under `name`, if it has exactly the type `T`
    pub fn typed_mut<T: AttributeValue>(&mut self, name: &str) -> Result<&mut T> {
        let attribute = self.get(name).ok_or_else(|| ImfError::not_found(name))?;
        if !attribute.as_any().is::<TypedAttribute<T>>() {
            return Err(type_mismatch(name, T::TYPE_NAME, attribute.type_name()));
        }
        self.get_mut(name)
            .and_then(|attribute| attribute.as_any_mut().downcast_mut::<TypedAttribute<T>>())
            .map(TypedAttribute::value_mut)
            .ok_or_else(|| ImfError::not_found(name))
    }

    /// Remove the attribute stored under `name`
    ///
    /// Removing a name that is not present is a no-op and returns `None`.
    /// The remaining attributes keep their relative order.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Attribute>> {
        let position = self.index.remove(name)?;
        let entry = self.entries.remove(position);
        for later in &self.entries[position..] {
            if let Some(slot) = self.index.get_mut(&later.name) {
                *slot -= 1;
            }
        }
        Some(entry.attribute)
    }

    /// Visit every attribute in insertion order
    ///
    /// The iterator borrows the header; call `iter` again to restart.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    /// Attribute names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Retry opaque attributes against `registry`
    ///
    /// Opaque attributes whose type name is now registered and whose payload
    /// decodes are replaced by typed holders at the same position. Payloads
    /// that still fail to decode stay opaque and their errors are returned.
    pub fn resolve(&mut self, registry: &TypeRegistry) -> Vec<ImfError> {
        let mut errors = Vec::new();
        for entry in &mut self.entries {
            let Some(opaque) = entry.attribute.as_any().downcast_ref::<OpaqueAttribute>() else {
                continue;
            };
            if !opaque.has_utf8_type_name() {
                continue;
            }
            let Some(mut holder) = registry.construct(opaque.type_name()) else {
                continue;
            };
            match holder.decode_from(opaque.data()) {
                Ok(()) => {
                    debug!("Resolved attribute {} as {}", entry.name, holder.type_name());
                    entry.attribute = holder;
                }
                Err(e) => errors.push(e),
            }
        }
        errors
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Box2i, Rational, V2i};

    #[test]
    fn test_insert_and_typed_get() {
        let mut header = Header::new();
        header.insert("aperture", 2.8f32).unwrap();

        assert!(header.contains("aperture"));
        assert_eq!(*header.typed::<f32>("aperture").unwrap(), 2.8);

        let err = header.typed::<i32>("aperture").unwrap_err();
        assert!(matches!(
            err,
            ImfError::TypeMismatch { ref expected, ref found, .. }
                if expected == "int" && found == "float"
        ));
        assert!(matches!(
            header.typed::<f32>("focus").unwrap_err(),
            ImfError::NotFound { .. }
        ));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut header = Header::new();
        header.insert("owner", "alice".to_string()).unwrap();
        header.insert("captureRate", Rational::new(24, 1)).unwrap();
        header.insert("comments", "first take".to_string()).unwrap();

        header.insert("owner", "bob".to_string()).unwrap();

        let names: Vec<_> = header.names().collect();
        assert_eq!(names, vec!["owner", "captureRate", "comments"]);
        assert_eq!(header.typed::<String>("owner").unwrap(), "bob");
        assert_eq!(header.len(), 3);
    }

    #[test]
    fn test_replace_with_other_type_fails() {
        let mut header = Header::new();
        header.insert("imageCounter", 7i32).unwrap();

        let err = header.insert("imageCounter", 7.0f32).unwrap_err();
        assert!(matches!(err, ImfError::TypeMismatch { .. }));
        assert_eq!(*header.typed::<i32>("imageCounter").unwrap(), 7);
    }

    #[test]
    fn test_typed_mut_modifies_in_place() {
        let mut header = Header::new();
        let window = Box2i::new(V2i::new(0, 0), V2i::new(99, 99));
        header.insert("originalDataWindow", window).unwrap();

        header.typed_mut::<Box2i>("originalDataWindow").unwrap().max.x = 199;
        assert_eq!(header.typed::<Box2i>("originalDataWindow").unwrap().width(), 200);
        assert!(header.typed_mut::<f32>("originalDataWindow").is_err());
        assert!(header.typed_mut::<f32>("missing").is_err());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut header = Header::new();
        assert!(matches!(
            header.insert("", 1i32).unwrap_err(),
            ImfError::InvalidName { .. }
        ));
        assert!(header.insert("bad\0name", 1i32).is_err());
        assert!(header.insert(&"x".repeat(256), 1i32).is_err());
        assert!(header.insert(&"x".repeat(255), 1i32).is_ok());
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut header = Header::new();
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            header.insert(name, i as i32).unwrap();
        }

        assert!(header.remove("b").is_some());
        assert!(header.remove("b").is_none());
        assert!(!header.contains("b"));

        let names: Vec<_> = header.names().collect();
        assert_eq!(names, vec!["a", "c", "d"]);
        assert_eq!(*header.typed::<i32>("d").unwrap(), 3);

        header.insert("b", 9i32).unwrap();
        let names: Vec<_> = header.iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let mut header = Header::new();
        header.insert("xDensity", 72.0f32).unwrap();
        header.insert("owner", "alice".to_string()).unwrap();

        let first: Vec<_> = header.iter().map(|a| (a.name, a.type_name)).collect();
        let second: Vec<_> = (&header).into_iter().map(|a| (a.name, a.type_name)).collect();
        assert_eq!(first, vec![("xDensity", "float"), ("owner", "string")]);
        assert_eq!(first, second);
        assert_eq!(header.iter().len(), 2);
    }

    #[test]
    fn test_opaque_upgraded_by_typed_insert() {
        let mut header = Header::new();
        header
            .insert_attribute("focus", Box::new(OpaqueAttribute::new("float", vec![0; 4])))
            .unwrap();
        header.insert("focus", 3.5f32).unwrap();
        assert_eq!(*header.typed::<f32>("focus").unwrap(), 3.5);

        let err = header
            .insert_attribute("focus", Box::new(OpaqueAttribute::new("futureType99", vec![])))
            .unwrap_err();
        assert!(matches!(err, ImfError::TypeMismatch { .. }));
    }

    /// Second Rust type sharing the `float` wire name
    #[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
    struct RawFloat(u32);

    impl AttributeValue for RawFloat {
        const TYPE_NAME: &'static str = "float";

        fn encode(&self, out: &mut Vec<u8>) {
            out.extend_from_slice(&self.0.to_le_bytes());
        }

        fn decode(bytes: &[u8]) -> Result<Self> {
            let raw: [u8; 4] = bytes
                .try_into()
                .map_err(|_| ImfError::decode(Self::TYPE_NAME, "expected 4 bytes"))?;
            Ok(Self(u32::from_le_bytes(raw)))
        }
    }

    #[test]
    fn test_same_type_name_other_rust_type_is_mismatch() {
        let mut header = Header::new();
        header.insert("focus", 1.0f32).unwrap();

        let err = header.insert("focus", RawFloat(7)).unwrap_err();
        assert!(matches!(err, ImfError::TypeMismatch { .. }));
        assert_eq!(*header.typed::<f32>("focus").unwrap(), 1.0);
        assert!(header.typed::<RawFloat>("focus").is_err());

        let err = header
            .insert_attribute("focus", Box::new(TypedAttribute::new(RawFloat(7))))
            .unwrap_err();
        assert!(matches!(err, ImfError::TypeMismatch { .. }));
        assert_eq!(*header.typed::<f32>("focus").unwrap(), 1.0);
    }

    #[test]
    fn test_resolve_upgrades_opaque() {
        let mut header = Header::new();
        let rate = Rational::new(30000, 1001);
        let mut bytes = Vec::new();
        rate.encode(&mut bytes);
        header
            .insert_attribute("framesPerSecond", Box::new(OpaqueAttribute::new("rational", bytes)))
            .unwrap();
        header
            .insert_attribute("broken", Box::new(OpaqueAttribute::new("rational", vec![1])))
            .unwrap();

        let errors = header.resolve(&TypeRegistry::with_standard_types());
        assert_eq!(errors.len(), 1);
        assert_eq!(*header.typed::<Rational>("framesPerSecond").unwrap(), rate);
        assert!(header.get("broken").unwrap().is_opaque());
    }

    #[test]
    fn test_clone_and_equality() {
        let mut header = Header::new();
        header.insert("owner", "alice".to_string()).unwrap();
        header.insert("isoSpeed", 800.0f32).unwrap();

        let mut copy = header.clone();
        assert_eq!(copy, header);

        *copy.typed_mut::<f32>("isoSpeed").unwrap() = 400.0;
        assert_ne!(copy, header);
        assert_eq!(*header.typed::<f32>("isoSpeed").unwrap(), 800.0);
    }
}
