//! Runtime type discovery for decoding
//!
//! A [`TypeRegistry`] maps wire type names to factories producing empty
//! holders. It is built once, then shared by reference with every decode:
//! decoding only needs `&TypeRegistry`, so the registry cannot change while a
//! header is being read.

use std::any::TypeId;
use std::collections::HashMap;

use log::debug;

use crate::attribute::{Attribute, TypedAttribute};
use crate::codec::AttributeValue;
use crate::error::{ImfError, Result};
use crate::types::{
    Box2f, Box2i, Chromaticities, CompressedIdManifest, DeepImageState, Envmap, KeyCode, M33d,
    M33f, M44d, M44f, Rational, StringVector, TimeCode, V2d, V2f, V2i, V3d, V3f, V3i,
};

/// Zero-argument constructor for an empty attribute holder
pub type AttributeFactory = fn() -> Box<dyn Attribute>;

#[derive(Debug, Clone, Copy)]
struct RegistryEntry {
    factory: AttributeFactory,
    holder: TypeId,
}

/// Type name to factory mapping
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

fn typed_factory<T: AttributeValue>() -> Box<dyn Attribute> {
    Box::new(TypedAttribute::<T>::default())
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every value type shipped with this crate
    pub fn with_standard_types() -> Self {
        let mut registry = Self::new();
        registry.add::<i32>();
        registry.add::<f32>();
        registry.add::<f64>();
        registry.add::<String>();
        registry.add::<StringVector>();
        registry.add::<V2i>();
        registry.add::<V2f>();
        registry.add::<V2d>();
        registry.add::<V3i>();
        registry.add::<V3f>();
        registry.add::<V3d>();
        registry.add::<Box2i>();
        registry.add::<Box2f>();
        registry.add::<M33f>();
        registry.add::<M33d>();
        registry.add::<M44f>();
        registry.add::<M44d>();
        registry.add::<Rational>();
        registry.add::<Chromaticities>();
        registry.add::<KeyCode>();
        registry.add::<TimeCode>();
        registry.add::<Envmap>();
        registry.add::<DeepImageState>();
        registry.add::<CompressedIdManifest>();
        registry
    }

    fn add<T: AttributeValue>(&mut self) {
        self.entries.insert(
            T::TYPE_NAME.to_string(),
            RegistryEntry {
                factory: typed_factory::<T>,
                holder: TypeId::of::<TypedAttribute<T>>(),
            },
        );
    }

    /// Register the value type `T` under its wire type name
    ///
    /// Registering the same type twice is a no-op. Registering a different
    /// type under a name that is already taken fails with
    /// [`ImfError::RegistryConflict`].
    pub fn register<T: AttributeValue>(&mut self) -> Result<()> {
        self.register_entry(
            T::TYPE_NAME,
            RegistryEntry {
                factory: typed_factory::<T>,
                holder: TypeId::of::<TypedAttribute<T>>(),
            },
        )
    }

    /// Register a custom holder factory under `type_name`
    ///
    /// The factory is called once to check that its holders report
    /// `type_name` and to identify the holder type for conflict detection.
    pub fn register_factory(&mut self, type_name: &str, factory: AttributeFactory) -> Result<()> {
        let probe = factory();
        if probe.type_name() != type_name {
            return Err(ImfError::InvalidName {
                name: type_name.to_string(),
                reason: format!("factory produces {} holders", probe.type_name()),
            });
        }
        let holder = probe.as_any().type_id();
        self.register_entry(type_name, RegistryEntry { factory, holder })
    }

    fn register_entry(&mut self, type_name: &str, entry: RegistryEntry) -> Result<()> {
        match self.entries.get(type_name) {
            Some(existing) if existing.holder == entry.holder => Ok(()),
            Some(_) => Err(ImfError::RegistryConflict {
                type_name: type_name.to_string(),
            }),
            None => {
                debug!("Registered attribute type {}", type_name);
                self.entries.insert(type_name.to_string(), entry);
                Ok(())
            }
        }
    }

    /// Construct an empty holder for `type_name`
    ///
    /// `None` means the type is unrecognized; callers keep such payloads
    /// as opaque attributes.
    pub fn construct(&self, type_name: &str) -> Option<Box<dyn Attribute>> {
        self.entries.get(type_name).map(|entry| (entry.factory)())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
