//! A lookup of message types by destination-style name, for consumers that
//! read several destinations and need to decode each record back into its
//! concrete type.

use std::{any::Any, any::TypeId, fmt::Debug};

use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    codec::{Codec, CodecError},
    destination::{NameError, qualified_type_name},
    message::Message,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("type {new} conflicts with already registered type {existing} under name {name:?}")]
    Conflict {
        name: String,
        existing: &'static str,
        new: &'static str,
    },

    #[error("no type registered under name {0:?}")]
    UnknownType(String),

    #[error("name {name:?} is registered for type {registered}, not {requested}")]
    TypeMismatch {
        name: String,
        registered: &'static str,
        requested: &'static str,
    },

    #[error(transparent)]
    Name(#[from] NameError),

    #[error("failed to decode record: {0}")]
    Decode(#[from] CodecError),
}

type DecodeFn = fn(Codec, &[u8]) -> Result<Box<dyn Any + Send>, CodecError>;

struct Entry {
    type_id: TypeId,
    type_path: &'static str,
    decode: DecodeFn,
}

fn decode_boxed<T: DeserializeOwned + Send + 'static>(
    codec: Codec,
    data: &[u8],
) -> Result<Box<dyn Any + Send>, CodecError> {
    Ok(Box::new(codec.decode::<T>(data)?))
}

/// Message types keyed by their lower-cased qualified name
/// (`module-path.typename`).
#[derive(Default)]
pub struct MessageTypeRegistry {
    types: HashMap<String, Entry>,
}

impl Debug for MessageTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.types.iter().map(|(name, e)| (name, e.type_path)))
            .finish()
    }
}

impl MessageTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, returning the name it is registered under. Registering
    /// the same type twice is a no-op.
    pub fn register<T: Message + DeserializeOwned>(&mut self) -> Result<String, RegistryError> {
        let name = qualified_type_name(T::type_path())?.to_lowercase();

        if let Some(existing) = self.types.get(&name) {
            if existing.type_id == TypeId::of::<T>() {
                return Ok(name);
            }
            return Err(RegistryError::Conflict {
                name,
                existing: existing.type_path,
                new: T::type_path(),
            });
        }

        self.types.insert(
            name.clone(),
            Entry {
                type_id: TypeId::of::<T>(),
                type_path: T::type_path(),
                decode: decode_boxed::<T>,
            },
        );
        Ok(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn type_path(&self, name: &str) -> Option<&'static str> {
        self.types.get(name).map(|e| e.type_path)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Decode `data` into the type registered under `name`.
    pub fn decode(
        &self,
        name: &str,
        codec: Codec,
        data: &[u8],
    ) -> Result<Box<dyn Any + Send>, RegistryError> {
        let entry = self
            .types
            .get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))?;
        Ok((entry.decode)(codec, data)?)
    }

    /// Decode `data` as `T`, which must be the type registered under `name`.
    pub fn decode_as<T: Message + DeserializeOwned>(
        &self,
        name: &str,
        codec: Codec,
        data: &[u8],
    ) -> Result<T, RegistryError> {
        let entry = self
            .types
            .get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))?;
        if entry.type_id != TypeId::of::<T>() {
            return Err(RegistryError::TypeMismatch {
                name: name.to_string(),
                registered: entry.type_path,
                requested: T::type_path(),
            });
        }
        Ok(codec.decode(data)?)
    }
}
