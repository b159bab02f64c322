//! Codec registry: the single shared, read-only-after-init dispatch table.
//!
//! Registration runs once during process initialization and is fail-fast on
//! key collisions. After that the table is only ever read, so an `Arc` of
//! the finished registry can be handed to every connection without locking.

mod keys;

pub use keys::{DeserializerKey, MatchEntryKey, SerializerKey};

use std::collections::HashMap;

use crate::codec::{self, MessageDecoder, MessageEncoder};
use crate::error::RegistryError;
use crate::oxm::{self, MatchFieldCodec};

/// Mapping from dispatch keys to codec instances.
pub struct CodecRegistry {
    decoders: HashMap<DeserializerKey, Box<dyn MessageDecoder>>,
    encoders: HashMap<SerializerKey, Box<dyn MessageEncoder>>,
    match_fields: HashMap<MatchEntryKey, Box<dyn MatchFieldCodec>>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
            encoders: HashMap::new(),
            match_fields: HashMap::new(),
        }
    }

    /// Create a registry with the built-in message catalog and OXM field
    /// codecs for OpenFlow 1.0 and 1.3 registered.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        codec::register_defaults(&mut registry)?;
        oxm::register_defaults(&mut registry)?;
        Ok(registry)
    }

    pub fn register_deserializer(
        &mut self,
        key: DeserializerKey,
        codec: Box<dyn MessageDecoder>,
    ) -> Result<(), RegistryError> {
        if self.decoders.contains_key(&key) {
            return Err(RegistryError::DuplicateRegistration(key.to_string()));
        }
        self.decoders.insert(key, codec);
        Ok(())
    }

    pub fn register_serializer(
        &mut self,
        key: SerializerKey,
        codec: Box<dyn MessageEncoder>,
    ) -> Result<(), RegistryError> {
        if self.encoders.contains_key(&key) {
            return Err(RegistryError::DuplicateRegistration(key.to_string()));
        }
        self.encoders.insert(key, codec);
        Ok(())
    }

    pub fn register_match_field(
        &mut self,
        key: MatchEntryKey,
        codec: Box<dyn MatchFieldCodec>,
    ) -> Result<(), RegistryError> {
        if self.match_fields.contains_key(&key) {
            return Err(RegistryError::DuplicateRegistration(key.to_string()));
        }
        self.match_fields.insert(key, codec);
        Ok(())
    }

    /// Look up a decoder. Pure and side-effect-free.
    pub fn deserializer(&self, key: &DeserializerKey) -> Result<&dyn MessageDecoder, RegistryError> {
        self.decoders
            .get(key)
            .map(Box::as_ref)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    /// Look up an encoder. Pure and side-effect-free.
    pub fn serializer(&self, key: &SerializerKey) -> Result<&dyn MessageEncoder, RegistryError> {
        self.encoders
            .get(key)
            .map(Box::as_ref)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    /// Look up a match-field codec. Pure and side-effect-free.
    pub fn match_field(&self, key: &MatchEntryKey) -> Result<&dyn MatchFieldCodec, RegistryError> {
        self.match_fields
            .get(key)
            .map(Box::as_ref)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    /// Number of registered decoders.
    pub fn deserializer_count(&self) -> usize {
        self.decoders.len()
    }

    /// Number of registered encoders.
    pub fn serializer_count(&self) -> usize {
        self.encoders.len()
    }

    /// Number of registered match-field codecs.
    pub fn match_field_count(&self) -> usize {
        self.match_fields.len()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("decoders", &self.decoders.len())
            .field("encoders", &self.encoders.len())
            .field("match_fields", &self.match_fields.len())
            .finish()
    }
}
