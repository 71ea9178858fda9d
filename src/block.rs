//! Tagged metadata blocks of the v6 header section.
//!
//! # On-disk layout
//! ```text
//! ┌────────────┬──────────────┬──────────────────────┐
//! │ Key (4B)   │ Length (u32) │ Payload (Length B)   │  … repeated
//! └────────────┴──────────────┴──────────────────────┘
//! ```
//! The section is preceded by a u32 holding the sum of `8 + Length` over all
//! blocks.
//!
//! # Registry
//! A [`BlockRegistry`] maps a block key to a [`BlockCodec`].  Keys without a
//! registered codec fall back to [`RawBlockCodec`], which passes payloads
//! through byte-for-byte.  The registry is immutable once built and is shared
//! across concurrent decodes through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{DecodeError, EncodeError};
use crate::primitive::FourCc;

/// Key + length prefix preceding every block payload.
pub const BLOCK_PREFIX_LEN: u64 = 8;

// ── BlockMap ─────────────────────────────────────────────────────────────────

/// Ordered mapping from block key to payload bytes.
///
/// Insertion order is kept so a re-encoded header lays blocks out exactly as
/// they were read.  Inserting an existing key replaces its payload in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMap {
    entries: Vec<(FourCc, Vec<u8>)>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace.  Returns the previous payload for `key`, if any.
    pub fn insert(&mut self, key: FourCc, payload: Vec<u8>) -> Option<Vec<u8>> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, payload)),
            None => {
                self.entries.push((key, payload));
                None
            }
        }
    }

    pub fn get(&self, key: FourCc) -> Option<&[u8]> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_slice())
    }

    pub fn contains_key(&self, key: FourCc) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: FourCc) -> Option<Vec<u8>> {
        let idx = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = FourCc> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FourCc, &[u8])> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

impl FromIterator<(FourCc, Vec<u8>)> for BlockMap {
    fn from_iter<I: IntoIterator<Item = (FourCc, Vec<u8>)>>(iter: I) -> Self {
        let mut map = BlockMap::new();
        for (key, payload) in iter {
            map.insert(key, payload);
        }
        map
    }
}

/// Serialized as a JSON object of key → hex payload, in block order.
impl Serialize for BlockMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, payload) in &self.entries {
            map.serialize_entry(key.as_str(), &hex::encode(payload))?;
        }
        map.end()
    }
}

// ── Codec trait ──────────────────────────────────────────────────────────────

/// Interprets the payload of one block type.
///
/// `decode` sees the raw bytes exactly as stored and returns what is kept in
/// the header; `encode` is its inverse.  Section sizes are always derived from
/// the bytes `encode` returns.
pub trait BlockCodec: Send + Sync {
    fn decode(&self, key: FourCc, raw: Vec<u8>) -> Result<Vec<u8>, DecodeError>;
    fn encode(&self, key: FourCc, payload: &[u8]) -> Result<Vec<u8>, EncodeError>;
}

/// Opaque pass-through; the default for every key.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBlockCodec;

impl BlockCodec for RawBlockCodec {
    fn decode(&self, _: FourCc, raw: Vec<u8>) -> Result<Vec<u8>, DecodeError> { Ok(raw) }
    fn encode(&self, _: FourCc, payload: &[u8]) -> Result<Vec<u8>, EncodeError> { Ok(payload.to_vec()) }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Keyed dispatch from block key to codec, with a raw fallback.
#[derive(Clone)]
pub struct BlockRegistry {
    codecs:   HashMap<FourCc, Arc<dyn BlockCodec>>,
    fallback: Arc<dyn BlockCodec>,
}

impl BlockRegistry {
    /// Registry where every key uses [`RawBlockCodec`].
    pub fn new() -> Self {
        Self {
            codecs:   HashMap::new(),
            fallback: Arc::new(RawBlockCodec),
        }
    }

    /// Builder-style registration; replaces any codec already set for `key`.
    pub fn with_codec(mut self, key: FourCc, codec: impl BlockCodec + 'static) -> Self {
        self.codecs.insert(key, Arc::new(codec));
        self
    }

    /// Replace the codec used for unregistered keys.
    pub fn with_fallback(mut self, codec: impl BlockCodec + 'static) -> Self {
        self.fallback = Arc::new(codec);
        self
    }

    pub fn codec_for(&self, key: FourCc) -> &dyn BlockCodec {
        match self.codecs.get(&key) {
            Some(codec) => codec.as_ref(),
            None => self.fallback.as_ref(),
        }
    }

    pub fn is_registered(&self, key: FourCc) -> bool {
        self.codecs.contains_key(&key)
    }

    /// Run every block through its codec's `encode`, keeping order.
    pub fn encode_all(&self, blocks: &BlockMap) -> Result<Vec<(FourCc, Vec<u8>)>, EncodeError> {
        blocks
            .iter()
            .map(|(key, payload)| -> Result<_, EncodeError> {
                Ok((key, self.codec_for(key).encode(key, payload)?))
            })
            .collect()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&FourCc> = self.codecs.keys().collect();
        keys.sort();
        f.debug_struct("BlockRegistry").field("registered", &keys).finish()
    }
}

/// On-disk length of a serialized block section (without its u32 size field).
pub fn section_len(blocks: &[(FourCc, Vec<u8>)]) -> u64 {
    blocks.iter().map(|(_, raw)| BLOCK_PREFIX_LEN + raw.len() as u64).sum()
}
