//! Immutable tag maps and their canonical byte-signature encoding.
//!
//! A [`TagMap`] is never mutated in place: [`TagMap::new`] copies a parent map and applies a
//! list of [`TagMutator`]s, producing a new, independent map. This mirrors how the ambient
//! call-context in [`crate::context`] is threaded through a call tree — children can extend or
//! shadow their parent's tags without being able to affect it.

pub mod context;

use crate::MetricsError;
use integer_encoding::VarInt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum number of bytes allowed in a [`Key`] name.
pub const MAX_KEY_LENGTH: usize = 255;

/// A named, validated string identifier used to tag measurements.
///
/// Keys are cheap to clone (backed by `Arc<str>`) and compare/hash/order by their name.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Key(Arc<str>);

impl Key {
    /// Creates a new key, validating that `name` is non-empty, no longer than
    /// [`MAX_KEY_LENGTH`] bytes, and restricted to printable ASCII.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidArgument`] if validation fails.
    pub fn new(name: impl Into<String>) -> Result<Self, MetricsError> {
        let name = name.into();
        validate_key_name(&name)?;
        Ok(Self(Arc::from(name)))
    }

    /// Returns the key's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_key_name(name: &str) -> Result<(), MetricsError> {
    if name.is_empty() {
        return Err(MetricsError::InvalidArgument("key name must not be empty".into()));
    }
    if name.len() > MAX_KEY_LENGTH {
        return Err(MetricsError::InvalidArgument(format!(
            "key name {name:?} exceeds {MAX_KEY_LENGTH} bytes"
        )));
    }
    if !name.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(MetricsError::InvalidArgument(format!(
            "key name {name:?} must be printable ASCII"
        )));
    }
    Ok(())
}

/// A `(key, value)` pair applied by a [`TagMutator`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tag {
    /// The tag's key.
    pub key: Key,
    /// The tag's value. Not constrained beyond UTF-8; backends may advise a length limit.
    pub value: Arc<str>,
}

impl Tag {
    /// Creates a new tag.
    pub fn new(key: Key, value: impl Into<Arc<str>>) -> Self {
        Self { key, value: value.into() }
    }
}

/// An operation applied by [`TagMap::new`] when building a derived map.
#[derive(Clone, Debug)]
pub enum TagMutator {
    /// Adds the tag only if its key is absent from the parent map.
    Insert(Tag),
    /// Sets the tag's value only if its key is already present in the parent map.
    Update(Tag),
    /// Adds or replaces the tag unconditionally.
    Upsert(Tag),
    /// Removes the key, if present.
    Delete(Key),
}

/// An immutable, unordered mapping from [`Key`] to string value.
///
/// Backed by a `BTreeMap` so that structural equality does not depend on insertion order.
/// Cloning a `TagMap` is cheap: keys and values are both reference-counted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagMap {
    entries: BTreeMap<Key, Arc<str>>,
}

impl TagMap {
    /// Returns a new, empty tag map.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a new map by cloning `parent` and applying `mutators` in order.
    ///
    /// # Errors
    /// This never fails today (mutators carry already-validated [`Key`]s), but returns
    /// `Result` so that future mutator variants can validate without a breaking change.
    pub fn new(
        parent: &TagMap,
        mutators: impl IntoIterator<Item = TagMutator>,
    ) -> Result<Self, MetricsError> {
        let mut entries = parent.entries.clone();
        for mutator in mutators {
            match mutator {
                TagMutator::Insert(tag) => {
                    entries.entry(tag.key).or_insert(tag.value);
                }
                TagMutator::Update(tag) => {
                    if let Some(slot) = entries.get_mut(&tag.key) {
                        *slot = tag.value;
                    }
                }
                TagMutator::Upsert(tag) => {
                    entries.insert(tag.key, tag.value);
                }
                TagMutator::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(Self { entries })
    }

    /// Returns the value bound to `key`, if present.
    #[must_use]
    pub fn value(&self, key: &Key) -> Option<&str> {
        self.entries.get(key).map(AsRef::as_ref)
    }

    /// Returns `true` if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the map's tags. Order follows `Key`'s `Ord` impl (lexicographic by name),
    /// not insertion order — the map does not track insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_ref()))
    }

    /// Produces the canonical tag-signature for this map restricted to `keys`.
    ///
    /// For each key in `keys`, in order, appends `uvarint(len(value))` followed by the value's
    /// bytes; a key absent from the map contributes a zero length and no bytes. Two tag maps
    /// with identical values under the same key list always produce identical signatures,
    /// regardless of how each map was built up.
    #[must_use]
    pub fn encode(&self, keys: &[Key]) -> Vec<u8> {
        let mut out = Vec::new();
        for key in keys {
            let value = self.value(key).unwrap_or("");
            let mut len_buf = [0u8; 10];
            let len_written = value.len().encode_var(&mut len_buf);
            out.extend_from_slice(&len_buf[..len_written]);
            out.extend_from_slice(value.as_bytes());
        }
        out
    }

    /// Reconstructs a tag map from a signature produced by [`TagMap::encode`] with the same
    /// `keys` (in the same order).
    ///
    /// # Panics
    /// Panics if `bytes` is not a well-formed encoding of `keys.len()` entries. Callers should
    /// only ever decode signatures the collector itself produced via `encode`.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn decode(bytes: &[u8], keys: &[Key]) -> Self {
        let mut entries = BTreeMap::new();
        let mut rest = bytes;
        for key in keys {
            let (len, consumed) =
                usize::decode_var(rest).expect("malformed tag signature: missing length prefix");
            rest = &rest[consumed..];
            let value_bytes = &rest[..len];
            rest = &rest[len..];
            if len > 0 {
                let value = std::str::from_utf8(value_bytes)
                    .expect("malformed tag signature: non-UTF-8 value");
                entries.insert(key.clone(), Arc::from(value));
            }
        }
        Self { entries }
    }
}
