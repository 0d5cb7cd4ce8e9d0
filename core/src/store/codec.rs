//! Settings image format
//!
//! Entries are `key:value` joined by commas; a trailing comma is tolerated and
//! always written. There is no escaping, so neither keys nor values may
//! contain `:` or `,`.

use heapless::{FnvIndexMap, String, Vec};

use super::StoreError;

/// Maximum number of settings
pub const MAX_SETTINGS: usize = 16;
/// Maximum key length in bytes
pub const MAX_KEY_LEN: usize = 24;
/// Maximum value length in bytes
pub const MAX_VALUE_LEN: usize = 64;
/// Maximum encoded image length in bytes
pub const MAX_IMAGE_LEN: usize = 1536;

pub type Key = String<MAX_KEY_LEN>;
pub type Value = String<MAX_VALUE_LEN>;
pub type Entries = FnvIndexMap<Key, Value, MAX_SETTINGS>;
pub type Image = Vec<u8, MAX_IMAGE_LEN>;

const ENTRY_SEPARATOR: char = ',';
const KEY_SEPARATOR: char = ':';

/// Reasons a stored image could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Image is not valid UTF-8
    NotUtf8,
    /// An entry does not contain exactly one `:`
    MalformedEntry,
    /// An entry has an empty key
    EmptyKey,
    /// A key or value exceeds its capacity
    TooLong,
    /// More entries than the store can hold
    TooManyEntries,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotUtf8 => write!(f, "image is not UTF-8"),
            Self::MalformedEntry => write!(f, "malformed entry"),
            Self::EmptyKey => write!(f, "empty key"),
            Self::TooLong => write!(f, "key or value too long"),
            Self::TooManyEntries => write!(f, "too many entries"),
        }
    }
}

/// Check that a key/value pair can be represented in the image format
pub fn validate_entry(key: &str, value: &str) -> Result<(), StoreError> {
    let forbidden = |c: char| c == KEY_SEPARATOR || c == ENTRY_SEPARATOR;
    if key.is_empty() || key.contains(forbidden) || value.contains(forbidden) {
        return Err(StoreError::InvalidEntry);
    }
    if key.len() > MAX_KEY_LEN || value.len() > MAX_VALUE_LEN {
        return Err(StoreError::Capacity);
    }
    Ok(())
}

pub fn decode(bytes: &[u8]) -> Result<Entries, DecodeError> {
    let text = core::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
    let text = text.trim().trim_matches(ENTRY_SEPARATOR);

    let mut entries = Entries::new();
    if text.is_empty() {
        return Ok(entries);
    }

    for entry in text.split(ENTRY_SEPARATOR) {
        let mut parts = entry.split(KEY_SEPARATOR);
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DecodeError::MalformedEntry);
        };
        if key.is_empty() {
            return Err(DecodeError::EmptyKey);
        }

        let mut k = Key::new();
        let mut v = Value::new();
        k.push_str(key).map_err(|_| DecodeError::TooLong)?;
        v.push_str(value).map_err(|_| DecodeError::TooLong)?;
        entries
            .insert(k, v)
            .map_err(|_| DecodeError::TooManyEntries)?;
    }
    Ok(entries)
}

pub fn encode(entries: &Entries) -> Result<Image, StoreError> {
    let mut image = Image::new();
    for (key, value) in entries {
        push_entry(&mut image, key, value).map_err(|_| StoreError::Capacity)?;
    }
    Ok(image)
}

fn push_entry(image: &mut Image, key: &str, value: &str) -> Result<(), ()> {
    image.extend_from_slice(key.as_bytes())?;
    image.push(KEY_SEPARATOR as u8).map_err(drop)?;
    image.extend_from_slice(value.as_bytes())?;
    image.push(ENTRY_SEPARATOR as u8).map_err(drop)
}
