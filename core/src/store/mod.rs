//! Persistent key-value settings store
//!
//! Settings are stored as one text image (`key:value,key:value,`) on a
//! [`SettingsMedium`]. Reads never fail: an absent, unreadable or unparsable
//! image is replaced by an empty store. Writes are upserts that rewrite the
//! whole image through the medium's stage/commit cycle.
//!
//! Values are strings on the medium; the typed accessors on [`Settings`]
//! parse them at this boundary so the rest of the crate never handles raw
//! setting strings.

mod codec;
mod shared;

use core::fmt::Write;

use hal_abstractions::SettingsMedium;

use crate::stepper::MAX_POSITION;
use crate::time::TimezoneCache;

pub use codec::{DecodeError, MAX_IMAGE_LEN, MAX_KEY_LEN, MAX_SETTINGS, MAX_VALUE_LEN};
pub use shared::SharedStore;

/// Well-known setting keys
pub mod keys {
    pub const POSITION: &str = "position";
    pub const NEXT_ROTATION: &str = "next_rotation";
    pub const TIMEZONE: &str = "timezone";
    pub const TZ_EXPIRY: &str = "tz_expiry";
    pub const WIFI_SSID: &str = "wifi_ssid";
    pub const WIFI_PASSWORD: &str = "wifi_password";
}

/// Settings store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Backing medium failed to stage or commit
    Medium,
    /// Key or value contains `:` or `,`, or the key is empty
    InvalidEntry,
    /// Too many settings, or a key/value is too long
    Capacity,
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Medium => write!(f, "Settings medium error"),
            Self::InvalidEntry => write!(f, "Invalid settings entry"),
            Self::Capacity => write!(f, "Settings capacity exceeded"),
        }
    }
}

impl core::error::Error for StoreError {}

/// WiFi credentials kept in the settings store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// A mapping of setting keys to string values
#[derive(Debug, Clone, Default)]
pub struct Settings {
    entries: codec::Entries,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Insert or overwrite one setting
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        codec::validate_entry(key, value)?;

        let mut v = codec::Value::new();
        v.push_str(value).map_err(|_| StoreError::Capacity)?;
        if let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| k.as_str() == key) {
            *existing = v;
            return Ok(());
        }

        let mut k = codec::Key::new();
        k.push_str(key).map_err(|_| StoreError::Capacity)?;
        self.entries
            .insert(k, v)
            .map(drop)
            .map_err(|_| StoreError::Capacity)
    }

    /// Insert or overwrite one integer setting
    pub fn set_i64(&mut self, key: &str, value: i64) -> Result<(), StoreError> {
        let mut text: heapless::String<20> = heapless::String::new();
        write!(text, "{}", value).map_err(|_| StoreError::Capacity)?;
        self.set(key, &text)
    }

    /// Builder form of [`Settings::set`]
    pub fn with(mut self, key: &str, value: &str) -> Result<Self, StoreError> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Builder form of [`Settings::set_i64`]
    pub fn with_i64(mut self, key: &str, value: i64) -> Result<Self, StoreError> {
        self.set_i64(key, value)?;
        Ok(self)
    }

    /// Upsert every entry of `updates` into `self`
    pub fn merge(&mut self, updates: &Settings) -> Result<(), StoreError> {
        for (key, value) in updates.iter() {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Integer value of a setting; missing or unparsable values are `None`
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.trim().parse().ok()
    }

    /// Persisted motor position, if present and within `0..=6`
    pub fn position(&self) -> Option<u8> {
        self.get_i64(keys::POSITION)
            .filter(|p| (0..=i64::from(MAX_POSITION)).contains(p))
            .map(|p| p as u8)
    }

    /// Persisted next rotation time (unix seconds)
    pub fn next_rotation(&self) -> Option<i64> {
        self.get_i64(keys::NEXT_ROTATION)
    }

    /// Persisted timezone cache; offsets other than UTC+1/UTC+2 are discarded
    pub fn timezone(&self) -> Option<TimezoneCache> {
        let offset_hours = self.get_i64(keys::TIMEZONE)?;
        let expiry = self.get_i64(keys::TZ_EXPIRY)?;
        TimezoneCache::new(i32::try_from(offset_hours).ok()?, expiry)
    }

    pub fn wifi_credentials(&self) -> Option<WifiCredentials<'_>> {
        Some(WifiCredentials {
            ssid: self.get(keys::WIFI_SSID)?,
            password: self.get(keys::WIFI_PASSWORD)?,
        })
    }
}

impl PartialEq for Settings {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Settings {}

/// Settings store over a persistent medium
pub struct SettingsStore<S: SettingsMedium> {
    medium: S,
}

impl<S: SettingsMedium> SettingsStore<S> {
    pub fn new(medium: S) -> Self {
        Self { medium }
    }

    /// Return every persisted setting.
    ///
    /// An absent, unreadable or unparsable image is replaced with an empty one
    /// and an empty mapping is returned.
    pub fn read_all(&mut self) -> Settings {
        let mut buf = [0u8; MAX_IMAGE_LEN];
        match self.medium.load(&mut buf) {
            Ok(None) => {
                info!("Settings store absent, creating empty store");
            }
            Ok(Some(len)) if len > buf.len() => {
                warn!("Settings image too large ({} bytes), resetting store", len);
            }
            Ok(Some(len)) => match codec::decode(&buf[..len]) {
                Ok(entries) => return Settings { entries },
                Err(e) => {
                    warn!("Settings image unparsable ({}), resetting store", e);
                }
            },
            Err(_) => {
                warn!("Settings medium read failed, resetting store");
            }
        }

        if self.medium.reset().is_err() {
            error!("Failed to recreate empty settings store");
        }
        Settings::new()
    }

    /// Upsert `updates` into the persisted settings.
    ///
    /// The merged image is staged and committed; if either step fails the
    /// previously committed image is untouched.
    pub fn write(&mut self, updates: &Settings) -> Result<(), StoreError> {
        let current = self.read_all();
        self.write_merged(current, updates)
    }

    pub(crate) fn write_merged(
        &mut self,
        mut current: Settings,
        updates: &Settings,
    ) -> Result<(), StoreError> {
        current.merge(updates)?;
        let image = codec::encode(&current.entries)?;

        self.medium.stage(&image).map_err(|_| StoreError::Medium)?;
        self.medium.commit().map_err(|_| StoreError::Medium)?;
        debug!(
            "Settings committed ({} entries, {} bytes)",
            current.len(),
            image.len()
        );
        Ok(())
    }
}
