//! Mutually exclusive access to the settings store
//!
//! Every component reads and writes settings through one [`SharedStore`].
//! Each call holds the lock for its whole read-modify-write, so a position
//! save and a schedule save can never interleave and drop each other's keys.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use hal_abstractions::SettingsMedium;

use super::{Settings, SettingsStore, StoreError};

/// Settings store behind a blocking mutex
///
/// Use `CriticalSectionRawMutex` when tasks on different priorities share the
/// store, `NoopRawMutex` when everything runs on one executor.
pub struct SharedStore<M: RawMutex, S: SettingsMedium> {
    inner: Mutex<M, RefCell<SettingsStore<S>>>,
}

impl<M: RawMutex, S: SettingsMedium> SharedStore<M, S> {
    pub fn new(medium: S) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(SettingsStore::new(medium))),
        }
    }

    /// See [`SettingsStore::read_all`]
    pub fn read_all(&self) -> Settings {
        self.inner.lock(|store| store.borrow_mut().read_all())
    }

    /// See [`SettingsStore::write`]
    pub fn write(&self, updates: &Settings) -> Result<(), StoreError> {
        self.inner.lock(|store| store.borrow_mut().write(updates))
    }

    /// Atomic read-modify-write.
    ///
    /// `f` sees the current settings and fills `updates`; if it adds anything
    /// the merged image is committed before the lock is released. Errors from
    /// `f` abort without writing.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&Settings, &mut Settings) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.inner.lock(|store| {
            let mut store = store.borrow_mut();
            let current = store.read_all();
            let mut updates = Settings::new();
            let value = f(&current, &mut updates)?;
            if !updates.is_empty() {
                store.write_merged(current, &updates)?;
            }
            Ok(value)
        })
    }
}
