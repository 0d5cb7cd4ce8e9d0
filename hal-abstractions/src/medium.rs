//! Persistent media for the settings store
//!
//! A medium holds exactly one committed settings image. Writes go through a
//! staging area and only become visible on [`SettingsMedium::commit`], so a
//! write interrupted by power loss leaves the previous image intact.

/// Non-volatile storage holding one settings image
pub trait SettingsMedium {
    type Error: core::fmt::Debug;

    /// Copy the committed image into `buf`.
    ///
    /// Returns `Ok(None)` if nothing has ever been committed. Otherwise returns
    /// the full length of the committed image; if that exceeds `buf.len()`
    /// only the first `buf.len()` bytes were copied.
    fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;

    /// Write `data` to the staging area without touching the committed image
    fn stage(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Atomically replace the committed image with the staged one
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Replace the committed image with an empty one
    fn reset(&mut self) -> Result<(), Self::Error> {
        self.stage(&[])?;
        self.commit()
    }
}

#[cfg(feature = "std")]
mod file {
    use std::fs;
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};

    use super::SettingsMedium;

    /// Settings file on a hosted filesystem
    ///
    /// Staging writes `<path>.tmp` and syncs it; commit renames it over `<path>`.
    #[derive(Debug, Clone)]
    pub struct FileMedium {
        path: PathBuf,
        staging: PathBuf,
    }

    impl FileMedium {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            let path = path.into();
            let mut staging = path.clone().into_os_string();
            staging.push(".tmp");
            Self {
                path,
                staging: PathBuf::from(staging),
            }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl SettingsMedium for FileMedium {
        type Error = io::Error;

        fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
            let contents = match fs::read(&self.path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            };
            let copied = contents.len().min(buf.len());
            buf[..copied].copy_from_slice(&contents[..copied]);
            Ok(Some(contents.len()))
        }

        fn stage(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            let mut file = fs::File::create(&self.staging)?;
            file.write_all(data)?;
            file.sync_all()
        }

        fn commit(&mut self) -> Result<(), Self::Error> {
            fs::rename(&self.staging, &self.path)
        }
    }

}

#[cfg(feature = "std")]
pub use file::FileMedium;
