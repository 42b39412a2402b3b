use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// RAII guard that removes a temporary file when dropped, whatever happened
/// while it was alive. An unarmed guard leaves the file in place.
pub struct TempFileGuard<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
    armed: bool,
}

impl<'a, R: Runtime> TempFileGuard<'a, R> {
    pub fn new(runtime: &'a R, path: PathBuf, armed: bool) -> Self {
        Self {
            runtime,
            path,
            armed,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Runtime> Drop for TempFileGuard<'_, R> {
    fn drop(&mut self) {
        if !self.armed || !self.runtime.exists(&self.path) {
            return;
        }

        debug!("Cleaning up: {:?}", self.path);
        if let Err(e) = self.runtime.remove_file(&self.path) {
            warn!("Failed to remove temporary file {:?}: {:#}", self.path, e);
        }
    }
}
