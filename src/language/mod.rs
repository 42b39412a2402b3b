//! Repository-wide index of language files.

mod info;

use anyhow::Result;
use log::debug;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;
use crate::scanner::{LanguageFiles, ScanResult, Scanner};

pub use info::{LanguageInfo, is_language_code};

/// Backend and frontend language files of every extension in a repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageFileIndex {
    backend: LanguageFiles,
    frontend: LanguageFiles,
}

impl LanguageFileIndex {
    /// Run every scanner against `root` and merge what they find.
    #[tracing::instrument(skip(runtime, root))]
    pub fn scan<R: Runtime>(runtime: &R, root: &Path) -> Result<Self> {
        let mut results = Vec::with_capacity(Scanner::ALL.len());
        for scanner in Scanner::ALL {
            results.push(scanner.discover(runtime, root)?);
        }
        Ok(Self::from_scan_results(results))
    }

    /// Merge scan results. Files for a code reported by several extensions
    /// accumulate in scan order.
    pub fn from_scan_results(results: impl IntoIterator<Item = ScanResult>) -> Self {
        let mut index = Self::default();
        for result in results {
            merge(&mut index.backend, result.backend);
            merge(&mut index.frontend, result.frontend);
        }
        debug!(
            "Indexed {} backend and {} frontend language(s)",
            index.backend.len(),
            index.frontend.len()
        );
        index
    }

    /// Every language code with at least one file, sorted and without duplicates.
    pub fn codes(&self) -> Vec<String> {
        self.backend
            .keys()
            .chain(self.frontend.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.backend.contains_key(code) || self.frontend.contains_key(code)
    }

    pub fn backend_files(&self, code: &str) -> &[PathBuf] {
        self.backend.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn frontend_files(&self, code: &str) -> &[PathBuf] {
        self.frontend.get(code).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn merge(into: &mut LanguageFiles, from: LanguageFiles) {
    for (code, files) in from {
        if files.is_empty() {
            continue;
        }
        into.entry(code).or_default().extend(files);
    }
}
