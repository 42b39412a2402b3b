//! Extension scanners.
//!
//! Every extension type keeps its language files in a conventional place inside
//! the repository. A [`Scanner`] variant knows those places for one extension
//! type and reports the files it finds, grouped by language code, as a
//! [`ScanResult`].

use anyhow::{Context, Result};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::language::is_language_code;
use crate::runtime::Runtime;

/// Language code -> language files.
pub type LanguageFiles = BTreeMap<String, Vec<PathBuf>>;

/// Language files discovered for one extension type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    /// Files installed under `administrator/language/{code}`
    pub backend: LanguageFiles,
    /// Files installed under `language/{code}`
    pub frontend: LanguageFiles,
}

/// The extension types found in a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scanner {
    Component,
    Library,
    Module,
    Plugin,
    Template,
}

impl fmt::Display for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scanner::Component => write!(f, "component"),
            Scanner::Library => write!(f, "library"),
            Scanner::Module => write!(f, "module"),
            Scanner::Plugin => write!(f, "plugin"),
            Scanner::Template => write!(f, "template"),
        }
    }
}

impl Scanner {
    pub const ALL: [Scanner; 5] = [
        Scanner::Component,
        Scanner::Library,
        Scanner::Module,
        Scanner::Plugin,
        Scanner::Template,
    ];

    /// Glob patterns, relative to the repository root, matching backend language files.
    fn backend_patterns(&self) -> &'static [&'static str] {
        match self {
            Scanner::Component => &[
                "component/backend/language/*/*.ini",
                "component/language/backend/*/*.ini",
            ],
            Scanner::Library => &[],
            Scanner::Module => &["modules/admin/*/language/*/*.ini"],
            Scanner::Plugin => &["plugins/*/*/language/*/*.ini"],
            Scanner::Template => &["templates/admin/*/language/*/*.ini"],
        }
    }

    /// Glob patterns, relative to the repository root, matching frontend language files.
    fn frontend_patterns(&self) -> &'static [&'static str] {
        match self {
            Scanner::Component => &[
                "component/frontend/language/*/*.ini",
                "component/language/frontend/*/*.ini",
            ],
            Scanner::Library => &["libraries/*/language/*/*.ini"],
            Scanner::Module => &["modules/site/*/language/*/*.ini"],
            Scanner::Plugin => &[],
            Scanner::Template => &["templates/site/*/language/*/*.ini"],
        }
    }

    /// Find this extension type's language files under `root`.
    #[tracing::instrument(skip(self, runtime, root))]
    pub fn discover<R: Runtime>(&self, runtime: &R, root: &Path) -> Result<ScanResult> {
        debug!("Scanning {} language files under {:?}", self, root);

        let backend = collect(runtime, root, self.backend_patterns())
            .with_context(|| format!("Failed to scan {} backend language files", self))?;
        let frontend = collect(runtime, root, self.frontend_patterns())
            .with_context(|| format!("Failed to scan {} frontend language files", self))?;

        Ok(ScanResult { backend, frontend })
    }
}

fn collect<R: Runtime>(runtime: &R, root: &Path, patterns: &[&str]) -> Result<LanguageFiles> {
    let mut files = LanguageFiles::new();

    for pattern in patterns {
        let full_pattern = root.join(pattern);
        let full_pattern = full_pattern.to_string_lossy();

        for path in runtime.glob(&full_pattern)? {
            if !runtime.is_file(&path) {
                continue;
            }

            let Some(code) = code_of(&path) else {
                debug!("Ignoring {:?}: not inside a language folder", path);
                continue;
            };

            let path = runtime.canonicalize(&path)?;
            files.entry(code).or_default().push(path);
        }
    }

    for paths in files.values_mut() {
        paths.sort();
        paths.dedup();
    }

    Ok(files)
}

/// The language code is the name of the folder holding the file.
fn code_of(path: &Path) -> Option<String> {
    let code = path.parent()?.file_name()?.to_str()?;
    is_language_code(code).then(|| code.to_string())
}
