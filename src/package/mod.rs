//! Language package assembly.
//!
//! A package is a ZIP archive holding the manifest, the backend and frontend
//! language files of one language (flattened into `backend/` and `frontend/`)
//! and the installer payload shared by every language.

mod manifest;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::config::Parameters;
use crate::error::PackageError;
use crate::language::{LanguageFileIndex, LanguageInfo};
use crate::runtime::Runtime;

pub use manifest::{FileGroup, Manifest};

pub const BACKEND_FOLDER: &str = "backend";
pub const FRONTEND_FOLDER: &str = "frontend";

/// Builds the package of a single language.
pub struct PackageAssembler<'a, R: Runtime> {
    runtime: &'a R,
    params: &'a Parameters,
    index: &'a LanguageFileIndex,
    payload: &'a [PathBuf],
}

/// Archive entry name -> source file, for one folder of the archive.
struct Group<'p> {
    folder: String,
    target: String,
    entries: Vec<(String, &'p Path)>,
}

impl<'a, R: Runtime> PackageAssembler<'a, R> {
    pub fn new(
        runtime: &'a R,
        params: &'a Parameters,
        index: &'a LanguageFileIndex,
        payload: &'a [PathBuf],
    ) -> Self {
        Self {
            runtime,
            params,
            index,
            payload,
        }
    }

    /// Build the package for `code` in `target_dir` and return the archive path.
    pub fn build_package(&self, code: &str, target_dir: &Path) -> Result<PathBuf, PackageError> {
        self.build_package_at(code, target_dir, Utc::now())
    }

    #[tracing::instrument(skip(self, target_dir, now))]
    pub fn build_package_at(
        &self,
        code: &str,
        target_dir: &Path,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, PackageError> {
        let groups = self.groups_for(code)?;

        let archive_name = self.params.archive_name(code);
        let zip_path = target_dir.join(&archive_name);
        let archive_error = |reason: String| PackageError::Archive {
            path: zip_path.clone(),
            reason,
        };

        if self.runtime.is_file(&zip_path) {
            debug!("Removing previous archive {:?}", zip_path);
            self.runtime
                .remove_file(&zip_path)
                .map_err(|e| archive_error(format!("{:#}", e)))?;
        }

        let manifest_name = format!("{}.xml", archive_name.trim_end_matches(".zip"));
        let manifest = self.manifest_from_groups(code, &groups, now).to_xml();

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(manifest_name, options)
            .map_err(|e| archive_error(e.to_string()))?;
        zip.write_all(manifest.as_bytes())
            .map_err(|e| archive_error(e.to_string()))?;

        for group in &groups {
            for (name, source) in &group.entries {
                let contents = self
                    .runtime
                    .read(source)
                    .map_err(|e| archive_error(format!("{:?}: {:#}", source, e)))?;

                zip.start_file(format!("{}/{}", group.folder, name), options)
                    .map_err(|e| archive_error(e.to_string()))?;
                zip.write_all(&contents)
                    .map_err(|e| archive_error(e.to_string()))?;
            }
        }

        let bytes = zip
            .finish()
            .map_err(|e| archive_error(e.to_string()))?
            .into_inner();

        if let Err(e) = self.runtime.write(&zip_path, &bytes) {
            if self.runtime.exists(&zip_path) {
                let _ = self.runtime.remove_file(&zip_path);
            }
            return Err(archive_error(format!("{:#}", e)));
        }

        debug!("Wrote {} bytes to {:?}", bytes.len(), zip_path);
        Ok(zip_path)
    }

    /// The manifest `build_package_at` embeds for `code`.
    pub fn manifest(&self, code: &str, now: DateTime<Utc>) -> Result<Manifest, PackageError> {
        let groups = self.groups_for(code)?;
        Ok(self.manifest_from_groups(code, &groups, now))
    }

    fn manifest_from_groups(&self, code: &str, groups: &[Group<'_>], now: DateTime<Utc>) -> Manifest {
        let language_name = LanguageInfo::resolve(code)
            .map(|info| info.name)
            .unwrap_or_else(|| code.to_string());

        let mut manifest = Manifest {
            name: format!("{} - {}", self.params.package_name, language_name),
            author: self.params.author_name.clone(),
            author_url: self.params.author_url.clone(),
            copyright: Manifest::copyright_for(&self.params.author_name, now),
            license: self.params.license.clone(),
            version: self.params.version.clone(),
            creation_date: Manifest::creation_date_for(now),
            description: format!(
                "{} language files for {}",
                language_name, self.params.software_name
            ),
            groups: Vec::new(),
        };

        for group in groups {
            manifest.push_group(
                &group.folder,
                &group.target,
                group.entries.iter().map(|(name, _)| name.clone()).collect(),
            );
        }

        manifest
    }

    /// Non-empty groups in archive order: backend, frontend, installer payload.
    fn groups_for(&self, code: &str) -> Result<Vec<Group<'a>>, PackageError> {
        if !self.index.contains(code) {
            return Err(PackageError::NotFound(code.to_string()));
        }

        let payload = &self.params.installer_payload;
        let candidates = [
            (
                BACKEND_FOLDER.to_string(),
                format!("administrator/language/{}", code),
                self.index.backend_files(code),
            ),
            (
                FRONTEND_FOLDER.to_string(),
                format!("language/{}", code),
                self.index.frontend_files(code),
            ),
            (
                payload.virtual_dir.trim_matches('/').to_string(),
                payload.target.clone(),
                self.payload,
            ),
        ];

        Ok(candidates
            .into_iter()
            .filter(|(_, _, files)| !files.is_empty())
            .map(|(folder, target, files)| Group {
                entries: flatten(&folder, files),
                folder,
                target,
            })
            .collect())
    }
}

/// Pre-built installer files matching the configured glob, relative to the
/// output directory. Empty when no glob is configured.
#[tracing::instrument(skip(runtime, params))]
pub fn find_installer_payload<R: Runtime>(
    runtime: &R,
    params: &Parameters,
) -> anyhow::Result<Vec<PathBuf>> {
    let Some(pattern) = params
        .installer_payload
        .glob
        .as_deref()
        .filter(|g| !g.is_empty())
    else {
        return Ok(Vec::new());
    };

    let pattern = params.output_directory.join(pattern);
    let mut files = Vec::new();
    for path in runtime.glob(&pattern.to_string_lossy())? {
        if runtime.is_file(&path) {
            files.push(runtime.canonicalize(&path)?);
        }
    }

    debug!("Found {} installer payload file(s)", files.len());
    Ok(files)
}

/// Entry names are basenames; the first file wins when two share a name.
fn flatten<'p>(folder: &str, files: &'p [PathBuf]) -> Vec<(String, &'p Path)> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(files.len());

    for file in files {
        let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !seen.insert(name.clone()) {
            warn!("Skipping {:?}: {}/{} is already packaged", file, folder, name);
            continue;
        }
        entries.push((name, file.as_path()));
    }

    entries
}
