//! Build orchestration.
//!
//! [`Builder`] owns everything a run needs: the language file index, the
//! installer payload, the completion cache and the object store. `build_all`
//! walks every language code in order and takes each one through
//! `Pending -> FilteredOut | Built (uploaded or not) | Failed`.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cleanup::TempFileGuard;
use crate::completion::{CompletionCache, CompletionMap, CompletionSource, percent_of};
use crate::config::Parameters;
use crate::error::{CompletionError, PackageError};
use crate::index::{BuiltPackages, IndexRenderer};
use crate::language::LanguageFileIndex;
use crate::package::{PackageAssembler, find_installer_payload};
use crate::runtime::Runtime;
use crate::storage::{ObjectStore, PutObject, object_key};

pub const INDEX_FILE: &str = "index.html";

/// Terminal state of one language code within a run.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeOutcome {
    /// Below the completion threshold, or unknown to the translation service
    FilteredOut,
    Built { archive: String, uploaded: bool },
    Failed(String),
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Successfully built packages, code -> archive basename
    pub packages: BuiltPackages,
    pub outcomes: BTreeMap<String, CodeOutcome>,
    /// The rendered index, when templates are configured
    pub index: Option<String>,
}

pub struct Builder<R: Runtime, C: CompletionSource, S: ObjectStore> {
    runtime: R,
    repository_root: PathBuf,
    params: Parameters,
    index: LanguageFileIndex,
    payload: Vec<PathBuf>,
    completion: CompletionCache<C>,
    store: S,
}

impl<R: Runtime, C: CompletionSource, S: ObjectStore> Builder<R, C, S> {
    /// Scan the repository for language files and installer payload.
    /// Fails when any scanner fails.
    #[tracing::instrument(skip(runtime, repository_root, params, source, store))]
    pub fn new(
        runtime: R,
        repository_root: PathBuf,
        params: Parameters,
        source: C,
        store: S,
    ) -> Result<Self> {
        let index = LanguageFileIndex::scan(&runtime, &repository_root)
            .context("Failed to scan language files")?;
        let payload = find_installer_payload(&runtime, &params)
            .context("Failed to find installer payload files")?;

        Ok(Self::with_index(
            runtime,
            repository_root,
            params,
            index,
            payload,
            source,
            store,
        ))
    }

    pub fn with_index(
        runtime: R,
        repository_root: PathBuf,
        params: Parameters,
        index: LanguageFileIndex,
        payload: Vec<PathBuf>,
        source: C,
        store: S,
    ) -> Self {
        Self {
            runtime,
            repository_root,
            params,
            index,
            payload,
            completion: CompletionCache::new(source),
            store,
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn language_codes(&self) -> Vec<String> {
        self.index.codes()
    }

    pub fn payload(&self) -> &[PathBuf] {
        &self.payload
    }

    /// Translation completion, fetched on first use.
    pub async fn completion(&mut self) -> Result<&CompletionMap, CompletionError> {
        self.completion.get().await
    }

    /// Fetch translation completion again, replacing the cached data.
    pub async fn refresh_completion(&mut self) -> Result<&CompletionMap, CompletionError> {
        self.completion.refresh().await
    }

    /// Build the package of one language in the output directory.
    /// An unknown code fails before anything is created on disk.
    pub fn build_one(&self, code: &str) -> Result<PathBuf> {
        if !self.index.contains(code) {
            return Err(PackageError::NotFound(code.to_string()).into());
        }
        self.prepare_output_directory()?;
        Ok(self.assembler().build_package(code, &self.params.output_directory)?)
    }

    /// Build, and optionally upload, the package of every language, then the index.
    #[tracing::instrument(skip(self))]
    pub async fn build_all(&mut self) -> Result<BuildReport> {
        let codes = self.index.codes();
        let filtering = self.params.filters_by_completion();

        let completion = if filtering {
            self.completion
                .get()
                .await
                .context("Failed to fetch translation completion")?
                .clone()
        } else {
            CompletionMap::new()
        };

        self.prepare_output_directory()?;
        info!("Building packages for {} language(s)", codes.len());

        let mut report = BuildReport::default();
        for code in codes {
            if filtering && !meets_threshold(&completion, &code, self.params.min_percent) {
                debug!(
                    "Skipping {}: {}% translated",
                    code,
                    percent_of(&completion, &code)
                );
                report.outcomes.insert(code, CodeOutcome::FilteredOut);
                continue;
            }

            let outcome = self.process(&code).await;
            self.say_line(&self.status_line(&code, &outcome));
            if let CodeOutcome::Built { archive, .. } = &outcome {
                report.packages.insert(code.clone(), archive.clone());
            }
            report.outcomes.insert(code, outcome);
        }

        report.index = self.publish_index(&report.packages, &completion).await?;
        Ok(report)
    }

    fn assembler(&self) -> PackageAssembler<'_, R> {
        PackageAssembler::new(&self.runtime, &self.params, &self.index, &self.payload)
    }

    fn prepare_output_directory(&self) -> Result<()> {
        let dir = &self.params.output_directory;
        self.runtime
            .create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))
    }

    /// Package one language and upload it when uploads are enabled.
    async fn process(&self, code: &str) -> CodeOutcome {
        let zip_path = match self
            .assembler()
            .build_package(code, &self.params.output_directory)
        {
            Ok(path) => path,
            Err(e @ (PackageError::NotFound(_) | PackageError::Archive { .. })) => {
                warn!("Packaging {} failed: {}", code, e);
                return CodeOutcome::Failed(e.to_string());
            }
        };
        let archive = file_name(&zip_path);

        if !self.params.upload {
            return CodeOutcome::Built {
                archive,
                uploaded: false,
            };
        }

        let local = TempFileGuard::new(&self.runtime, zip_path, !self.params.keep_output);
        let key = self.object_key(&archive);

        match self.upload_file(local.path(), key, None).await {
            Ok(()) => CodeOutcome::Built {
                archive,
                uploaded: true,
            },
            Err(e) => {
                warn!("Uploading {} failed: {:#}", code, e);
                CodeOutcome::Failed(format!("{:#}", e))
            }
        }
    }

    /// The single progress line printed for an attempted code.
    fn status_line(&self, code: &str, outcome: &CodeOutcome) -> String {
        match outcome {
            CodeOutcome::Built {
                archive,
                uploaded: true,
            } => format!(
                "Packaging {} and uploading to s3://{}/{}",
                code,
                self.params.storage.bucket,
                self.object_key(archive)
            ),
            CodeOutcome::Built {
                archive,
                uploaded: false,
            } => format!(
                "Packaging {} to {}",
                code,
                self.params.output_directory.join(archive).display()
            ),
            CodeOutcome::Failed(reason) => format!("Packaging {} has FAILED ({})", code, reason),
            CodeOutcome::FilteredOut => format!("Skipping {}", code),
        }
    }

    fn object_key(&self, filename: &str) -> String {
        object_key(
            &self.params.storage.path,
            &self.params.package_name_url,
            filename,
        )
    }

    async fn upload_file(&self, path: &Path, key: String, content_type: Option<&str>) -> Result<()> {
        let body = self
            .runtime
            .read(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        self.upload(body, key, content_type).await
    }

    async fn upload(&self, body: Vec<u8>, key: String, content_type: Option<&str>) -> Result<()> {
        self.store
            .put_object(PutObject {
                bucket: self.params.storage.bucket.clone(),
                key,
                body,
                content_type: content_type.map(String::from),
            })
            .await
    }

    /// Render the index and store it locally and/or remotely.
    async fn publish_index(
        &self,
        packages: &BuiltPackages,
        completion: &CompletionMap,
    ) -> Result<Option<String>> {
        let Some(html) = self.render_index(packages, completion)? else {
            debug!("No index templates configured, skipping {}", INDEX_FILE);
            return Ok(None);
        };

        self.say(&format!("Generating {}", INDEX_FILE));

        if self.params.keep_output {
            let path = self.params.output_directory.join(INDEX_FILE);
            self.runtime
                .write(&path, html.as_bytes())
                .with_context(|| format!("Failed to write {:?}", path))?;
        }

        if self.params.upload {
            let key = self.object_key(INDEX_FILE);
            self.say_line(&format!(
                " and uploading to s3://{}/{}",
                self.params.storage.bucket, key
            ));
            self.upload(html.as_bytes().to_vec(), key, Some("text/html"))
                .await
                .with_context(|| format!("Failed to upload {}", INDEX_FILE))?;
        } else {
            self.say_line("");
        }

        Ok(Some(html))
    }

    fn render_index(
        &self,
        packages: &BuiltPackages,
        completion: &CompletionMap,
    ) -> Result<Option<String>> {
        let templates = &self.params.templates;
        let (Some(page), Some(row)) = (&templates.page, &templates.row) else {
            return Ok(None);
        };

        let page = self.read_template(page)?;
        let row = self.read_template(row)?;

        let renderer = IndexRenderer::new(&self.params, &page, &row);
        Ok(Some(renderer.render(packages, completion, Utc::now())))
    }

    fn read_template(&self, relative: &Path) -> Result<String> {
        let path = self.repository_root.join(relative);
        self.runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read index template {:?}", path))
    }

    fn say(&self, message: &str) {
        if !self.params.quiet {
            print!("{}", message);
            let _ = std::io::stdout().flush();
        }
    }

    fn say_line(&self, message: &str) {
        if !self.params.quiet {
            println!("{}", message);
        }
    }
}

/// Codes unknown to the translation service never meet a threshold.
fn meets_threshold(completion: &CompletionMap, code: &str, min_percent: f64) -> bool {
    completion
        .get(code)
        .is_some_and(|percent| *percent >= min_percent)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::MockCompletionSource;
    use crate::config::tests::sample_parameters;
    use crate::runtime::RealRuntime;
    use crate::scanner::ScanResult;
    use crate::storage::MockObjectStore;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::{TempDir, tempdir};

    /// A repository with backend files for de-DE, en-GB and fr-FR.
    struct Repo {
        dir: TempDir,
        index: LanguageFileIndex,
    }

    impl Repo {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let mut backend = BTreeMap::new();
            for code in ["de-DE", "en-GB", "fr-FR"] {
                let path = dir
                    .path()
                    .join(format!("component/backend/language/{}/com_example.ini", code));
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, format!("LANG=\"{}\"", code)).unwrap();
                backend.insert(code.to_string(), vec![path]);
            }
            let index = LanguageFileIndex::from_scan_results([ScanResult {
                backend,
                frontend: BTreeMap::new(),
            }]);
            Repo { dir, index }
        }

        fn root(&self) -> PathBuf {
            self.dir.path().to_path_buf()
        }

        fn out(&self) -> PathBuf {
            self.dir.path().join("out")
        }

        fn params(&self) -> Parameters {
            sample_parameters(&self.out())
        }

        fn builder(
            &self,
            params: Parameters,
            source: MockCompletionSource,
            store: MockObjectStore,
        ) -> Builder<RealRuntime, MockCompletionSource, MockObjectStore> {
            Builder::with_index(
                RealRuntime,
                self.root(),
                params,
                self.index.clone(),
                Vec::new(),
                source,
                store,
            )
        }

        fn with_templates(&self, params: &mut Parameters) {
            fs::write(self.dir.path().join("page.html"), "<ul>[LANGTABLE]</ul>").unwrap();
            fs::write(
                self.dir.path().join("row.html"),
                "<li class=\"[BS_PROGRESSBAR_TYPE]\">[LANGCODE] [PERCENT]</li>",
            )
            .unwrap();
            params.templates.page = Some(PathBuf::from("page.html"));
            params.templates.row = Some(PathBuf::from("row.html"));
        }
    }

    fn completion(entries: &[(&str, f64)]) -> CompletionMap {
        entries.iter().map(|(c, p)| (c.to_string(), *p)).collect()
    }

    fn no_fetch() -> MockCompletionSource {
        let mut source = MockCompletionSource::new();
        source.expect_fetch().times(0);
        source
    }

    fn no_upload() -> MockObjectStore {
        let mut store = MockObjectStore::new();
        store.expect_put_object().times(0);
        store
    }

    #[test_log::test(tokio::test)]
    async fn test_threshold_filters_codes() {
        let repo = Repo::new();
        let mut params = repo.params();
        params.min_percent = 75.0;
        let mut source = MockCompletionSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|| Ok(completion(&[("en-GB", 80.0), ("fr-FR", 60.0)])));
        let mut builder = repo.builder(params, source, no_upload());

        let report = builder.build_all().await.unwrap();

        assert_eq!(
            report.packages,
            BuiltPackages::from([("en-GB".to_string(), "example_soft-en-GB.zip".to_string())])
        );
        assert_eq!(report.outcomes["de-DE"], CodeOutcome::FilteredOut);
        assert_eq!(report.outcomes["fr-FR"], CodeOutcome::FilteredOut);
        assert!(repo.out().join("example_soft-en-GB.zip").exists());
        assert!(!repo.out().join("example_soft-fr-FR.zip").exists());
        assert!(!repo.out().join("example_soft-de-DE.zip").exists());

        // The cached completion is reused without another fetch
        assert_eq!(builder.completion().await.unwrap()["en-GB"], 80.0);
    }

    #[tokio::test]
    async fn test_zero_threshold_never_fetches_completion() {
        let repo = Repo::new();
        let mut builder = repo.builder(repo.params(), no_fetch(), no_upload());

        let report = builder.build_all().await.unwrap();

        assert_eq!(
            report.packages.keys().collect::<Vec<_>>(),
            vec!["de-DE", "en-GB", "fr-FR"]
        );
        for code in ["de-DE", "en-GB", "fr-FR"] {
            assert_eq!(
                report.outcomes[code],
                CodeOutcome::Built {
                    archive: format!("example_soft-{}.zip", code),
                    uploaded: false,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_completion_failure_aborts_run() {
        let repo = Repo::new();
        let mut params = repo.params();
        params.min_percent = 50.0;
        let mut source = MockCompletionSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|| Err(CompletionError::Transport("connection refused".to_string())));
        let mut builder = repo.builder(params, source, no_upload());

        let err = builder.build_all().await.unwrap_err();

        assert_eq!(
            err.downcast_ref::<CompletionError>(),
            Some(&CompletionError::Transport("connection refused".to_string()))
        );
        assert!(!repo.out().exists());
    }

    #[tokio::test]
    async fn test_failed_package_does_not_stop_the_run() {
        let repo = Repo::new();
        fs::remove_file(
            repo.dir
                .path()
                .join("component/backend/language/en-GB/com_example.ini"),
        )
        .unwrap();
        let mut builder = repo.builder(repo.params(), no_fetch(), no_upload());

        let report = builder.build_all().await.unwrap();

        assert!(matches!(report.outcomes["en-GB"], CodeOutcome::Failed(_)));
        assert_eq!(
            report.packages.keys().collect::<Vec<_>>(),
            vec!["de-DE", "fr-FR"]
        );
    }

    #[tokio::test]
    async fn test_upload_removes_local_archives_and_uploads_index() {
        let repo = Repo::new();
        let mut params = repo.params();
        params.upload = true;
        params.keep_output = false;
        repo.with_templates(&mut params);

        let uploads: Arc<Mutex<Vec<PutObject>>> = Arc::default();
        let recorded = Arc::clone(&uploads);
        let mut store = MockObjectStore::new();
        store.expect_put_object().times(4).returning(move |object| {
            recorded.lock().unwrap().push(object);
            Ok(())
        });
        let mut builder = repo.builder(params, no_fetch(), store);

        let report = builder.build_all().await.unwrap();

        let uploads = uploads.lock().unwrap();
        let keys: Vec<&str> = uploads.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "language/example-soft/example_soft-de-DE.zip",
                "language/example-soft/example_soft-en-GB.zip",
                "language/example-soft/example_soft-fr-FR.zip",
                "language/example-soft/index.html",
            ]
        );
        assert!(uploads.iter().all(|o| o.bucket == "downloads"));
        assert_eq!(uploads[0].content_type, None);
        assert_eq!(uploads[3].content_type.as_deref(), Some("text/html"));
        assert_eq!(&uploads[3].body[..4], b"<ul>");

        assert_eq!(
            report.outcomes["de-DE"],
            CodeOutcome::Built {
                archive: "example_soft-de-DE.zip".to_string(),
                uploaded: true,
            }
        );
        assert_eq!(fs::read_dir(repo.out()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_upload_still_removes_local_archive() {
        let repo = Repo::new();
        let mut params = repo.params();
        params.upload = true;
        params.keep_output = false;

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .times(3)
            .returning(|object| {
                if object.key.ends_with("en-GB.zip") {
                    Err(anyhow::anyhow!("503 Slow Down"))
                } else {
                    Ok(())
                }
            });
        let mut builder = repo.builder(params, no_fetch(), store);

        let report = builder.build_all().await.unwrap();

        assert!(matches!(&report.outcomes["en-GB"], CodeOutcome::Failed(reason) if reason.contains("503")));
        assert_eq!(
            report.packages.keys().collect::<Vec<_>>(),
            vec!["de-DE", "fr-FR"]
        );
        assert!(!repo.out().join("example_soft-en-GB.zip").exists());
        assert_eq!(report.index, None);
    }

    #[tokio::test]
    async fn test_keep_output_retains_archives_and_writes_index() {
        let repo = Repo::new();
        let mut params = repo.params();
        params.upload = true;
        params.keep_output = true;
        params.min_percent = 1.0;
        repo.with_templates(&mut params);

        let mut source = MockCompletionSource::new();
        source.expect_fetch().times(1).returning(|| {
            Ok(completion(&[
                ("de-DE", 95.0),
                ("en-GB", 100.0),
                ("fr-FR", 80.0),
            ]))
        });
        let mut store = MockObjectStore::new();
        store.expect_put_object().times(4).returning(|_| Ok(()));
        let mut builder = repo.builder(params, source, store);

        let report = builder.build_all().await.unwrap();

        for code in ["de-DE", "en-GB", "fr-FR"] {
            assert!(repo.out().join(format!("example_soft-{}.zip", code)).exists());
        }
        let index = fs::read_to_string(repo.out().join(INDEX_FILE)).unwrap();
        assert_eq!(Some(&index), report.index.as_ref());
        assert_eq!(
            index,
            "<ul><li class=\"success\">de-DE 95</li><li class=\"success\">en-GB 100</li><li class=\"warning\">fr-FR 80</li></ul>"
        );
    }

    #[tokio::test]
    async fn test_index_not_written_without_keep_output() {
        let repo = Repo::new();
        let mut params = repo.params();
        params.keep_output = false;
        repo.with_templates(&mut params);
        let mut builder = repo.builder(params, no_fetch(), no_upload());

        let report = builder.build_all().await.unwrap();

        assert!(report.index.is_some());
        assert!(!repo.out().join(INDEX_FILE).exists());
        // Without uploads the archives are the output and stay on disk
        assert!(repo.out().join("example_soft-de-DE.zip").exists());
    }

    #[test]
    fn test_build_one() {
        let repo = Repo::new();
        let builder = repo.builder(repo.params(), no_fetch(), no_upload());

        let path = builder.build_one("fr-FR").unwrap();
        assert_eq!(path, repo.out().join("example_soft-fr-FR.zip"));

        let err = builder.build_one("xx-XX").unwrap_err();
        assert_eq!(
            err.downcast_ref::<PackageError>(),
            Some(&PackageError::NotFound("xx-XX".to_string()))
        );
        assert!(!repo.out().join("example_soft-xx-XX.zip").exists());
    }

    #[test]
    fn test_build_one_unknown_code_creates_nothing() {
        let repo = Repo::new();
        let builder = repo.builder(repo.params(), no_fetch(), no_upload());

        let err = builder.build_one("xx-XX").unwrap_err();

        assert!(err.downcast_ref::<PackageError>().is_some());
        assert!(!repo.out().exists());
    }

    #[tokio::test]
    async fn test_failed_upload_reports_on_one_line() {
        let repo = Repo::new();
        let mut params = repo.params();
        params.upload = true;

        let mut store = MockObjectStore::new();
        store.expect_put_object().times(3).returning(|object| {
            if object.key.ends_with("en-GB.zip") {
                Err(anyhow::anyhow!("Access Denied"))
            } else {
                Ok(())
            }
        });
        let mut builder = repo.builder(params, no_fetch(), store);

        let report = builder.build_all().await.unwrap();

        let failed = builder.status_line("en-GB", &report.outcomes["en-GB"]);
        assert_eq!(failed, "Packaging en-GB has FAILED (Access Denied)");
        assert_eq!(
            builder.status_line("de-DE", &report.outcomes["de-DE"]),
            "Packaging de-DE and uploading to s3://downloads/language/example-soft/example_soft-de-DE.zip"
        );
        assert!(report.outcomes.keys().all(|code| {
            !builder
                .status_line(code, &report.outcomes[code])
                .contains('\n')
        }));
    }

    #[test]
    fn test_status_line_for_local_build() {
        let repo = Repo::new();
        let builder = repo.builder(repo.params(), no_fetch(), no_upload());

        let line = builder.status_line(
            "fr-FR",
            &CodeOutcome::Built {
                archive: "example_soft-fr-FR.zip".to_string(),
                uploaded: false,
            },
        );

        assert_eq!(
            line,
            format!(
                "Packaging fr-FR to {}",
                repo.out().join("example_soft-fr-FR.zip").display()
            )
        );
    }

    #[test]
    fn test_new_scans_repository() {
        let repo = Repo::new();
        fs::create_dir_all(repo.out()).unwrap();
        fs::write(repo.out().join("angie-en-GB.jpa"), "").unwrap();
        let mut params = repo.params();
        params.installer_payload.glob = Some("*.jpa".to_string());

        let builder = Builder::new(RealRuntime, repo.root(), params, no_fetch(), no_upload())
            .unwrap();

        assert_eq!(builder.language_codes(), vec!["de-DE", "en-GB", "fr-FR"]);
        assert_eq!(builder.payload().len(), 1);
    }

    #[tokio::test]
    async fn test_completion_is_cached_until_refreshed() {
        let repo = Repo::new();
        let mut source = MockCompletionSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(completion(&[("en-GB", 50.0)])));
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(completion(&[("en-GB", 95.0)])));
        let mut builder = repo.builder(repo.params(), source, no_upload());

        assert_eq!(builder.completion().await.unwrap()["en-GB"], 50.0);
        assert_eq!(builder.completion().await.unwrap()["en-GB"], 50.0);
        assert_eq!(builder.refresh_completion().await.unwrap()["en-GB"], 95.0);
        assert_eq!(builder.completion().await.unwrap()["en-GB"], 95.0);
    }

    #[test]
    fn test_meets_threshold() {
        let map = completion(&[("en-GB", 80.0), ("fr-FR", 60.0)]);
        assert!(meets_threshold(&map, "en-GB", 75.0));
        assert!(meets_threshold(&map, "en-GB", 80.0));
        assert!(!meets_threshold(&map, "fr-FR", 75.0));
        assert!(!meets_threshold(&map, "de-DE", 75.0));
    }
}
