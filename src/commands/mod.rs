use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::{builder::CodeOutcome, runtime::Runtime};

pub mod config;

use config::Config;

/// Overrides of the configured build behaviour given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOverrides {
    pub min_percent: Option<f64>,
    pub upload: bool,
    pub discard_output: bool,
}

/// Build every language package, upload them when enabled and generate the index.
#[tracing::instrument(skip(runtime, root, config_file))]
pub async fn build<R: Runtime + 'static>(
    runtime: R,
    root: &Path,
    config_file: Option<PathBuf>,
    quiet: bool,
    overrides: BuildOverrides,
) -> Result<()> {
    let mut config = Config::new(runtime, root, config_file, quiet).await?;
    if let Some(min_percent) = overrides.min_percent {
        config.params.min_percent = min_percent;
    }
    config.params.upload |= overrides.upload;
    if overrides.discard_output {
        config.params.keep_output = false;
    }
    let quiet = config.params.quiet;

    let mut builder = config.into_builder()?;
    let report = builder.build_all().await?;

    let attempted = report
        .outcomes
        .values()
        .filter(|o| **o != CodeOutcome::FilteredOut)
        .count();
    debug!(
        "{} of {} language(s) attempted, {} built",
        attempted,
        report.outcomes.len(),
        report.packages.len()
    );

    if !quiet {
        println!(
            "Built {} of {} language package(s).",
            report.packages.len(),
            attempted
        );
    }

    Ok(())
}

/// Build the package of a single language.
#[tracing::instrument(skip(runtime, root, config_file))]
pub async fn package<R: Runtime + 'static>(
    runtime: R,
    root: &Path,
    config_file: Option<PathBuf>,
    quiet: bool,
    code: &str,
) -> Result<()> {
    let config = Config::new(runtime, root, config_file, quiet).await?;
    let builder = config.into_builder()?;

    let path = builder
        .build_one(code)
        .with_context(|| format!("Failed to package {}", code))?;

    if !builder.params().quiet {
        println!("Packaged {} to {}", code, path.display());
    }
    Ok(())
}

/// List the language codes found in the repository.
#[tracing::instrument(skip(runtime, root, config_file))]
pub async fn codes<R: Runtime + 'static>(
    runtime: R,
    root: &Path,
    config_file: Option<PathBuf>,
) -> Result<()> {
    let config = Config::new(runtime, root, config_file, false).await?;
    let builder = config.into_builder()?;

    let codes = builder.language_codes();
    if codes.is_empty() {
        println!("No language files found.");
        return Ok(());
    }

    for code in codes {
        println!("{}", code);
    }
    Ok(())
}

/// Print the translation completion reported by the translation service.
#[tracing::instrument(skip(runtime, root, config_file))]
pub async fn progress<R: Runtime + 'static>(
    runtime: R,
    root: &Path,
    config_file: Option<PathBuf>,
) -> Result<()> {
    let config = Config::new(runtime, root, config_file, false).await?;
    let mut builder = config.into_builder()?;

    let completion = builder
        .completion()
        .await
        .context("Failed to fetch translation completion")?;

    for (code, percent) in completion {
        println!("{} {}%", code, percent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn repository(translation_url: &str) -> TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();

        let ini = root.join("component/backend/language/de-DE/com_example.ini");
        fs::create_dir_all(ini.parent().unwrap()).unwrap();
        fs::write(&ini, "KEY=\"Wert\"").unwrap();

        fs::write(
            root.join("langpack.json"),
            format!(
                r#"{{
                    "output_directory": "release",
                    "package_name": "example_soft",
                    "package_name_url": "example-soft",
                    "software_name": "Example Software",
                    "version": "1.0.0",
                    "author_name": "Acme Corp",
                    "author_url": "https://www.example.net",
                    "license": "GPLv3",
                    "quiet": true,
                    "translation": {{ "url": "{}", "project": "example" }}
                }}"#,
                translation_url
            ),
        )
        .unwrap();

        dir
    }

    #[tokio::test]
    async fn test_package_command() {
        let dir = repository("https://translate.example.com");

        package(RealRuntime, dir.path(), None, true, "de-DE")
            .await
            .unwrap();

        assert!(dir.path().join("release/example_soft-de-DE.zip").exists());
    }

    #[tokio::test]
    async fn test_package_command_unknown_code() {
        let dir = repository("https://translate.example.com");

        let result = package(RealRuntime, dir.path(), None, true, "fr-FR").await;

        assert!(result.is_err());
        assert!(!dir.path().join("release/example_soft-fr-FR.zip").exists());
    }

    #[tokio::test]
    async fn test_codes_command() {
        let dir = repository("https://translate.example.com");
        codes(RealRuntime, dir.path(), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_build_command_with_threshold_override() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/projects/example/statistics/?format=json")
            .with_status(200)
            .with_body(r#"[{"code": "de-DE", "translated_percent": 40.0}]"#)
            .create_async()
            .await;
        let dir = repository(&server.url());

        build(
            RealRuntime,
            dir.path(),
            None,
            true,
            BuildOverrides {
                min_percent: Some(50.0),
                ..BuildOverrides::default()
            },
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert!(!dir.path().join("release/example_soft-de-DE.zip").exists());
    }

    #[tokio::test]
    async fn test_progress_command_service_down() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/projects/example/statistics/?format=json")
            .with_status(500)
            .create_async()
            .await;
        let dir = repository(&server.url());

        let result = progress(RealRuntime, dir.path(), None).await;

        mock.assert_async().await;
        assert!(format!("{:#}", result.unwrap_err()).contains("Unexpected HTTP status 500"));
    }
}
