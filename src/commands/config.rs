use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::{
    builder::Builder,
    completion::WeblateClient,
    config::{DEFAULT_CONFIG_FILE, Parameters},
    runtime::Runtime,
    storage::S3ObjectStore,
};

/// Everything a command needs: parameters and the network clients built from them.
pub struct Config<R: Runtime> {
    pub runtime: R,
    pub repository_root: PathBuf,
    pub params: Parameters,
    pub completion: WeblateClient,
    pub store: S3ObjectStore,
}

impl<R: Runtime> Config<R> {
    /// Load parameters for the repository at `root`.
    /// `config_file` defaults to `langpack.json` in the repository root.
    pub async fn new(
        runtime: R,
        root: &Path,
        config_file: Option<PathBuf>,
        quiet: bool,
    ) -> Result<Self> {
        let repository_root = runtime
            .canonicalize(root)
            .with_context(|| format!("Repository root {:?} does not exist", root))?;
        let config_file =
            config_file.unwrap_or_else(|| repository_root.join(DEFAULT_CONFIG_FILE));
        debug!("Using repository {:?} with {:?}", repository_root, config_file);

        let mut params = Parameters::load(&runtime, &config_file, &repository_root)?;
        params.quiet |= quiet;

        let completion = WeblateClient::new(
            &params.translation.url,
            &params.translation.project,
            params.translation.api_key.as_deref(),
        )?;
        let store = S3ObjectStore::new(&params.storage).await;

        Ok(Self {
            runtime,
            repository_root,
            params,
            completion,
            store,
        })
    }

    /// Scan the repository and set up a builder.
    pub fn into_builder(self) -> Result<Builder<R, WeblateClient, S3ObjectStore>> {
        Builder::new(
            self.runtime,
            self.repository_root,
            self.params,
            self.completion,
            self.store,
        )
    }
}
