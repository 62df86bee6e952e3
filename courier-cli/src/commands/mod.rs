//! Subcommands and the setup they share.

pub mod diff;
pub mod import;
pub mod plan;
pub mod watermark;

use std::path::PathBuf;

use anyhow::{Context, Result};

use courier_core::{config, Config, EntityTypeRegistry};
use courier_import::{watermark_key, Collaborators, ImportOptions, ReconciliationEngine};
use courier_store::{FileWatermarkStore, HalCodec, HalLinkTypes, JsonStore};

/// Configuration, source folder and stateless collaborators of one command.
pub struct Setup {
    pub home: PathBuf,
    pub config: Config,
    pub folder: PathBuf,
    pub registry: EntityTypeRegistry,
    pub codec: HalCodec,
    pub links: HalLinkTypes,
}

impl Setup {
    /// Loads `~/.courier/config.yaml` and resolves the source folder: the
    /// `--folder` argument, else the configured `content_folder`.
    pub fn load(folder: Option<PathBuf>) -> Result<Self> {
        let home = config::home()?;
        let config = config::load_at(&home).context("failed to load courier config")?;
        let folder = folder
            .or_else(|| config.content_folder.clone())
            .context("no content folder: pass --folder or set content_folder in ~/.courier/config.yaml")?;
        let folder = folder
            .canonicalize()
            .with_context(|| format!("content folder {} is not readable", folder.display()))?;
        let registry = config.entity_types();
        tracing::debug!(folder = %folder.display(), entity_types = registry.ids().len(), "loaded setup");
        Ok(Self {
            links: HalLinkTypes::new(registry.clone()),
            codec: HalCodec::new(),
            registry,
            home,
            config,
            folder,
        })
    }

    pub fn open_store(&self) -> Result<JsonStore> {
        let dir = self.config.store_dir_at(&self.home);
        JsonStore::open(&dir).with_context(|| format!("failed to open store in {}", dir.display()))
    }

    pub fn watermarks(&self) -> FileWatermarkStore {
        FileWatermarkStore::at(&self.home)
    }

    pub fn watermark_key(&self) -> String {
        watermark_key(&self.folder)
    }

    pub fn engine<'a>(
        &'a self,
        options: ImportOptions,
        store: &'a mut JsonStore,
        watermarks: &'a mut FileWatermarkStore,
    ) -> ReconciliationEngine<'a> {
        ReconciliationEngine::new(
            &self.folder,
            options,
            Collaborators {
                registry: &self.registry,
                repository: store,
                codec: &self.codec,
                link_types: &self.links,
                watermarks,
                hooks: Vec::new(),
            },
        )
    }
}
