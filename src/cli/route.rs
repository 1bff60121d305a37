//! CLI route: single route table and run context. Dispatches to the pack
//! expander, the catalog and the configuration loader.

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_config, format_expansion, format_pack_summary, PackSummaryRow,
};
use crate::config::{ConfigLoader, StudioConfig};
use crate::error::StudioError;
use crate::pack::{expand, AspectRatio, Catalog, ExpandOptions, PackKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace and effective configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: StudioConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, StudioError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, StudioError> {
        match command {
            Commands::Packs { format } => {
                let catalog = self.load_catalog(None)?;
                let rows = PackKind::ALL
                    .iter()
                    .map(|&pack| {
                        Ok(PackSummaryRow {
                            pack,
                            model_jobs: expand(pack, &catalog, &ExpandOptions::default())?.len(),
                            product_jobs: expand(
                                pack,
                                &catalog,
                                &ExpandOptions {
                                    product_only: true,
                                    ..ExpandOptions::default()
                                },
                            )?
                            .len(),
                        })
                    })
                    .collect::<Result<Vec<_>, StudioError>>()?;
                format_pack_summary(&rows, format)
            }
            Commands::Expand {
                pack,
                aspect_ratio,
                product_only,
                catalog,
                format,
            } => {
                let pack: PackKind = pack.parse()?;
                let aspect_ratio: AspectRatio = aspect_ratio.parse()?;
                let catalog = self.load_catalog(catalog.as_deref())?;
                let options = ExpandOptions {
                    aspect_ratio,
                    product_only: *product_only,
                };
                let jobs = expand(pack, &catalog, &options)?;
                info!(pack = %pack, jobs = jobs.len(), product_only, "Expanded pack");
                format_expansion(pack, *product_only, &jobs, format)
            }
            Commands::Config => format_config(&self.config),
        }
    }

    /// The catalog from `--catalog`, else the configured one, else the built-in one.
    fn load_catalog(&self, override_path: Option<&Path>) -> Result<Catalog, StudioError> {
        let path = override_path.or(self.config.catalog_path.as_deref());
        match path {
            Some(path) => {
                let resolved = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.workspace_root.join(path)
                };
                debug!(path = %resolved.display(), "Loading shot catalog");
                Catalog::load(&resolved)
            }
            None => Ok(Catalog::builtin()),
        }
    }
}
