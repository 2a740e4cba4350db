//! SCAD export plugin: the `.scad` template extension.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use scad_core::ScadOptions;
use scad_core::result::AppResult;
use scad_plugin::{ExtensionRegistry, PageContext, TemplateExtension};

use crate::cache::HashCache;
use crate::discovery::{expand_alias, resolve_launch_path};
use crate::error::ExportError;
use crate::invoker::{ExportFiles, MeshExporter, ProcessInvoker};
use crate::launch::LaunchSpec;
use crate::metrics::ExportMetrics;
use crate::models::{SCAD_EXT, TemplateData, artifact_path};
use crate::orchestrator::{BuildOrchestrator, BuildOutcome};

/// Plugin identifier used in the extension registry and in log lines.
pub const PLUGIN_ID: &str = "scad";

/// What happened to a page in the last build pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    /// Mesh export is switched off.
    Disabled,
    /// Mesh was up to date.
    Skipped,
    /// Mesh was written.
    Exported {
        /// Compiler wall time in seconds.
        duration_secs: f64,
    },
    /// The compiler failed.
    Failed {
        /// Compiler exit code, if any.
        exit_code: Option<i32>,
    },
    /// The page could not be processed.
    Error {
        /// What went wrong.
        message: String,
    },
}

impl From<&BuildOutcome> for PageStatus {
    fn from(outcome: &BuildOutcome) -> Self {
        match outcome {
            BuildOutcome::Skipped => Self::Skipped,
            BuildOutcome::Exported { duration_secs, .. } => Self::Exported {
                duration_secs: *duration_secs,
            },
            BuildOutcome::Failed { exit_code, .. } => Self::Failed {
                exit_code: *exit_code,
            },
        }
    }
}

impl PageStatus {
    /// Short label for summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Skipped => "skipped",
            Self::Exported { .. } => "exported",
            Self::Failed { .. } => "failed",
            Self::Error { .. } => "error",
        }
    }
}

/// Exports `.scad` pages to `.stl` meshes.
#[derive(Debug)]
pub struct ScadExportPlugin {
    options: ScadOptions,
    orchestrator: BuildOrchestrator,
    statuses: DashMap<PathBuf, PageStatus>,
}

impl ScadExportPlugin {
    /// Create the plugin with the OpenSCAD process invoker.
    ///
    /// Fails when the launch path cannot be resolved.
    pub fn new(options: ScadOptions) -> Result<Self, ExportError> {
        Self::with_exporter(
            options,
            Arc::new(ProcessInvoker::new()),
            Arc::new(HashCache::new()),
        )
    }

    /// Create the plugin with a custom exporter and cache.
    pub fn with_exporter(
        options: ScadOptions,
        exporter: Arc<dyn MeshExporter>,
        cache: Arc<HashCache>,
    ) -> Result<Self, ExportError> {
        let launch = launch_spec(&options).inspect_err(|e| error!("{}", e))?;

        info!(
            launch = %launch,
            resolved = options.resolve_launch_path,
            no_stl = options.no_stl,
            "SCAD export plugin initialized"
        );

        let orchestrator = BuildOrchestrator::new(cache, exporter, launch)
            .with_verbose(options.verbose)
            .with_silent(options.silent);

        Ok(Self {
            options,
            orchestrator,
            statuses: DashMap::new(),
        })
    }

    /// Register the `.scad` extension.
    pub async fn register(self: &Arc<Self>, registry: &ExtensionRegistry) {
        registry.register(Arc::clone(self) as Arc<dyn TemplateExtension>).await;
        debug!("registered .{} as extension for templates", SCAD_EXT);
    }

    /// Effective options.
    pub fn options(&self) -> &ScadOptions {
        &self.options
    }

    /// Launch specification used for every export.
    pub fn launch(&self) -> &LaunchSpec {
        self.orchestrator.launch()
    }

    /// Export metrics for this plugin instance.
    pub fn metrics(&self) -> &Arc<ExportMetrics> {
        self.orchestrator.metrics()
    }

    /// Layout data for a page.
    pub fn template_data(&self, page: &PageContext) -> TemplateData {
        TemplateData::for_source(&page.input_path, &self.options.layout, &self.options.theme)
    }

    /// Export job for a page.
    pub fn export_files(&self, page: &PageContext) -> Result<ExportFiles, ExportError> {
        let url = page
            .url
            .as_deref()
            .ok_or_else(|| ExportError::MissingPermalink {
                input: page.input_path.clone(),
            })?;

        let data = self.template_data(page);
        let output_stem = output_stem(&page.project_root, &page.output_dir);
        let output = artifact_path(&output_stem, url, &data.stl_file);

        Ok(ExportFiles::new(
            page.project_root.clone(),
            page.input_path.clone(),
            output,
        ))
    }

    /// Status of a page from the last pass, by source path.
    pub fn status(&self, input_path: &Path) -> Option<PageStatus> {
        self.statuses.get(input_path).map(|entry| entry.clone())
    }

    /// All page statuses, sorted by source path.
    pub fn statuses(&self) -> Vec<(PathBuf, PageStatus)> {
        let mut all: Vec<_> = self
            .statuses
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    async fn export_page(&self, page: &PageContext) -> PageStatus {
        let files = match self.export_files(page) {
            Ok(files) => files,
            Err(e) => {
                self.metrics().record_error();
                return PageStatus::Error { message: e.to_string() };
            }
        };
        match self.orchestrator.process(&files).await {
            Ok(outcome) => PageStatus::from(&outcome),
            Err(e) => PageStatus::Error { message: e.to_string() },
        }
    }
}

#[async_trait]
impl TemplateExtension for ScadExportPlugin {
    fn extension(&self) -> &str {
        SCAD_EXT
    }

    fn plugin_id(&self) -> &str {
        PLUGIN_ID
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn compile(&self, content: String, page: &PageContext) -> AppResult<String> {
        debug!(page = %page.input_path.display(), url = ?page.url, "compile begin");

        let status = if self.options.no_stl {
            let data = self.template_data(page);
            let message = format!(
                "Skipping write of {} from {}",
                data.stl_file,
                page.input_path.display()
            );
            if self.options.silent {
                debug!("{}", message);
            } else {
                info!("{}", message);
            }
            PageStatus::Disabled
        } else {
            self.export_page(page).await
        };

        if let PageStatus::Error { ref message } = status {
            error!("[{}] ERR {}", PLUGIN_ID, message);
        }
        self.statuses.insert(page.input_path.clone(), status);

        Ok(content)
    }
}

/// Launch specification for `options`: aliases expanded and, when
/// `resolve_launch_path` is set, validated against the filesystem.
pub fn launch_spec(options: &ScadOptions) -> Result<LaunchSpec, ExportError> {
    let launch_path = expand_alias(&options.launch_path)?;
    if options.resolve_launch_path {
        return Ok(resolve_launch_path(&launch_path)?.spec);
    }
    if launch_path.trim().is_empty() {
        return Err(ExportError::LaunchPathMissing);
    }
    Ok(LaunchSpec::parse(&launch_path))
}

/// Output directory relative to the project root when it lies inside it.
fn output_stem(project_root: &Path, output_dir: &Path) -> PathBuf {
    if output_dir.is_relative() {
        return output_dir.to_path_buf();
    }
    let root = std::path::absolute(project_root).unwrap_or_else(|_| project_root.to_path_buf());
    output_dir
        .strip_prefix(&root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| output_dir.to_path_buf())
}
