//! One build pass over a directory of models.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::output::{self, OutputFormat};
use plugin_scad_export::metrics::MetricsSnapshot;
use plugin_scad_export::models::is_scad_file;
use plugin_scad_export::{PageStatus, ScadExportPlugin};
use scad_core::error::AppError;
use scad_core::{PartialScadOptions, SiteConfig};
use scad_plugin::{ExtensionDispatcher, ExtensionRegistry, PageContext, RenderResult};

/// Arguments for the build command
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Directory scanned for models, relative to the project root
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// Output directory, relative to the project root
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// How to launch OpenSCAD (path, auto, nightly, docker, docker:<tag>)
    #[arg(short, long)]
    pub launch_path: Option<String>,
    /// Maximum number of models processed at once
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,
    /// Skip mesh export entirely
    #[arg(long)]
    pub no_stl: bool,
}

/// Summary row per model
#[derive(Debug, Serialize, Tabled)]
struct BuildRow {
    /// Source file
    file: String,
    /// Outcome
    status: String,
    /// Duration, exit code or error
    detail: String,
}

impl BuildRow {
    fn new(file: &Path, status: &PageStatus) -> Self {
        let detail = match status {
            PageStatus::Exported { duration_secs } => format!("{duration_secs:.2}s"),
            PageStatus::Failed { exit_code: Some(code) } => format!("exit code {code}"),
            PageStatus::Failed { exit_code: None } => "no exit code".to_string(),
            PageStatus::Error { message } => message.clone(),
            PageStatus::Disabled | PageStatus::Skipped => String::new(),
        };
        Self {
            file: file.display().to_string(),
            status: status.label().to_string(),
            detail,
        }
    }
}

/// JSON report
#[derive(Debug, Serialize)]
struct BuildReport {
    pages: Vec<BuildRow>,
    metrics: MetricsSnapshot,
}

/// Execute the build command
pub async fn execute(
    args: &BuildArgs,
    config: &SiteConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let root = std::path::absolute(&config.site.root)?;
    let input = args.input.clone().unwrap_or_else(|| config.site.input.clone());
    let output_dir = args.output.clone().unwrap_or_else(|| config.site.output.clone());

    let overrides = PartialScadOptions {
        launch_path: args.launch_path.clone(),
        no_stl: args.no_stl.then_some(true),
        ..PartialScadOptions::default()
    };
    let options = super::plugin_options(config, overrides)?;

    let plugin = Arc::new(ScadExportPlugin::new(options)?);
    let registry = Arc::new(ExtensionRegistry::new());
    plugin.register(&registry).await;
    let dispatcher = ExtensionDispatcher::new(registry);

    let pages = discover_pages(&root, &input, &output_dir);
    info!(
        count = pages.len(),
        root = %root.display(),
        launch = %plugin.launch(),
        "Starting build pass"
    );

    let dispatcher = &dispatcher;
    let results: Vec<(PathBuf, Result<RenderResult, AppError>)> = stream::iter(pages)
        .map(|page| async move {
            let result = render_page(dispatcher, &page).await;
            (page.input_path, result)
        })
        .buffer_unordered(args.jobs.max(1))
        .collect()
        .await;

    for (input_path, result) in results {
        match result {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => error!(page = %input_path.display(), error = %e, "Page failed"),
        }
    }

    let rows: Vec<BuildRow> = plugin
        .statuses()
        .iter()
        .map(|(file, status)| BuildRow::new(file, status))
        .collect();
    let metrics = plugin.metrics().snapshot();

    match format {
        OutputFormat::Json => output::print_json(&BuildReport {
            pages: rows,
            metrics,
        }),
        OutputFormat::Table => {
            output::print_list(&rows, format);
            print_summary(&metrics);
        }
    }

    Ok(())
}

async fn render_page(
    dispatcher: &ExtensionDispatcher,
    page: &PageContext,
) -> Result<RenderResult, AppError> {
    let content = tokio::fs::read_to_string(page.absolute_input()).await?;
    dispatcher.render(content, page).await
}

fn print_summary(metrics: &MetricsSnapshot) {
    println!();
    output::print_kv("Models", &metrics.files_seen.to_string());
    output::print_kv("Exported", &metrics.exports_succeeded.to_string());
    output::print_kv("Up to date", &metrics.skipped.to_string());
    output::print_kv("Failed", &metrics.exports_failed.to_string());
    if let Some(p50) = metrics.duration_p50 {
        output::print_kv("Export time (p50)", &format!("{:.2}s", p50.as_secs_f64()));
    }

    if metrics.exports_failed > 0 || metrics.errors > 0 {
        output::print_warning("Some models could not be exported; see the log above.");
    } else {
        output::print_success("Build pass complete");
    }
}

/// Every model below `root/input`, skipping hidden directories and the
/// output directory. Each page's permalink is its input-relative path
/// without extension (`dir/cube.scad` -> `/dir/cube/`).
fn discover_pages(root: &Path, input: &Path, output_dir: &Path) -> Vec<PageContext> {
    let input_root = root.join(input);
    let output_root = root.join(output_dir);

    let walker = WalkDir::new(&input_root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.path() == output_root
                    || entry.file_name().to_string_lossy().starts_with('.'))
        });

    let mut pages = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_scad_file(entry.path()) {
            continue;
        }

        let Ok(rel_to_root) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Ok(rel_to_input) = entry.path().strip_prefix(&input_root) else {
            continue;
        };

        pages.push(
            PageContext::new(rel_to_root, root, output_dir).with_url(permalink(rel_to_input)),
        );
    }
    pages
}

/// `/dir/cube/` for `dir/cube.scad`.
fn permalink(rel: &Path) -> String {
    let stem = rel.with_extension("");
    let parts: Vec<String> = stem
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}/", parts.join("/"))
}
