//! # Plugin SCAD Export
//!
//! A scad-site plugin that exports `.scad` models to `.stl` meshes with
//! OpenSCAD, running either a locally installed binary or the official
//! container image.
//!
//! ## Incremental builds
//!
//! Every build pass asks the [`BuildOrchestrator`] what to do per model:
//! a model whose mesh already exists and whose source digest is unchanged
//! since the last successful export is skipped; anything else is exported
//! again through the [`ProcessInvoker`]. A failed export is reported and
//! the page passes through untouched, so one broken model never stops the
//! rest of the site from building.
//!
//! ## Launch paths
//!
//! `docker` or `docker:<tag>` runs `openscad/openscad:<tag>` through the
//! container engine; anything else names the OpenSCAD executable. The
//! aliases `auto` and `nightly` pick the platform's default install
//! location (see [`discovery`]).

pub mod args;
pub mod cache;
pub mod discovery;
pub mod error;
pub mod invoker;
pub mod launch;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod paths;
pub mod plugin;

pub use cache::{ContentDigest, HashCache};
pub use error::ExportError;
pub use invoker::{ExportFiles, ExportResult, MeshExporter, ProcessInvoker};
pub use launch::LaunchSpec;
pub use orchestrator::{BuildDecision, BuildOrchestrator, BuildOutcome};
pub use plugin::{PageStatus, ScadExportPlugin};
