//! Per-file build decisions: skip, regenerate, or fail.
//!
//! For every model in a build pass the orchestrator registers the source
//! with the [`HashCache`], checks whether the mesh exists, compares digests
//! and only then invokes the exporter. A failed export never updates the
//! cache, so the next pass retries it.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::cache::HashCache;
use crate::error::ExportError;
use crate::invoker::{ExportFiles, MeshExporter};
use crate::launch::LaunchSpec;
use crate::metrics::ExportMetrics;

/// What to do with one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildDecision {
    /// Mesh exists and the source is unchanged.
    Skip,
    /// Mesh is missing or stale.
    Regenerate,
}

impl BuildDecision {
    /// Skip only when the artifact exists and the digest is unchanged.
    pub fn decide(artifact_exists: bool, source_changed: bool) -> Self {
        if artifact_exists && !source_changed {
            Self::Skip
        } else {
            Self::Regenerate
        }
    }
}

/// Result of processing one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Nothing to do.
    Skipped,
    /// The mesh was written.
    Exported {
        /// Compiler wall time in seconds.
        duration_secs: f64,
        /// Compiler stderr chunks.
        diagnostics: Vec<String>,
    },
    /// The compiler failed; the cache was left untouched.
    Failed {
        /// Compiler exit code, if any.
        exit_code: Option<i32>,
        /// Compiler stderr chunks or the spawn error.
        diagnostics: Vec<String>,
    },
}

impl BuildOutcome {
    /// Whether the compiler failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Decides and runs exports for single files.
#[derive(Debug, Clone)]
pub struct BuildOrchestrator {
    cache: Arc<HashCache>,
    exporter: Arc<dyn MeshExporter>,
    launch: LaunchSpec,
    metrics: Arc<ExportMetrics>,
    verbose: bool,
    silent: bool,
}

impl BuildOrchestrator {
    /// Orchestrator with fresh metrics, quiet success output and progress
    /// logging enabled.
    pub fn new(cache: Arc<HashCache>, exporter: Arc<dyn MeshExporter>, launch: LaunchSpec) -> Self {
        Self {
            cache,
            exporter,
            launch,
            metrics: Arc::new(ExportMetrics::new()),
            verbose: false,
            silent: false,
        }
    }

    /// Echo compiler output after successful exports.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Demote progress lines to debug level.
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Record into shared metrics.
    pub fn with_metrics(mut self, metrics: Arc<ExportMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The shared digest cache.
    pub fn cache(&self) -> &Arc<HashCache> {
        &self.cache
    }

    /// The metrics collector.
    pub fn metrics(&self) -> &Arc<ExportMetrics> {
        &self.metrics
    }

    /// The launch specification every export uses.
    pub fn launch(&self) -> &LaunchSpec {
        &self.launch
    }

    /// Decide without exporting. Registers the source on first sight.
    pub async fn decide(&self, files: &ExportFiles) -> Result<BuildDecision, ExportError> {
        let input = files.absolute_input();
        let output = files.absolute_output();

        self.cache.ensure_registered(&input).await?;
        let artifact_exists = tokio::fs::try_exists(&output).await.unwrap_or(false);
        let source_changed = self.cache.hashes_differ(&input).await?;

        let decision = BuildDecision::decide(artifact_exists, source_changed);
        debug!(
            input = %input.display(),
            output = %output.display(),
            artifact_exists,
            source_changed,
            decision = ?decision,
            "Build decision"
        );
        Ok(decision)
    }

    /// Process one source file.
    ///
    /// Compiler failures are logged and returned as
    /// [`BuildOutcome::Failed`]. Errors are local problems such as an
    /// unreadable source.
    #[instrument(skip(self, files), fields(input = %files.input.display()))]
    pub async fn process(&self, files: &ExportFiles) -> Result<BuildOutcome, ExportError> {
        self.metrics.record_seen();
        let outcome = self.run(files).await;
        if outcome.is_err() {
            self.metrics.record_error();
        }
        outcome
    }

    async fn run(&self, files: &ExportFiles) -> Result<BuildOutcome, ExportError> {
        let stl_file = display_name(&files.output);
        let input = files.input.display();

        if self.decide(files).await? == BuildDecision::Skip {
            debug!("{} is up to date; skipped", stl_file);
            self.metrics.record_skipped();
            return Ok(BuildOutcome::Skipped);
        }

        self.progress(&format!("Writing {stl_file} from {input}"));
        self.metrics.record_started();

        let result = self.exporter.export(&self.launch, files).await?;

        if !result.ok {
            error!("OpenSCAD encountered an issue");
            for line in result.lines() {
                error!("{}", line);
            }
            self.metrics.record_failure();
            return Ok(BuildOutcome::Failed {
                exit_code: result.exit_code,
                diagnostics: result.diagnostics,
            });
        }

        self.cache.update_hash(&files.absolute_input()).await?;

        if self.verbose {
            for line in result.lines() {
                self.progress(&format!("\t{line}"));
            }
        }

        self.progress(&format!(
            "Wrote {stl_file} in {:.2} seconds",
            result.duration_secs()
        ));
        self.metrics.record_success(result.duration);

        Ok(BuildOutcome::Exported {
            duration_secs: result.duration_secs(),
            diagnostics: result.diagnostics,
        })
    }

    fn progress(&self, message: &str) {
        if self.silent {
            debug!("{}", message);
        } else {
            info!("{}", message);
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::ExportResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Writes the mesh and succeeds, or fails with exit code 1.
    #[derive(Debug)]
    struct MockExporter {
        succeed: bool,
        calls: AtomicUsize,
    }

    impl MockExporter {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                succeed,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MeshExporter for MockExporter {
        async fn export(
            &self,
            _launch: &LaunchSpec,
            files: &ExportFiles,
        ) -> Result<ExportResult, ExportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.succeed {
                return Ok(ExportResult {
                    ok: false,
                    diagnostics: vec!["ERROR: Parser error\nin file cube.scad\n".to_string()],
                    exit_code: Some(1),
                    duration: Duration::from_millis(5),
                });
            }
            let output = files.absolute_output();
            crate::paths::ensure_parent_dir(&output).await?;
            tokio::fs::write(&output, b"solid").await.expect("write mesh");
            Ok(ExportResult {
                ok: true,
                diagnostics: vec!["Total rendering time: 0:00:00.010\n".to_string()],
                exit_code: Some(0),
                duration: Duration::from_millis(10),
            })
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        cache: Arc<HashCache>,
        files: ExportFiles,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            std::fs::write(dir.path().join("cube.scad"), "cube(1);").expect("write source");
            let files = ExportFiles::new(dir.path(), "cube.scad", "_site/cube/cube.stl");
            Self {
                dir,
                cache: Arc::new(HashCache::new()),
                files,
            }
        }

        fn orchestrator(&self, exporter: Arc<MockExporter>) -> BuildOrchestrator {
            BuildOrchestrator::new(self.cache.clone(), exporter, LaunchSpec::parse("docker"))
                .with_verbose(true)
        }

        fn source(&self) -> std::path::PathBuf {
            self.dir.path().join("cube.scad")
        }

        fn artifact(&self) -> std::path::PathBuf {
            self.dir.path().join("_site/cube/cube.stl")
        }
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(BuildDecision::decide(true, false), BuildDecision::Skip);
        assert_eq!(BuildDecision::decide(true, true), BuildDecision::Regenerate);
        assert_eq!(BuildDecision::decide(false, false), BuildDecision::Regenerate);
        assert_eq!(BuildDecision::decide(false, true), BuildDecision::Regenerate);
    }

    #[tokio::test]
    async fn test_missing_artifact_regenerates() {
        let fx = Fixture::new();
        let exporter = MockExporter::new(true);
        let orchestrator = fx.orchestrator(exporter.clone());

        let outcome = orchestrator.process(&fx.files).await.expect("process");
        assert!(matches!(outcome, BuildOutcome::Exported { .. }));
        assert_eq!(exporter.calls(), 1);
        assert!(fx.artifact().is_file());
    }

    #[tokio::test]
    async fn test_second_pass_skips_without_export() {
        let fx = Fixture::new();
        let exporter = MockExporter::new(true);
        let orchestrator = fx.orchestrator(exporter.clone());

        orchestrator.process(&fx.files).await.expect("first pass");
        let outcome = orchestrator.process(&fx.files).await.expect("second pass");

        assert_eq!(outcome, BuildOutcome::Skipped);
        assert_eq!(exporter.calls(), 1);

        let snap = orchestrator.metrics().snapshot();
        assert_eq!(snap.files_seen, 2);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.exports_succeeded, 1);
    }

    #[tokio::test]
    async fn test_existing_mesh_kept_on_first_sight() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.artifact().parent().expect("parent")).expect("mkdir");
        std::fs::write(fx.artifact(), b"solid from last run").expect("write mesh");
        assert!(!fx.cache.is_registered(&fx.source()));

        let exporter = MockExporter::new(true);
        let orchestrator = fx.orchestrator(exporter.clone());
        let outcome = orchestrator.process(&fx.files).await.expect("first pass");

        assert_eq!(outcome, BuildOutcome::Skipped);
        assert_eq!(exporter.calls(), 0);
        assert!(fx.cache.is_registered(&fx.source()));
        assert_eq!(
            std::fs::read(fx.artifact()).expect("read mesh"),
            b"solid from last run"
        );
    }

    #[tokio::test]
    async fn test_changed_source_regenerates() {
        let fx = Fixture::new();
        let exporter = MockExporter::new(true);
        let orchestrator = fx.orchestrator(exporter.clone());

        orchestrator.process(&fx.files).await.expect("first pass");
        std::fs::write(fx.source(), "cube(2);").expect("rewrite");

        assert_eq!(
            orchestrator.decide(&fx.files).await.expect("decide"),
            BuildDecision::Regenerate
        );
        let outcome = orchestrator.process(&fx.files).await.expect("second pass");
        assert!(matches!(outcome, BuildOutcome::Exported { .. }));
        assert_eq!(exporter.calls(), 2);
        assert!(fx.cache.hashes_match(&fx.source()).await.expect("compare"));
    }

    #[tokio::test]
    async fn test_deleted_artifact_regenerates() {
        let fx = Fixture::new();
        let exporter = MockExporter::new(true);
        let orchestrator = fx.orchestrator(exporter.clone());

        orchestrator.process(&fx.files).await.expect("first pass");
        std::fs::remove_file(fx.artifact()).expect("remove mesh");

        orchestrator.process(&fx.files).await.expect("second pass");
        assert_eq!(exporter.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_old_digest() {
        let fx = Fixture::new();
        fx.orchestrator(MockExporter::new(true))
            .process(&fx.files)
            .await
            .expect("first pass");
        let exported_digest = fx.cache.digest(&fx.source()).expect("digest");

        std::fs::write(fx.source(), "cube(;").expect("rewrite");
        let failing = fx.orchestrator(MockExporter::new(false));
        let outcome = failing.process(&fx.files).await.expect("failed pass");

        match outcome {
            BuildOutcome::Failed {
                exit_code,
                diagnostics,
            } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(diagnostics.len(), 1);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(fx.cache.digest(&fx.source()), Some(exported_digest));
        assert!(fx.cache.hashes_differ(&fx.source()).await.expect("compare"));
        assert_eq!(failing.metrics().snapshot().exports_failed, 1);

        let retry = MockExporter::new(true);
        let outcome = fx
            .orchestrator(retry.clone())
            .process(&fx.files)
            .await
            .expect("retry pass");
        assert!(matches!(outcome, BuildOutcome::Exported { .. }));
        assert_eq!(retry.calls(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_source_is_error() {
        let fx = Fixture::new();
        let exporter = MockExporter::new(true);
        let orchestrator = fx.orchestrator(exporter.clone());
        let files = ExportFiles::new(fx.dir.path(), "missing.scad", "_site/missing.stl");

        let err = orchestrator.process(&files).await.expect_err("missing source");
        assert!(matches!(err, ExportError::Read { .. }));
        assert_eq!(exporter.calls(), 0);
        assert_eq!(orchestrator.metrics().snapshot().errors, 1);
    }
}
