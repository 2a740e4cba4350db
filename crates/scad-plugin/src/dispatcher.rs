//! Extension dispatcher. Runs a page through every handler registered for
//! its source extension.
//!
//! Handlers run in priority order and each receives the previous handler's
//! output. A non-fatal error from one handler is logged and the content it
//! was given passes through to the next; a fatal error (configuration)
//! aborts the page and is returned to the host.

use std::sync::Arc;

use tracing::{debug, error};

use scad_core::result::AppResult;

use crate::page::PageContext;
use crate::registry::ExtensionRegistry;

/// Outcome of rendering one page.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// Final page content.
    pub content: String,
    /// Plugins whose handler ran, in order.
    pub handled_by: Vec<String>,
    /// Plugins whose handler reported a non-fatal error.
    pub failed: Vec<String>,
}

impl RenderResult {
    /// Whether any handler picked up the page.
    pub fn was_handled(&self) -> bool {
        !self.handled_by.is_empty()
    }
}

/// Dispatches pages to registered template extensions.
#[derive(Debug)]
pub struct ExtensionDispatcher {
    /// Extension registry.
    registry: Arc<ExtensionRegistry>,
}

impl ExtensionDispatcher {
    /// Creates a new dispatcher.
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }

    /// Renders a page through its handlers.
    pub async fn render(&self, content: String, page: &PageContext) -> AppResult<RenderResult> {
        let Some(extension) = page.extension() else {
            return Ok(RenderResult {
                content,
                handled_by: Vec::new(),
                failed: Vec::new(),
            });
        };

        let handlers = self.registry.get_handlers(extension).await;

        debug!(
            page = %page.input_path.display(),
            handler_count = handlers.len(),
            "Dispatching page"
        );

        let mut content = content;
        let mut handled_by = Vec::with_capacity(handlers.len());
        let mut failed = Vec::new();

        for handler in &handlers {
            handled_by.push(handler.plugin_id().to_string());
            match handler.compile(content.clone(), page).await {
                Ok(output) => content = output,
                Err(e) if e.is_fatal() => {
                    error!(
                        page = %page.input_path.display(),
                        plugin_id = %handler.plugin_id(),
                        error = %e,
                        "Handler failed fatally"
                    );
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        page = %page.input_path.display(),
                        plugin_id = %handler.plugin_id(),
                        error = %e,
                        "Handler failed; passing content through"
                    );
                    failed.push(handler.plugin_id().to_string());
                }
            }
        }

        Ok(RenderResult {
            content,
            handled_by,
            failed,
        })
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TemplateExtension;
    use async_trait::async_trait;
    use scad_core::error::AppError;

    #[derive(Debug)]
    enum Behaviour {
        Append(&'static str),
        Fail,
        Fatal,
    }

    #[derive(Debug)]
    struct Stub {
        id: &'static str,
        priority: i32,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl TemplateExtension for Stub {
        fn extension(&self) -> &str {
            "scad"
        }

        fn plugin_id(&self) -> &str {
            self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn compile(&self, content: String, _page: &PageContext) -> AppResult<String> {
            match self.behaviour {
                Behaviour::Append(s) => Ok(format!("{content}{s}")),
                Behaviour::Fail => Err(AppError::plugin("export failed")),
                Behaviour::Fatal => Err(AppError::configuration("no compiler")),
            }
        }
    }

    async fn dispatcher(stubs: Vec<Stub>) -> ExtensionDispatcher {
        let registry = Arc::new(ExtensionRegistry::new());
        for stub in stubs {
            registry.register(Arc::new(stub)).await;
        }
        ExtensionDispatcher::new(registry)
    }

    fn page(path: &str) -> PageContext {
        PageContext::new(path, "/site", "_site").with_url("/cube/")
    }

    #[tokio::test]
    async fn test_handlers_chain_in_priority_order() {
        let d = dispatcher(vec![
            Stub { id: "b", priority: 20, behaviour: Behaviour::Append("-b") },
            Stub { id: "a", priority: 10, behaviour: Behaviour::Append("-a") },
        ])
        .await;

        let result = d.render("cube(1);".to_string(), &page("cube.scad")).await.expect("render");
        assert_eq!(result.content, "cube(1);-a-b");
        assert_eq!(result.handled_by, vec!["a", "b"]);
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn test_non_fatal_failure_passes_content_through() {
        let d = dispatcher(vec![
            Stub { id: "broken", priority: 10, behaviour: Behaviour::Fail },
            Stub { id: "ok", priority: 20, behaviour: Behaviour::Append("!") },
        ])
        .await;

        let result = d.render("sphere(2);".to_string(), &page("s.scad")).await.expect("render");
        assert_eq!(result.content, "sphere(2);!");
        assert_eq!(result.failed, vec!["broken"]);
    }

    #[tokio::test]
    async fn test_fatal_failure_aborts() {
        let d = dispatcher(vec![Stub { id: "x", priority: 10, behaviour: Behaviour::Fatal }]).await;
        let err = d.render(String::new(), &page("x.scad")).await.expect_err("fatal");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unhandled_extension() {
        let d = dispatcher(vec![]).await;
        let result = d.render("# hi".to_string(), &page("readme.md")).await.expect("render");
        assert!(!result.was_handled());
        assert_eq!(result.content, "# hi");
    }
}
