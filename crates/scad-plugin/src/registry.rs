//! Extension registry. Plugins register handlers by source extension with
//! priority ordering.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use scad_core::result::AppResult;

use crate::page::PageContext;

/// Trait for template extension implementations.
///
/// `compile` receives the current page content and returns the content to
/// hand to the next handler (or to write out). Returning `Err` reports a
/// failure for this page; fatal errors abort the build.
#[async_trait]
pub trait TemplateExtension: Send + Sync + std::fmt::Debug {
    /// Source extension handled, without the leading dot (e.g. `"scad"`).
    fn extension(&self) -> &str;

    /// Returns the plugin ID owning this handler.
    fn plugin_id(&self) -> &str;

    /// Returns the priority (lower = runs first).
    fn priority(&self) -> i32 {
        100
    }

    /// Compiles one page.
    async fn compile(&self, content: String, page: &PageContext) -> AppResult<String>;
}

/// Entry in the registry.
#[derive(Debug)]
struct ExtensionEntry {
    /// The handler.
    handler: Arc<dyn TemplateExtension>,
    /// Priority (lower = earlier execution).
    priority: i32,
    /// Plugin that registered this handler.
    plugin_id: String,
}

/// Registry of template handlers organized by source extension.
#[derive(Debug)]
pub struct ExtensionRegistry {
    /// Extension → sorted list of handlers.
    handlers: RwLock<HashMap<String, Vec<ExtensionEntry>>>,
}

impl ExtensionRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a handler for the extension it declares.
    pub async fn register(&self, handler: Arc<dyn TemplateExtension>) {
        let extension = handler.extension().trim_start_matches('.').to_string();
        let plugin_id = handler.plugin_id().to_string();
        let priority = handler.priority();

        let mut handlers = self.handlers.write().await;
        let entries = handlers.entry(extension.clone()).or_default();

        entries.push(ExtensionEntry {
            handler,
            priority,
            plugin_id: plugin_id.clone(),
        });

        entries.sort_by_key(|e| e.priority);

        info!(
            extension = %extension,
            plugin_id = %plugin_id,
            priority = priority,
            "Template extension registered"
        );
    }

    /// Unregisters all handlers for a specific plugin.
    pub async fn unregister_plugin(&self, plugin_id: &str) {
        let mut handlers = self.handlers.write().await;

        for entries in handlers.values_mut() {
            entries.retain(|e| e.plugin_id != plugin_id);
        }

        handlers.retain(|_, entries| !entries.is_empty());

        info!(plugin_id = %plugin_id, "All extensions unregistered for plugin");
    }

    /// Returns all handlers for an extension, sorted by priority.
    pub async fn get_handlers(&self, extension: &str) -> Vec<Arc<dyn TemplateExtension>> {
        let handlers = self.handlers.read().await;
        handlers
            .get(extension)
            .map(|entries| entries.iter().map(|e| e.handler.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns whether any handler is registered for an extension.
    pub async fn has_handlers(&self, extension: &str) -> bool {
        let handlers = self.handlers.read().await;
        handlers
            .get(extension)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    /// Returns all extensions with at least one handler (the template
    /// formats the host should pick up).
    pub async fn template_formats(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        let mut formats: Vec<String> = handlers.keys().cloned().collect();
        formats.sort();
        formats
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
