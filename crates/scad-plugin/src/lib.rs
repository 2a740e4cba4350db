//! # scad-plugin
//!
//! The seam between a static-site host and the plugins that render its
//! pages. Provides:
//!
//! - [`PageContext`], what the host knows about a page being built
//! - [`TemplateExtension`], the trait a plugin implements per source extension
//! - [`ExtensionRegistry`] with priority-ordered registration
//! - [`ExtensionDispatcher`] that runs a page through its handlers

pub mod dispatcher;
pub mod page;
pub mod registry;

pub use dispatcher::{ExtensionDispatcher, RenderResult};
pub use page::PageContext;
pub use registry::{ExtensionRegistry, TemplateExtension};
