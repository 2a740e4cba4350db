//! # scad-core
//!
//! Core crate for scad-site. Contains the configuration schemas (site layout,
//! plugin options, logging), environment option parsing, and the unified
//! error system shared by every other crate in the workspace.
//!
//! This crate has **no** internal dependencies on other scad-site crates.

pub mod config;
pub mod error;
pub mod result;

pub use config::SiteConfig;
pub use config::scad::{PartialScadOptions, ScadOptions};
pub use error::{AppError, ErrorKind};
pub use result::AppResult;
