//! Extraction and compilation tools behind swappable traits.
//!
//! # Architecture
//!
//! - `gettext`: runs GNU `xgettext` / `msgfmt` as child processes
//! - `native`: in-process equivalents built on `crate::catalog`
//!
//! The pipeline only sees `TextExtractor` and `CatalogCompiler`, so tests
//! substitute fakes that record their arguments.

mod gettext;
mod native;

pub use gettext::{Msgfmt, Xgettext};
pub use native::{NativeCompiler, NativeExtractor};

use std::path::Path;
use thiserror::Error;

use crate::config::Toolchain;

/// Failure of an extraction or compilation step, naming the tool and its input
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} could not be started: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed for {input} ({status}): {stderr}")]
    Failed {
        tool: String,
        input: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} failed for {input}: {reason}")]
    Invalid {
        tool: String,
        input: String,
        reason: String,
    },
}

/// Produces a catalog template from a listing of source files
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Extract every translatable string from the files named in `listing`
    /// (paths relative to `working_dir`) into the template at `output`.
    fn extract(&self, working_dir: &Path, listing: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Turns a human-readable catalog into its binary runtime form
pub trait CatalogCompiler: Send + Sync {
    fn name(&self) -> &str;

    fn compile(&self, catalog: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Instantiate the configured toolchain
pub fn select(toolchain: Toolchain) -> (Box<dyn TextExtractor>, Box<dyn CatalogCompiler>) {
    match toolchain {
        Toolchain::Gettext => (Box::new(Xgettext::default()), Box::new(Msgfmt::default())),
        Toolchain::Native => (Box::new(NativeExtractor), Box::new(NativeCompiler)),
    }
}
