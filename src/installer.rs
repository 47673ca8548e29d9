use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::archive::{self, ArchiveFilter, ExtractReport, RemoteArchive};
use crate::toolchain::CatalogCompiler;

/// Directories under the locale root starting with this are not locales
const RESERVED_PREFIX: &str = "messages";

/// Subdirectory the runtime looks up binary catalogs in
pub const LOOKUP_DIR: &str = "LC_MESSAGES";

/// One locale's catalogs on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleBundle {
    pub code: String,
    /// Translator-editable `<code>/<domain>.po`
    pub catalog: PathBuf,
    /// Compiled `<code>/LC_MESSAGES/<domain>.mo`
    pub binary: PathBuf,
}

impl LocaleBundle {
    pub fn new(locale_dir: &Path, code: &str, domain: &str) -> Self {
        let dir = locale_dir.join(code);
        Self {
            code: code.to_string(),
            catalog: dir.join(format!("{}.po", domain)),
            binary: dir.join(LOOKUP_DIR).join(format!("{}.mo", domain)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleFailure {
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub compiled: Vec<String>,
    pub failed: Vec<LocaleFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub extracted: ExtractReport,
    pub compiled: CompileReport,
}

/// Unpack the export into `locale_dir`, then compile every locale found there.
pub fn install(
    archive: &RemoteArchive,
    filter: &ArchiveFilter,
    locale_dir: &Path,
    domain: &str,
    compiler: &dyn CatalogCompiler,
) -> Result<InstallReport> {
    let extracted = archive::extract(archive, filter, locale_dir)?;
    info!(
        "✓ Extracted {} files ({} directories, {} entries ignored)",
        extracted.files_written, extracted.directories, extracted.ignored
    );

    let compiled = compile_locales(locale_dir, domain, compiler)?;
    Ok(InstallReport { extracted, compiled })
}

/// Every locale directory under `locale_dir`, sorted by code.
///
/// Files and entries named `messages*` (the template) are skipped.
pub fn discover_locales(locale_dir: &Path, domain: &str) -> Result<Vec<LocaleBundle>> {
    if !locale_dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(locale_dir)
        .with_context(|| format!("Failed to list {}", locale_dir.display()))?;

    let mut codes = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", locale_dir.display()))?;
        let Ok(code) = entry.file_name().into_string() else {
            warn!("Skipping non UTF-8 locale directory {:?}", entry.file_name());
            continue;
        };
        if code.starts_with(RESERVED_PREFIX) || !entry.path().is_dir() {
            continue;
        }
        codes.push(code);
    }
    codes.sort();

    Ok(codes
        .iter()
        .map(|code| LocaleBundle::new(locale_dir, code, domain))
        .collect())
}

/// Compile each locale's catalog; a failing locale is recorded and skipped
pub fn compile_locales(
    locale_dir: &Path,
    domain: &str,
    compiler: &dyn CatalogCompiler,
) -> Result<CompileReport> {
    let bundles = discover_locales(locale_dir, domain)?;
    let total = bundles.len();
    let mut report = CompileReport::default();

    for (index, bundle) in bundles.iter().enumerate() {
        let progress = index + 1;
        match compile_bundle(bundle, compiler) {
            Ok(()) => {
                info!("[{}/{}] ✓ {}", progress, total, bundle.code);
                report.compiled.push(bundle.code.clone());
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!("[{}/{}] ✗ {} - {}", progress, total, bundle.code, reason);
                report.failed.push(LocaleFailure {
                    code: bundle.code.clone(),
                    reason,
                });
            }
        }
    }

    info!(
        "Compile complete: {} successful, {} failed",
        report.compiled.len(),
        report.failed.len()
    );

    Ok(report)
}

fn compile_bundle(bundle: &LocaleBundle, compiler: &dyn CatalogCompiler) -> Result<()> {
    if !bundle.catalog.is_file() {
        anyhow::bail!("missing catalog {}", bundle.catalog.display());
    }

    if let Some(lookup_dir) = bundle.binary.parent() {
        std::fs::create_dir_all(lookup_dir)
            .with_context(|| format!("Failed to create {}", lookup_dir.display()))?;
    }

    compiler.compile(&bundle.catalog, &bundle.binary)?;
    Ok(())
}
