use anyhow::Result;
use tracing::{info, warn};

use crate::archive::{ArchiveFilter, ExtractReport};
use crate::config::{Config, Credential};
use crate::crowdin::CrowdinClient;
use crate::generator::{self, CatalogTemplate};
use crate::installer::{self, CompileReport};
use crate::scanner;
use crate::toolchain::{CatalogCompiler, TextExtractor};

/// What a completed run did, stage by stage
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub source_files: usize,
    pub template: CatalogTemplate,
    /// `None` when the template could not be read back
    pub template_messages: Option<usize>,
    pub pushed: bool,
    pub extracted: ExtractReport,
    pub compiled: CompileReport,
}

/// Run scan, extract, sync and install in order.
///
/// Extraction and network failures abort the run; per-locale compile
/// failures are collected in the report instead.
pub async fn run(
    config: &Config,
    credential: Option<&Credential>,
    extractor: &dyn TextExtractor,
    compiler: &dyn CatalogCompiler,
) -> Result<PipelineReport> {
    // Step 1: Find translatable sources
    info!("Step 1: Scanning {:?} for {:?} files", config.source_dirs, config.source_extensions);
    let sources = scanner::scan_sources(&config.repo_root, &config.source_dirs, &config.source_extensions);
    sources.write_listing(&config.listing_file)?;
    info!("✓ Found {} files to translate", sources.len());

    // Step 2: Regenerate the template
    info!("Step 2: Generating template");
    let template = generator::generate_template(
        &config.repo_root,
        &config.listing_file,
        &config.locale_dir(),
        extractor,
    )?;
    let template_messages = match template.message_count() {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Could not count template messages: {:#}", e);
            None
        }
    };
    match template_messages {
        Some(count) => info!("✓ Template {} has {} messages", template.path.display(), count),
        None => info!("✓ Template written to {}", template.path.display()),
    }

    // Step 3: Sync with Crowdin
    info!("Step 3: Syncing with Crowdin");
    let client = CrowdinClient::new(config)?;
    let outcome = client.sync(credential, &template.path).await?;

    // Step 4: Unpack and compile
    info!("Step 4: Installing translations");
    let filter = ArchiveFilter::new(config.crowdin_archive_prefix.as_str());
    let installed = installer::install(
        &outcome.archive,
        &filter,
        &config.locale_dir(),
        &config.domain,
        compiler,
    )?;

    Ok(PipelineReport {
        source_files: sources.len(),
        template,
        template_messages,
        pushed: outcome.pushed,
        extracted: installed.extracted,
        compiled: installed.compiled,
    })
}
