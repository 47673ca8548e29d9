use polib::catalog::Catalog;
use polib::message::Message;
use polib::metadata::CatalogMetadata;
use polib::{mo_file, po_file};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use super::{CatalogCompiler, TextExtractor, ToolError};

// `_("...")` or `_('...')` with a single literal argument
static CALL_REGEX: OnceLock<Regex> = OnceLock::new();

/// Extracts `_()` call sites from Python and Kivy sources without gettext installed
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeExtractor;

impl NativeExtractor {
    fn invalid(&self, input: &Path, reason: impl ToString) -> ToolError {
        ToolError::Invalid {
            tool: self.name().to_string(),
            input: input.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl TextExtractor for NativeExtractor {
    fn name(&self) -> &str {
        "native extractor"
    }

    fn extract(&self, working_dir: &Path, listing: &Path, output: &Path) -> Result<(), ToolError> {
        let listed = std::fs::read_to_string(listing).map_err(|e| self.invalid(listing, e))?;

        // Sorted by msgid, each id once, references in discovery order
        let mut found: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for file in listed.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let path = working_dir.join(file);
            let source = std::fs::read_to_string(&path).map_err(|e| self.invalid(&path, e))?;

            for (id, line) in find_calls(&source) {
                found
                    .entry(id)
                    .or_default()
                    .push(format!("{}:{}", file, line));
            }
        }

        debug!("{}: {} distinct messages", self.name(), found.len());

        let mut catalog = Catalog::new(template_metadata());
        for (id, references) in found {
            let message = Message::build_singular()
                .with_source(references.join(" "))
                .with_msgid(id)
                .with_msgstr(String::new())
                .done();
            catalog.append_or_update(message);
        }

        po_file::write(&catalog, output).map_err(|e| self.invalid(output, e))
    }
}

/// Header of a fresh template. No creation date, so reruns are byte-identical.
fn template_metadata() -> CatalogMetadata {
    let mut metadata = CatalogMetadata::new();
    metadata.mime_version = "1.0".to_string();
    metadata.content_type = "text/plain; charset=UTF-8".to_string();
    metadata.content_transfer_encoding = "8bit".to_string();
    metadata
}

/// Every translatable literal in `source` with its 1-based line number
fn find_calls(source: &str) -> Vec<(String, usize)> {
    let regex = CALL_REGEX.get_or_init(|| {
        Regex::new(r#"\b_\(\s*(?:"((?:[^"\\\n]|\\.)*)"|'((?:[^'\\\n]|\\.)*)')\s*\)"#).unwrap()
    });

    regex
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let literal = caps.get(1).or_else(|| caps.get(2))?;
            let line = source[..whole.start()].matches('\n').count() + 1;
            let text = unescape(literal.as_str());
            (!text.is_empty()).then_some((text, line))
        })
        .collect()
}

/// Resolve the common escapes of a Python string literal
fn unescape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Compiles `.po` files to `.mo` in process
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCompiler;

impl CatalogCompiler for NativeCompiler {
    fn name(&self) -> &str {
        "native compiler"
    }

    fn compile(&self, catalog: &Path, output: &Path) -> Result<(), ToolError> {
        let invalid = |reason: String| ToolError::Invalid {
            tool: self.name().to_string(),
            input: catalog.display().to_string(),
            reason,
        };

        let parsed = po_file::parse(catalog).map_err(|e| invalid(e.to_string()))?;

        mo_file::write(&parsed, output)
            .map_err(|e| invalid(format!("cannot write {}: {}", output.display(), e)))
    }
}
