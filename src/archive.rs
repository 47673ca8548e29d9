use anyhow::{Context, Result};
use std::io::{Cursor, Read};
use std::path::{Component, Path};
use tracing::debug;
use zip::ZipArchive;

/// Export archive as downloaded, held in memory until extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArchive {
    bytes: Vec<u8>,
}

impl RemoteArchive {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Which archive entries get installed.
///
/// An entry is kept only when its name lies strictly below the namespace
/// prefix and the remainder is a plain relative path. Everything else is
/// ignored, not reported as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFilter {
    prefix: String,
}

impl ArchiveFilter {
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The install path of `name` relative to the locale directory, if accepted
    pub fn accept<'a>(&self, name: &'a str) -> Option<&'a str> {
        let rest = name.strip_prefix(&self.prefix)?;
        let trimmed = rest.trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }

        let safe = Path::new(trimmed)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then_some(rest)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files_written: usize,
    pub directories: usize,
    pub ignored: usize,
}

/// Unpack the accepted entries of `archive` below `destination`.
///
/// Directory entries (trailing `/`) are created if missing; file entries are
/// written verbatim, replacing existing files.
pub fn extract(
    archive: &RemoteArchive,
    filter: &ArchiveFilter,
    destination: &Path,
) -> Result<ExtractReport> {
    let mut zip = ZipArchive::new(Cursor::new(archive.as_bytes()))
        .context("Downloaded export is not a valid zip archive")?;
    let mut report = ExtractReport::default();

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .with_context(|| format!("Failed to read archive entry #{}", index))?;
        let name = entry.name().to_string();

        let Some(relative) = filter.accept(&name) else {
            debug!("Ignoring archive entry {}", name);
            report.ignored += 1;
            continue;
        };
        let target = destination.join(relative);

        if name.ends_with('/') {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            report.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Declared sizes come from the archive and are not trusted for allocation
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .with_context(|| format!("Failed to decompress {}", name))?;
        std::fs::write(&target, contents)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        report.files_written += 1;
    }

    Ok(report)
}
