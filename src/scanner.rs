use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Source files to hand to the extractor, relative to the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFileSet {
    files: Vec<PathBuf>,
}

impl SourceFileSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Write the listing artifact consumed by the extractor, one path per line.
    ///
    /// Any previous listing is replaced.
    pub fn write_listing(&self, path: &Path) -> Result<()> {
        let mut contents = String::new();
        for file in &self.files {
            contents.push_str(&file.to_string_lossy());
            contents.push('\n');
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write file listing {}", path.display()))
    }
}

/// Collect every file under `roots` whose extension is in `extensions`.
///
/// Roots are visited in the order given and files inside a root are sorted,
/// so the same tree always yields the same listing. A root that does not
/// exist contributes nothing.
pub fn scan_sources(repo_root: &Path, roots: &[String], extensions: &[String]) -> SourceFileSet {
    let mut files = Vec::new();

    for root in roots {
        let dir = repo_root.join(root);
        if !dir.is_dir() {
            warn!("Source directory {} not found, skipping", dir.display());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Cannot access path: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(repo_root)
                .unwrap_or(entry.path())
                .to_path_buf();
            found.push(relative);
        }

        debug!("{}: {} files", dir.display(), found.len());
        files.extend(found);
    }

    SourceFileSet { files }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|wanted| wanted == ext))
        .unwrap_or(false)
}
