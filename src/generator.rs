use anyhow::{anyhow, Context, Result};
use polib::po_file;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::toolchain::TextExtractor;

pub const TEMPLATE_FILE: &str = "messages.pot";

/// The freshly generated template, regenerated from scratch every run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTemplate {
    pub path: PathBuf,
}

impl CatalogTemplate {
    /// Number of messages in the template, header excluded
    pub fn message_count(&self) -> Result<usize> {
        let catalog = po_file::parse(&self.path)
            .map_err(|err| anyhow!("{err}"))
            .with_context(|| format!("Failed to parse template {}", self.path.display()))?;
        Ok(catalog.messages().count())
    }
}

/// Run the extractor over the listed sources into `<locale_dir>/messages.pot`.
///
/// Creates `locale_dir` when missing. Any previous template is removed first,
/// so an extractor that exits cleanly without writing cannot leave a stale
/// template behind to be uploaded.
pub fn generate_template(
    repo_root: &Path,
    listing: &Path,
    locale_dir: &Path,
    extractor: &dyn TextExtractor,
) -> Result<CatalogTemplate> {
    std::fs::create_dir_all(locale_dir)
        .with_context(|| format!("Failed to create {}", locale_dir.display()))?;

    let path = locale_dir.join(TEMPLATE_FILE);
    match std::fs::remove_file(&path) {
        Ok(()) => debug!("Removed previous template {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to remove old template {}", path.display()))
        }
    }

    info!("Generating template with {}", extractor.name());
    extractor
        .extract(repo_root, listing, &path)
        .context("Template generation failed")?;

    if !path.is_file() {
        anyhow::bail!("{} exited cleanly but wrote no template to {}", extractor.name(), path.display());
    }

    Ok(CatalogTemplate { path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{NativeExtractor, ToolError};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records each call and writes a fixed template
    #[derive(Default)]
    struct RecordingExtractor {
        calls: Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>,
    }

    impl TextExtractor for RecordingExtractor {
        fn name(&self) -> &str {
            "recording"
        }

        fn extract(&self, working_dir: &Path, listing: &Path, output: &Path) -> Result<(), ToolError> {
            self.calls.lock().unwrap().push((
                working_dir.to_path_buf(),
                listing.to_path_buf(),
                output.to_path_buf(),
            ));
            std::fs::write(output, "msgid \"\"\nmsgstr \"\"\n\nmsgid \"Send\"\nmsgstr \"\"\n").unwrap();
            Ok(())
        }
    }

    /// Succeeds without producing output, like xgettext on a tree with no strings
    struct SilentExtractor;

    impl TextExtractor for SilentExtractor {
        fn name(&self) -> &str {
            "xgettext"
        }

        fn extract(&self, _: &Path, _: &Path, _: &Path) -> Result<(), ToolError> {
            Ok(())
        }
    }

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn name(&self) -> &str {
            "xgettext"
        }

        fn extract(&self, _: &Path, listing: &Path, _: &Path) -> Result<(), ToolError> {
            Err(ToolError::Failed {
                tool: "xgettext".to_string(),
                input: listing.display().to_string(),
                status: "exit status: 1".to_string(),
                stderr: "gui/broken.py:3: unterminated string".to_string(),
            })
        }
    }

    #[test]
    fn test_creates_locale_dir_and_passes_paths() {
        let temp_dir = TempDir::new().unwrap();
        let listing = temp_dir.path().join("app.fil");
        let locale_dir = temp_dir.path().join("lib/locale");
        let extractor = RecordingExtractor::default();

        let template = generate_template(temp_dir.path(), &listing, &locale_dir, &extractor).unwrap();

        assert!(locale_dir.is_dir());
        assert_eq!(template.path, locale_dir.join("messages.pot"));
        assert_eq!(template.message_count().unwrap(), 1);

        let calls = extractor.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(temp_dir.path().to_path_buf(), listing.clone(), template.path.clone())]
        );
    }

    #[test]
    fn test_existing_locale_dir_is_fine() {
        let temp_dir = TempDir::new().unwrap();
        let locale_dir = temp_dir.path().join("locale");
        std::fs::create_dir_all(&locale_dir).unwrap();

        let result = generate_template(
            temp_dir.path(),
            &temp_dir.path().join("app.fil"),
            &locale_dir,
            &RecordingExtractor::default(),
        );

        assert!(result.is_ok());
    }

    #[test]
    fn test_extractor_failure_is_surfaced() {
        let temp_dir = TempDir::new().unwrap();

        let err = generate_template(
            temp_dir.path(),
            &temp_dir.path().join("app.fil"),
            &temp_dir.path().join("locale"),
            &FailingExtractor,
        )
        .unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("Template generation failed"));
        assert!(message.contains("xgettext failed"));
        assert!(message.contains("unterminated string"));
    }

    #[test]
    fn test_generation_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("gui")).unwrap();
        std::fs::write(temp_dir.path().join("gui/a.py"), "_(\"Send\")\n_(\"Receive\")\n").unwrap();
        let listing = temp_dir.path().join("app.fil");
        std::fs::write(&listing, "gui/a.py\n").unwrap();
        let locale_dir = temp_dir.path().join("lib/locale");

        let first = generate_template(temp_dir.path(), &listing, &locale_dir, &NativeExtractor).unwrap();
        let first_bytes = std::fs::read(&first.path).unwrap();
        let second = generate_template(temp_dir.path(), &listing, &locale_dir, &NativeExtractor).unwrap();
        let second_bytes = std::fs::read(&second.path).unwrap();

        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn test_stale_template_does_not_survive_silent_extractor() {
        let temp_dir = TempDir::new().unwrap();
        let locale_dir = temp_dir.path().join("lib/locale");
        std::fs::create_dir_all(&locale_dir).unwrap();
        let stale = locale_dir.join(TEMPLATE_FILE);
        std::fs::write(&stale, "msgid \"Removed string\"\nmsgstr \"\"\n").unwrap();

        let err = generate_template(
            temp_dir.path(),
            &temp_dir.path().join("app.fil"),
            &locale_dir,
            &SilentExtractor,
        )
        .unwrap_err();

        assert!(err.to_string().contains("wrote no template"));
        assert!(!stale.exists());
    }

    #[test]
    fn test_failed_extraction_leaves_no_template() {
        let temp_dir = TempDir::new().unwrap();
        let locale_dir = temp_dir.path().join("locale");
        std::fs::create_dir_all(&locale_dir).unwrap();
        std::fs::write(locale_dir.join(TEMPLATE_FILE), "old").unwrap();

        let result = generate_template(
            temp_dir.path(),
            &temp_dir.path().join("app.fil"),
            &locale_dir,
            &FailingExtractor,
        );

        assert!(result.is_err());
        assert!(!locale_dir.join(TEMPLATE_FILE).exists());
    }
}
